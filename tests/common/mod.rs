//! In-memory repository fakes shared by the integration tests.

#![allow(dead_code)]

use std::sync::{
    Mutex,
    atomic::{AtomicI64, Ordering},
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use piazza::application::repos::{
    CommentsRepo, CommentsWriteRepo, CreateCommentParams, CreateGroupParams, CreatePostParams,
    CreateUserParams, GroupsRepo, GroupsWriteRepo, PostListFilter, PostsRepo, PostsWriteRepo,
    RepoError, UpdatePostParams, UsersRepo, UsersWriteRepo,
};
use piazza::domain::entities::{
    CommentRecord, GroupRecord, PostGroupRef, PostRecord, UserRecord,
};

// Smallest well-formed GIF, used where a valid image payload is needed.
pub const TINY_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x02, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xFF, 0xFF, 0xFF, 0x21, 0xF9, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2C, 0x00, 0x00,
    0x00, 0x00, 0x02, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x0C, 0x0A, 0x00, 0x3B,
];

struct SeqPost {
    seq: i64,
    record: PostRecord,
}

struct SeqComment {
    seq: i64,
    record: CommentRecord,
}

/// Shared in-memory store implementing every repository trait.
///
/// Insertion order stands in for the `created_at` tie-break of the real
/// schema, so listings are deterministic even when timestamps collide.
#[derive(Default)]
pub struct MemoryRepos {
    users: Mutex<Vec<UserRecord>>,
    groups: Mutex<Vec<GroupRecord>>,
    posts: Mutex<Vec<SeqPost>>,
    comments: Mutex<Vec<SeqComment>>,
    seq: AtomicI64,
}

impl MemoryRepos {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_seq(&self) -> i64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    pub fn seed_user(&self, username: &str) -> UserRecord {
        let record = UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.users.lock().expect("users lock").push(record.clone());
        record
    }

    pub fn seed_group(&self, slug: &str, title: &str) -> GroupRecord {
        let record = GroupRecord {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            title: title.to_string(),
            description: String::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        self.groups
            .lock()
            .expect("groups lock")
            .push(record.clone());
        record
    }

    /// Insert a post directly, bypassing validation, the way a fixture would.
    pub fn seed_post(
        &self,
        author: &UserRecord,
        group: Option<&GroupRecord>,
        text: &str,
    ) -> PostRecord {
        let now = OffsetDateTime::now_utc();
        let record = PostRecord {
            id: Uuid::new_v4(),
            text: text.to_string(),
            author_id: author.id,
            author_username: author.username.clone(),
            group: group.map(|group| PostGroupRef {
                id: group.id,
                slug: group.slug.clone(),
                title: group.title.clone(),
            }),
            image_path: None,
            created_at: now,
            updated_at: now,
        };
        self.posts.lock().expect("posts lock").push(SeqPost {
            seq: self.next_seq(),
            record: record.clone(),
        });
        record
    }

    fn matches(record: &PostRecord, filter: &PostListFilter) -> bool {
        if let Some(group_id) = filter.group_id {
            if record.group.as_ref().map(|group| group.id) != Some(group_id) {
                return false;
            }
        }
        if let Some(author_id) = filter.author_id {
            if record.author_id != author_id {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl UsersRepo for MemoryRepos {
    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .expect("users lock")
            .iter()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .expect("users lock")
            .iter()
            .find(|user| user.id == id)
            .cloned())
    }
}

#[async_trait]
impl UsersWriteRepo for MemoryRepos {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut users = self.users.lock().expect("users lock");
        if users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: "users_username_key".to_string(),
            });
        }

        let record = UserRecord {
            id: params.id,
            username: params.username,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl GroupsRepo for MemoryRepos {
    async fn find_by_slug(&self, slug: &str) -> Result<Option<GroupRecord>, RepoError> {
        Ok(self
            .groups
            .lock()
            .expect("groups lock")
            .iter()
            .find(|group| group.slug == slug)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<GroupRecord>, RepoError> {
        let mut groups: Vec<GroupRecord> =
            self.groups.lock().expect("groups lock").iter().cloned().collect();
        groups.sort_by(|left, right| left.title.cmp(&right.title));
        Ok(groups)
    }
}

#[async_trait]
impl GroupsWriteRepo for MemoryRepos {
    async fn create_group(&self, params: CreateGroupParams) -> Result<GroupRecord, RepoError> {
        let mut groups = self.groups.lock().expect("groups lock");
        if groups.iter().any(|group| group.slug == params.slug) {
            return Err(RepoError::Duplicate {
                constraint: "groups_slug_key".to_string(),
            });
        }

        let record = GroupRecord {
            id: params.id,
            slug: params.slug,
            title: params.title,
            description: params.description,
            created_at: OffsetDateTime::now_utc(),
        };
        groups.push(record.clone());
        Ok(record)
    }
}

#[async_trait]
impl PostsRepo for MemoryRepos {
    async fn list_ordered(&self, filter: &PostListFilter) -> Result<Vec<PostRecord>, RepoError> {
        let posts = self.posts.lock().expect("posts lock");
        let mut matching: Vec<(i64, PostRecord)> = posts
            .iter()
            .filter(|post| Self::matches(&post.record, filter))
            .map(|post| (post.seq, post.record.clone()))
            .collect();
        matching.sort_by(|left, right| right.0.cmp(&left.0));
        Ok(matching.into_iter().map(|(_, record)| record).collect())
    }

    async fn count(&self, filter: &PostListFilter) -> Result<u64, RepoError> {
        let posts = self.posts.lock().expect("posts lock");
        Ok(posts
            .iter()
            .filter(|post| Self::matches(&post.record, filter))
            .count() as u64)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self
            .posts
            .lock()
            .expect("posts lock")
            .iter()
            .find(|post| post.record.id == id)
            .map(|post| post.record.clone()))
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepos {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let author = self
            .users
            .lock()
            .expect("users lock")
            .iter()
            .find(|user| user.id == params.author_id)
            .cloned()
            .ok_or(RepoError::InvalidInput {
                message: "unknown author".to_string(),
            })?;

        let group = match params.group_id {
            None => None,
            Some(group_id) => Some(
                self.groups
                    .lock()
                    .expect("groups lock")
                    .iter()
                    .find(|group| group.id == group_id)
                    .map(|group| PostGroupRef {
                        id: group.id,
                        slug: group.slug.clone(),
                        title: group.title.clone(),
                    })
                    .ok_or(RepoError::InvalidInput {
                        message: "unknown group".to_string(),
                    })?,
            ),
        };

        let now = OffsetDateTime::now_utc();
        let record = PostRecord {
            id: params.id,
            text: params.text,
            author_id: author.id,
            author_username: author.username,
            group,
            image_path: params.image_path,
            created_at: now,
            updated_at: now,
        };
        self.posts.lock().expect("posts lock").push(SeqPost {
            seq: self.next_seq(),
            record: record.clone(),
        });
        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let group = match params.group_id {
            None => None,
            Some(group_id) => Some(
                self.groups
                    .lock()
                    .expect("groups lock")
                    .iter()
                    .find(|group| group.id == group_id)
                    .map(|group| PostGroupRef {
                        id: group.id,
                        slug: group.slug.clone(),
                        title: group.title.clone(),
                    })
                    .ok_or(RepoError::InvalidInput {
                        message: "unknown group".to_string(),
                    })?,
            ),
        };

        let mut posts = self.posts.lock().expect("posts lock");
        let post = posts
            .iter_mut()
            .find(|post| post.record.id == params.id)
            .ok_or(RepoError::NotFound)?;

        post.record.text = params.text;
        post.record.group = group;
        if let Some(image_path) = params.image_path {
            post.record.image_path = Some(image_path);
        }
        post.record.updated_at = OffsetDateTime::now_utc();

        Ok(post.record.clone())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let mut posts = self.posts.lock().expect("posts lock");
        let before = posts.len();
        posts.retain(|post| post.record.id != id);
        if posts.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepos {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let comments = self.comments.lock().expect("comments lock");
        let mut matching: Vec<(i64, CommentRecord)> = comments
            .iter()
            .filter(|comment| comment.record.post_id == post_id)
            .map(|comment| (comment.seq, comment.record.clone()))
            .collect();
        matching.sort_by(|left, right| left.0.cmp(&right.0));
        Ok(matching.into_iter().map(|(_, record)| record).collect())
    }
}

#[async_trait]
impl CommentsWriteRepo for MemoryRepos {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let author = self
            .users
            .lock()
            .expect("users lock")
            .iter()
            .find(|user| user.id == params.author_id)
            .cloned()
            .ok_or(RepoError::InvalidInput {
                message: "unknown author".to_string(),
            })?;

        let record = CommentRecord {
            id: params.id,
            post_id: params.post_id,
            author_id: author.id,
            author_username: author.username,
            text: params.text,
            created_at: OffsetDateTime::now_utc(),
        };
        self.comments.lock().expect("comments lock").push(SeqComment {
            seq: self.next_seq(),
            record: record.clone(),
        });
        Ok(record)
    }
}
