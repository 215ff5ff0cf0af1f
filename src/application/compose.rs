//! Write-side operations: post create/edit and comments.
//!
//! Validation failures are reported per field so the form can be
//! re-rendered in place; nothing is persisted on a failed draft. Post
//! mutation deliberately does not touch the home-listing cache.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{
    CommentsWriteRepo, CreateCommentParams, CreatePostParams, GroupsRepo, PostsRepo,
    PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{CommentRecord, PostRecord, UserRecord};
use crate::domain::posts;
use crate::infra::uploads::{UploadStorage, UploadStorageError};

const TEXT_REQUIRED: &str = "Enter the post text.";
const GROUP_UNKNOWN: &str = "Select one of the existing groups.";
const IMAGE_INVALID: &str = "Upload a valid image file.";

/// Raw form payload for post create/edit.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<ImageUpload>,
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFormErrors {
    pub text: Option<String>,
    pub group: Option<String>,
    pub image: Option<String>,
}

impl PostFormErrors {
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.group.is_none() && self.image.is_none()
    }
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("post form validation failed")]
    Invalid(PostFormErrors),
    #[error("comment text must not be empty")]
    EmptyComment,
    #[error("post not found")]
    UnknownPost,
    #[error("only the author may edit a post")]
    NotAuthor,
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("attachment storage failed: {0}")]
    Storage(#[from] UploadStorageError),
}

struct ValidDraft {
    text: String,
    group_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct ComposeService {
    posts: Arc<dyn PostsRepo>,
    posts_write: Arc<dyn PostsWriteRepo>,
    groups: Arc<dyn GroupsRepo>,
    comments_write: Arc<dyn CommentsWriteRepo>,
    storage: Arc<UploadStorage>,
}

impl ComposeService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        posts_write: Arc<dyn PostsWriteRepo>,
        groups: Arc<dyn GroupsRepo>,
        comments_write: Arc<dyn CommentsWriteRepo>,
        storage: Arc<UploadStorage>,
    ) -> Self {
        Self {
            posts,
            posts_write,
            groups,
            comments_write,
            storage,
        }
    }

    pub async fn create_post(
        &self,
        author: &UserRecord,
        draft: PostDraft,
    ) -> Result<PostRecord, ComposeError> {
        let valid = self.validate(&draft).await?;

        let id = Uuid::new_v4();
        let image_path = self.store_attachment(id, draft.image.as_ref()).await?;

        let record = self
            .posts_write
            .create_post(CreatePostParams {
                id,
                author_id: author.id,
                group_id: valid.group_id,
                text: valid.text,
                image_path,
            })
            .await?;

        Ok(record)
    }

    pub async fn update_post(
        &self,
        editor: &UserRecord,
        id: Uuid,
        draft: PostDraft,
    ) -> Result<PostRecord, ComposeError> {
        let existing = self.editable_post(editor, id).await?;
        let valid = self.validate(&draft).await?;

        let image_path = self
            .store_attachment(existing.id, draft.image.as_ref())
            .await?;

        let record = self
            .posts_write
            .update_post(UpdatePostParams {
                id: existing.id,
                group_id: valid.group_id,
                text: valid.text,
                image_path,
            })
            .await?;

        Ok(record)
    }

    /// Fetch a post for its edit form, enforcing the author-only rule.
    pub async fn editable_post(
        &self,
        editor: &UserRecord,
        id: Uuid,
    ) -> Result<PostRecord, ComposeError> {
        let post = self
            .posts
            .find_by_id(id)
            .await?
            .ok_or(ComposeError::UnknownPost)?;

        if post.author_id != editor.id {
            return Err(ComposeError::NotAuthor);
        }

        Ok(post)
    }

    pub async fn add_comment(
        &self,
        author: &UserRecord,
        post_id: Uuid,
        text: &str,
    ) -> Result<CommentRecord, ComposeError> {
        let post = self
            .posts
            .find_by_id(post_id)
            .await?
            .ok_or(ComposeError::UnknownPost)?;
        let text = posts::normalized_text(text).ok_or(ComposeError::EmptyComment)?;

        let record = self
            .comments_write
            .create_comment(CreateCommentParams {
                id: Uuid::new_v4(),
                post_id: post.id,
                author_id: author.id,
                text,
            })
            .await?;

        Ok(record)
    }

    async fn validate(&self, draft: &PostDraft) -> Result<ValidDraft, ComposeError> {
        let mut errors = PostFormErrors::default();

        let text = posts::normalized_text(&draft.text);
        if text.is_none() {
            errors.text = Some(TEXT_REQUIRED.to_string());
        }

        let group_id = match draft.group.as_deref() {
            None => None,
            Some(slug) => match self.groups.find_by_slug(slug).await? {
                Some(group) => Some(group.id),
                None => {
                    errors.group = Some(GROUP_UNKNOWN.to_string());
                    None
                }
            },
        };

        if let Some(image) = draft.image.as_ref() {
            if !is_valid_image(image) {
                errors.image = Some(IMAGE_INVALID.to_string());
            }
        }

        match (text, errors.is_empty()) {
            (Some(text), true) => Ok(ValidDraft { text, group_id }),
            _ => Err(ComposeError::Invalid(errors)),
        }
    }

    async fn store_attachment(
        &self,
        post_id: Uuid,
        image: Option<&ImageUpload>,
    ) -> Result<Option<String>, ComposeError> {
        let Some(image) = image else {
            return Ok(None);
        };

        let stored = self
            .storage
            .store_image(post_id, &image.filename, &image.bytes)
            .await?;
        Ok(Some(stored.stored_path))
    }
}

/// An attachment is accepted only when the declared content type is an image
/// and the payload parses as one.
fn is_valid_image(image: &ImageUpload) -> bool {
    image.content_type.starts_with("image/") && imagesize::blob_size(&image.bytes).is_ok()
}
