//! Read-side composition for the listing surfaces.
//!
//! The home listing is served through the injected [`ListingCache`]; group
//! and profile listings always query fresh, which is why deleting a post
//! disappears from those surfaces immediately while the home page may keep
//! showing it until the cache entry expires.

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono_tz::Tz;
use thiserror::Error;
use uuid::Uuid;

use crate::application::listing_cache::ListingCache;
use crate::application::pagination::{Page, PageNumber, paginate};
use crate::application::repos::{
    CommentsRepo, GroupsRepo, PostListFilter, PostsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{CommentRecord, PostRecord};
use crate::domain::posts;
use crate::presentation::views::{
    CommentView, GroupBadge, GroupPageView, ListingView, PaginationView, PostCard, PostDetailView,
    ProfilePageView,
};
use crate::util::timezone;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown group")]
    UnknownGroup,
    #[error("unknown user")]
    UnknownUser,
    #[error("unknown post")]
    UnknownPost,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    groups: Arc<dyn GroupsRepo>,
    users: Arc<dyn UsersRepo>,
    comments: Arc<dyn CommentsRepo>,
    home_cache: Arc<ListingCache<Vec<PostRecord>>>,
    page_size: NonZeroUsize,
    timezone: Tz,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        groups: Arc<dyn GroupsRepo>,
        users: Arc<dyn UsersRepo>,
        comments: Arc<dyn CommentsRepo>,
        home_cache: Arc<ListingCache<Vec<PostRecord>>>,
        page_size: NonZeroUsize,
        timezone: Tz,
    ) -> Self {
        Self {
            posts,
            groups,
            users,
            comments,
            home_cache,
            page_size,
            timezone,
        }
    }

    pub async fn index_page(&self, page: PageNumber) -> Result<ListingView, FeedError> {
        let posts = self.posts.clone();
        let listing = self
            .home_cache
            .get_or_compute(|| async move { posts.list_ordered(&PostListFilter::default()).await })
            .await?;

        Ok(self.listing_view(listing, page, "/"))
    }

    pub async fn group_page(
        &self,
        slug: &str,
        page: PageNumber,
    ) -> Result<GroupPageView, FeedError> {
        let group = self
            .groups
            .find_by_slug(slug)
            .await?
            .ok_or(FeedError::UnknownGroup)?;

        let records = self
            .posts
            .list_ordered(&PostListFilter::for_group(group.id))
            .await?;
        let listing = self.listing_view(records, page, &format!("/group/{}/", group.slug));

        Ok(GroupPageView {
            slug: group.slug,
            title: group.title,
            description: group.description,
            listing,
        })
    }

    pub async fn profile_page(
        &self,
        username: &str,
        page: PageNumber,
    ) -> Result<ProfilePageView, FeedError> {
        let author = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(FeedError::UnknownUser)?;

        let filter = PostListFilter::for_author(author.id);
        let records = self.posts.list_ordered(&filter).await?;
        let post_count = self.posts.count(&filter).await?;
        let listing = self.listing_view(records, page, &format!("/profile/{}/", author.username));

        Ok(ProfilePageView {
            username: author.username,
            post_count,
            listing,
        })
    }

    pub async fn post_detail(&self, id: Uuid) -> Result<PostDetailView, FeedError> {
        let post = self
            .posts
            .find_by_id(id)
            .await?
            .ok_or(FeedError::UnknownPost)?;
        let comments = self.comments.list_for_post(post.id).await?;

        Ok(PostDetailView {
            post: record_to_card(&post, self.timezone),
            comments: comments
                .iter()
                .map(|comment| comment_to_view(comment, self.timezone))
                .collect(),
        })
    }

    fn listing_view(
        &self,
        records: Vec<PostRecord>,
        page: PageNumber,
        base_path: &str,
    ) -> ListingView {
        let page = paginate(records, self.page_size, page);
        let pagination = build_pagination(&page, base_path);

        ListingView {
            posts: page
                .items
                .iter()
                .map(|record| record_to_card(record, self.timezone))
                .collect(),
            pagination,
        }
    }
}

fn record_to_card(record: &PostRecord, timezone: Tz) -> PostCard {
    let date = timezone::localized_date(record.created_at, timezone);

    PostCard {
        id: record.id.to_string(),
        text: record.text.clone(),
        author_username: record.author_username.clone(),
        group: record.group.as_ref().map(|group| GroupBadge {
            slug: group.slug.clone(),
            title: group.title.clone(),
        }),
        image_url: record
            .image_path
            .as_ref()
            .map(|path| format!("/media/{path}")),
        published: posts::format_human_date(date),
    }
}

fn comment_to_view(record: &CommentRecord, timezone: Tz) -> CommentView {
    let date = timezone::localized_date(record.created_at, timezone);

    CommentView {
        author_username: record.author_username.clone(),
        text: record.text.clone(),
        published: posts::format_human_date(date),
    }
}

fn build_pagination(page: &Page<PostRecord>, base_path: &str) -> PaginationView {
    PaginationView {
        number: page.number,
        total_pages: page.total_pages,
        total_items: page.total_items,
        has_previous: page.has_previous(),
        has_next: page.has_next(),
        previous: page.number.saturating_sub(1),
        next: page.number + 1,
        base_path: base_path.to_string(),
    }
}
