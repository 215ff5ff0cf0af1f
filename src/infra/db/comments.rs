use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CommentsRepo, CommentsWriteRepo, CreateCommentParams, RepoError,
};
use crate::domain::entities::CommentRecord;

use super::PgRepositories;
use super::util::map_sqlx_error;

const COMMENT_SELECT: &str = "SELECT c.id, c.post_id, c.author_id, \
     u.username AS author_username, c.text, c.created_at \
     FROM comments c \
     INNER JOIN users u ON u.id = c.author_id";

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    post_id: Uuid,
    author_id: Uuid,
    author_username: String,
    text: String,
    created_at: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            author_username: row.author_username,
            text: row.text,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl CommentsRepo for PgRepositories {
    async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        sqlx::query_as::<_, CommentRow>(&format!(
            "{COMMENT_SELECT} WHERE c.post_id = $1 ORDER BY c.created_at, c.id"
        ))
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map(|rows| rows.into_iter().map(Into::into).collect())
        .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl CommentsWriteRepo for PgRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        sqlx::query(
            "INSERT INTO comments (id, post_id, author_id, text) VALUES ($1, $2, $3, $4)",
        )
        .bind(params.id)
        .bind(params.post_id)
        .bind(params.author_id)
        .bind(&params.text)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        sqlx::query_as::<_, CommentRow>(&format!("{COMMENT_SELECT} WHERE c.id = $1"))
            .bind(params.id)
            .fetch_one(self.pool())
            .await
            .map(Into::into)
            .map_err(map_sqlx_error)
    }
}
