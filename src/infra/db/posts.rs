use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreatePostParams, PostListFilter, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{PostGroupRef, PostRecord};

use super::PgRepositories;
use super::util::map_sqlx_error;

const POST_SELECT: &str = "SELECT p.id, p.text, p.author_id, u.username AS author_username, \
     p.group_id, g.slug AS group_slug, g.title AS group_title, \
     p.image_path, p.created_at, p.updated_at \
     FROM posts p \
     INNER JOIN users u ON u.id = p.author_id \
     LEFT JOIN groups g ON g.id = p.group_id";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    text: String,
    author_id: Uuid,
    author_username: String,
    group_id: Option<Uuid>,
    group_slug: Option<String>,
    group_title: Option<String>,
    image_path: Option<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        let group = match (row.group_id, row.group_slug, row.group_title) {
            (Some(id), Some(slug), Some(title)) => Some(PostGroupRef { id, slug, title }),
            _ => None,
        };

        Self {
            id: row.id,
            text: row.text,
            author_id: row.author_id,
            author_username: row.author_username,
            group,
            image_path: row.image_path,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn apply_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q PostListFilter) {
    if let Some(group_id) = filter.group_id {
        qb.push(" AND p.group_id = ");
        qb.push_bind(group_id);
    }
    if let Some(author_id) = filter.author_id {
        qb.push(" AND p.author_id = ");
        qb.push_bind(author_id);
    }
}

impl PgRepositories {
    async fn post_by_id_required(&self, id: Uuid) -> Result<PostRecord, RepoError> {
        PostsRepo::find_by_id(self, id)
            .await?
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl PostsRepo for PgRepositories {
    async fn list_ordered(&self, filter: &PostListFilter) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(POST_SELECT);
        qb.push(" WHERE 1=1 ");
        apply_filter(&mut qb, filter);
        qb.push(" ORDER BY p.created_at DESC, p.id DESC ");

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count(&self, filter: &PostListFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM posts p WHERE 1=1 ");
        apply_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        count
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        sqlx::query_as::<_, PostRow>(&format!("{POST_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map(|row| row.map(Into::into))
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl PostsWriteRepo for PgRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        sqlx::query(
            "INSERT INTO posts (id, author_id, group_id, text, image_path) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(params.id)
        .bind(params.author_id)
        .bind(params.group_id)
        .bind(&params.text)
        .bind(&params.image_path)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        self.post_by_id_required(params.id).await
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let result = sqlx::query(
            "UPDATE posts SET text = $2, group_id = $3, \
             image_path = COALESCE($4, image_path), updated_at = now() \
             WHERE id = $1",
        )
        .bind(params.id)
        .bind(&params.text)
        .bind(params.group_id)
        .bind(&params.image_path)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        self.post_by_id_required(params.id).await
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        Ok(())
    }
}
