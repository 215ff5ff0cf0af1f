//! Operator provisioning entry points used by the CLI subcommands.
//!
//! Account signup and group administration have no web surface; users and
//! groups are provisioned out of band, directly against the repositories.

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{
    CreateGroupParams, CreateUserParams, GroupsWriteRepo, RepoError, UsersWriteRepo,
};
use crate::domain::accounts;
use crate::domain::entities::{GroupRecord, UserRecord};
use crate::domain::error::DomainError;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} already exists")]
    Duplicate { entity: &'static str },
    #[error(transparent)]
    Repo(RepoError),
}

impl ProvisionError {
    fn from_repo(entity: &'static str, err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { .. } => Self::Duplicate { entity },
            other => Self::Repo(other),
        }
    }
}

pub async fn create_user(
    users: &dyn UsersWriteRepo,
    username: &str,
) -> Result<UserRecord, ProvisionError> {
    let username = accounts::validate_username(username)?;

    users
        .create_user(CreateUserParams {
            id: Uuid::new_v4(),
            username,
        })
        .await
        .map_err(|err| ProvisionError::from_repo("user", err))
}

pub async fn create_group(
    groups: &dyn GroupsWriteRepo,
    title: &str,
    slug: Option<&str>,
    description: &str,
) -> Result<GroupRecord, ProvisionError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(DomainError::validation("group title must not be empty").into());
    }

    let slug = accounts::resolve_group_slug(title, slug)?;

    groups
        .create_group(CreateGroupParams {
            id: Uuid::new_v4(),
            slug,
            title: title.to_string(),
            description: description.trim().to_string(),
        })
        .await
        .map_err(|err| ProvisionError::from_repo("group", err))
}
