//! Session-based identity seam.
//!
//! Credential verification is out of scope for this service; logging in
//! resolves an existing username (provisioned via the operator CLI) and
//! binds its id to the cookie session. Everything else only asks "who is
//! the viewer", via [`current_user`].

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use url::Url;
use uuid::Uuid;

use crate::application::repos::UsersRepo;
use crate::domain::entities::UserRecord;
use crate::presentation::views::{LayoutContext, LoginTemplate, LoginView, render_template_response};

use super::public::HttpState;
use super::repo_error_to_http;
use crate::application::error::HttpError;

const SESSION_USER_KEY: &str = "user_id";
const SOURCE: &str = "infra::http::auth";

/// Resolve the authenticated user bound to the session, if any.
pub(super) async fn current_user(
    session: &Session,
    users: &dyn UsersRepo,
) -> Result<Option<UserRecord>, HttpError> {
    let user_id: Option<Uuid> = session.get(SESSION_USER_KEY).await.map_err(|err| {
        HttpError::new(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Session unavailable",
            err.to_string(),
        )
    })?;

    let Some(user_id) = user_id else {
        return Ok(None);
    };

    users
        .find_by_id(user_id)
        .await
        .map_err(|err| repo_error_to_http(SOURCE, err))
}

/// Redirect an unauthenticated request to the login form, preserving the
/// originally requested path.
pub(super) fn login_redirect(next: &str) -> Response {
    Redirect::to(&format!("/auth/login/?next={next}")).into_response()
}

/// Only same-site absolute paths are accepted as post-login targets.
fn safe_next(raw: Option<&str>) -> String {
    match raw {
        Some(path)
            if path.starts_with('/') && !path.starts_with("//") && Url::parse(path).is_err() =>
        {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LoginQuery {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    next: Option<String>,
}

pub(super) async fn login_form(
    State(state): State<HttpState>,
    session: Session,
    Query(query): Query<LoginQuery>,
) -> Response {
    let viewer = match current_user(&session, state.users.as_ref()).await {
        Ok(viewer) => viewer,
        Err(err) => return err.into_response(),
    };

    let view = LayoutContext::new(
        viewer.as_ref().map(Into::into),
        LoginView {
            username: String::new(),
            next: safe_next(query.next.as_deref()),
            error: None,
        },
    );
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

pub(super) async fn login_submit(
    State(state): State<HttpState>,
    session: Session,
    axum::Form(form): axum::Form<LoginForm>,
) -> Response {
    let username = form.username.trim();
    let next = safe_next(form.next.as_deref());

    match state.users.find_by_username(username).await {
        Ok(Some(user)) => {
            if let Err(err) = session.insert(SESSION_USER_KEY, user.id).await {
                return HttpError::new(
                    SOURCE,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Session unavailable",
                    err.to_string(),
                )
                .into_response();
            }
            Redirect::to(&next).into_response()
        }
        Ok(None) => {
            let view = LayoutContext::new(
                None,
                LoginView {
                    username: username.to_string(),
                    next,
                    error: Some("Unknown username.".to_string()),
                },
            );
            render_template_response(LoginTemplate { view }, StatusCode::OK)
        }
        Err(err) => repo_error_to_http(SOURCE, err).into_response(),
    }
}

pub(super) async fn logout(session: Session) -> Response {
    if let Err(err) = session.flush().await {
        return HttpError::new(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Session unavailable",
            err.to_string(),
        )
        .into_response();
    }
    Redirect::to("/").into_response()
}
