use std::io::ErrorKind;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::Deserialize;
use tower_sessions::{MemoryStore, Session, SessionManagerLayer};
use tracing::error;
use uuid::Uuid;

use crate::{
    application::{
        compose::ComposeService,
        error::{ErrorReport, HttpError},
        feed::{FeedError, FeedService},
        pagination::PageNumber,
        repos::{GroupsRepo, UsersRepo},
    },
    infra::uploads::{UploadStorage, UploadStorageError},
    presentation::views::{
        GroupTemplate, IndexTemplate, LayoutContext, PostDetailContent, PostDetailTemplate,
        ProfileTemplate, ViewerView, render_not_found_response, render_template_response,
    },
};

use super::{
    auth, compose,
    middleware::{log_responses, set_request_context},
    repo_error_to_http,
};

#[derive(Clone)]
pub struct HttpState {
    pub feed: Arc<FeedService>,
    pub compose: Arc<ComposeService>,
    pub users: Arc<dyn UsersRepo>,
    pub groups: Arc<dyn GroupsRepo>,
    pub storage: Arc<UploadStorage>,
}

pub fn build_router(state: HttpState, upload_limit_bytes: usize) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_name("piazza_session")
        .with_secure(false);

    Router::new()
        .route("/", get(index))
        .route("/group/{slug}/", get(group_posts))
        .route("/profile/{username}/", get(profile))
        .route("/posts/{id}/", get(post_detail))
        .route(
            "/create/",
            get(compose::create_form).post(compose::create_submit),
        )
        .route(
            "/posts/{id}/edit/",
            get(compose::edit_form).post(compose::edit_submit),
        )
        .route("/posts/{id}/comment/", post(compose::add_comment))
        .route("/auth/login/", get(auth::login_form).post(auth::login_submit))
        .route("/auth/logout/", get(auth::logout))
        .route("/media/{*path}", get(serve_media))
        .with_state(state)
        .layer(DefaultBodyLimit::max(upload_limit_bytes))
        .layer(session_layer)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

/// The page parameter stays a raw string: any malformed value defaults to
/// page 1 instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct PageQuery {
    page: Option<String>,
}

impl PageQuery {
    fn number(&self) -> PageNumber {
        PageNumber::parse(self.page.as_deref())
    }
}

/// Unknown post ids, including unparsable ones, surface as not-found.
pub(super) fn parse_post_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw).ok()
}

async fn index(
    State(state): State<HttpState>,
    session: Session,
    Query(query): Query<PageQuery>,
) -> Response {
    let viewer = match auth::current_user(&session, state.users.as_ref()).await {
        Ok(viewer) => viewer,
        Err(err) => return err.into_response(),
    };
    let viewer = viewer.as_ref().map(ViewerView::from);

    match state.feed.index_page(query.number()).await {
        Ok(content) => render_template_response(
            IndexTemplate {
                view: LayoutContext::new(viewer, content),
            },
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, viewer),
    }
}

async fn group_posts(
    State(state): State<HttpState>,
    session: Session,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let viewer = match auth::current_user(&session, state.users.as_ref()).await {
        Ok(viewer) => viewer,
        Err(err) => return err.into_response(),
    };
    let viewer = viewer.as_ref().map(ViewerView::from);

    match state.feed.group_page(&slug, query.number()).await {
        Ok(content) => render_template_response(
            GroupTemplate {
                view: LayoutContext::new(viewer, content),
            },
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, viewer),
    }
}

async fn profile(
    State(state): State<HttpState>,
    session: Session,
    Path(username): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let viewer = match auth::current_user(&session, state.users.as_ref()).await {
        Ok(viewer) => viewer,
        Err(err) => return err.into_response(),
    };
    let viewer = viewer.as_ref().map(ViewerView::from);

    match state.feed.profile_page(&username, query.number()).await {
        Ok(content) => render_template_response(
            ProfileTemplate {
                view: LayoutContext::new(viewer, content),
            },
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, viewer),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    session: Session,
    Path(id): Path<String>,
) -> Response {
    let viewer = match auth::current_user(&session, state.users.as_ref()).await {
        Ok(viewer) => viewer,
        Err(err) => return err.into_response(),
    };
    let viewer = viewer.as_ref().map(ViewerView::from);

    let Some(id) = parse_post_id(&id) else {
        return render_not_found_response(viewer);
    };

    match state.feed.post_detail(id).await {
        Ok(detail) => render_template_response(
            PostDetailTemplate {
                view: LayoutContext::new(
                    viewer,
                    PostDetailContent {
                        detail,
                        comment_error: None,
                    },
                ),
            },
            StatusCode::OK,
        ),
        Err(err) => feed_error_to_response(err, viewer),
    }
}

async fn serve_media(State(state): State<HttpState>, Path(path): Path<String>) -> Response {
    const SOURCE: &str = "infra::http::public::serve_media";

    match state.storage.read(&path).await {
        Ok(bytes) => build_media_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Attachment not found",
            "The requested attachment is not available",
        )
        .into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => HttpError::new(
            SOURCE,
            StatusCode::NOT_FOUND,
            "Attachment not found",
            "The requested attachment is not available",
        )
        .into_response(),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored attachment"
            );
            HttpError::new(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read attachment",
                err.to_string(),
            )
            .into_response()
        }
    }
}

fn build_media_response(path: &str, bytes: Bytes) -> Response {
    let mut response = Response::new(Body::from(bytes.clone()));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&bytes.len().to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

pub(super) fn feed_error_to_response(err: FeedError, viewer: Option<ViewerView>) -> Response {
    match err {
        FeedError::UnknownGroup | FeedError::UnknownUser | FeedError::UnknownPost => {
            let detail = err.to_string();
            let mut response = render_not_found_response(viewer);
            ErrorReport::from_message(
                "infra::http::public::feed_error_to_response",
                StatusCode::NOT_FOUND,
                detail,
            )
            .attach(&mut response);
            response
        }
        FeedError::Repo(err) => {
            repo_error_to_http("infra::http::public::feed_error_to_response", err).into_response()
        }
    }
}
