//! Authenticated write handlers: post create/edit and comments.

use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Multipart;
use serde::Deserialize;
use tower_sessions::Session;

use crate::application::compose::{ComposeError, PostDraft, PostFormErrors};
use crate::application::error::HttpError;
use crate::domain::entities::UserRecord;
use crate::presentation::views::{
    FormErrorsView, GroupOption, LayoutContext, PostDetailContent, PostDetailTemplate,
    PostFormTemplate, PostFormView, ViewerView, render_not_found_response,
    render_template_response,
};

use super::public::{HttpState, feed_error_to_response, parse_post_id};
use super::{auth, forms, repo_error_to_http};

const SOURCE: &str = "infra::http::compose";
const COMMENT_REQUIRED: &str = "Enter a comment text.";

async fn require_viewer(
    session: &Session,
    state: &HttpState,
    next: &str,
) -> Result<UserRecord, Response> {
    match auth::current_user(session, state.users.as_ref()).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(auth::login_redirect(next)),
        Err(err) => Err(err.into_response()),
    }
}

async fn post_form_view(
    state: &HttpState,
    is_edit: bool,
    action: String,
    text: &str,
    selected_group: Option<&str>,
    errors: FormErrorsView,
) -> Result<PostFormView, HttpError> {
    let groups = state
        .groups
        .list_all()
        .await
        .map_err(|err| repo_error_to_http(SOURCE, err))?;

    Ok(PostFormView {
        is_edit,
        action,
        text: text.to_string(),
        groups: groups
            .into_iter()
            .map(|group| {
                let selected = selected_group == Some(group.slug.as_str());
                GroupOption {
                    slug: group.slug,
                    title: group.title,
                    selected,
                }
            })
            .collect(),
        errors,
    })
}

fn form_errors_view(errors: PostFormErrors) -> FormErrorsView {
    FormErrorsView {
        text: errors.text,
        group: errors.group,
        image: errors.image,
    }
}

fn render_post_form(viewer: &UserRecord, content: PostFormView) -> Response {
    render_template_response(
        PostFormTemplate {
            view: LayoutContext::new(Some(ViewerView::from(viewer)), content),
        },
        StatusCode::OK,
    )
}

fn unexpected_compose_error(err: ComposeError) -> Response {
    HttpError::new(
        SOURCE,
        StatusCode::INTERNAL_SERVER_ERROR,
        "Request could not be processed",
        err.to_string(),
    )
    .into_response()
}

pub(super) async fn create_form(State(state): State<HttpState>, session: Session) -> Response {
    let viewer = match require_viewer(&session, &state, "/create/").await {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };

    match post_form_view(
        &state,
        false,
        "/create/".to_string(),
        "",
        None,
        FormErrorsView::default(),
    )
    .await
    {
        Ok(content) => render_post_form(&viewer, content),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn create_submit(
    State(state): State<HttpState>,
    session: Session,
    mut multipart: Multipart,
) -> Response {
    let viewer = match require_viewer(&session, &state, "/create/").await {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };

    let form = match forms::read_post_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let draft = PostDraft {
        text: form.text.clone(),
        group: form.group.clone(),
        image: form.image,
    };

    match state.compose.create_post(&viewer, draft).await {
        Ok(_) => Redirect::to(&format!("/profile/{}/", viewer.username)).into_response(),
        Err(ComposeError::Invalid(errors)) => {
            match post_form_view(
                &state,
                false,
                "/create/".to_string(),
                &form.text,
                form.group.as_deref(),
                form_errors_view(errors),
            )
            .await
            {
                Ok(content) => render_post_form(&viewer, content),
                Err(err) => err.into_response(),
            }
        }
        Err(ComposeError::Repo(err)) => repo_error_to_http(SOURCE, err).into_response(),
        Err(err) => unexpected_compose_error(err),
    }
}

pub(super) async fn edit_form(
    State(state): State<HttpState>,
    session: Session,
    Path(id): Path<String>,
) -> Response {
    let viewer = match require_viewer(&session, &state, &format!("/posts/{id}/edit/")).await {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };
    let viewer_view = Some(ViewerView::from(&viewer));

    let Some(post_id) = parse_post_id(&id) else {
        return render_not_found_response(viewer_view);
    };

    match state.compose.editable_post(&viewer, post_id).await {
        Ok(post) => {
            let selected = post.group.as_ref().map(|group| group.slug.clone());
            match post_form_view(
                &state,
                true,
                format!("/posts/{post_id}/edit/"),
                &post.text,
                selected.as_deref(),
                FormErrorsView::default(),
            )
            .await
            {
                Ok(content) => render_post_form(&viewer, content),
                Err(err) => err.into_response(),
            }
        }
        Err(ComposeError::NotAuthor) => {
            Redirect::to(&format!("/posts/{post_id}/")).into_response()
        }
        Err(ComposeError::UnknownPost) => render_not_found_response(viewer_view),
        Err(ComposeError::Repo(err)) => repo_error_to_http(SOURCE, err).into_response(),
        Err(err) => unexpected_compose_error(err),
    }
}

pub(super) async fn edit_submit(
    State(state): State<HttpState>,
    session: Session,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let viewer = match require_viewer(&session, &state, &format!("/posts/{id}/edit/")).await {
        Ok(viewer) => viewer,
        Err(response) => return response,
    };
    let viewer_view = Some(ViewerView::from(&viewer));

    let Some(post_id) = parse_post_id(&id) else {
        return render_not_found_response(viewer_view);
    };

    let form = match forms::read_post_form(&mut multipart).await {
        Ok(form) => form,
        Err(err) => return err.into_response(),
    };

    let draft = PostDraft {
        text: form.text.clone(),
        group: form.group.clone(),
        image: form.image,
    };

    match state.compose.update_post(&viewer, post_id, draft).await {
        Ok(_) => Redirect::to(&format!("/posts/{post_id}/")).into_response(),
        Err(ComposeError::Invalid(errors)) => {
            match post_form_view(
                &state,
                true,
                format!("/posts/{post_id}/edit/"),
                &form.text,
                form.group.as_deref(),
                form_errors_view(errors),
            )
            .await
            {
                Ok(content) => render_post_form(&viewer, content),
                Err(err) => err.into_response(),
            }
        }
        Err(ComposeError::NotAuthor) => {
            Redirect::to(&format!("/posts/{post_id}/")).into_response()
        }
        Err(ComposeError::UnknownPost) => render_not_found_response(viewer_view),
        Err(ComposeError::Repo(err)) => repo_error_to_http(SOURCE, err).into_response(),
        Err(err) => unexpected_compose_error(err),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CommentForm {
    #[serde(default)]
    text: String,
}

pub(super) async fn add_comment(
    State(state): State<HttpState>,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Response {
    let viewer = match auth::current_user(&session, state.users.as_ref()).await {
        Ok(Some(user)) => user,
        Ok(None) => return auth::login_redirect(&format!("/posts/{id}/")),
        Err(err) => return err.into_response(),
    };
    let viewer_view = Some(ViewerView::from(&viewer));

    let Some(post_id) = parse_post_id(&id) else {
        return render_not_found_response(viewer_view);
    };

    match state.compose.add_comment(&viewer, post_id, &form.text).await {
        Ok(_) => Redirect::to(&format!("/posts/{post_id}/")).into_response(),
        Err(ComposeError::EmptyComment) => match state.feed.post_detail(post_id).await {
            Ok(detail) => render_template_response(
                PostDetailTemplate {
                    view: LayoutContext::new(
                        viewer_view,
                        PostDetailContent {
                            detail,
                            comment_error: Some(COMMENT_REQUIRED.to_string()),
                        },
                    ),
                },
                StatusCode::OK,
            ),
            Err(err) => feed_error_to_response(err, Some(ViewerView::from(&viewer))),
        },
        Err(ComposeError::UnknownPost) => render_not_found_response(viewer_view),
        Err(ComposeError::Repo(err)) => repo_error_to_http(SOURCE, err).into_response(),
        Err(err) => unexpected_compose_error(err),
    }
}
