//! The public URL surface: statuses, redirects, login round-trip, and the
//! cached home page as seen over HTTP.

mod common;

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{
        Request, StatusCode,
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
    },
    response::Response,
};
use chrono_tz::Tz;
use http_body_util::BodyExt;
use tower::ServiceExt;

use piazza::application::compose::ComposeService;
use piazza::application::feed::FeedService;
use piazza::application::listing_cache::ListingCache;
use piazza::application::repos::PostsWriteRepo;
use piazza::domain::entities::PostRecord;
use piazza::infra::http::{HttpState, build_router};
use piazza::infra::uploads::UploadStorage;

use common::MemoryRepos;

const UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

struct TestApp {
    router: Router,
    repos: Arc<MemoryRepos>,
    cache: Arc<ListingCache<Vec<PostRecord>>>,
    _media: tempfile::TempDir,
}

fn build_app() -> TestApp {
    let repos = Arc::new(MemoryRepos::new());
    let cache = Arc::new(ListingCache::new(Duration::from_secs(20)));
    let media = tempfile::tempdir().expect("media dir");
    let storage = Arc::new(UploadStorage::new(media.path().to_path_buf()).expect("storage root"));

    let feed = Arc::new(FeedService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        cache.clone(),
        NonZeroUsize::new(10).expect("page size"),
        Tz::UTC,
    ));
    let compose = Arc::new(ComposeService::new(
        repos.clone(),
        repos.clone(),
        repos.clone(),
        repos.clone(),
        storage.clone(),
    ));

    let state = HttpState {
        feed,
        compose,
        users: repos.clone(),
        groups: repos.clone(),
        storage,
    };

    TestApp {
        router: build_router(state, UPLOAD_LIMIT),
        repos,
        cache,
        _media: media,
    }
}

async fn get(app: &TestApp, path: &str) -> Response {
    app.router
        .clone()
        .oneshot(
            Request::get(path)
                .body(Body::empty())
                .expect("request built"),
        )
        .await
        .expect("response")
}

async fn get_with_cookie(app: &TestApp, path: &str, cookie: &str) -> Response {
    app.router
        .clone()
        .oneshot(
            Request::get(path)
                .header(COOKIE, cookie)
                .body(Body::empty())
                .expect("request built"),
        )
        .await
        .expect("response")
}

async fn post_form(app: &TestApp, path: &str, cookie: Option<&str>, body: &str) -> Response {
    let mut request = Request::post(path).header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        request = request.header(COOKIE, cookie);
    }
    app.router
        .clone()
        .oneshot(request.body(Body::from(body.to_string())).expect("request"))
        .await
        .expect("response")
}

async fn body_string(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collected")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn session_cookie(response: &Response) -> String {
    response
        .headers()
        .get(SET_COOKIE)
        .expect("session cookie set")
        .to_str()
        .expect("cookie header")
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(LOCATION)
        .expect("location header")
        .to_str()
        .expect("location value")
}

/// Log in through the real form and hand back the session cookie.
async fn login(app: &TestApp, username: &str) -> String {
    let response = post_form(
        app,
        "/auth/login/",
        None,
        &format!("username={username}&next=/"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    session_cookie(&response)
}

#[tokio::test]
async fn read_surfaces_answer_for_anonymous_clients() {
    let app = build_app();
    let martha = app.repos.seed_user("martha");
    let circle = app.repos.seed_group("evening-circle", "Evening Circle");
    let post = app.repos.seed_post(&martha, Some(&circle), "an observation");

    for path in [
        "/".to_string(),
        "/group/evening-circle/".to_string(),
        "/profile/martha/".to_string(),
        format!("/posts/{}/", post.id),
    ] {
        let response = get(&app, &path).await;
        assert_eq!(response.status(), StatusCode::OK, "path {path}");
    }

    for path in [
        "/group/missing/".to_string(),
        "/profile/ghost/".to_string(),
        format!("/posts/{}/", uuid::Uuid::new_v4()),
        "/posts/not-a-post-id/".to_string(),
        "/unexisting-page/".to_string(),
    ] {
        let response = get(&app, &path).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "path {path}");
    }
}

#[tokio::test]
async fn authenticated_actions_redirect_anonymous_clients_to_login() {
    let app = build_app();
    let martha = app.repos.seed_user("martha");
    let post = app.repos.seed_post(&martha, None, "an observation");

    let response = get(&app, "/create/").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/auth/login/"));

    let response = get(&app, &format!("/posts/{}/edit/", post.id)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/auth/login/"));

    let response = post_form(&app, &format!("/posts/{}/comment/", post.id), None, "text=hi").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/auth/login/"));
}

#[tokio::test]
async fn login_round_trip_establishes_a_session() {
    let app = build_app();
    app.repos.seed_user("martha");

    let rejected = post_form(&app, "/auth/login/", None, "username=stranger&next=/").await;
    assert_eq!(rejected.status(), StatusCode::OK);
    assert!(body_string(rejected).await.contains("Unknown username."));

    let cookie = login(&app, "martha").await;

    let form = get_with_cookie(&app, "/create/", &cookie).await;
    assert_eq!(form.status(), StatusCode::OK);
    assert!(body_string(form).await.contains("New post"));
}

#[tokio::test]
async fn edit_is_reserved_for_the_author() {
    let app = build_app();
    let martha = app.repos.seed_user("martha");
    app.repos.seed_user("nils");
    let post = app.repos.seed_post(&martha, None, "an observation");

    let martha_cookie = login(&app, "martha").await;
    let response = get_with_cookie(&app, &format!("/posts/{}/edit/", post.id), &martha_cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Edit post"));

    let nils_cookie = login(&app, "nils").await;
    let response = get_with_cookie(&app, &format!("/posts/{}/edit/", post.id), &nils_cookie).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));
}

#[tokio::test]
async fn posts_are_created_through_the_multipart_form() {
    let app = build_app();
    app.repos.seed_user("martha");
    app.repos.seed_group("evening-circle", "Evening Circle");
    let cookie = login(&app, "martha").await;

    let boundary = "piazza-test-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"text\"\r\n\r\nfresh from the form\r\n\
         --{boundary}\r\nContent-Disposition: form-data; name=\"group\"\r\n\r\nevening-circle\r\n\
         --{boundary}--\r\n"
    );

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/create/")
                .header(COOKIE, &cookie)
                .header(
                    CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/martha/");

    let index = body_string(get(&app, "/").await).await;
    assert!(index.contains("fresh from the form"));
    assert!(index.contains("/group/evening-circle/"));
}

#[tokio::test]
async fn invalid_drafts_re_render_the_form_with_messages() {
    let app = build_app();
    app.repos.seed_user("martha");
    let cookie = login(&app, "martha").await;

    let boundary = "piazza-test-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"text\"\r\n\r\n   \r\n\
         --{boundary}--\r\n"
    );

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/create/")
                .header(COOKIE, &cookie)
                .header(
                    CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("Enter the post text."));
}

#[tokio::test]
async fn comments_post_and_render_on_the_detail_page() {
    let app = build_app();
    let martha = app.repos.seed_user("martha");
    app.repos.seed_user("nils");
    let post = app.repos.seed_post(&martha, None, "an observation");
    let cookie = login(&app, "nils").await;

    let response = post_form(
        &app,
        &format!("/posts/{}/comment/", post.id),
        Some(&cookie),
        "text=nice+one",
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));

    let detail = body_string(get(&app, &format!("/posts/{}/", post.id)).await).await;
    assert!(detail.contains("nice one"));

    let rejected = post_form(
        &app,
        &format!("/posts/{}/comment/", post.id),
        Some(&cookie),
        "text=",
    )
    .await;
    assert_eq!(rejected.status(), StatusCode::OK);
    assert!(body_string(rejected).await.contains("Enter a comment text."));
}

#[tokio::test]
async fn page_query_values_are_forgiving() {
    let app = build_app();
    let martha = app.repos.seed_user("martha");
    for n in 0..13 {
        app.repos.seed_post(&martha, None, &format!("post {n}"));
    }

    let first = body_string(get(&app, "/?page=abc").await).await;
    assert!(first.contains("Page 1 of 2"));

    let clamped = body_string(get(&app, "/?page=999").await).await;
    assert!(clamped.contains("Page 2 of 2"));
}

#[tokio::test]
async fn home_page_serves_stale_listing_until_cache_clear() {
    let app = build_app();
    let martha = app.repos.seed_user("martha");
    let post = app.repos.seed_post(&martha, None, "short-lived");

    let primed = body_string(get(&app, "/").await).await;
    assert!(primed.contains("short-lived"));

    app.repos.delete_post(post.id).await.expect("delete");

    let profile = body_string(get(&app, "/profile/martha/").await).await;
    assert!(!profile.contains("short-lived"));

    let stale = body_string(get(&app, "/").await).await;
    assert!(stale.contains("short-lived"));

    app.cache.clear().await;

    let fresh = body_string(get(&app, "/").await).await;
    assert!(!fresh.contains("short-lived"));
}
