use std::{process, sync::Arc};

use piazza::{
    application::{
        compose::ComposeService,
        error::AppError,
        feed::FeedService,
        listing_cache::ListingCache,
        repos::{
            CommentsRepo, CommentsWriteRepo, GroupsRepo, GroupsWriteRepo, PostsRepo,
            PostsWriteRepo, UsersRepo, UsersWriteRepo,
        },
        site::{self, ProvisionError},
    },
    config,
    domain::entities::PostRecord,
    infra::{
        db::PgRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        uploads::UploadStorage,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        None | Some(config::Command::Serve(_)) => run_serve(settings).await,
        Some(config::Command::Users(args)) => run_users(settings, args).await,
        Some(config::Command::Groups(args)) => run_groups(settings, args).await,
    }
}

async fn init_repositories(settings: &config::Settings) -> Result<Arc<PgRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PgRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PgRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Arc::new(PgRepositories::new(pool)))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;

    let storage = Arc::new(
        UploadStorage::new(settings.uploads.directory.clone())
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );

    let posts: Arc<dyn PostsRepo> = repositories.clone();
    let posts_write: Arc<dyn PostsWriteRepo> = repositories.clone();
    let groups: Arc<dyn GroupsRepo> = repositories.clone();
    let users: Arc<dyn UsersRepo> = repositories.clone();
    let comments: Arc<dyn CommentsRepo> = repositories.clone();
    let comments_write: Arc<dyn CommentsWriteRepo> = repositories.clone();

    let home_cache: Arc<ListingCache<Vec<PostRecord>>> =
        Arc::new(ListingCache::new(settings.listings.cache_ttl));

    let feed = Arc::new(FeedService::new(
        posts.clone(),
        groups.clone(),
        users.clone(),
        comments,
        home_cache,
        settings.listings.page_size,
        settings.display.timezone,
    ));
    let compose = Arc::new(ComposeService::new(
        posts,
        posts_write,
        groups.clone(),
        comments_write,
        storage.clone(),
    ));

    let state = HttpState {
        feed,
        compose,
        users,
        groups,
        storage,
    };

    let upload_limit =
        usize::try_from(settings.uploads.max_request_bytes.get()).unwrap_or(usize::MAX);
    let router = http::build_router(state, upload_limit)
        .merge(http::build_health_router(repositories.clone()));

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::Io(err)))?;

    info!(addr = %settings.server.addr, "listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install shutdown signal handler");
    }
}

async fn run_users(settings: config::Settings, args: config::UsersArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let users: &dyn UsersWriteRepo = repositories.as_ref();

    match args.command {
        config::UsersCommand::Create(create) => {
            let record = site::create_user(users, &create.username)
                .await
                .map_err(provision_error)?;
            info!(username = %record.username, id = %record.id, "user created");
        }
    }

    Ok(())
}

async fn run_groups(settings: config::Settings, args: config::GroupsArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let groups: &dyn GroupsWriteRepo = repositories.as_ref();

    match args.command {
        config::GroupsCommand::Create(create) => {
            let record = site::create_group(
                groups,
                &create.title,
                create.slug.as_deref(),
                &create.description,
            )
            .await
            .map_err(provision_error)?;
            info!(slug = %record.slug, title = %record.title, id = %record.id, "group created");
        }
    }

    Ok(())
}

fn provision_error(err: ProvisionError) -> AppError {
    match err {
        ProvisionError::Domain(domain) => AppError::Domain(domain),
        ProvisionError::Duplicate { .. } => AppError::validation(err.to_string()),
        ProvisionError::Repo(repo) => AppError::unexpected(repo.to_string()),
    }
}
