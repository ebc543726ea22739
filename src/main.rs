use std::{future::IntoFuture, process, sync::Arc};

use coinrank::{
    application::{cache_service::CacheService, error::AppError, repos::BitcoinsRepo},
    cache::{CacheBackend, CacheConfig, MemoryBackend},
    config::{self, CacheBackendKind},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        redis::RedisBackend,
        telemetry,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
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

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Prime(_) => run_prime(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let service = Arc::new(build_cache_service(&settings).await?);

    if service.config().prime_on_startup {
        // Startup continues on a failed prime; reads fall through to the store.
        if let Err(err) = service.prime().await {
            warn!(
                target = "coinrank::startup",
                error = %err,
                "cache priming failed"
            );
        }
    }

    serve_http(&settings, HttpState::new(service)).await
}

async fn run_prime(settings: config::Settings) -> Result<(), AppError> {
    let service = build_cache_service(&settings).await?;
    let report = service.prime().await?;

    println!(
        "primed {} of {} records ({} skipped, {} cache faults)",
        report.primed,
        report.scanned,
        report.skipped,
        report.faults.len()
    );
    Ok(())
}

async fn build_cache_service(settings: &config::Settings) -> Result<CacheService, AppError> {
    let repositories = init_repositories(settings).await?;
    let cache = init_cache(settings).await?;
    let repo: Arc<dyn BitcoinsRepo> = repositories;

    Ok(CacheService::new(
        repo,
        cache,
        CacheConfig::from(&settings.cache),
    ))
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let pool = PostgresRepositories::connect(
        settings.database.connect_options.clone(),
        settings.database.max_connections.get(),
        settings.database.acquire_timeout,
    )
    .await
    .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    info!(target = "coinrank::startup", "connected to postgres");
    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn init_cache(settings: &config::Settings) -> Result<Arc<dyn CacheBackend>, AppError> {
    match settings.cache.backend {
        CacheBackendKind::Memory => {
            info!(target = "coinrank::startup", "using in-process cache");
            Ok(Arc::new(MemoryBackend::new()))
        }
        CacheBackendKind::Redis => {
            let backend =
                RedisBackend::connect(&settings.cache.redis_url, settings.cache.pool_max_size)?;
            backend
                .ping()
                .await
                .map_err(|err| AppError::from(InfraError::cache(err.to_string())))?;
            info!(target = "coinrank::startup", "connected to redis");
            Ok(Arc::new(backend))
        }
    }
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state, &settings.server.cors_allowed_origins);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "coinrank::startup",
        addr = %settings.server.addr,
        "server listening"
    );

    let stop = Arc::new(Notify::new());
    let stopped = stop.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move { stopped.notified().await });
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        joined = &mut server => return flatten_server_result(joined),
        _ = shutdown_signal() => {}
    }

    info!(target = "coinrank::shutdown", "shutting down server");
    stop.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => {
            flatten_server_result(joined)?;
            info!(target = "coinrank::shutdown", "server exited");
            Ok(())
        }
        Err(_) => {
            server.abort();
            Err(AppError::unexpected(format!(
                "server forced to shut down after {}s",
                settings.server.graceful_shutdown.as_secs()
            )))
        }
    }
}

fn flatten_server_result(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "coinrank::shutdown", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "coinrank::shutdown", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
