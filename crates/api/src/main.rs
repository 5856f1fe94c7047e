use std::sync::Arc;

use anyhow::Context;

use raxerp_api::app::{AppState, CookiePolicy, build_app};
use raxerp_auth::{Argon2PasswordHasher, AuthService, AuthStore, InMemoryAuthStore, TokenService};
use raxerp_infra::{AppConfig, PostgresAuthStore, ensure_admin, seed_catalog};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    raxerp_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::debug!(?config, "configuration loaded");

    let (store, postgres): (Arc<dyn AuthStore>, Option<Arc<PostgresAuthStore>>) =
        match config.database_url.as_deref() {
            Some(url) => {
                let pg = Arc::new(
                    PostgresAuthStore::connect(url)
                        .await
                        .context("failed to connect to postgres")?,
                );
                pg.ensure_schema().await.context("failed to apply schema")?;
                let store: Arc<dyn AuthStore> = pg.clone();
                (store, Some(pg))
            }
            None => {
                tracing::warn!(
                    "DATABASE_URL not set; using in-memory store (state is lost on exit)"
                );
                let store: Arc<dyn AuthStore> = Arc::new(InMemoryAuthStore::new());
                (store, None)
            }
        };

    let tokens = TokenService::with_leeway(config.jwt_secret.as_bytes(), config.token_leeway)
        .context("invalid token settings")?;
    let service = Arc::new(
        AuthService::new(
            store.clone(),
            Arc::new(Argon2PasswordHasher::new()),
            tokens,
            config.token_ttl,
        )
        .context("invalid auth service settings")?,
    );

    seed_catalog(&service).await?;
    if let Some(seed) = &config.bootstrap_admin {
        ensure_admin(&service, store.as_ref(), seed).await?;
    }

    let app = build_app(AppState::new(
        service,
        CookiePolicy {
            secure: config.cookie_secure,
        },
    ));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(pg) = postgres {
        pg.close().await;
    }
    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
