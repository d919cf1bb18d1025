use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use retail_api::{
    app::build_app,
    config::AppConfig,
    db::{create_pool, run_migrations},
    services::user_service::ensure_admin_account,
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,retail_api=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let state = AppState::new(pool, config.jwt.clone());

    if let (Some(email), Some(password)) = (&config.admin_user, &config.admin_password) {
        ensure_admin_account(&state, email, password).await?;
    }

    let app = build_app(state, &config.cors_origins);

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    tracing::info!(project = %config.project_name, "listening on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
