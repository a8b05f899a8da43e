use student_management_backend::{
    build_router,
    config::Config,
    services::user::UserService,
    utils::database::create_pool,
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "student_management_backend=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db = create_pool(&config.database_url, config.db_max_connections).await?;

    sqlx::migrate!("./migrations").run(&db).await?;

    if let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) {
        if UserService::new(db.clone())
            .ensure_admin(username, password)
            .await?
        {
            tracing::info!("Created bootstrap admin account '{}'", username);
        }
    }

    let state = AppState::new(db, &config);
    let app = build_router(state, &config)?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server running on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
