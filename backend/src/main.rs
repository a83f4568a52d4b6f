use std::sync::Arc;

use clap::Parser;
use trail_tracker::{
    config::Settings,
    create_router,
    database::Database,
    store::{MemoryStore, RouteStore},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trail_tracker=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::parse();

    let store: Arc<dyn RouteStore> = match &settings.database_url {
        Some(url) => {
            let db = Database::new(url).await.expect("connect to PostgreSQL");
            db.migrate().await.expect("run database migrations");
            tracing::info!("Using PostgreSQL store");
            Arc::new(db)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, data is kept in memory and lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let addr = settings.bind_addr;
    let state = AppState {
        store,
        settings: Arc::new(settings),
    };
    let app = create_router(state);

    tracing::info!("starting trail tracker on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("bind listen address");
    axum::serve(listener, app).await.expect("serve HTTP");
}
