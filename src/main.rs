use dotenvy::dotenv;
use log::info;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use taskserver::broker::AmqpConnector;
use taskserver::config::AppConfig;
use taskserver::email::{FixedRecipient, NotificationDispatcher, SmtpMailer};
use taskserver::shared::state::AppState;
use taskserver::tasks;
use taskserver::tasks::upstream::{SubgroupApiClient, TaskApiClient};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();

    let config = AppConfig::from_env();

    let notifier = NotificationDispatcher::new(
        Arc::new(SmtpMailer::new(config.smtp.clone())),
        Arc::new(FixedRecipient(config.smtp.test_email.clone())),
        config.smtp.username.clone(),
        config.frontend_url.clone(),
    );
    let state = Arc::new(AppState {
        tasks: Arc::new(TaskApiClient::new(config.upstream.clone())),
        subgroups: Arc::new(SubgroupApiClient::new(config.upstream.clone())),
        broker: Arc::new(AmqpConnector::new(config.broker.clone())),
        notifier,
        config: config.clone(),
    });

    let app = tasks::router()
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}
