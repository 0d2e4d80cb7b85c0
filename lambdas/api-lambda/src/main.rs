use lambda_http::{run, service_fn, tracing, Error, Request};
use qpaper_shared::config::Config;
use qpaper_shared::AppState;
use std::sync::Arc;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    // Gateways are built once per cold start and shared across invocations
    let config = Config::from_env();
    tracing::info!(
        "Starting paper API - users: {} papers: {} bucket: {} backend: {:?}",
        config.users_table,
        config.papers_table,
        config.bucket,
        config.backend
    );
    let state = AppState::from_config(config).await;

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
