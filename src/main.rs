mod achievements;
mod ai;
mod app;
mod auth;
mod config;
mod db;
mod email;
mod error;
mod meals;
mod nutrition;
mod progress;
mod state;
mod users;
mod workouts;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "fittrack=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;
    db::migrate(&app_state.db).await?;

    let reminders = email::scheduler::spawn(app_state.clone());

    let result = app::serve(app::build_app(app_state)).await;
    if let Some(handle) = reminders {
        handle.abort();
    }
    result
}
