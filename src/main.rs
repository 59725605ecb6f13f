use std::time::Duration;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};

use exam_server::{app_state::AppState, config::Config, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env();
    if std::env::var("APP_ENV").is_ok_and(|env| env == "production") {
        config.validate_for_production();
    }

    let state = AppState::new(config.clone())
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    if let (Some(username), Some(password)) = (&config.owner_username, &config.owner_password) {
        match state.auth_service.seed_owner(username, password).await {
            Ok(_) => {}
            Err(e) => log::warn!("Could not seed owner account: {}", e),
        }
    }

    state
        .backend
        .spawn_health_monitor(Duration::from_secs(config.storage_health_interval_secs));

    let bind = (config.web_server_host.clone(), config.web_server_port);
    log::info!(
        "Starting {} on http://{}:{} (storage: {:?})",
        config.app_name,
        bind.0,
        bind.1,
        state.backend.mode().await
    );

    let client_url = config.client_url.clone();
    let data = web::Data::new(state);
    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&client_url)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(data.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .configure(handlers::configure)
    })
    .bind(bind)?
    .run()
    .await
}
