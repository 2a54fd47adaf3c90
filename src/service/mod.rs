//! Вебхук-сервис
//!
//! Принимает ссылку на голосовое сообщение и id клиента, сводит голос с
//! фоновой музыкой и отправляет результат в Telegram.

pub mod fetch;
pub mod handlers;
pub mod keepalive;
pub mod telegram;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use log::{info, warn};

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::mixer::TimelineMixer;
use telegram::{AudioDelivery, TelegramClient};

/// Общее состояние обработчиков
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub http: reqwest::Client,
    pub mixer: Arc<TimelineMixer>,
    pub delivery: Arc<dyn AudioDelivery>,
}

impl AppState {
    pub fn new(config: ServiceConfig, mixer: TimelineMixer, delivery: Arc<dyn AudioDelivery>) -> Self {
        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
            mixer: Arc::new(mixer),
            delivery,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/process_audio", post(handlers::process_audio))
        .with_state(state)
}

/// Запустить HTTP-сервер и keepalive
pub async fn serve(config: ServiceConfig) -> Result<(), ServiceError> {
    if config.bot_token.is_empty() {
        warn!("TELEGRAM_BOT_TOKEN is not set, delivery will fail");
    }

    let mixer = TimelineMixer::new(config.timeline.clone())?.with_work_root(&config.work_dir);
    let http = reqwest::Client::new();
    let delivery = Arc::new(TelegramClient::new(
        http.clone(),
        &config.telegram_api_url,
        &config.bot_token,
        config.delivery_timeout,
    ));

    if let Some(app_url) = config.app_url.clone() {
        keepalive::spawn_keepalive(http.clone(), app_url, config.keepalive_interval);
    }

    let port = config.port;
    let mut state = AppState::new(config, mixer, delivery);
    state.http = http;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("🌐 Starting server on port {}...", port);
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
