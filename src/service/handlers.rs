//! HTTP-обработчики: `/health` и `/process_audio`.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ServiceError;
use crate::media::AudioSource;
use crate::service::fetch::download_to_file;
use crate::service::telegram::caption_for;
use crate::service::AppState;
use crate::utils::temp::TempWorkspace;

const DELIVERY_FAILED: &str = "Failed to send audio to Telegram";

/// Тело запроса вебхука (JSON или form-urlencoded)
#[derive(Debug, Default, Deserialize)]
pub struct ProcessRequest {
    pub voice_url: Option<String>,
    /// Telegram chat id; приходит и строкой, и числом
    pub client_id: Option<Value>,
    pub name: Option<String>,
}

impl ProcessRequest {
    fn is_empty(&self) -> bool {
        self.voice_url.is_none() && self.client_id.is_none() && self.name.is_none()
    }

    fn client_id(&self) -> Option<String> {
        match self.client_id.as_ref()? {
            Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn voice_url(&self) -> Option<&str> {
        self.voice_url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

/// JSON пробуется первым независимо от Content-Type, затем форма
pub fn parse_request(body: &[u8]) -> Option<ProcessRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice::<ProcessRequest>(body)
        .ok()
        .or_else(|| serde_urlencoded::from_bytes::<ProcessRequest>(body).ok())
        .filter(|r| !r.is_empty())
}

pub fn new_task_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn failure(status: StatusCode, task_id: &str, message: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message, "task_id": task_id })))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "voice-mixer-api",
        "timestamp": chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn process_audio(State(state): State<AppState>, body: Bytes) -> (StatusCode, Json<Value>) {
    let task_id = new_task_id();
    info!("[task_id={}] 🎯 /process_audio called", task_id);

    let Some(request) = parse_request(&body) else {
        return failure(StatusCode::BAD_REQUEST, &task_id, "No data received");
    };
    info!("[task_id={}] 🔍 Incoming data: {:?}", task_id, request);

    let (Some(voice_url), Some(client_id)) = (request.voice_url(), request.client_id()) else {
        return failure(
            StatusCode::BAD_REQUEST,
            &task_id,
            "voice_url and client_id required",
        );
    };

    match run_task(&state, &task_id, voice_url, &client_id, request.name.as_deref()).await {
        Ok(response) => {
            info!("[task_id={}] ✅ Done: {}", task_id, response);
            (StatusCode::OK, Json(response))
        }
        Err(ServiceError::Delivery(message)) => {
            error!("[task_id={}] ❌ Telegram API error: {}", task_id, message);
            failure(StatusCode::INTERNAL_SERVER_ERROR, &task_id, DELIVERY_FAILED)
        }
        Err(e) => {
            error!("[task_id={}] ❌ Error in /process_audio: {}", task_id, e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, &task_id, &e.to_string())
        }
    }
}

async fn run_task(
    state: &AppState,
    task_id: &str,
    voice_url: &str,
    client_id: &str,
    name: Option<&str>,
) -> Result<Value, ServiceError> {
    let config = &state.config;
    let mut workspace = TempWorkspace::new(Some(&config.work_dir), &format!("task_{}", task_id))?;

    let voice_path = workspace.temp_path(&format!("voice_{}", task_id), "ogg");
    download_to_file(&state.http, voice_url, config.voice_timeout, &voice_path, "voice").await?;
    info!("[task_id={}] 📥 Voice saved as {}", task_id, voice_path.display());

    let music_path = workspace.temp_path("music", "mp3");
    download_to_file(&state.http, &config.music_url, config.music_timeout, &music_path, "music").await?;

    let extension = state.mixer.spec().output_codec.extension();
    let output_path = workspace.temp_path(&format!("mixed_{}", task_id), extension);

    let mixer = state.mixer.clone();
    let mixed = tokio::task::spawn_blocking(move || {
        mixer.mix(
            &AudioSource::File(voice_path),
            &AudioSource::File(music_path),
            &output_path,
        )
    })
    .await??;
    info!(
        "[task_id={}] 🎵 Mixed audio created: {} ({:.2}s)",
        task_id,
        mixed.path.display(),
        mixed.duration_secs
    );

    let receipt = state
        .delivery
        .send_audio(
            client_id,
            &caption_for(name),
            &mixed.path,
            &format!("{}.{}", task_id, extension),
        )
        .await?;
    info!("[task_id={}] 📦 Telegram response: {}", task_id, receipt.body);

    if !receipt.is_ok() {
        return Err(ServiceError::Delivery(format!(
            "status {}: {}",
            receipt.status, receipt.body
        )));
    }

    if let Err(e) = workspace.close() {
        warn!("[task_id={}] ⚠️ Cleanup error: {}", task_id, e);
    }

    Ok(json!({
        "task_id": task_id,
        "status": "done",
        "duration_secs": mixed.duration_secs,
        "telegram_result": receipt.body,
    }))
}
