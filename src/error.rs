//! Модуль обработки ошибок
//!
//! Ошибки микшера (`MixError`) и ошибки HTTP-слоя (`ServiceError`).

use std::path::PathBuf;
use thiserror::Error;

/// Ошибки сборки аудио-таймлайна
#[derive(Debug, Error)]
pub enum MixError {
    /// Не удалось получить байты источника (голос или музыка)
    #[error("Source fetch failed for {source_name}: {reason}")]
    SourceFetchFailed { source_name: String, reason: String },

    /// Источник не удалось разобрать как аудио
    #[error("Decode failed for {source_name}: {reason}")]
    DecodeFailed { source_name: String, reason: String },

    /// Внешний инструмент завершился с ошибкой; stderr сохраняется дословно
    #[error("{tool} failed ({status}): {stderr}")]
    ExternalToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// Не удалось записать итоговый файл
    #[error("Encode failed for {}: {reason}", .path.display())]
    EncodeFailed { path: PathBuf, reason: String },

    /// Некорректная конфигурация таймлайна
    #[error("Invalid timeline config: {0}")]
    InvalidConfig(String),

    /// Дорожки для микширования разной длины
    #[error("Timeline mismatch: voice timeline has {voice_frames} frames, music bed has {music_frames}")]
    TimelineMismatch {
        voice_frames: usize,
        music_frames: usize,
    },
}

impl MixError {
    pub(crate) fn fetch(source_name: &str, reason: impl ToString) -> Self {
        Self::SourceFetchFailed {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn decode(source_name: &str, reason: impl ToString) -> Self {
        Self::DecodeFailed {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn encode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::EncodeFailed {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Тип Result для микшера
pub type Result<T> = std::result::Result<T, MixError>;

/// Ошибки вебхук-сервиса
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Mix(#[from] MixError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Worker error: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
