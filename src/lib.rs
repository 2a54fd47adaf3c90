//! Основной файл библиотеки voice-mixer
//!
//! Сводит голосовое сообщение с фоновой музыкой: тишина перед голосом и после
//! него, музыка зациклена и обрезана ровно по длине, приглушена и плавно
//! появляется и затухает. Поверх микшера работает вебхук-сервис, который
//! скачивает голос, сводит его и отправляет результат в Telegram.

pub mod config;
pub mod error;
pub mod media;
pub mod mixer;
pub mod service;
pub mod utils;

use std::path::Path;

pub use crate::config::{MusicGain, OutputCodec, ServiceConfig, TimelineSpec};
pub use crate::error::{MixError, Result, ServiceError};
pub use crate::media::AudioSource;
pub use crate::mixer::{MixResult, TimelineMixer};

/// Свести голос и музыку в `output` с параметрами `spec`
pub fn mix(
    voice: &AudioSource,
    music: &AudioSource,
    spec: &TimelineSpec,
    output: &Path,
) -> Result<MixResult> {
    TimelineMixer::new(spec.clone())?.mix(voice, music, output)
}
