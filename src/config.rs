//! Модуль конфигурации
//!
//! Параметры таймлайна (`TimelineSpec`) и настройки вебхук-сервиса
//! (`ServiceConfig`). Микшер получает конфигурацию только явно.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MixError, Result};

/// Громкость музыкальной подложки
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MusicGain {
    /// Ослабление в децибелах (например, -10.0)
    Decibels(f32),
    /// Линейный множитель амплитуды (например, 0.3)
    Linear(f32),
}

impl Default for MusicGain {
    fn default() -> Self {
        Self::Decibels(-10.0)
    }
}

impl MusicGain {
    /// Линейный множитель амплитуды
    pub fn to_linear(self) -> f32 {
        match self {
            Self::Decibels(db) => 10f32.powf(db / 20.0),
            Self::Linear(gain) => gain,
        }
    }
}

/// Формат итогового файла
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputCodec {
    /// MP3 через libmp3lame (VBR)
    #[default]
    Mp3,
    /// Несжатый WAV, пишется без ffmpeg
    Wav,
}

impl OutputCodec {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }
}

/// Параметры сборки таймлайна
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimelineSpec {
    /// Тишина перед голосом, секунды
    pub lead_in_secs: f64,
    /// Тишина после голоса, секунды
    pub trail_out_secs: f64,
    /// Длительность fade-in и fade-out музыки, секунды
    pub fade_secs: f64,
    /// Громкость музыки
    pub music_gain: MusicGain,
    /// Частота дискретизации результата
    pub sample_rate: u32,
    /// Количество каналов результата
    pub channels: u16,
    /// Формат результата
    pub output_codec: OutputCodec,
    /// Качество VBR для MP3 (0 лучшее, 9 худшее)
    pub mp3_vbr_quality: u8,
}

impl Default for TimelineSpec {
    fn default() -> Self {
        Self {
            lead_in_secs: 1.0,
            trail_out_secs: 2.0,
            fade_secs: 1.5,
            music_gain: MusicGain::default(),
            sample_rate: 44_100,
            channels: 2,
            output_codec: OutputCodec::default(),
            mp3_vbr_quality: 2,
        }
    }
}

impl TimelineSpec {
    /// Загрузить параметры из JSON-файла; отсутствующие поля берутся по умолчанию
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MixError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let spec: Self = serde_json::from_str(&raw).map_err(|e| {
            MixError::InvalidConfig(format!("cannot parse {}: {}", path.display(), e))
        })?;
        spec.validate()?;
        Ok(spec)
    }

    /// Верхняя граница для вступления, концовки и fade
    pub const MAX_SEGMENT_SECS: f64 = 3600.0;

    /// Проверка параметров перед запуском конвейера
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("lead_in_secs", self.lead_in_secs),
            ("trail_out_secs", self.trail_out_secs),
            ("fade_secs", self.fade_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(MixError::InvalidConfig(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
            if value > Self::MAX_SEGMENT_SECS {
                return Err(MixError::InvalidConfig(format!(
                    "{} must not exceed {} s, got {}",
                    name,
                    Self::MAX_SEGMENT_SECS,
                    value
                )));
            }
        }

        let gain = self.music_gain.to_linear();
        if !gain.is_finite() || gain < 0.0 {
            return Err(MixError::InvalidConfig(format!(
                "music gain {:?} does not give a usable amplitude factor",
                self.music_gain
            )));
        }

        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Err(MixError::InvalidConfig(format!(
                "sample rate {} is outside 8000..=192000",
                self.sample_rate
            )));
        }

        if !matches!(self.channels, 1 | 2) {
            return Err(MixError::InvalidConfig(format!(
                "channel count must be 1 or 2, got {}",
                self.channels
            )));
        }

        if self.mp3_vbr_quality > 9 {
            return Err(MixError::InvalidConfig(format!(
                "mp3 VBR quality must be 0..=9, got {}",
                self.mp3_vbr_quality
            )));
        }

        Ok(())
    }
}

/// Настройки вебхук-сервиса
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Порт HTTP-сервера
    pub port: u16,
    /// Токен Telegram-бота
    pub bot_token: String,
    /// Базовый адрес Telegram Bot API
    pub telegram_api_url: String,
    /// Адрес фоновой музыки
    pub music_url: String,
    /// Публичный адрес сервиса для self-ping
    pub app_url: Option<String>,
    /// Интервал self-ping
    pub keepalive_interval: Duration,
    /// Каталог для временных файлов запросов
    pub work_dir: PathBuf,
    /// Таймаут загрузки голосового сообщения
    pub voice_timeout: Duration,
    /// Таймаут загрузки музыки
    pub music_timeout: Duration,
    /// Таймаут отправки в Telegram
    pub delivery_timeout: Duration,
    /// Параметры таймлайна
    pub timeline: TimelineSpec,
}

pub const DEFAULT_MUSIC_URL: &str =
    "https://raw.githubusercontent.com/belbotmixer-bot/gitrep/main/background_music.mp3";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            bot_token: String::new(),
            telegram_api_url: DEFAULT_TELEGRAM_API_URL.to_string(),
            music_url: DEFAULT_MUSIC_URL.to_string(),
            app_url: None,
            keepalive_interval: Duration::from_secs(8 * 60),
            work_dir: std::env::temp_dir(),
            voice_timeout: Duration::from_secs(300),
            music_timeout: Duration::from_secs(60),
            delivery_timeout: Duration::from_secs(300),
            timeline: TimelineSpec::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeline_matches_service_constants() {
        let spec = TimelineSpec::default();
        assert_eq!(spec.lead_in_secs, 1.0);
        assert_eq!(spec.trail_out_secs, 2.0);
        assert_eq!(spec.fade_secs, 1.5);
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.output_codec, OutputCodec::Mp3);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn minus_ten_db_is_about_point_three() {
        let gain = MusicGain::Decibels(-10.0).to_linear();
        assert!((gain - 0.316).abs() < 0.001, "gain = {}", gain);
        assert_eq!(MusicGain::Linear(0.3).to_linear(), 0.3);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let negative_fade = TimelineSpec {
            fade_secs: -1.0,
            ..TimelineSpec::default()
        };
        assert!(matches!(
            negative_fade.validate(),
            Err(MixError::InvalidConfig(_))
        ));

        let surround = TimelineSpec {
            channels: 6,
            ..TimelineSpec::default()
        };
        assert!(surround.validate().is_err());

        let nan_lead = TimelineSpec {
            lead_in_secs: f64::NAN,
            ..TimelineSpec::default()
        };
        assert!(nan_lead.validate().is_err());

        let negative_gain = TimelineSpec {
            music_gain: MusicGain::Linear(-0.5),
            ..TimelineSpec::default()
        };
        assert!(negative_gain.validate().is_err());
    }

    #[test]
    fn validate_rejects_huge_durations() {
        let huge_lead = TimelineSpec {
            lead_in_secs: 1e15,
            ..TimelineSpec::default()
        };
        assert!(matches!(
            huge_lead.validate(),
            Err(MixError::InvalidConfig(_))
        ));

        let long_trail = TimelineSpec {
            trail_out_secs: TimelineSpec::MAX_SEGMENT_SECS + 1.0,
            ..TimelineSpec::default()
        };
        assert!(long_trail.validate().is_err());

        let hour_fade = TimelineSpec {
            fade_secs: TimelineSpec::MAX_SEGMENT_SECS,
            ..TimelineSpec::default()
        };
        assert!(hour_fade.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timeline.json");
        std::fs::write(
            &path,
            r#"{"fade_secs": 0.5, "music_gain": {"kind": "linear", "value": 0.3}, "output_codec": "wav"}"#,
        )
        .unwrap();

        let spec = TimelineSpec::from_json_file(&path).unwrap();
        assert_eq!(spec.fade_secs, 0.5);
        assert_eq!(spec.music_gain, MusicGain::Linear(0.3));
        assert_eq!(spec.output_codec, OutputCodec::Wav);
        assert_eq!(spec.lead_in_secs, 1.0);
    }
}
