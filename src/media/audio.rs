//! Модуль для работы с аудио через FFmpeg
//!
//! Этот модуль содержит стадии конвейера, выполняемые внешними
//! инструментами: определение формата источника, нормализация в WAV
//! и экспорт итогового файла.

use std::ffi::OsString;
use std::path::Path;

use log::{debug, info};
use serde::Deserialize;

use crate::error::{MixError, Result};
use crate::utils::ffmpeg::{run_tool, MediaTools};

/// Сведения об исходном аудио по данным ffprobe
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    /// Контейнер (например, "ogg" или "mp3")
    pub format_name: String,
    /// Кодек первой аудиодорожки (например, "opus")
    pub codec_name: String,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    /// Длительность по заголовкам контейнера; для расчетов не используется
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<String>,
}

fn args<I, S>(items: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    items.into_iter().map(Into::into).collect()
}

/// Разобрать JSON-вывод ffprobe
pub(crate) fn parse_probe_output(json: &str, source_name: &str) -> Result<SourceInfo> {
    let probe: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| MixError::decode(source_name, format!("unreadable ffprobe output: {}", e)))?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .ok_or_else(|| MixError::decode(source_name, "no audio stream found"))?;

    let format = probe.format.as_ref();
    Ok(SourceInfo {
        format_name: format
            .and_then(|f| f.format_name.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        codec_name: stream
            .codec_name
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        sample_rate: stream.sample_rate.as_deref().and_then(|s| s.parse().ok()),
        channels: stream.channels,
        duration_secs: format
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse().ok()),
    })
}

/// Определить контейнер и кодек источника.
///
/// Если ffprobe не смог разобрать файл, это `DecodeFailed` с его диагностикой.
pub fn probe_source(tools: &MediaTools, input: &Path, source_name: &str) -> Result<SourceInfo> {
    let mut probe_args = args([
        "-v",
        "error",
        "-show_entries",
        "stream=codec_type,codec_name,sample_rate,channels:format=format_name,duration",
        "-of",
        "json",
    ]);
    probe_args.push(input.as_os_str().to_owned());

    let output = run_tool(&tools.ffprobe, &probe_args).map_err(|e| match e {
        MixError::ExternalToolFailed { status, stderr, .. } if status != "not started" => {
            MixError::decode(source_name, stderr)
        }
        other => other,
    })?;

    let info = parse_probe_output(&output.stdout, source_name)?;
    debug!("Probed {}: {:?}", source_name, info);
    Ok(info)
}

/// Декодировать источник в 16-битный WAV с заданной частотой и числом каналов
pub fn normalize_to_wav(
    tools: &MediaTools,
    input: &Path,
    output: &Path,
    sample_rate: u32,
    channels: u16,
) -> Result<()> {
    let mut ffmpeg_args = args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"]);
    ffmpeg_args.push(input.as_os_str().to_owned());
    let rate = sample_rate.to_string();
    let layout = channels.to_string();
    ffmpeg_args.extend(args([
        "-vn", "-map", "0:a:0", "-ar", rate.as_str(), "-ac", layout.as_str(), "-c:a", "pcm_s16le", "-f", "wav",
    ]));
    ffmpeg_args.push(output.as_os_str().to_owned());

    run_tool(&tools.ffmpeg, &ffmpeg_args)?;
    Ok(())
}

/// Экспорт WAV в MP3 (libmp3lame, VBR).
///
/// При ошибке частично записанный файл удаляется; уже существовавший
/// файл по этому пути не трогается.
pub fn export_mp3(tools: &MediaTools, input: &Path, output: &Path, vbr_quality: u8) -> Result<()> {
    let mut ffmpeg_args = args(["-hide_banner", "-nostdin", "-loglevel", "error", "-y", "-i"]);
    ffmpeg_args.push(input.as_os_str().to_owned());
    let quality = vbr_quality.to_string();
    ffmpeg_args.extend(args(["-c:a", "libmp3lame", "-q:a", quality.as_str(), "-f", "mp3"]));
    ffmpeg_args.push(output.as_os_str().to_owned());

    let preexisting = output.exists();
    if let Err(e) = run_tool(&tools.ffmpeg, &ffmpeg_args) {
        if !preexisting {
            let _ = std::fs::remove_file(output);
        }
        return Err(match e {
            MixError::ExternalToolFailed { stderr, .. } => MixError::encode(output, stderr),
            other => other,
        });
    }

    info!("Exported MP3 (q={}) to {}", vbr_quality, output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ogg_opus_probe() {
        let json = r#"{
            "programs": [],
            "streams": [
                {"codec_name": "opus", "codec_type": "audio", "sample_rate": "48000", "channels": 1}
            ],
            "format": {"format_name": "ogg", "duration": "3.012000"}
        }"#;
        let info = parse_probe_output(json, "voice").unwrap();
        assert_eq!(info.format_name, "ogg");
        assert_eq!(info.codec_name, "opus");
        assert_eq!(info.sample_rate, Some(48_000));
        assert_eq!(info.channels, Some(1));
        assert_eq!(info.duration_secs, Some(3.012));
    }

    #[test]
    fn picks_audio_stream_after_cover_art() {
        let json = r#"{
            "streams": [
                {"codec_name": "mjpeg", "codec_type": "video"},
                {"codec_name": "mp3", "codec_type": "audio", "sample_rate": "44100", "channels": 2}
            ],
            "format": {"format_name": "mp3"}
        }"#;
        let info = parse_probe_output(json, "music").unwrap();
        assert_eq!(info.codec_name, "mp3");
        assert_eq!(info.duration_secs, None);
    }

    #[test]
    fn failed_export_keeps_an_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("mixed.mp3");
        std::fs::write(&output, b"previous result").unwrap();

        let tools = MediaTools {
            ffmpeg: dir.path().join("no-such-ffmpeg"),
            ffprobe: dir.path().join("no-such-ffprobe"),
        };
        let err = export_mp3(&tools, &dir.path().join("in.wav"), &output, 2).unwrap_err();
        assert!(matches!(err, MixError::ExternalToolFailed { .. }), "{err:?}");
        assert_eq!(std::fs::read(&output).unwrap(), b"previous result");
    }

    #[test]
    fn no_audio_stream_is_a_decode_failure() {
        let json = r#"{"streams": [{"codec_type": "video", "codec_name": "h264"}], "format": {}}"#;
        assert!(matches!(
            parse_probe_output(json, "voice"),
            Err(MixError::DecodeFailed { .. })
        ));
        assert!(matches!(
            parse_probe_output("{}", "voice"),
            Err(MixError::DecodeFailed { .. })
        ));
    }
}
