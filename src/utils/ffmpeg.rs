//! Модуль для работы с FFmpeg
//!
//! Поиск ffmpeg/ffprobe в PATH, проверка версии и запуск команд
//! с сохранением диагностического вывода.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;

use crate::error::{MixError, Result};

static FFMPEG_VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"ffmpeg version n?(\d+)\.(\d+)(?:\.(\d+))?").expect("valid ffmpeg version regex")
});

/// Минимальная версия, с которой проверялись используемые фильтры и кодеки
pub const MIN_FFMPEG_VERSION: Version = Version::new(4, 0, 0);

/// Пути к ffmpeg и ffprobe
#[derive(Debug, Clone)]
pub struct MediaTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

/// Вывод успешно завершившейся команды
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

impl MediaTools {
    /// Найти ffmpeg и ffprobe в PATH
    pub fn locate() -> Result<Self> {
        let ffmpeg = check_command_in_path("ffmpeg")?;
        let ffprobe = check_command_in_path("ffprobe")?;
        info!("Found ffmpeg at {}", ffmpeg.display());

        let tools = Self { ffmpeg, ffprobe };
        match tools.ffmpeg_version() {
            Ok(version) if version < MIN_FFMPEG_VERSION => warn!(
                "FFmpeg {} is older than {}, some filters may be missing",
                version, MIN_FFMPEG_VERSION
            ),
            Ok(version) => info!("FFmpeg version: {}", version),
            Err(e) => warn!("Could not determine FFmpeg version: {}", e),
        }
        Ok(tools)
    }

    /// Версия ffmpeg; для git-сборок без номера версии считается минимальной
    pub fn ffmpeg_version(&self) -> Result<Version> {
        let output = run_tool(&self.ffmpeg, &["-version".into()])?;
        Ok(parse_ffmpeg_version(&output.stdout).unwrap_or_else(|| {
            debug!("Could not parse ffmpeg version, using default");
            MIN_FFMPEG_VERSION
        }))
    }
}

fn check_command_in_path(command: &str) -> Result<PathBuf> {
    which::which(command).map_err(|e| MixError::ExternalToolFailed {
        tool: command.to_string(),
        status: "not found".to_string(),
        stderr: e.to_string(),
    })
}

pub(crate) fn parse_ffmpeg_version(output: &str) -> Option<Version> {
    let caps = FFMPEG_VERSION_RE.captures(output)?;
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    Some(Version::new(part(1), part(2), part(3)))
}

/// Запуск внешней команды; при ненулевом коде возврата stderr попадает в ошибку дословно
pub fn run_tool(program: &Path, args: &[OsString]) -> Result<ToolOutput> {
    let tool = program
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string());
    debug!("Running {} {:?}", tool, args);

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| MixError::ExternalToolFailed {
            tool: tool.clone(),
            status: "not started".to_string(),
            stderr: e.to_string(),
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !output.status.success() {
        log::error!("{} exited with {}: {}", tool, output.status, stderr);
        return Err(MixError::ExternalToolFailed {
            tool,
            status: output.status.to_string(),
            stderr,
        });
    }

    Ok(ToolOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_release_and_distro_versions() {
        let release = "ffmpeg version 6.1.1 Copyright (c) 2000-2023 the FFmpeg developers";
        assert_eq!(parse_ffmpeg_version(release), Some(Version::new(6, 1, 1)));

        let distro = "ffmpeg version 4.4-6ubuntu5 Copyright (c) 2000-2021";
        assert_eq!(parse_ffmpeg_version(distro), Some(Version::new(4, 4, 0)));

        let tagged = "ffmpeg version n7.0 Copyright";
        assert_eq!(parse_ffmpeg_version(tagged), Some(Version::new(7, 0, 0)));
    }

    #[test]
    fn git_builds_have_no_version() {
        let git = "ffmpeg version N-112874-g2f9ed9b0c9-static https://johnvansickle.com";
        assert_eq!(parse_ffmpeg_version(git), None);
    }

    #[test]
    fn missing_program_is_an_external_tool_failure() {
        let err = run_tool(Path::new("/nonexistent/ffmpeg-for-tests"), &[]).unwrap_err();
        match err {
            MixError::ExternalToolFailed { tool, status, .. } => {
                assert_eq!(tool, "ffmpeg-for-tests");
                assert_eq!(status, "not started");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
