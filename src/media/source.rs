//! Источник аудио для микшера: файл на диске или байты в памяти.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::{MixError, Result};
use crate::utils::temp::TempWorkspace;

#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Локальный файл; вызывающая сторона владеет им и удаляет сама
    File(PathBuf),
    /// Уже загруженные байты; расширение служит подсказкой формата
    Bytes {
        data: Bytes,
        extension: Option<String>,
    },
}

impl AudioSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn bytes(data: impl Into<Bytes>, extension: Option<&str>) -> Self {
        Self::Bytes {
            data: data.into(),
            extension: extension.map(|e| e.trim_start_matches('.').to_string()),
        }
    }

    /// Получить путь к данным источника, записав байты в рабочий каталог при необходимости
    pub(crate) fn materialize(&self, workspace: &mut TempWorkspace, source_name: &str) -> Result<PathBuf> {
        match self {
            Self::File(path) => {
                check_readable(path, source_name)?;
                Ok(path.clone())
            }
            Self::Bytes { data, extension } => {
                if data.is_empty() {
                    return Err(MixError::decode(source_name, "empty byte buffer"));
                }
                let extension = extension.as_deref().unwrap_or("bin");
                workspace
                    .write_file(source_name, extension, data)
                    .map_err(|e| MixError::fetch(source_name, e))
            }
        }
    }
}

fn check_readable(path: &Path, source_name: &str) -> Result<()> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| MixError::fetch(source_name, format!("{}: {}", path.display(), e)))?;
    if !metadata.is_file() {
        return Err(MixError::fetch(
            source_name,
            format!("{} is not a regular file", path.display()),
        ));
    }
    if metadata.len() == 0 {
        return Err(MixError::decode(
            source_name,
            format!("{} is empty", path.display()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_a_fetch_failure() {
        let mut ws = TempWorkspace::new(None, "test").unwrap();
        let source = AudioSource::file("/nonexistent/voice.ogg");
        assert!(matches!(
            source.materialize(&mut ws, "voice"),
            Err(MixError::SourceFetchFailed { .. })
        ));
    }

    #[test]
    fn empty_inputs_are_decode_failures() {
        let mut ws = TempWorkspace::new(None, "test").unwrap();
        let empty_file = ws.write_file("empty", "ogg", b"").unwrap();

        assert!(matches!(
            AudioSource::file(&empty_file).materialize(&mut ws, "voice"),
            Err(MixError::DecodeFailed { .. })
        ));
        assert!(matches!(
            AudioSource::bytes(Vec::<u8>::new(), Some("ogg")).materialize(&mut ws, "voice"),
            Err(MixError::DecodeFailed { .. })
        ));
    }

    #[test]
    fn bytes_land_inside_the_workspace() {
        let mut ws = TempWorkspace::new(None, "test").unwrap();
        let path = AudioSource::bytes(&b"ID3\x04"[..], Some(".mp3"))
            .materialize(&mut ws, "music")
            .unwrap();
        assert!(path.starts_with(ws.path()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mp3"));
        assert_eq!(std::fs::read(&path).unwrap(), b"ID3\x04");
    }
}
