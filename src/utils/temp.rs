//! Модуль для работы с временными файлами
//!
//! Каждый вызов микшера и каждый запрос вебхука работает в собственном
//! каталоге `<label>_<uuid>_*`, который удаляется при уничтожении объекта.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Временный рабочий каталог одного вызова
#[derive(Debug)]
pub struct TempWorkspace {
    /// Временная директория
    temp_dir: TempDir,
    /// Уникальный идентификатор каталога
    id: String,
    /// Список созданных файлов
    files: Vec<PathBuf>,
}

impl TempWorkspace {
    /// Создать каталог в `root` (или в системном temp)
    pub fn new(root: Option<&Path>, label: &str) -> io::Result<Self> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let prefix = format!("{}_{}_", label, id);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);

        let temp_dir = match root {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        Ok(Self {
            temp_dir,
            id,
            files: Vec::new(),
        })
    }

    /// Зарезервировать путь для промежуточного файла (сам файл не создается)
    pub fn temp_path(&mut self, prefix: &str, extension: &str) -> PathBuf {
        let file_name = format!("{}_{}.{}", prefix, self.files.len(), extension);
        let file_path = self.temp_dir.path().join(file_name);
        self.files.push(file_path.clone());
        file_path
    }

    /// Записать байты во временный файл
    pub fn write_file(&mut self, prefix: &str, extension: &str, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.temp_path(prefix, extension);
        fs::write(&path, data)?;
        Ok(path)
    }

    /// Получить путь к временной директории
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Сколько путей было выдано
    pub fn artifact_count(&self) -> usize {
        self.files.len()
    }

    /// Явное удаление с возвратом ошибки; при обычном drop ошибка игнорируется
    pub fn close(self) -> io::Result<()> {
        self.temp_dir.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_is_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let dir = {
            let mut ws = TempWorkspace::new(Some(root.path()), "mix").unwrap();
            let file = ws.write_file("voice", "ogg", b"OggS").unwrap();
            assert!(file.exists());
            assert!(ws.path().starts_with(root.path()));
            ws.path().to_path_buf()
        };
        assert!(!dir.exists());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn workspaces_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let mut a = TempWorkspace::new(Some(root.path()), "mix").unwrap();
        let mut b = TempWorkspace::new(Some(root.path()), "mix").unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a.temp_path("voice", "wav"), b.temp_path("voice", "wav"));
    }

    #[test]
    fn temp_paths_are_unique_within_a_workspace() {
        let mut ws = TempWorkspace::new(None, "mix").unwrap();
        let first = ws.temp_path("stage", "wav");
        let second = ws.temp_path("stage", "wav");
        assert_ne!(first, second);
        assert_eq!(ws.artifact_count(), 2);
        ws.close().unwrap();
    }
}
