//! Модуль для работы с медиа
//!
//! Источники аудио, стадии FFmpeg, PCM-буферы и сборка таймлайна.

pub mod audio;
pub mod pcm;
pub mod source;
pub mod timeline;

pub use audio::SourceInfo;
pub use pcm::PcmBuffer;
pub use source::AudioSource;
