//! Вспомогательные модули: внешние инструменты, временные файлы, логирование.

pub mod ffmpeg;
pub mod logger;
pub mod temp;
