//! Сборка итоговой дорожки из голоса и музыки
//!
//! Таймлайн результата: тишина (вступление) + голос + тишина (концовка),
//! под ним музыка, зацикленная и обрезанная ровно до длины таймлайна,
//! приглушенная и с fade-in/fade-out. Все промежуточные файлы живут
//! в отдельном временном каталоге и удаляются на любом выходе.

use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::config::{OutputCodec, TimelineSpec};
use crate::error::{MixError, Result};
use crate::media::audio::{export_mp3, normalize_to_wav, probe_source};
use crate::media::pcm::{read_wav, secs_to_frames, write_wav, PcmBuffer};
use crate::media::source::AudioSource;
use crate::media::timeline;
use crate::utils::ffmpeg::MediaTools;
use crate::utils::temp::TempWorkspace;

/// Результат сведения
#[derive(Debug, Clone, PartialEq)]
pub struct MixResult {
    /// Путь к итоговому файлу; удаляет его вызывающая сторона
    pub path: PathBuf,
    /// Длительность результата: вступление + голос + концовка
    pub duration_secs: f64,
    pub frames: usize,
    pub sample_rate: u32,
    pub channels: u16,
    /// Длительность декодированного голоса
    pub voice_duration_secs: f64,
    /// Сколько раз повторялась музыка
    pub music_loops: usize,
    /// Фактическая длина fade после ограничения
    pub fade_secs: f64,
}

/// Микшер голосового сообщения и фоновой музыки
#[derive(Debug, Clone)]
pub struct TimelineMixer {
    spec: TimelineSpec,
    tools: MediaTools,
    work_root: Option<PathBuf>,
}

impl TimelineMixer {
    /// Создать микшер, найдя ffmpeg и ffprobe в PATH
    pub fn new(spec: TimelineSpec) -> Result<Self> {
        Self::with_tools(spec, MediaTools::locate()?)
    }

    pub fn with_tools(spec: TimelineSpec, tools: MediaTools) -> Result<Self> {
        spec.validate()?;
        Ok(Self {
            spec,
            tools,
            work_root: None,
        })
    }

    /// Каталог, в котором создаются рабочие каталоги вызовов
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }

    pub fn spec(&self) -> &TimelineSpec {
        &self.spec
    }

    /// Свести `voice` и `music` в файл `output`.
    ///
    /// Ошибка любой стадии прерывает конвейер; временные файлы удаляются
    /// в обоих случаях.
    pub fn mix(&self, voice: &AudioSource, music: &AudioSource, output: &Path) -> Result<MixResult> {
        let root = self.work_root.as_deref();
        let mut workspace = TempWorkspace::new(root, "mix").map_err(|e| {
            MixError::encode(root.map_or_else(std::env::temp_dir, Path::to_path_buf), e)
        })?;
        let task = workspace.id()[..8].to_string();
        info!("[mix {}] Starting, output {}", task, output.display());

        let result = self.run(&mut workspace, &task, voice, music, output);

        let artifacts = workspace.artifact_count();
        if let Err(e) = workspace.close() {
            warn!("[mix {}] Cleanup error: {}", task, e);
        } else {
            info!("[mix {}] Removed workspace with {} artifact(s)", task, artifacts);
        }

        match &result {
            Ok(mixed) => info!(
                "[mix {}] ✅ Done: {:.3}s ({} frames), music looped {}x",
                task, mixed.duration_secs, mixed.frames, mixed.music_loops
            ),
            Err(e) => error!("[mix {}] ❌ Failed: {}", task, e),
        }
        result
    }

    fn run(
        &self,
        workspace: &mut TempWorkspace,
        task: &str,
        voice: &AudioSource,
        music: &AudioSource,
        output: &Path,
    ) -> Result<MixResult> {
        let spec = &self.spec;
        let rate = spec.sample_rate;

        let voice_path = voice.materialize(workspace, "voice")?;
        let music_path = music.materialize(workspace, "music")?;

        let voice_info = probe_source(&self.tools, &voice_path, "voice")?;
        info!(
            "[mix {}] 🎤 Voice: {}/{}, {:?} Hz, {:?} ch",
            task, voice_info.format_name, voice_info.codec_name, voice_info.sample_rate, voice_info.channels
        );
        let voice_pcm = self.decode(workspace, &voice_path, "voice")?;
        if voice_pcm.is_empty() {
            return Err(MixError::decode("voice", "decoded voice contains no audio"));
        }
        info!(
            "[mix {}] Voice decoded: {:.3}s, {} frames",
            task,
            voice_pcm.duration_secs(),
            voice_pcm.frames()
        );

        let required_span = secs_to_frames(spec.lead_in_secs, rate)
            .checked_add(voice_pcm.frames())
            .and_then(|frames| frames.checked_add(secs_to_frames(spec.trail_out_secs, rate)))
            .ok_or_else(|| MixError::InvalidConfig("timeline length overflows".to_string()))?;

        let music_info = probe_source(&self.tools, &music_path, "music")?;
        info!(
            "[mix {}] 🎼 Music: {}/{}, {:?}s",
            task, music_info.format_name, music_info.codec_name, music_info.duration_secs
        );
        let music_pcm = self.decode(workspace, &music_path, "music")?;
        info!(
            "[mix {}] Music decoded: {:.3}s, required span {:.3}s",
            task,
            music_pcm.duration_secs(),
            required_span as f64 / f64::from(rate)
        );

        let (mut bed, music_loops) = timeline::loop_to_length(&music_pcm, required_span)?;
        timeline::apply_gain(&mut bed, spec.music_gain.to_linear());
        let fade_secs = timeline::apply_fades(&mut bed, spec.fade_secs);
        if fade_secs < spec.fade_secs {
            warn!(
                "[mix {}] Fade shortened from {:.3}s to {:.3}s to fit the timeline",
                task, spec.fade_secs, fade_secs
            );
        }

        let foreground = timeline::voice_timeline(&voice_pcm, spec.lead_in_secs, spec.trail_out_secs)?;
        let mixed = timeline::mix(&foreground, &bed)?;

        self.export(workspace, &mixed, output)?;

        Ok(MixResult {
            path: output.to_path_buf(),
            duration_secs: mixed.duration_secs(),
            frames: mixed.frames(),
            sample_rate: mixed.sample_rate(),
            channels: mixed.channels(),
            voice_duration_secs: voice_pcm.duration_secs(),
            music_loops,
            fade_secs,
        })
    }

    fn decode(&self, workspace: &mut TempWorkspace, input: &Path, source_name: &str) -> Result<PcmBuffer> {
        let wav = workspace.temp_path(&format!("{}_normalized", source_name), "wav");
        normalize_to_wav(&self.tools, input, &wav, self.spec.sample_rate, self.spec.channels)?;
        read_wav(&wav, source_name)
    }

    fn export(&self, workspace: &mut TempWorkspace, mixed: &PcmBuffer, output: &Path) -> Result<()> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(MixError::encode(output, "output directory does not exist"));
            }
        }

        match self.spec.output_codec {
            OutputCodec::Wav => write_wav(mixed, output).inspect_err(|_| {
                let _ = std::fs::remove_file(output);
            }),
            OutputCodec::Mp3 => {
                let wav = workspace.temp_path("mixed", "wav");
                write_wav(mixed, &wav)?;
                export_mp3(&self.tools, &wav, output, self.spec.mp3_vbr_quality)
            }
        }
    }
}
