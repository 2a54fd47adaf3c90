//! # Timeline assembly
//!
//! Операции над декодированным PCM, из которых собирается итоговая дорожка:
//!
//! - тишина для вступления и концовки
//! - зацикливание музыки с последующей обрезкой (loop-then-trim)
//! - линейные fade-in / fade-out музыкальной подложки
//! - склейка голосовой дорожки
//! - сведение голоса и музыки с ограничением амплитуды
//!
//! Все функции работают с точностью до кадра; длительности задаются в кадрах.

use log::debug;

use crate::error::{MixError, Result};
use crate::media::pcm::{secs_to_frames, PcmBuffer};

/// Сколько раз нужно повторить источник, чтобы покрыть `target_frames`.
///
/// Если источник уже не короче цели, повтор один; иначе
/// `target / source + 1`, как у исходного сервиса.
pub fn loop_count(source_frames: usize, target_frames: usize) -> usize {
    if source_frames == 0 {
        return 0;
    }
    if source_frames >= target_frames {
        1
    } else {
        target_frames / source_frames + 1
    }
}

/// Повторить источник целиком `loop_count` раз и обрезать до `target_frames`.
///
/// Всегда начинается с начала источника. Возвращает буфер и число повторов.
pub fn loop_to_length(source: &PcmBuffer, target_frames: usize) -> Result<(PcmBuffer, usize)> {
    if source.is_empty() {
        return Err(MixError::decode("music", "decoded music contains no audio"));
    }

    let repeats = loop_count(source.frames(), target_frames);
    let len = target_frames
        .checked_mul(usize::from(source.channels()))
        .ok_or_else(|| MixError::InvalidConfig(format!("{} frames of music overflow", target_frames)))?;
    let samples: Vec<f32> = source.samples().iter().copied().cycle().take(len).collect();

    debug!(
        "Music looped {} time(s): {} -> {} frames",
        repeats,
        source.frames(),
        target_frames
    );
    Ok((
        PcmBuffer::new(samples, source.sample_rate(), source.channels()),
        repeats,
    ))
}

/// Умножить все семплы на `gain`
pub fn apply_gain(buffer: &mut PcmBuffer, gain: f32) {
    if (gain - 1.0).abs() < f32::EPSILON {
        return;
    }
    for sample in buffer.samples_mut() {
        *sample *= gain;
    }
}

/// Длина fade в кадрах; не больше половины буфера, чтобы окна не пересекались
pub fn fade_frames(fade_secs: f64, sample_rate: u32, total_frames: usize) -> usize {
    let requested = secs_to_frames(fade_secs, sample_rate);
    let limit = total_frames / 2;
    if requested > limit {
        debug!(
            "Fade of {} frames does not fit into {} frames, clamping to {}",
            requested, total_frames, limit
        );
        limit
    } else {
        requested
    }
}

/// Линейный fade-in на `[0, fade)` и fade-out на `[len - fade, len)`.
///
/// Множитель равен 0 в первом кадре, 1 в кадре `fade` и в кадре `len - fade`,
/// и убывает до `1/fade` в последнем кадре. Возвращает фактическую длину fade
/// в секундах.
pub fn apply_fades(buffer: &mut PcmBuffer, fade_secs: f64) -> f64 {
    let total = buffer.frames();
    let fade = fade_frames(fade_secs, buffer.sample_rate(), total);
    if fade == 0 {
        return 0.0;
    }

    let channels = usize::from(buffer.channels());
    let sample_rate = buffer.sample_rate();
    let samples = buffer.samples_mut();

    for frame in 0..fade {
        let gain_in = frame as f32 / fade as f32;
        let gain_out = (fade - frame) as f32 / fade as f32;
        let head = frame * channels;
        let tail = (total - fade + frame) * channels;
        for ch in 0..channels {
            samples[head + ch] *= gain_in;
            samples[tail + ch] *= gain_out;
        }
    }

    fade as f64 / f64::from(sample_rate)
}

/// Склеить буферы одного формата по порядку
pub fn concat(parts: &[&PcmBuffer]) -> Result<PcmBuffer> {
    let first = parts
        .first()
        .ok_or_else(|| MixError::InvalidConfig("nothing to concatenate".to_string()))?;

    let mut samples = Vec::with_capacity(parts.iter().map(|p| p.samples().len()).sum());
    for part in parts {
        if !part.same_format(first) {
            return Err(MixError::InvalidConfig(format!(
                "cannot concatenate {} Hz/{} ch with {} Hz/{} ch",
                part.sample_rate(),
                part.channels(),
                first.sample_rate(),
                first.channels()
            )));
        }
        samples.extend_from_slice(part.samples());
    }

    Ok(PcmBuffer::new(samples, first.sample_rate(), first.channels()))
}

/// Вступление + голос + концовка
pub fn voice_timeline(
    voice: &PcmBuffer,
    lead_in_secs: f64,
    trail_out_secs: f64,
) -> Result<PcmBuffer> {
    let rate = voice.sample_rate();
    let lead = PcmBuffer::silence(secs_to_frames(lead_in_secs, rate), rate, voice.channels())?;
    let trail = PcmBuffer::silence(secs_to_frames(trail_out_secs, rate), rate, voice.channels())?;
    concat(&[&lead, voice, &trail])
}

/// Сложить голосовую дорожку и музыку с ограничением до [-1.0, 1.0].
///
/// Длины должны совпадать до кадра; расхождение считается ошибкой сборки.
pub fn mix(voice: &PcmBuffer, music: &PcmBuffer) -> Result<PcmBuffer> {
    if voice.frames() != music.frames() {
        return Err(MixError::TimelineMismatch {
            voice_frames: voice.frames(),
            music_frames: music.frames(),
        });
    }
    if !voice.same_format(music) {
        return Err(MixError::InvalidConfig(format!(
            "cannot mix {} Hz/{} ch with {} Hz/{} ch",
            voice.sample_rate(),
            voice.channels(),
            music.sample_rate(),
            music.channels()
        )));
    }

    let samples = voice
        .samples()
        .iter()
        .zip(music.samples())
        .map(|(v, m)| (v + m).clamp(-1.0, 1.0))
        .collect();

    Ok(PcmBuffer::new(samples, voice.sample_rate(), voice.channels()))
}
