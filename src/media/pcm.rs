//! Декодированное PCM-аудио и чтение/запись WAV.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{MixError, Result};

/// Чередующиеся (interleaved) f32 семплы в диапазоне [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

/// Перевод секунд в кадры с округлением до ближайшего кадра
pub fn secs_to_frames(secs: f64, sample_rate: u32) -> usize {
    (secs * f64::from(sample_rate)).round() as usize
}

impl PcmBuffer {
    /// Неполный последний кадр отбрасывается
    pub fn new(mut samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % usize::from(channels);
        samples.truncate(whole);
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Ошибка, если длина в семплах не помещается в `usize`
    pub fn silence(frames: usize, sample_rate: u32, channels: u16) -> Result<Self> {
        let len = frames
            .checked_mul(usize::from(channels.max(1)))
            .ok_or_else(|| MixError::InvalidConfig(format!("{} frames of silence overflow", frames)))?;
        Ok(Self::new(vec![0.0; len], sample_rate, channels))
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn same_format(&self, other: &Self) -> bool {
        self.sample_rate == other.sample_rate && self.channels == other.channels
    }

    /// Пиковая амплитуда кадра (по всем каналам)
    pub fn frame_peak(&self, frame: usize) -> f32 {
        let ch = usize::from(self.channels);
        self.samples[frame * ch..(frame + 1) * ch]
            .iter()
            .fold(0.0, |peak, s| peak.max(s.abs()))
    }
}

/// Прочитать WAV (целочисленный или float) в `PcmBuffer`
pub fn read_wav(path: &Path, source_name: &str) -> Result<PcmBuffer> {
    let mut reader = WavReader::open(path).map_err(|e| MixError::decode(source_name, e))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| MixError::decode(source_name, e))?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| MixError::decode(source_name, e))?
        }
    };

    Ok(PcmBuffer::new(samples, spec.sample_rate, spec.channels))
}

/// Записать `PcmBuffer` в 16-битный WAV
pub fn write_wav(buffer: &PcmBuffer, path: &Path) -> Result<()> {
    let spec = WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).map_err(|e| MixError::encode(path, e))?;
    for &sample in buffer.samples() {
        let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16;
        writer
            .write_sample(value)
            .map_err(|e| MixError::encode(path, e))?;
    }
    writer.finalize().map_err(|e| MixError::encode(path, e))?;
    Ok(())
}
