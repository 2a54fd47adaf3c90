use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;

use voice_mixer::config::{DEFAULT_MUSIC_URL, DEFAULT_TELEGRAM_API_URL};
use voice_mixer::{AudioSource, MusicGain, OutputCodec, ServiceConfig, TimelineSpec};

#[derive(Debug, Parser)]
#[command(name = "voice-mixer", version, about = "Mix a voice message over background music")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the webhook server
    Serve(ServeArgs),
    /// Mix local files once
    Mix(MixArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CodecArg {
    Mp3,
    Wav,
}

impl From<CodecArg> for OutputCodec {
    fn from(codec: CodecArg) -> Self {
        match codec {
            CodecArg::Mp3 => OutputCodec::Mp3,
            CodecArg::Wav => OutputCodec::Wav,
        }
    }
}

#[derive(Debug, Args)]
struct TimelineArgs {
    /// JSON file with timeline settings; flags below override it
    #[arg(long, value_name = "PATH")]
    timeline_config: Option<PathBuf>,
    /// Silence before the voice, seconds
    #[arg(long)]
    lead_in: Option<f64>,
    /// Silence after the voice, seconds
    #[arg(long)]
    trail_out: Option<f64>,
    /// Music fade-in/fade-out length, seconds
    #[arg(long)]
    fade: Option<f64>,
    /// Music attenuation in dB (e.g. -10)
    #[arg(long, allow_negative_numbers = true)]
    music_gain_db: Option<f32>,
    /// Music amplitude factor (e.g. 0.3)
    #[arg(long, conflicts_with = "music_gain_db")]
    music_gain: Option<f32>,
    #[arg(long)]
    sample_rate: Option<u32>,
    #[arg(long)]
    channels: Option<u16>,
    #[arg(long, value_enum)]
    codec: Option<CodecArg>,
    /// MP3 VBR quality, 0 (best) to 9
    #[arg(long)]
    quality: Option<u8>,
}

impl TimelineArgs {
    fn resolve(&self) -> Result<TimelineSpec> {
        let mut spec = match &self.timeline_config {
            Some(path) => TimelineSpec::from_json_file(path)?,
            None => TimelineSpec::default(),
        };

        if let Some(v) = self.lead_in {
            spec.lead_in_secs = v;
        }
        if let Some(v) = self.trail_out {
            spec.trail_out_secs = v;
        }
        if let Some(v) = self.fade {
            spec.fade_secs = v;
        }
        if let Some(db) = self.music_gain_db {
            spec.music_gain = MusicGain::Decibels(db);
        }
        if let Some(gain) = self.music_gain {
            spec.music_gain = MusicGain::Linear(gain);
        }
        if let Some(v) = self.sample_rate {
            spec.sample_rate = v;
        }
        if let Some(v) = self.channels {
            spec.channels = v;
        }
        if let Some(codec) = self.codec {
            spec.output_codec = codec.into();
        }
        if let Some(v) = self.quality {
            spec.mp3_vbr_quality = v;
        }

        spec.validate()?;
        Ok(spec)
    }
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", default_value = "", hide_env_values = true)]
    bot_token: String,
    #[arg(long, env = "TELEGRAM_API_URL", default_value = DEFAULT_TELEGRAM_API_URL)]
    telegram_api_url: String,
    #[arg(long, env = "MUSIC_URL", default_value = DEFAULT_MUSIC_URL)]
    music_url: String,
    /// Public URL of this service, enables self-ping
    #[arg(long, env = "APP_URL")]
    app_url: Option<String>,
    #[arg(long, env = "KEEPALIVE_MINUTES", default_value_t = 8)]
    keepalive_minutes: u64,
    /// Directory for per-request temp files
    #[arg(long, env = "WORK_DIR")]
    work_dir: Option<PathBuf>,
    #[command(flatten)]
    timeline: TimelineArgs,
}

impl ServeArgs {
    fn into_config(self) -> Result<ServiceConfig> {
        let defaults = ServiceConfig::default();
        Ok(ServiceConfig {
            port: self.port,
            bot_token: self.bot_token,
            telegram_api_url: self.telegram_api_url,
            music_url: self.music_url,
            app_url: self.app_url.filter(|u| !u.is_empty()),
            keepalive_interval: Duration::from_secs(self.keepalive_minutes.max(1) * 60),
            work_dir: self.work_dir.unwrap_or(defaults.work_dir),
            timeline: self.timeline.resolve()?,
            ..defaults
        })
    }
}

#[derive(Debug, Args)]
struct MixArgs {
    #[arg(long)]
    voice: PathBuf,
    #[arg(long)]
    music: PathBuf,
    #[arg(long)]
    output: PathBuf,
    #[command(flatten)]
    timeline: TimelineArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    voice_mixer::utils::logger::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => {
            let config = args.into_config()?;
            voice_mixer::service::serve(config).await?;
        }
        Command::Mix(args) => {
            let spec = args.timeline.resolve()?;
            let voice = AudioSource::file(&args.voice);
            let music = AudioSource::file(&args.music);
            let output = args.output.clone();

            let result = tokio::task::spawn_blocking(move || {
                voice_mixer::mix(&voice, &music, &spec, &output)
            })
            .await
            .context("mixer worker panicked")??;

            info!(
                "Wrote {} ({:.3}s, voice {:.3}s, music looped {}x)",
                result.path.display(),
                result.duration_secs,
                result.voice_duration_secs,
                result.music_loops
            );
        }
    }

    Ok(())
}
