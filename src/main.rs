//! Binaural CLI - list presets, play live, or render sessions to WAV

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use binaural::config::EngineConfig;
use binaural::render::{render_session, RenderOptions};
use binaural::synth::{NoiseState, NoiseType};

#[derive(Parser)]
#[command(name = "binaural")]
#[command(about = "Binaural beat generator", long_about = None)]
struct Cli {
    /// TOML file overriding the built-in presets and timings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List base presets and frequency bands
    Presets,

    /// Play through the default audio output
    Play {
        /// Duration in seconds (default: 60.0)
        #[arg(short, long, default_value = "60.0")]
        duration: f32,

        /// Base preset key (default: from config)
        #[arg(short, long)]
        base: Option<String>,

        /// Band key (default: from config)
        #[arg(long)]
        band: Option<String>,

        /// Sweep the beat within the band
        #[arg(long)]
        drift: bool,

        /// Noise color: white, pink, brown or off
        #[arg(short, long, default_value = "off")]
        noise: NoiseType,

        /// Noise volume 0.0-1.0 (default: from config)
        #[arg(short, long)]
        volume: Option<f32>,
    },

    /// Render a session to WAV
    Render {
        /// Output WAV file path
        output: PathBuf,

        /// Duration in seconds (default: 10.0)
        #[arg(short, long, default_value = "10.0")]
        duration: f32,

        /// Sample rate in Hz (default: 44100)
        #[arg(short, long, default_value = "44100")]
        sample_rate: u32,

        /// Base preset key (default: from config)
        #[arg(short, long)]
        base: Option<String>,

        /// Band key (default: from config)
        #[arg(long)]
        band: Option<String>,

        /// Sweep the beat within the band
        #[arg(long)]
        drift: bool,

        /// Noise color: white, pink, brown or off
        #[arg(short, long, default_value = "off")]
        noise: NoiseType,

        /// Noise volume 0.0-1.0 (default: from config)
        #[arg(short, long)]
        volume: Option<f32>,

        /// Fade in time in seconds (default: 0.05)
        #[arg(long, default_value = "0.05")]
        fade_in: f32,

        /// Fade out time in seconds (default: 0.05)
        #[arg(long, default_value = "0.05")]
        fade_out: f32,
    },
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Presets => {
            println!("Base presets:");
            for (key, hz) in config.bases_by_frequency() {
                let marker = if key == config.default_base { " (default)" } else { "" };
                println!("  {:<8} {:>7.1} Hz{}", key, hz, marker);
            }
            println!("Bands:");
            for (key, band) in config.bands_by_frequency() {
                let marker = if key == config.default_band { " (default)" } else { "" };
                println!("  {:<8} {:>5.1} - {:<5.1} Hz{}", key, band.min, band.max, marker);
            }
        }

        Commands::Play {
            duration,
            base,
            band,
            drift,
            noise,
            volume,
        } => {
            let noise = NoiseState::new(noise, volume.unwrap_or(config.voices.noise_volume));
            play(config, duration, base, band, drift, noise).await?;
        }

        Commands::Render {
            output,
            duration,
            sample_rate,
            base,
            band,
            drift,
            noise,
            volume,
            fade_in,
            fade_out,
        } => {
            let options = RenderOptions {
                sample_rate,
                duration,
                base,
                band,
                noise: NoiseState::new(noise, volume.unwrap_or(config.voices.noise_volume)),
                drift,
                fade_in,
                fade_out,
            };
            let stats = render_session(&config, &options, &output).await?;
            stats.print_summary();
        }
    }

    Ok(())
}

#[cfg(feature = "realtime")]
async fn play(
    config: EngineConfig,
    duration: f32,
    base: Option<String>,
    band: Option<String>,
    drift: bool,
    noise: NoiseState,
) -> Result<(), Box<dyn std::error::Error>> {
    use binaural::backend::RealtimeBackend;
    use binaural::engine::Engine;
    use std::time::Duration;

    let handle = Engine::new(config, RealtimeBackend::new())?.spawn();

    if let Some(base) = base {
        handle.set_base_preset(&base).await?;
    }
    if let Some(band) = band {
        handle.set_band(&band).await?;
    }
    handle.set_noise(noise).await?;
    handle.play().await?;
    if drift {
        handle.toggle_drift().await?;
    }

    let snapshot = handle.snapshot().await?;
    info!(
        "Playing {} / {} for {:.1}s (Ctrl+C to stop)",
        snapshot.base_key, snapshot.band_key, duration
    );

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs_f32(duration.max(0.0))) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    handle.stop().await?;
    handle.shutdown().await;
    Ok(())
}

#[cfg(not(feature = "realtime"))]
async fn play(
    _config: EngineConfig,
    _duration: f32,
    _base: Option<String>,
    _band: Option<String>,
    _drift: bool,
    _noise: NoiseState,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Live playback needs the `realtime` feature");
    Err("binaural was built without the `realtime` feature; use `render` or rebuild with --features realtime".into())
}
