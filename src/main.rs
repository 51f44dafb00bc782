use clap::Parser;
use mood_cam::app::Session;
use mood_cam::config::{AppConfig, ClassificationPolicy, SourceKind};
use mood_cam::error::{MoodCamError, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Selects the networked or plain variant; every value not given here falls
/// back to the constants in `config.rs`
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Do not forward labels over UDP
    #[arg(long)]
    no_publish: bool,

    /// Also read datagrams arriving on the receive port
    #[arg(long)]
    listen: bool,

    /// Use a still image instead of the webcam
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Keep running when the emotion model fails on a frame
    #[arg(long)]
    skip_failed_frames: bool,

    /// Haar cascade XML used for face detection
    #[arg(long)]
    cascade: Option<PathBuf>,

    /// ONNX emotion model
    #[arg(long)]
    model: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> AppConfig {
        let mut config = AppConfig::default();

        if let Some(path) = self.image {
            config.source = SourceKind::StillImage(path);
        }
        if let Some(path) = self.cascade {
            config.cascade_path = path;
        }
        if let Some(path) = self.model {
            config.model_path = path;
        }
        if self.skip_failed_frames {
            config.on_classification_error = ClassificationPolicy::SkipFrame;
        }
        if self.no_publish {
            config.publisher = None;
        } else if let Some(publisher) = config.publisher.as_mut() {
            publisher.enable_rx = self.listen;
        }

        config
    }
}

/// Initializes the logging system (file only, no console output)
fn init_logging() -> Result<()> {
    let log_file = std::fs::File::create("mood_cam.log").map_err(MoodCamError::Io)?;

    let file_layer = fmt::layer()
        .with_writer(Arc::new(log_file))
        .with_ansi(false);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();

    Ok(())
}

fn run(config: AppConfig) -> Result<u64> {
    let mut session = Session::open(&config)?;
    session.run()
}

fn main() -> ExitCode {
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let config = Args::parse().into_config();
    info!("Starting with {:?}", config);

    match run(config) {
        Ok(frames) => {
            info!("Exited cleanly after {} frame(s)", frames);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Fatal: {}", e);
            eprintln!("mood-cam: {e}");
            ExitCode::FAILURE
        }
    }
}
