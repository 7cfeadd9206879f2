mod diff;
mod sample;
mod sampler;
mod shutdown;
mod sink;
mod source;

use std::path::{Path, PathBuf};

use sampler::{SamplerSettings, SamplingLoop};
use shutdown::ShutdownFlag;
use sink::RunLogFile;
use sleep_tracker_common::config::Config;
use source::CameraSource;
use tracing::{error, info};

const DEFAULT_CONFIG: &str = "config.toml";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let explicit_path = std::env::args().nth(1).map(PathBuf::from);

    let config = match load_config(explicit_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        mode = config.camera.mode,
        delay_secs = config.sampling.delay_secs,
        pause_secs = config.sampling.pause_secs,
        flush_on_shutdown = config.sampling.flush_on_shutdown,
        log_dir = config.output.log_dir,
        "starting sleep tracker"
    );

    let shutdown = ShutdownFlag::new();
    shutdown::spawn_signal_listener(shutdown.clone());

    println!("Starting Camera...");

    let source = match CameraSource::from_config(&config.camera) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to set up camera source");
            std::process::exit(1);
        }
    };

    let run_log = match RunLogFile::create(Path::new(&config.output.log_dir)) {
        Ok(log) => log,
        Err(e) => {
            error!(error = %e, "failed to open run log");
            std::process::exit(1);
        }
    };
    println!("{}", run_log.path().display());

    let mut sampler = SamplingLoop::new(
        source,
        run_log,
        shutdown,
        SamplerSettings::from(&config.sampling),
    );

    match sampler.run().await {
        Ok(summary) => {
            info!(
                samples = summary.samples,
                windows = summary.windows_flushed,
                records = summary.records_written,
                discarded = summary.discarded_records,
                "sampling stopped"
            );
            println!("Exited Gracefully");
        }
        Err(e) => {
            error!(error = %e, "sampling aborted");
            std::process::exit(1);
        }
    }
}

/// An explicit path must load; without one, `config.toml` is used when present
/// and built-in defaults otherwise.
fn load_config(explicit: Option<&Path>) -> Result<Config, sleep_tracker_common::config::ConfigError> {
    match explicit {
        Some(path) => Config::load(path),
        None if Path::new(DEFAULT_CONFIG).exists() => Config::load(Path::new(DEFAULT_CONFIG)),
        None => Ok(Config::default()),
    }
}
