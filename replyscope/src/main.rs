//! replyscope - reply history word cloud
//!
//! Collects every reply a user posted, writes them to
//! `<out>/<uid>_records.csv` and renders `<out>/<uid>_records.png`.
//! Status lines are printed while the run progresses; the exit status is
//! non-zero when the run fails.

use anyhow::{Context, Result};
use clap::Parser;
use replyscope::{PipelineOrchestrator, RunRequest};
use replyscope_common::config::{read_config, TomlConfig};
use replyscope_common::events::{EventBus, PipelineEvent};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Event capacity of the status bus
const EVENT_CAPACITY: usize = 100;

#[derive(Debug, Parser)]
#[command(name = "replyscope", version, about = "Collect a user's replies and render a word cloud")]
struct Args {
    /// Remote user identifier
    uid: String,

    /// Directory receiving the table and the image
    #[arg(short, long, env = "REPLYSCOPE_OUTPUT_DIR")]
    out: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Records requested per page
    #[arg(long)]
    page_size: Option<u32>,

    /// Image width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Image height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Font file used to draw terms
    #[arg(long)]
    font: Option<PathBuf>,
}

impl Args {
    /// Fold command line overrides into the loaded configuration
    fn apply_overrides(&self, config: &mut TomlConfig) {
        if let Some(page_size) = self.page_size {
            config.api.page_size = page_size;
        }
        if let Some(width) = self.width {
            config.cloud.width = width;
        }
        if let Some(height) = self.height {
            config.cloud.height = height;
        }
        if let Some(font) = &self.font {
            config.cloud.font_path = Some(font.clone());
        }
    }

    fn output_dir(&self, config: &TomlConfig) -> PathBuf {
        self.out
            .clone()
            .or_else(|| config.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Load the config file, apply command line overrides, then validate once
fn resolve_config(args: &Args) -> Result<TomlConfig> {
    let mut config = read_config(args.config.clone()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn init_tracing(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn print_event(event: &PipelineEvent) {
    let mut stdout = std::io::stdout();
    match event {
        PipelineEvent::Log { message, .. } => {
            let _ = writeln!(stdout, "\r\x1b[K{message}");
        }
        PipelineEvent::Progress { message, .. } => {
            let _ = write!(stdout, "\r\x1b[K{message}");
        }
        PipelineEvent::StateChanged { .. } => {}
    }
    let _ = stdout.flush();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = resolve_config(&args)?;
    init_tracing(&config.logging.level)?;

    info!("Starting replyscope {}", env!("CARGO_PKG_VERSION"));

    let event_bus = EventBus::new(EVENT_CAPACITY);
    let mut events = event_bus.subscribe();

    let orchestrator = Arc::new(
        PipelineOrchestrator::new(&config, Arc::new(event_bus))
            .context("Failed to initialize pipeline")?,
    );

    let request = RunRequest::new(args.uid.clone(), args.output_dir(&config));
    info!(
        uid = %request.identifier,
        output_dir = %request.output_dir.display(),
        "Dispatching run"
    );
    let mut handle = orchestrator.spawn(request);

    let outcome = loop {
        tokio::select! {
            biased;
            received = events.recv() => match received {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Status output fell behind");
                }
                Err(RecvError::Closed) => {}
            },
            joined = &mut handle => break joined,
        }
    };

    // Events emitted just before the worker finished
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
    println!();

    let report = outcome.context("Pipeline worker panicked")??;
    info!(
        records = report.record_count,
        terms = report.term_count,
        table = %report.table_path.display(),
        image = %report.image_path.display(),
        "Run finished"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    const OUTPUT_ENV_VAR: &str = "REPLYSCOPE_OUTPUT_DIR";

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("replyscope").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    #[serial]
    fn test_out_flag_beats_env_and_config() {
        env::set_var(OUTPUT_ENV_VAR, "/tmp/from-env");
        let args = parse(&["123", "--out", "/tmp/from-flag"]);
        env::remove_var(OUTPUT_ENV_VAR);

        let config = TomlConfig {
            output_dir: Some(PathBuf::from("/tmp/from-config")),
            ..TomlConfig::default()
        };
        assert_eq!(args.output_dir(&config), PathBuf::from("/tmp/from-flag"));
    }

    #[test]
    #[serial]
    fn test_env_output_dir_used_without_flag() {
        env::set_var(OUTPUT_ENV_VAR, "/tmp/from-env");
        let args = parse(&["123"]);
        env::remove_var(OUTPUT_ENV_VAR);

        let config = TomlConfig {
            output_dir: Some(PathBuf::from("/tmp/from-config")),
            ..TomlConfig::default()
        };
        assert_eq!(args.output_dir(&config), PathBuf::from("/tmp/from-env"));
    }

    #[test]
    #[serial]
    fn test_output_dir_falls_back_to_config_then_cwd() {
        env::remove_var(OUTPUT_ENV_VAR);
        let args = parse(&["123"]);

        let config = TomlConfig {
            output_dir: Some(PathBuf::from("/tmp/from-config")),
            ..TomlConfig::default()
        };
        assert_eq!(args.output_dir(&config), PathBuf::from("/tmp/from-config"));
        assert_eq!(args.output_dir(&TomlConfig::default()), PathBuf::from("."));
    }

    #[test]
    fn test_flag_repairs_invalid_file_value() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("replyscope.toml");
        std::fs::write(&path, "[api]\npage_size = 0\n").unwrap();
        let path_arg = path.to_string_lossy().to_string();

        let args = parse(&["123", "--config", &path_arg, "--page-size", "10"]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.api.page_size, 10);

        let args = parse(&["123", "--config", &path_arg]);
        assert!(resolve_config(&args).is_err());
    }

    #[test]
    fn test_overrides_applied() {
        let args = parse(&["1", "--width", "640", "--height", "320", "--font", "/fonts/x.ttf"]);
        let mut config = TomlConfig::default();
        args.apply_overrides(&mut config);

        assert_eq!((config.cloud.width, config.cloud.height), (640, 320));
        assert_eq!(config.cloud.font_path, Some(PathBuf::from("/fonts/x.ttf")));
    }
}
