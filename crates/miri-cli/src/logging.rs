use std::fs;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const ENV_LOG: &str = "MIRI_LOG";
const DEFAULT_FILTER: &str = "info";

pub enum LogTarget {
    Stderr,
    /// The TUI owns the terminal, so its logs go to a file.
    File(PathBuf),
}

fn env_filter() -> EnvFilter {
    std::env::var(ENV_LOG)
        .unwrap_or_else(|_| DEFAULT_FILTER.to_string())
        .parse()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init(target: LogTarget) -> Result<(), Box<dyn std::error::Error>> {
    match target {
        LogTarget::Stderr => tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init()
            .map_err(|err| err.to_string())?,
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init()
                .map_err(|err| err.to_string())?;
        }
    }
    Ok(())
}
