use clap::Parser;
use machinist_server::{ConfigError, ServerConfig, ServerError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "machinist-server", version, about = "HTTP service for machine records")]
struct Cli {
    /// TOML config file. Flags given on the command line override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind.
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Directory for the durable store. Without it, records live in memory only.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Number of request worker threads.
    #[arg(long)]
    workers: Option<usize>,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.data_dir.is_some() {
            config.data_dir = self.data_dir;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.validate()?;
        Ok(config)
    }
}

fn run(cli: Cli) -> Result<(), ServerError> {
    let config = cli.into_config()?;
    match &config.data_dir {
        Some(dir) => info!("data directory: {}", dir.display()),
        None => info!("no data directory configured, records are kept in memory"),
    }

    let handle = machinist_server::serve(&config)?;
    let trigger = handle.trigger();
    ctrlc::set_handler(move || {
        if trigger.fire() {
            eprintln!("\nshutdown requested, finishing in-flight requests...");
        } else {
            std::process::exit(1);
        }
    })?;

    handle.join();
    info!("server stopped");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machinist.toml");
        std::fs::write(&path, "port = 9000\nworkers = 8\nbind = \"127.0.0.1\"").unwrap();

        let cli = Cli::parse_from([
            "machinist-server",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "9100",
        ]);
        let config = cli.into_config().unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.workers, 8);
        assert_eq!(config.bind, "127.0.0.1");
        assert_eq!(config.data_dir, None);
    }

    #[test]
    fn defaults_without_flags() {
        let config = Cli::parse_from(["machinist-server"]).into_config().unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn zero_workers_flag_is_rejected() {
        let cli = Cli::parse_from(["machinist-server", "--workers", "0"]);
        assert!(matches!(cli.into_config(), Err(ConfigError::Invalid(_))));
    }
}
