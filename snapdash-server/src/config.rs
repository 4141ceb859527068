use clap::Parser;
use snapdash_core::Config;
use std::path::PathBuf;

/// Config file used when `--config` is not given
pub const CONFIG_PATH_ENV: &str = "SNAPDASH_CONFIG";

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "snapdash", author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub core: Config,
    pub config_path: Option<PathBuf>,
}

impl AppConfig {
    /// Defaults, then the config file, then `SNAPDASH__*` variables, then
    /// command line flags.
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let config_path = args
            .config
            .clone()
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));
        let core = Config::load(config_path.as_deref())?;

        Ok(Self::with_overrides(core, config_path, args))
    }

    fn with_overrides(mut core: Config, config_path: Option<PathBuf>, args: &Args) -> Self {
        if let Some(port) = args.port {
            core.server.port = port;
        }
        if let Some(level) = &args.log_level {
            core.log.level = level.clone();
        }
        Self { core, config_path }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.core.server.bind, self.core.server.port)
    }
}
