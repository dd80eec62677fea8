use clap::Parser;
use pingora_core::server::configuration::Opt;
use std::path::PathBuf;
use shukusho::config::{Config, ConfigOverrides};
use shukusho::server::ShukushoServer;

/// Shukusho - on-the-fly image resizing proxy built on Cloudflare's Pingora
#[derive(Parser, Debug)]
#[command(name = "shukusho")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Width used when a request does not ask for one (0 = unconstrained)
    #[arg(long)]
    max_width: Option<u32>,

    /// Height used when a request does not ask for one (0 = unconstrained)
    #[arg(long)]
    max_height: Option<u32>,

    /// Concurrent fetch + transform operations
    #[arg(long)]
    fetch_slots: Option<usize>,

    /// Listen address as host:port
    #[arg(short, long)]
    listen: Option<String>,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Upgrade workers gracefully
    #[arg(long)]
    upgrade: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            max_width: self.max_width,
            max_height: self.max_height,
            fetch_slots: self.fetch_slots,
            listen: self.listen.clone(),
        }
    }
}

fn exit_with(message: String) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn load_config(args: &Args) -> Result<Config, String> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_overrides(&args.overrides())?;
    config.validate()?;
    Ok(config)
}

fn main() {
    let args = Args::parse();

    let config = load_config(&args)
        .unwrap_or_else(|e| exit_with(format!("Failed to load configuration: {}", e)));

    shukusho::logging::init_subscriber(&config.logging)
        .unwrap_or_else(|e| exit_with(format!("Failed to initialize logging: {}", e)));

    tracing::info!(
        config_file = %args.config.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "-".to_string()),
        listen = %config.server.listen_addr(),
        max_width = config.image.max_width,
        max_height = config.image.max_height,
        fetch_slots = config.fetch.slots,
        engine_threads = config.image.engine_threads,
        upstream_base_url = config.fetch.upstream_base_url.as_deref().unwrap_or("-"),
        "Configuration loaded successfully"
    );

    let opt = Opt {
        daemon: args.daemon,
        test: args.test,
        upgrade: args.upgrade,
        ..Default::default()
    };

    let server = ShukushoServer::new(config)
        .and_then(|s| s.into_server(opt))
        .unwrap_or_else(|e| exit_with(format!("Failed to start server: {}", e)));

    tracing::info!("Starting Shukusho image proxy");

    // Blocks until shutdown
    server.run_forever();
}
