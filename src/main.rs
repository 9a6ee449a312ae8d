use anyhow::Result;
use clap::Parser;
use genmon_exporter::{config::Config, server};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/Default.toml")]
    config: String,

    /// Monitor host (overrides config)
    #[arg(long, env = "GENMON_HOST")]
    monitor_host: Option<String>,

    /// Monitor port (overrides config)
    #[arg(long, env = "GENMON_PORT")]
    monitor_port: Option<u16>,

    /// SNMP community (overrides config)
    #[arg(long, env = "GENMON_SNMP_COMMUNITY")]
    community: Option<String>,

    /// UDP port for the SNMP agent (overrides config)
    #[arg(long, env = "GENMON_SNMP_PORT")]
    snmp_port: Option<u16>,

    /// Port to listen on for metrics (overrides config)
    #[arg(short, long, env = "EXPORTER_PORT")]
    port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long, env = "EXPORTER_ADDR")]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Genmon Exporter v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let mut config = Config::load(&args.config)?;

    if let Some(host) = args.monitor_host {
        config.monitor.host = host;
    }
    if let Some(port) = args.monitor_port {
        config.monitor.port = port;
    }
    if let Some(community) = args.community {
        config.snmp.community = secrecy::SecretString::new(community.into());
    }
    if let Some(port) = args.snmp_port {
        config.snmp.port = port;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }

    info!("Configuration loaded successfully");
    info!("Monitor: {}", config.monitor.address());
    if config.snmp.enabled {
        info!(
            "SNMP agent on UDP port {}, enterprise {}",
            config.snmp.port, config.snmp.enterprise_id
        );
    }

    if let Err(e) = server::start(config).await {
        error!("Exporter error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
