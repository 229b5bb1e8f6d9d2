use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use proxy_relay::cli::{Cli, Commands};
use proxy_relay::{LogSink, ProxyConfig, ProxyServer};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_level.as_str())
        .with_target(false)
        .init();

    info!("proxy-relay v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve {
            config,
            bind_host,
            bind_port,
        } => {
            let mut proxy_config = match config {
                Some(path) => {
                    info!("Loading configuration from: {}", path);
                    ProxyConfig::load(path)?
                }
                None => {
                    let port = bind_port
                        .ok_or_else(|| anyhow::anyhow!("either --config or --bind-port is required"))?;
                    ProxyConfig::new("127.0.0.1", port)
                }
            };
            if let Some(host) = bind_host {
                proxy_config.bind_host = host;
            }
            if let Some(port) = bind_port {
                proxy_config.bind_port = port;
            }
            proxy_config.validate()?;

            let server = ProxyServer::new(proxy_config, Arc::new(LogSink));
            let handle = server.handle();

            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received shutdown signal, stopping server...");
                    handle.stop();
                }
            });

            server.run().await?;
        }
        Commands::Check { config } => {
            let proxy_config = ProxyConfig::load(config)?;
            println!("Configuration OK: listening on {}", proxy_config.bind_addr());
            println!(
                "  buffer_size = {}, backlog = {}",
                proxy_config.buffer_size, proxy_config.backlog
            );
        }
        Commands::Template { output } => match output {
            Some(path) => {
                std::fs::write(&path, ProxyConfig::template())?;
                println!("Wrote example configuration to {}", path);
            }
            None => print!("{}", ProxyConfig::template()),
        },
    }

    Ok(())
}
