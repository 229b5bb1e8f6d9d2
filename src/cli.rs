use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "proxy-relay")]
#[command(author, version, about = "Forward HTTP/HTTPS proxy", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the proxy server
    Serve {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<String>,

        /// Listen address (overrides the config file)
        #[arg(long)]
        bind_host: Option<String>,

        /// Listen port (overrides the config file)
        #[arg(long)]
        bind_port: Option<u16>,
    },
    /// Check that a configuration file is valid
    Check {
        /// Configuration file path
        #[arg(short, long)]
        config: String,
    },
    /// Write an example configuration file
    Template {
        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_with_overrides() {
        let cli = Cli::parse_from([
            "proxy-relay",
            "serve",
            "--bind-host",
            "0.0.0.0",
            "--bind-port",
            "3128",
        ]);
        match cli.command {
            Commands::Serve {
                config,
                bind_host,
                bind_port,
            } => {
                assert!(config.is_none());
                assert_eq!(bind_host.as_deref(), Some("0.0.0.0"));
                assert_eq!(bind_port, Some(3128));
            }
            _ => panic!("expected serve command"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_check_command() {
        let cli = Cli::parse_from(["proxy-relay", "check", "--config", "proxy.toml"]);
        match cli.command {
            Commands::Check { config } => assert_eq!(config, "proxy.toml"),
            _ => panic!("expected check command"),
        }
    }

    #[test]
    fn test_global_log_level() {
        let cli = Cli::parse_from(["proxy-relay", "-l", "debug", "template"]);
        assert_eq!(cli.log_level, "debug");
    }
}
