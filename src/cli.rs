use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "faasnet")]
#[command(about = "Route FaaS invocations across edge, fog, and cloud tiers")]
#[command(version)]
pub struct Args {
    /// Configuration file loaded at startup (optional; a configuration can
    /// also be uploaded later via POST /faas)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Address to bind the decision API on
    #[arg(long, value_name = "ADDR", default_value = "0.0.0.0")]
    pub bind_addr: String,

    /// Port for the decision API
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Path to a .env file
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Timeout in seconds for each telemetry query
    #[arg(long, default_value = "5")]
    pub poll_timeout: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["faasnet"]);
        assert_eq!(args.bind_addr, "0.0.0.0");
        assert_eq!(args.port, 8080);
        assert_eq!(args.poll_timeout, 5);
        assert!(args.config.is_none());
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "faasnet",
            "-vv",
            "--bind-addr",
            "127.0.0.1",
            "-p",
            "9000",
            "--config",
            "hosts.yaml",
        ]);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.bind_addr, "127.0.0.1");
        assert_eq!(args.port, 9000);
        assert_eq!(
            args.config.as_deref(),
            Some(std::path::Path::new("hosts.yaml"))
        );
    }
}
