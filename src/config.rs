use anyhow::Context;
use clap::Parser;

/// Runtime configuration, read from flags, the environment, or a `.env` file
#[derive(Parser, Debug, Clone)]
#[clap(name = "wholesale-orders", about = "Order lifecycle and inventory engine")]
pub struct Config {
    /// PostgreSQL connection string
    #[clap(long, env)]
    pub database_url: Option<String>,

    #[clap(long, env, default_value = "10")]
    pub db_max_connections: u32,

    #[clap(long, env, default_value = "9090")]
    pub metrics_port: u16,

    /// Active products with stock below this are reported as low stock
    #[clap(long, env, default_value = "10")]
    pub low_stock_threshold: i32,

    /// Use the in-process store instead of PostgreSQL
    #[clap(long)]
    pub in_memory: bool,

    /// Seed a few products and run one order through its lifecycle on startup
    #[clap(long)]
    pub demo: bool,
}

impl Config {
    pub fn load() -> Self {
        // A missing .env is fine
        let _ = dotenvy::dotenv();
        Self::parse()
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set unless --in-memory is given")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["wholesale-orders", "--in-memory"]).unwrap();
        assert!(config.in_memory);
        assert!(!config.demo);
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.low_stock_threshold, 10);
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::try_parse_from([
            "wholesale-orders",
            "--database-url",
            "postgres://localhost/wholesale",
            "--low-stock-threshold",
            "3",
            "--metrics-port",
            "9100",
        ])
        .unwrap();
        assert_eq!(config.database_url().unwrap(), "postgres://localhost/wholesale");
        assert_eq!(config.low_stock_threshold, 3);
        assert_eq!(config.metrics_port, 9100);
    }

    #[test]
    fn test_unknown_flags_are_rejected() {
        // Phone login codes belong to the auth service wiring, not the binary
        assert!(Config::try_parse_from(["wholesale-orders", "--otp-code", "123456"]).is_err());
    }
}
