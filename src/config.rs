//! Server configuration.
//!
//! Everything is read from environment variables with working defaults,
//! so the binary runs without any configuration:
//!
//! | Variable                 | Default          |
//! |--------------------------|------------------|
//! | `ELD_BIND_ADDR`          | `127.0.0.1:3000` |
//! | `ELD_ROUTE_TABLE_DIR`    | `route_tables`   |
//! | `ELD_DEFAULT_START_HOUR` | `6`              |
//! | `ELD_FUEL_STOP_MINUTES`  | `30`             |
//! | `ELD_REST_BREAK`         | `false`          |

use crate::rules::HosRules;
use anyhow::{bail, Context, Result};
use chrono::Duration;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub route_table_dir: PathBuf,
    /// Hour of the day a trip starts when the request gives no time.
    pub default_start_hour: u32,
    pub rules: HosRules,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_addr = lookup("ELD_BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:3000".to_string())
            .parse()
            .context("invalid ELD_BIND_ADDR")?;
        let route_table_dir =
            PathBuf::from(lookup("ELD_ROUTE_TABLE_DIR").unwrap_or_else(|| "route_tables".to_string()));

        let default_start_hour = match lookup("ELD_DEFAULT_START_HOUR") {
            Some(value) => value
                .trim()
                .parse::<u32>()
                .context("invalid ELD_DEFAULT_START_HOUR")?,
            None => 6,
        };
        if default_start_hour > 23 {
            bail!("ELD_DEFAULT_START_HOUR must be between 0 and 23, got {default_start_hour}");
        }

        let mut rules = HosRules::default();
        if let Some(value) = lookup("ELD_FUEL_STOP_MINUTES") {
            let minutes = value
                .trim()
                .parse::<i64>()
                .context("invalid ELD_FUEL_STOP_MINUTES")?;
            if minutes <= 0 {
                bail!("ELD_FUEL_STOP_MINUTES must be positive, got {minutes}");
            }
            rules.fuel_stop = Duration::minutes(minutes);
        }
        if let Some(value) = lookup("ELD_REST_BREAK") {
            if parse_flag(&value).context("invalid ELD_REST_BREAK")? {
                rules = rules.with_rest_break();
            }
        }

        Ok(Self {
            bind_addr,
            route_table_dir,
            default_start_hour,
            rules,
        })
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}
