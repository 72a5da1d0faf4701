//! Configuration management for the controller.
//!
//! Loads configuration from environment variables with defaults for
//! everything except the broker address.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Startup configuration errors. All of them are fatal.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed
    #[error("Invalid value {value:?} for {var}: {reason}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
        /// Parser message
        reason: String,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bus connection
    pub bus: BusConfig,
    /// HTTP server
    pub server: ServerConfig,
    /// Engine timers
    pub timings: Timings,
}

/// Bus configuration
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Broker addresses (comma-separated)
    pub brokers: String,
    /// The fan-out topic shared by every participant
    pub topic: String,
    /// Consumer group id
    pub consumer_group: String,
    /// First reconnect delay
    pub reconnect_initial: Duration,
    /// Reconnect delay cap
    pub reconnect_max: Duration,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Messages buffered per dashboard viewer before it is dropped
    pub viewer_buffer: usize,
}

/// Durations of every self-driven timer in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Walking to Inline
    pub walk_delay: Duration,
    /// Ordering without a submission
    pub order_timeout: Duration,
    /// Ordered without a delivery
    pub fulfillment_timeout: Duration,
    /// Simulated carrier transit
    pub transit_delay: Duration,
    /// Watchdog deadline for every watched pattern
    pub expectation_timeout: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            walk_delay: Duration::from_millis(2000),
            order_timeout: Duration::from_millis(10_000),
            fulfillment_timeout: Duration::from_millis(10_000),
            transit_delay: Duration::from_millis(4000),
            expectation_timeout: Duration::from_millis(10_000),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when `BUS_BROKERS` is unset and
    /// [`ConfigError::Invalid`] when a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Timings::default();
        let millis = |var: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            Ok(Duration::from_millis(parse_or(
                &lookup,
                var,
                u64::try_from(default.as_millis()).unwrap_or(u64::MAX),
            )?))
        };

        Ok(Self {
            bus: BusConfig {
                brokers: lookup("BUS_BROKERS")
                    .filter(|s| !s.trim().is_empty())
                    .ok_or(ConfigError::Missing("BUS_BROKERS"))?,
                topic: lookup("BUS_TOPIC").unwrap_or_else(|| "concourse".to_string()),
                consumer_group: lookup("BUS_CONSUMER_GROUP")
                    .unwrap_or_else(|| "concourse-controller".to_string()),
                reconnect_initial: millis("BUS_RECONNECT_INITIAL_MS", Duration::from_secs(2))?,
                reconnect_max: millis("BUS_RECONNECT_MAX_MS", Duration::from_secs(30))?,
            },
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&lookup, "PORT", 8080)?,
                viewer_buffer: parse_or(&lookup, "VIEWER_BUFFER", 255)?,
            },
            timings: Timings {
                walk_delay: millis("WALK_DELAY_MS", defaults.walk_delay)?,
                order_timeout: millis("ORDER_TIMEOUT_MS", defaults.order_timeout)?,
                fulfillment_timeout: millis("FULFILLMENT_TIMEOUT_MS", defaults.fulfillment_timeout)?,
                transit_delay: millis("TRANSIT_DELAY_MS", defaults.transit_delay)?,
                expectation_timeout: millis(
                    "EXPECTATION_TIMEOUT_MS",
                    defaults.expectation_timeout,
                )?,
            },
        })
    }

    /// `host:port` to bind the HTTP server to.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}
