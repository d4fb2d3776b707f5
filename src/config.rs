//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `ALUMCTL_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `ALUMCTL_` override YAML values
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `ALUMCTL_WEBHOOK__SECRET=whsec_...` sets the `webhook.secret` field.
//!
//! ## Configuration Structure
//!
//! - **Server**: `host`, `port` - HTTP server binding configuration
//! - **Payment**: `payment.http` / `payment.dummy` - Payment gateway selection and credentials
//! - **Webhook**: `webhook.secret`, `webhook.timestamp_tolerance` - Inbound webhook verification
//! - **Reservations**: `reservations.pending_timeout`, `reservations.sweep_interval` - Expiry behavior
//! - **Directory**: `directory.participants`, `directory.events` - Seed data for the directory

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::directory::{Branch, Role};
use crate::webhooks::signing;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "ALUMCTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Payment gateway configuration
    pub payment: PaymentConfig,
    /// Inbound webhook verification configuration
    pub webhook: WebhookConfig,
    /// Reservation lifecycle configuration
    pub reservations: ReservationsConfig,
    /// Seed data for the participant and event directory
    pub directory: DirectoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            payment: PaymentConfig::default(),
            webhook: WebhookConfig::default(),
            reservations: ReservationsConfig::default(),
            directory: DirectoryConfig::default(),
        }
    }
}

/// Payment gateway configuration.
///
/// Supports different gateways via an enum. Credentials should be set via
/// environment variables for security.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentConfig {
    /// External HTTP payment gateway
    /// Set credentials via:
    /// - `ALUMCTL_PAYMENT__HTTP__BASE_URL` - Gateway API base URL
    /// - `ALUMCTL_PAYMENT__HTTP__API_KEY` - Gateway secret API key
    Http(HttpGatewayConfig),
    /// Dummy payment gateway for testing; issues intents locally without any
    /// network calls
    Dummy(DummyGatewayConfig),
}

impl Default for PaymentConfig {
    fn default() -> Self {
        PaymentConfig::Dummy(DummyGatewayConfig::default())
    }
}

/// External HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpGatewayConfig {
    /// Gateway API base URL
    pub base_url: Url,
    /// Gateway secret API key, sent as a bearer token
    pub api_key: String,
    /// Per-request HTTP timeout (default: 10s)
    #[serde(default = "HttpGatewayConfig::default_timeout")]
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl HttpGatewayConfig {
    fn default_timeout() -> Duration {
        Duration::from_secs(10)
    }
}

/// Dummy gateway configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DummyGatewayConfig {}

/// Inbound webhook verification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WebhookConfig {
    /// Shared signing secret (starts with `whsec_`). A fresh secret is
    /// generated at startup when not configured; set it explicitly in any
    /// deployment where the gateway must outlive a restart.
    pub secret: String,
    /// Maximum allowed skew between the webhook timestamp header and the
    /// server clock (default: 5m)
    #[serde(with = "humantime_serde")]
    pub timestamp_tolerance: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: signing::generate_secret(),
            timestamp_tolerance: Duration::from_secs(5 * 60),
        }
    }
}

/// Reservation lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReservationsConfig {
    /// How long a reservation may sit `pending` before the expiry sweep
    /// cancels it and releases its capacity slot (default: 30m)
    #[serde(with = "humantime_serde")]
    pub pending_timeout: Duration,
    /// How often the expiry sweep runs (default: 60s)
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
    /// Deadline for payment gateway calls; slower calls surface as
    /// gateway-unavailable (default: 10s)
    #[serde(with = "humantime_serde")]
    pub gateway_timeout: Duration,
    /// ISO 4217 currency code for payment intents
    pub currency: String,
    /// Mentorship hours per month when the match request omits it
    pub default_hours_per_month: u32,
}

impl Default for ReservationsConfig {
    fn default() -> Self {
        Self {
            pending_timeout: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
            gateway_timeout: Duration::from_secs(10),
            currency: "inr".to_string(),
            default_hours_per_month: 10,
        }
    }
}

/// Seed data for the participant and event directory.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectoryConfig {
    pub participants: Vec<ParticipantSeed>,
    pub events: Vec<EventSeed>,
}

/// A participant to seed into the directory at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParticipantSeed {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub branch: Branch,
    /// Whether a mentor has opted in to matching (ignored for students)
    #[serde(default = "ParticipantSeed::default_is_mentor")]
    pub is_mentor: bool,
    /// Students a mentor will take per calendar month
    #[serde(default = "ParticipantSeed::default_monthly_capacity")]
    pub monthly_capacity: u32,
    /// Mentorship rate per hour-per-month unit
    #[serde(default = "ParticipantSeed::default_monthly_rate")]
    pub monthly_rate: Decimal,
}

impl ParticipantSeed {
    fn default_is_mentor() -> bool {
        true
    }

    fn default_monthly_capacity() -> u32 {
        5
    }

    fn default_monthly_rate() -> Decimal {
        Decimal::from(100)
    }
}

/// An event to seed into the directory at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventSeed {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub title: String,
    /// Registration fee; zero-fee registrations activate without payment
    #[serde(default)]
    pub registration_fee: Decimal,
    #[serde(default = "EventSeed::default_max_participants")]
    pub max_participants: u32,
    #[serde(default = "EventSeed::default_is_active")]
    pub is_active: bool,
}

impl EventSeed {
    fn default_max_participants() -> u32 {
        100
    }

    fn default_is_active() -> bool {
        true
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("ALUMCTL_").split("__"))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> anyhow::Result<()> {
        if signing::decode_secret(&self.webhook.secret).is_none() {
            anyhow::bail!(
                "Config validation: webhook.secret must be a base64 secret prefixed with `{}`",
                signing::SECRET_PREFIX
            );
        }

        if let PaymentConfig::Http(http) = &self.payment {
            if http.api_key.is_empty() {
                anyhow::bail!(
                    "Config validation: payment.http.api_key is required. \
                     Set ALUMCTL_PAYMENT__HTTP__API_KEY or add it to the config file."
                );
            }
        }

        if self.reservations.pending_timeout.is_zero() {
            anyhow::bail!("Config validation: reservations.pending_timeout must be positive");
        }

        if self.reservations.sweep_interval.is_zero() {
            anyhow::bail!("Config validation: reservations.sweep_interval must be positive");
        }

        if self.reservations.default_hours_per_month == 0 {
            anyhow::bail!("Config validation: reservations.default_hours_per_month must be positive");
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
