//! Layered runtime configuration: built-in defaults, then an optional TOML
//! file, then `TAPEX_*` environment variables. CLI flags are applied on top
//! by the binary.

use std::path::Path;
use std::time::Duration;

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use crate::engine::alerts::AlertPolicy;
use crate::engine::book::BookMarketFilter;
use crate::engine::instrument::Instrument;
use crate::engine::tape::{MarketFilter, SideFilter, TapeFilter};
use crate::engine::types::VenueId;
use crate::error::ConfigError;
use crate::market_data::router::ConnectionSettings;
use crate::market_data::unified_book::CoreSettings;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_FILE: &str = "tapex";
pub const ENV_PREFIX: &str = "TAPEX";

pub const DEFAULT_VENUES: [VenueId; 6] = [
    VenueId::Binance,
    VenueId::BinanceFutures,
    VenueId::Bybit,
    VenueId::BybitPerp,
    VenueId::Okx,
    VenueId::OkxSwap,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub instrument: String,
    pub venues: Vec<String>,
    pub book_market: BookMarketFilter,
    pub tape: TapeFilterConfig,
    pub alerts: AlertConfig,
    pub runtime: RuntimeConfig,
    pub log_filter: String,
}

/// Initial read-side filter over the tape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapeFilterConfig {
    /// Empty means every venue.
    pub venues: Vec<String>,
    pub side: SideFilter,
    pub market: MarketFilter,
    pub min_notional: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub min_notional: f64,
    pub whale_alerts: bool,
    pub whale_threshold: f64,
    pub venues: Vec<String>,
    pub side: SideFilter,
    pub market: MarketFilter,
    /// Bound on undelivered notifications; extras are dropped.
    pub buffer: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub event_buffer: usize,
    pub connect_timeout_ms: u64,
    pub max_frame_bytes: usize,
    pub render_interval_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            instrument: "BTCUSDT".to_string(),
            venues: DEFAULT_VENUES.iter().map(|v| v.as_str().to_string()).collect(),
            book_market: BookMarketFilter::Combined,
            tape: TapeFilterConfig::default(),
            alerts: AlertConfig::default(),
            runtime: RuntimeConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        let policy = AlertPolicy::default();
        Self {
            enabled: policy.enabled,
            min_notional: policy.min_notional,
            whale_alerts: policy.whale_alerts,
            whale_threshold: policy.whale_threshold,
            venues: Vec::new(),
            side: SideFilter::All,
            market: MarketFilter::All,
            buffer: 256,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let conn = ConnectionSettings::default();
        Self {
            event_buffer: conn.event_buffer,
            connect_timeout_ms: conn.connect_timeout.as_millis() as u64,
            max_frame_bytes: conn.max_frame_bytes,
            render_interval_ms: 1_000,
        }
    }
}

impl AppConfig {
    /// Defaults, then `path` (or `tapex.toml` if present), then environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };
        Self::from_builder(config::Config::builder().add_source(file).add_source(env_source(None)))
    }

    pub(crate) fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let cfg: AppConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.instrument()?;
        self.venue_ids()?;
        parse_venues(&self.tape.venues)?;
        parse_venues(&self.alerts.venues)?;
        non_negative("tape.min_notional", self.tape.min_notional)?;
        non_negative("alerts.min_notional", self.alerts.min_notional)?;
        non_negative("alerts.whale_threshold", self.alerts.whale_threshold)?;
        positive("runtime.event_buffer", self.runtime.event_buffer as u64)?;
        positive("runtime.connect_timeout_ms", self.runtime.connect_timeout_ms)?;
        positive("runtime.max_frame_bytes", self.runtime.max_frame_bytes as u64)?;
        positive("runtime.render_interval_ms", self.runtime.render_interval_ms)?;
        Ok(())
    }

    pub fn instrument(&self) -> Result<Instrument, ConfigError> {
        Ok(Instrument::from_symbol(&self.instrument)?)
    }

    /// An empty list is allowed and yields empty views.
    pub fn venue_ids(&self) -> Result<Vec<VenueId>, ConfigError> {
        parse_venues(&self.venues)
    }

    pub fn tape_filter(&self) -> Result<TapeFilter, ConfigError> {
        Ok(TapeFilter {
            venues: parse_venues(&self.tape.venues)?,
            side: self.tape.side,
            market: self.tape.market,
            min_notional: self.tape.min_notional,
        })
    }

    pub fn alert_policy(&self) -> Result<AlertPolicy, ConfigError> {
        Ok(AlertPolicy {
            enabled: self.alerts.enabled,
            min_notional: self.alerts.min_notional,
            filter: TapeFilter {
                venues: parse_venues(&self.alerts.venues)?,
                side: self.alerts.side,
                market: self.alerts.market,
                min_notional: 0.0,
            },
            whale_alerts: self.alerts.whale_alerts,
            whale_threshold: self.alerts.whale_threshold,
        })
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            connect_timeout: Duration::from_millis(self.runtime.connect_timeout_ms),
            max_frame_bytes: self.runtime.max_frame_bytes,
            event_buffer: self.runtime.event_buffer,
        }
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.runtime.render_interval_ms)
    }

    pub fn core_settings(&self) -> Result<CoreSettings, ConfigError> {
        Ok(CoreSettings {
            instrument: self.instrument()?,
            venues: self.venue_ids()?,
            book_market: self.book_market,
            tape_filter: self.tape_filter()?,
            alerts: self.alert_policy()?,
            connection: self.connection_settings(),
            notification_buffer: self.alerts.buffer,
        })
    }
}

/// `TAPEX_INSTRUMENT`, `TAPEX_VENUES=binance,okx`, `TAPEX_TAPE__MIN_NOTIONAL`...
fn env_source(vars: Option<config::Map<String, String>>) -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("venues")
        .with_list_parse_key("tape.venues")
        .with_list_parse_key("alerts.venues")
        .try_parsing(true)
        .source(vars)
}

pub fn parse_venues<S: AsRef<str>>(names: &[S]) -> Result<Vec<VenueId>, ConfigError> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            VenueId::parse(name).ok_or_else(|| ConfigError::UnknownVenue(name.to_string()))
        })
        .collect()
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid { field, reason: format!("{value} is not a non-negative number") })
    }
}

fn positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid { field, reason: "must be greater than zero".to_string() })
    }
}
