//! Engine configuration.
//!
//! Sources, highest priority last:
//! 1. Built-in defaults
//! 2. TOML file (`GRADEBOOK_CONFIG`, or `./gradebook.toml` when present)
//! 3. Environment variables (`GRADEBOOK_*`, `__` separates nested keys).
//!    Key segments match field names case-insensitively, so
//!    `GRADEBOOK_DISPLAYDECIMALS=3` sets `displayDecimals`.
//!
//! `GRADEBOOK_SCALE__PASSING=3.5` maps to `scale.passing`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Figment(Box::new(e))
    }
}

/// Numeric grade scale. Scores live in `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradeScale {
    pub min: f64,
    pub max: f64,
    pub passing: f64,
    pub high: f64,
}

impl Default for GradeScale {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 5.0,
            passing: 3.0,
            high: 4.0,
        }
    }
}

impl GradeScale {
    pub fn contains(&self, score: f64) -> bool {
        score.is_finite() && score >= self.min && score <= self.max
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Averaging {
    /// Every tracked subject counts once.
    #[default]
    Equal,
    #[serde(alias = "creditweighted")]
    CreditWeighted,
}

/// Month boundaries of the two terms in an academic year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TermCalendar {
    pub first_start_month: u32,
    pub first_end_month: u32,
    pub second_start_month: u32,
    pub second_end_month: u32,
}

impl Default for TermCalendar {
    fn default() -> Self {
        Self {
            first_start_month: 2,
            first_end_month: 7,
            second_start_month: 8,
            second_end_month: 12,
        }
    }
}

const fn default_display_decimals() -> u32 {
    2
}

const fn default_progress_decimals() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub scale: GradeScale,
    #[serde(default)]
    pub averaging: Averaging,
    #[serde(default)]
    pub calendar: TermCalendar,
    #[serde(default = "default_display_decimals")]
    pub display_decimals: u32,
    #[serde(default = "default_progress_decimals")]
    pub progress_decimals: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scale: GradeScale::default(),
            averaging: Averaging::default(),
            calendar: TermCalendar::default(),
            display_decimals: default_display_decimals(),
            progress_decimals: default_progress_decimals(),
        }
    }
}

impl EngineConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let cfg: Self = Self::figment().extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let file = std::env::var_os("GRADEBOOK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("gradebook.toml"));
        if file.exists() {
            figment = figment.merge(Toml::file(file));
        }

        figment.merge(
            Env::prefixed("GRADEBOOK_")
                .ignore(&["CONFIG", "LOG"])
                .split("__")
                .lowercase(false)
                .map(|key| canonical_key(key.as_str()).into()),
        )
    }

    /// Merge a JSON object of overrides (same shape as the config) on top.
    pub fn with_overrides(&self, overrides: &serde_json::Value) -> Result<Self, ConfigError> {
        let cfg: Self = Figment::from(Serialized::defaults(self.clone()))
            .merge(Serialized::defaults(overrides.clone()))
            .extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scale;
        if !(s.min < s.max) {
            return Err(invalid("scale.max", "must be greater than scale.min"));
        }
        if !(s.min <= s.passing && s.passing <= s.high && s.high <= s.max) {
            return Err(invalid(
                "scale.passing",
                "expected min <= passing <= high <= max",
            ));
        }
        let c = &self.calendar;
        for (field, m) in [
            ("calendar.firstStartMonth", c.first_start_month),
            ("calendar.firstEndMonth", c.first_end_month),
            ("calendar.secondStartMonth", c.second_start_month),
            ("calendar.secondEndMonth", c.second_end_month),
        ] {
            if !(1..=12).contains(&m) {
                return Err(invalid(field, "month must be 1..=12"));
            }
        }
        if c.first_start_month > c.first_end_month || c.second_start_month > c.second_end_month {
            return Err(invalid("calendar", "term start month after end month"));
        }
        if self.display_decimals > 6 || self.progress_decimals > 6 {
            return Err(invalid("displayDecimals", "at most 6 decimals"));
        }
        Ok(())
    }
}

const FIELD_NAMES: &[&str] = &[
    "scale",
    "min",
    "max",
    "passing",
    "high",
    "averaging",
    "calendar",
    "firstStartMonth",
    "firstEndMonth",
    "secondStartMonth",
    "secondEndMonth",
    "displayDecimals",
    "progressDecimals",
];

/// Restore the camelCase spelling of a dotted env key.
fn canonical_key(key: &str) -> String {
    key.split('.')
        .map(|part| {
            FIELD_NAMES
                .iter()
                .find(|name| name.eq_ignore_ascii_case(part))
                .map(|name| name.to_string())
                .unwrap_or_else(|| part.to_ascii_lowercase())
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
