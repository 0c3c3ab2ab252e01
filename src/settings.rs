//! User settings - progression knobs and language

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::PersistenceGateway;
use crate::engine::{
    IncrementTable, IncrementTier, ProgressionConfig, DEFAULT_REQUIRED_STREAK,
};
use crate::plan::parse_weight;

pub const SETTINGS_KEY: &str = "gainengine-settings";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fi,
}

impl Language {
    /// Unknown tags fall back to English
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "fi" | "fi-fi" | "suomi" => Language::Fi,
            _ => Language::En,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fi => "fi",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Sessions at one weight before it goes up
    pub overload_frequency: usize,
    /// Step for weights above every tier
    pub overload_increment: f64,
    pub increment_tiers: Vec<IncrementTier>,
    pub language: Language,
}

impl Default for Settings {
    fn default() -> Self {
        let table = IncrementTable::default();
        Self {
            overload_frequency: DEFAULT_REQUIRED_STREAK,
            overload_increment: table.fallback(),
            increment_tiers: table.tiers().to_vec(),
            language: Language::default(),
        }
    }
}

impl Settings {
    /// Stored settings, or defaults when absent or unreadable
    pub async fn load<G: PersistenceGateway + ?Sized>(gateway: &G) -> Settings {
        let bytes = match gateway.get(SETTINGS_KEY).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Settings::default(),
            Err(e) => {
                warn!("Failed to read settings, using defaults: {:#}", e);
                return Settings::default();
            }
        };

        match serde_json::from_slice::<Settings>(&bytes) {
            Ok(settings) => settings.sanitized(),
            Err(e) => {
                warn!("Stored settings unreadable, using defaults: {}", e);
                Settings::default()
            }
        }
    }

    pub async fn save<G: PersistenceGateway + ?Sized>(&self, gateway: &G) -> Result<()> {
        let bytes = serde_json::to_vec(self).context("failed to encode settings")?;
        gateway.set(SETTINGS_KEY, &bytes).await
    }

    fn sanitized(mut self) -> Self {
        if self.overload_frequency == 0 {
            self.overload_frequency = DEFAULT_REQUIRED_STREAK;
        }
        if !self.overload_increment.is_finite() || self.overload_increment < 0.0 {
            self.overload_increment = Settings::default().overload_increment;
        }
        self.align_increments();
        self
    }

    /// Store the table exactly as the engine will apply it: tiers sorted,
    /// steps never smaller than the tier below, fallback at least the last step
    fn align_increments(&mut self) {
        let table = IncrementTable::new(self.increment_tiers.clone(), self.overload_increment);
        self.increment_tiers = table.tiers().to_vec();
        self.overload_increment = table.fallback();
    }

    /// Configuration the progression engine reads at call time
    pub fn progression(&self) -> ProgressionConfig {
        ProgressionConfig {
            required_streak: self.overload_frequency.max(1),
            increments: IncrementTable::new(self.increment_tiers.clone(), self.overload_increment),
        }
    }

    /// Apply user text; invalid input keeps the previous value
    pub fn set_frequency(&mut self, raw: &str) {
        self.overload_frequency = parse_streak(raw).unwrap_or(self.overload_frequency);
    }

    /// Increment above every tier. Raised to the last tier's step when lower;
    /// returns the value now in effect
    pub fn set_increment(&mut self, raw: &str) -> f64 {
        self.overload_increment = parse_weight(raw).unwrap_or(self.overload_increment);
        self.align_increments();
        self.overload_increment
    }

    /// "20:1.25,60:2.5"; "none" clears the table so every weight uses the
    /// flat increment
    pub fn set_tiers(&mut self, raw: &str) {
        if let Some(tiers) = parse_tiers(raw) {
            self.increment_tiers = tiers;
            self.align_increments();
        }
    }
}

pub fn parse_streak(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|n| *n >= 1)
}

pub fn parse_tiers(raw: &str) -> Option<Vec<IncrementTier>> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("none") || raw.is_empty() {
        return Some(Vec::new());
    }

    raw.split(',')
        .map(|part| {
            let (below, step) = part.split_once(':')?;
            Some(IncrementTier {
                below: parse_weight(below)?,
                step: parse_weight(step)?,
            })
        })
        .collect()
}
