//! Pipeline configuration.
//!
//! Every heuristic the reconciliation relies on (year window, ratio
//! plausibility band, alias tables, proxy regions) lives here as data. The
//! configuration is built once per run and handed by reference to each stage
//! so all of them agree on canonical names.
use crate::error::{ReconcileError, Result};
use crate::names::collapse_whitespace;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const CONFIG_VERSION: u32 = 1;

static DEFAULT_BASE_ALIASES: Lazy<BTreeMap<String, String>> = Lazy::new(|| {
    alias_table(&[
        ("NSembilan", "Negeri Sembilan"),
        ("N Sembilan", "Negeri Sembilan"),
        ("Negri Sembilan", "Negeri Sembilan"),
        ("Penang", "Pulau Pinang"),
        ("Selangor-Wilayah", "Selangor"),
        ("Wilayah Persekutuan Kuala Lumpur", "Kuala Lumpur"),
        ("Wilayah Persekutuan Putrajaya", "Putrajaya"),
        ("Wilayah Persekutuan Labuan", "Labuan"),
    ])
});

static DEFAULT_AGGREGATION_ALIASES: Lazy<BTreeMap<String, String>> = Lazy::new(|| {
    // Spelling variants are already resolved by the base table, which runs
    // first; only folding into a parent state belongs here.
    alias_table(&[("Kuala Lumpur", "Selangor")])
});

fn alias_table(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub years: YearWindow,
    #[serde(default)]
    pub calibration: PlausibilityBand,
    #[serde(default)]
    pub imputation: ImputationConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub aliases: AliasConfig,
    #[serde(default)]
    pub stations: StationConfig,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            years: YearWindow::default(),
            calibration: PlausibilityBand::default(),
            imputation: ImputationConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            proxy: ProxyConfig::default(),
            aliases: AliasConfig::default(),
            stations: StationConfig::default(),
        }
    }
}

/// Inclusive year range applied to the yearly source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YearWindow {
    pub start: i32,
    pub end: i32,
}

impl Default for YearWindow {
    fn default() -> Self {
        Self {
            start: 2014,
            end: 2020,
        }
    }
}

impl YearWindow {
    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }
}

/// Closed interval of acceptable yearly/daily ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlausibilityBand {
    pub ratio_min: f64,
    pub ratio_max: f64,
}

impl Default for PlausibilityBand {
    fn default() -> Self {
        Self {
            ratio_min: 0.2,
            ratio_max: 6.0,
        }
    }
}

impl PlausibilityBand {
    pub fn contains(&self, ratio: f64) -> bool {
        ratio >= self.ratio_min && ratio <= self.ratio_max
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum ImputationStrategy {
    /// Scale the daily aggregate by the year's median yearly/daily ratio.
    #[default]
    RatioCalibration,
    /// Use the mean of the state's present yearly totals.
    StateMean,
    /// Interpolate linearly on year between the state's present totals.
    LinearInterpolation,
}

impl std::fmt::Display for ImputationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImputationStrategy::RatioCalibration => write!(f, "ratio-calibration"),
            ImputationStrategy::StateMean => write!(f, "state-mean"),
            ImputationStrategy::LinearInterpolation => write!(f, "linear-interpolation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputationConfig {
    pub strategy: ImputationStrategy,
    pub days_per_year: f64,
    /// Regions with yearly data but no daily station coverage.
    pub daily_from_yearly_regions: Vec<String>,
}

impl Default for ImputationConfig {
    fn default() -> Self {
        Self {
            strategy: ImputationStrategy::RatioCalibration,
            days_per_year: 365.0,
            daily_from_yearly_regions: vec![
                "Sabah".to_string(),
                "Sarawak".to_string(),
                "Labuan".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub extreme_yearly_mm: f64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            extreme_yearly_mm: 20000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub reference: String,
    pub regions: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            reference: "Selangor".to_string(),
            regions: vec!["Kuala Lumpur".to_string(), "Putrajaya".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasConfig {
    /// Canonical spellings shared by every source.
    pub base: BTreeMap<String, String>,
    /// Yearly-source folding of subdivisions into their parent state.
    pub aggregation: BTreeMap<String, String>,
}

impl Default for AliasConfig {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_ALIASES.clone(),
            aggregation: DEFAULT_AGGREGATION_ALIASES.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub target: String,
    /// Case-insensitive substrings of station labels that belong to `target`.
    pub patterns: Vec<String>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            target: "Selangor".to_string(),
            patterns: vec![
                "Kuala Lumpur International Airport".to_string(),
                "Subang".to_string(),
            ],
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != CONFIG_VERSION {
            return Err(ReconcileError::InvalidConfig(format!(
                "unsupported config version {} (expected {})",
                self.version, CONFIG_VERSION
            )));
        }
        if self.years.start > self.years.end {
            return Err(ReconcileError::InvalidConfig(format!(
                "year window {}..={} is empty",
                self.years.start, self.years.end
            )));
        }
        let band = &self.calibration;
        if !(band.ratio_min > 0.0 && band.ratio_min <= band.ratio_max) {
            return Err(ReconcileError::InvalidConfig(format!(
                "plausibility band [{}, {}] must satisfy 0 < min <= max",
                band.ratio_min, band.ratio_max
            )));
        }
        if !(self.imputation.days_per_year > 0.0) {
            return Err(ReconcileError::InvalidConfig(
                "days_per_year must be positive".to_string(),
            ));
        }
        if self.proxy.regions.contains(&self.proxy.reference) {
            return Err(ReconcileError::InvalidConfig(format!(
                "proxy reference '{}' cannot also be a proxy region",
                self.proxy.reference
            )));
        }
        check_alias_whitespace("base", &self.aliases.base)?;
        check_alias_whitespace("aggregation", &self.aliases.aggregation)?;
        check_alias_chain("base", &self.aliases.base)?;
        check_alias_chain("aggregation", &self.aliases.aggregation)?;
        for (from, to) in &self.aliases.aggregation {
            // The base table has already rewritten `from` before the
            // aggregation lookup, so such a key could never match.
            if self.aliases.base.contains_key(from) {
                return Err(ReconcileError::InvalidConfig(format!(
                    "aggregation alias '{}' is unreachable: it is also a base alias",
                    from
                )));
            }
            if self.aliases.base.contains_key(to) {
                return Err(ReconcileError::InvalidConfig(format!(
                    "aggregation alias '{}' -> '{}' targets a non-canonical name",
                    from, to
                )));
            }
        }
        Ok(())
    }
}

// Lookups happen on whitespace-collapsed names: a key with extra spaces is
// unreachable and a target with extra spaces changes on a second pass.
fn check_alias_whitespace(table: &str, aliases: &BTreeMap<String, String>) -> Result<()> {
    for (from, to) in aliases {
        for name in [from, to] {
            if collapse_whitespace(name) != *name {
                return Err(ReconcileError::InvalidConfig(format!(
                    "{} alias '{}' -> '{}' has untrimmed or repeated whitespace",
                    table, from, to
                )));
            }
        }
    }
    Ok(())
}

// A target that is itself a key would make normalization non-idempotent.
fn check_alias_chain(table: &str, aliases: &BTreeMap<String, String>) -> Result<()> {
    for (from, to) in aliases {
        if from != to && aliases.contains_key(to) {
            return Err(ReconcileError::InvalidConfig(format!(
                "{} alias '{}' -> '{}' chains into another alias",
                table, from, to
            )));
        }
    }
    Ok(())
}
