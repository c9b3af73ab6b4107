use std::collections::BTreeMap;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One validated row of the primary shipping dataset.
#[derive(Debug, Clone)]
pub struct PrimaryRow {
    pub state: String,
    pub rank: i64,
    pub postal: String,
    pub population: f64,
    pub population_per_rank: f64,
}

/// One validated row of the scraped fuel-price table.
#[derive(Debug, Clone, PartialEq)]
pub struct FuelQuote {
    pub regular: f64,
    pub mid_grade: f64,
    pub premium: f64,
    pub diesel: f64,
}

/// One validated per-state weather snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReading {
    pub temperature: f64,
    pub condition: String,
    pub humidity: f64,
    pub wind_speed: f64,
    pub feels_like: f64,
    pub source: String,
}

/// Pre-loaded sources, keyed by normalized state. Each secondary source is
/// optional: `None` means the source failed or was disabled for this run.
#[derive(Debug, Default)]
pub struct MergeInput {
    pub primary: Vec<PrimaryRow>,
    /// Authoritative population reference (scraped), used to coalesce over
    /// the primary value.
    pub population: Option<BTreeMap<String, f64>>,
    pub fuel: Option<BTreeMap<String, FuelQuote>>,
    pub weather: Option<BTreeMap<String, WeatherReading>>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// One reconciled row of the master table. Fields absent from every source
/// are `None`, never a sentinel zero.
#[derive(Debug, Clone, PartialEq)]
pub struct MasterRecord {
    pub state: String,
    pub rank: Option<i64>,
    pub postal: Option<String>,
    pub population: Option<f64>,
    pub population_per_rank: Option<f64>,
    pub diesel: Option<f64>,
    pub population_per_dollar: Option<f64>,
    pub temperature: Option<f64>,
    pub condition: Option<String>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub feels_like: Option<f64>,
    pub weather_source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeSummary {
    pub total_rows: usize,
    pub primary_rows: usize,
    /// Keys present in a secondary source but not in the primary set.
    pub secondary_only: usize,
    pub fuel_matched: usize,
    pub weather_matched: usize,
    /// Primary populations replaced by the authoritative reference.
    pub population_overridden: usize,
}

#[derive(Debug)]
pub struct MergeOutput {
    pub rows: Vec<MasterRecord>,
    pub summary: MergeSummary,
    pub warnings: Vec<String>,
}
