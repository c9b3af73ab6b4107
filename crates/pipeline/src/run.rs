use std::collections::BTreeMap;
use std::fmt;

use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};

use shipdash_extract::{
    ColumnMap, CsvExtractor, Extractor, HeaderTarget, HttpClient, KeyedApiExtractor,
    KeyedProvider, OpenWeatherProvider, WeatherApiProvider,
};
use shipdash_recon::MergeInput;
use shipdash_schema::{ValidatedRecord, Value};
use shipdash_store::TableStore;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::schemas;

// ---------------------------------------------------------------------------
// Run identity
// ---------------------------------------------------------------------------

/// Opaque token tagging all artifacts of one pipeline execution. Created
/// once at orchestration start and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Caller-supplied id from `PIPELINE_RUN_ID`, or a fresh random token.
    pub fn from_env_or_new() -> Self {
        match std::env::var("PIPELINE_RUN_ID") {
            Ok(id) if !id.trim().is_empty() => Self(id.trim().to_string()),
            _ => Self(uuid::Uuid::new_v4().simple().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Stage policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PrimaryExtract,
    PrimaryValidate,
    FuelScrape,
    PopulationScrape,
    WeatherFetch,
    Reconcile,
    Persist,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Self::PrimaryExtract => "primary extract",
            Self::PrimaryValidate => "primary validate",
            Self::FuelScrape => "fuel scrape",
            Self::PopulationScrape => "population scrape",
            Self::WeatherFetch => "weather fetch",
            Self::Reconcile => "reconcile",
            Self::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Halts the run; downstream stages do not execute.
    Fatal,
    /// Recorded and skipped; the run continues with that source absent.
    Degradable,
}

/// The per-stage failure policy. Classification is declared here, per
/// stage, never inferred from the error type that happened to surface.
pub fn failure_class(stage: Stage) -> FailureClass {
    match stage {
        Stage::PrimaryExtract => FailureClass::Fatal,
        Stage::PrimaryValidate => FailureClass::Fatal,
        Stage::FuelScrape => FailureClass::Degradable,
        Stage::PopulationScrape => FailureClass::Degradable,
        Stage::WeatherFetch => FailureClass::Degradable,
        Stage::Reconcile => FailureClass::Fatal,
        Stage::Persist => FailureClass::Fatal,
    }
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Completed,
    Degraded(String),
}

#[derive(Debug)]
pub struct StageOutcome {
    pub stage: Stage,
    pub status: StageStatus,
}

/// What one run did: per-stage outcomes, accumulated warnings, and the
/// tables written with their row counts.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: String,
    pub stages: Vec<StageOutcome>,
    pub warnings: Vec<String>,
    pub tables: Vec<(String, usize)>,
}

impl RunReport {
    fn new(run_id: &RunId) -> Self {
        Self {
            run_id: run_id.as_str().to_string(),
            stages: Vec::new(),
            warnings: Vec::new(),
            tables: Vec::new(),
        }
    }

    fn completed(&mut self, stage: Stage) {
        self.stages.push(StageOutcome {
            stage,
            status: StageStatus::Completed,
        });
    }

    fn degraded(&mut self, stage: Stage, message: String) {
        self.warnings.push(format!("{stage}: {message}"));
        self.stages.push(StageOutcome {
            stage,
            status: StageStatus::Degraded(message),
        });
    }

    pub fn is_degraded(&self) -> bool {
        self.stages
            .iter()
            .any(|s| matches!(s.status, StageStatus::Degraded(_)))
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Every external collaborator of one run, injected explicitly. `None`
/// disables that enrichment source.
pub struct Sources {
    pub primary: Box<dyn Extractor>,
    pub fuel: Option<Box<dyn Extractor>>,
    pub population: Option<Box<dyn Extractor>>,
    pub weather: Option<KeyedApiExtractor>,
}

impl Sources {
    /// Build the production sources. Weather API keys come from
    /// `WEATHERAPI_KEY` and `OPENWEATHER_API_KEY`; with neither set the
    /// weather source is disabled.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let client = || {
            HttpClient::new(config.timeout()).map_err(|e| PipelineError::Config(e.to_string()))
        };

        let fuel = WebTableSource::fuel(&config.sources.fuel_url, client()?);
        let population = WebTableSource::population(&config.sources.population_url, client()?);

        let mut providers: Vec<Box<dyn KeyedProvider>> = Vec::new();
        if let Some(key) = env_key("WEATHERAPI_KEY") {
            providers.push(Box::new(WeatherApiProvider::new(key, client()?)));
        }
        if let Some(key) = env_key("OPENWEATHER_API_KEY") {
            providers.push(Box::new(OpenWeatherProvider::new(key, client()?)));
        }
        let weather = if providers.is_empty() {
            None
        } else {
            Some(KeyedApiExtractor::new(providers, config.min_delay()))
        };

        Ok(Self {
            primary: Box::new(CsvExtractor::new(&config.csv_path)),
            fuel: Some(Box::new(fuel)),
            population: Some(Box::new(population)),
            weather,
        })
    }
}

/// Column mappings for the two scraped pages.
struct WebTableSource;

impl WebTableSource {
    fn fuel(url: &str, client: HttpClient) -> shipdash_extract::WebTableExtractor {
        shipdash_extract::WebTableExtractor::new(
            "fuel prices",
            url,
            ColumnMap::Positional(
                ["state", "regular", "mid_grade", "premium", "diesel"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
            client,
        )
    }

    fn population(url: &str, client: HttpClient) -> shipdash_extract::WebTableExtractor {
        shipdash_extract::WebTableExtractor::new(
            "population reference",
            url,
            ColumnMap::HeaderContains {
                targets: vec![
                    HeaderTarget {
                        field: "state".into(),
                        needles: vec!["state".into(), "name".into()],
                    },
                    HeaderTarget {
                        field: "population".into(),
                        needles: vec!["population".into(), "pop".into()],
                    },
                ],
                fallback: vec![1, 2],
            },
            client,
        )
        .strip_brackets()
    }
}

fn env_key(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Execute one pipeline run: extract, validate, enrich, reconcile, persist.
///
/// Returns the run report on success (possibly with degraded stages and
/// warnings) or the first fatal stage failure. No table is ever left
/// partially written.
pub fn run(
    mut sources: Sources,
    store: &mut TableStore,
    config: &PipelineConfig,
    run_id: &RunId,
) -> Result<RunReport, PipelineError> {
    let span = tracing::info_span!("pipeline", run_id = %run_id);
    let _guard = span.enter();

    let mut report = RunReport::new(run_id);
    info!("pipeline run started");

    // Primary dataset: extract, validate, derive, persist.
    let raw = apply_policy(&mut report, Stage::PrimaryExtract, sources.primary.extract())?
        .ok_or_else(|| cannot_degrade(Stage::PrimaryExtract))?;
    info!(rows = raw.len(), source = sources.primary.source_name(), "primary rows extracted");

    let outcome = schemas::shipping_schema().validate_batch(&raw);
    for reject in &outcome.rejected {
        warn!(row = reject.row, reason = %reject.reason, "shipping row rejected");
        report
            .warnings
            .push(format!("shipping row {} rejected: {}", reject.row, reject.reason));
    }
    let mut primary_records = apply_policy(
        &mut report,
        Stage::PrimaryValidate,
        if outcome.valid.is_empty() {
            Err(format!("all {} rows failed validation", raw.len()))
        } else {
            Ok(outcome.valid)
        },
    )?
    .ok_or_else(|| cannot_degrade(Stage::PrimaryValidate))?;
    info!(
        valid = primary_records.len(),
        rejected = outcome.rejected.len(),
        "primary rows validated"
    );

    for record in &mut primary_records {
        if let (Some(population), Some(rank)) =
            (record.f64_field("population"), record.i64_field("rank"))
        {
            record.set("population_per_rank", Value::Float(population / rank as f64));
        }
    }
    primary_records.sort_by(|a, b| {
        b.f64_field("population")
            .partial_cmp(&a.f64_field("population"))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    primary_records.dedup();

    let shipping_rows: Vec<Vec<Value>> =
        primary_records.iter().map(schemas::shipping_values).collect();
    persist(&mut report, store, &schemas::SHIPPING_STATS, &shipping_rows, run_id)?;

    // Fuel prices (degradable enrichment).
    let fuel_records = match sources.fuel.as_mut() {
        Some(extractor) => {
            let mut stage_warnings = Vec::new();
            let result = fuel_stage(extractor.as_mut(), &mut stage_warnings);
            report.warnings.append(&mut stage_warnings);
            apply_policy(&mut report, Stage::FuelScrape, result)?
        }
        None => {
            report.degraded(Stage::FuelScrape, "source disabled".into());
            None
        }
    };
    let fuel_map = match &fuel_records {
        Some(records) => {
            let scraped_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
            let rows: Vec<Vec<Value>> = records
                .iter()
                .map(|r| schemas::fuel_values(r, &scraped_at, &config.sources.fuel_label))
                .collect();
            persist(&mut report, store, &schemas::FUEL_PRICES, &rows, run_id)?;
            Some(records.iter().filter_map(schemas::fuel_quote).collect::<BTreeMap<_, _>>())
        }
        None => None,
    };

    // Authoritative population reference (degradable enrichment).
    let population_map = match sources.population.as_mut() {
        Some(extractor) => {
            let mut stage_warnings = Vec::new();
            let result = population_stage(extractor.as_mut(), &mut stage_warnings);
            report.warnings.append(&mut stage_warnings);
            apply_policy(&mut report, Stage::PopulationScrape, result)?
        }
        None => {
            report.degraded(Stage::PopulationScrape, "source disabled".into());
            None
        }
    };

    // Weather (degradable enrichment), keyed by the primary set's states.
    let weather_records = match sources.weather.as_mut() {
        Some(api) => {
            let mut stage_warnings = Vec::new();
            let result = weather_stage(api, &primary_records, &mut stage_warnings);
            report.warnings.append(&mut stage_warnings);
            apply_policy(&mut report, Stage::WeatherFetch, result)?
        }
        None => {
            report.degraded(Stage::WeatherFetch, "no API keys configured".into());
            None
        }
    };
    let weather_map = match &weather_records {
        Some(records) => {
            let rows: Vec<Vec<Value>> = records.iter().map(schemas::weather_values).collect();
            persist(&mut report, store, &schemas::WEATHER_DATA, &rows, run_id)?;
            Some(
                records
                    .iter()
                    .filter_map(schemas::weather_reading)
                    .collect::<BTreeMap<_, _>>(),
            )
        }
        None => None,
    };

    // Reconcile and persist the master table.
    let merge_input = MergeInput {
        primary: primary_records.iter().filter_map(schemas::primary_row).collect(),
        population: population_map,
        fuel: fuel_map,
        weather: weather_map,
    };
    let merged = shipdash_recon::merge(&merge_input);
    report.completed(Stage::Reconcile);
    for warning in &merged.warnings {
        warn!(warning = warning.as_str(), "reconciliation warning");
    }
    report.warnings.extend(merged.warnings);
    info!(
        rows = merged.summary.total_rows,
        fuel_matched = merged.summary.fuel_matched,
        weather_matched = merged.summary.weather_matched,
        population_overridden = merged.summary.population_overridden,
        "reconciled"
    );

    let master_rows: Vec<Vec<Value>> = merged.rows.iter().map(schemas::master_values).collect();
    persist(&mut report, store, &schemas::MASTER_SHIPPING_DATA, &master_rows, run_id)?;

    info!(
        tables = report.tables.len(),
        warnings = report.warnings.len(),
        "pipeline run finished"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Stage bodies
// ---------------------------------------------------------------------------

fn fuel_stage(
    extractor: &mut dyn Extractor,
    warnings: &mut Vec<String>,
) -> Result<Vec<ValidatedRecord>, String> {
    let mut raw = extractor.extract().map_err(|e| e.to_string())?;
    for row in &mut raw {
        schemas::scrub_money_fields(row, schemas::FUEL_MONEY_FIELDS);
    }
    let outcome = schemas::fuel_schema().validate_batch(&raw);
    for reject in &outcome.rejected {
        warn!(row = reject.row, reason = %reject.reason, "fuel row rejected");
        warnings.push(format!("fuel row {} rejected: {}", reject.row, reject.reason));
    }
    if outcome.valid.is_empty() {
        return Err("no valid fuel rows scraped".into());
    }
    Ok(outcome.valid)
}

fn population_stage(
    extractor: &mut dyn Extractor,
    warnings: &mut Vec<String>,
) -> Result<BTreeMap<String, f64>, String> {
    let mut raw = extractor.extract().map_err(|e| e.to_string())?;
    for row in &mut raw {
        schemas::scrub_number_field(row, "population");
    }
    let outcome = schemas::population_schema().validate_batch(&raw);
    // Unparseable reference rows only lose the override; the merge falls
    // back to the primary value, so these are not worth a warning each.
    if !outcome.rejected.is_empty() {
        warnings.push(format!(
            "population reference: {} of {} rows unusable",
            outcome.rejected.len(),
            raw.len()
        ));
    }
    if outcome.valid.is_empty() {
        return Err("no usable population rows".into());
    }
    Ok(schemas::population_map(&outcome.valid))
}

fn weather_stage(
    api: &mut KeyedApiExtractor,
    primary_records: &[ValidatedRecord],
    warnings: &mut Vec<String>,
) -> Result<Vec<ValidatedRecord>, String> {
    // Providers answer by postal code; results are re-keyed to the state
    // name so they join against the other sources.
    let mut postal_to_state: BTreeMap<String, String> = BTreeMap::new();
    for record in primary_records {
        if let (Some(postal), Some(state)) =
            (record.str_field("postal"), record.str_field("state"))
        {
            postal_to_state.insert(postal.to_string(), state.to_string());
        }
    }
    let keys: Vec<String> = postal_to_state.keys().cloned().collect();
    if keys.is_empty() {
        return Err("no states to enrich".into());
    }

    let batch = api.extract_keys(&keys);
    for key in &batch.exhausted {
        warnings.push(format!("weather: all providers failed for key '{key}'"));
    }

    let outcome = schemas::weather_schema().validate_batch(&batch.records);
    for reject in &outcome.rejected {
        warn!(row = reject.row, reason = %reject.reason, "weather row rejected");
        warnings.push(format!("weather row {} rejected: {}", reject.row, reject.reason));
    }

    let mut records = outcome.valid;
    for record in &mut records {
        if let Some(state) = record
            .str_field("state")
            .and_then(|postal| postal_to_state.get(postal))
        {
            let state = state.clone();
            record.set("state", Value::Text(state));
        }
    }

    if records.is_empty() {
        return Err("no weather data retrieved".into());
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Policy plumbing
// ---------------------------------------------------------------------------

/// Route a stage result through the failure policy table. Fatal failures
/// abort the run; degradable failures are recorded and yield `None`.
fn apply_policy<T, E: fmt::Display>(
    report: &mut RunReport,
    stage: Stage,
    result: Result<T, E>,
) -> Result<Option<T>, PipelineError> {
    match result {
        Ok(value) => {
            report.completed(stage);
            Ok(Some(value))
        }
        Err(e) => match failure_class(stage) {
            FailureClass::Fatal => Err(PipelineError::Stage {
                stage,
                message: e.to_string(),
            }),
            FailureClass::Degradable => {
                warn!(stage = stage.name(), error = %e, "stage degraded");
                report.degraded(stage, e.to_string());
                Ok(None)
            }
        },
    }
}

/// Guard for stages whose output the rest of the run cannot do without. If
/// the policy table ever classifies one of them as degradable, the run
/// fails here with a clear message instead of continuing without data.
fn cannot_degrade(stage: Stage) -> PipelineError {
    PipelineError::Stage {
        stage,
        message: "stage cannot run degraded".into(),
    }
}

fn persist(
    report: &mut RunReport,
    store: &mut TableStore,
    spec: &shipdash_store::TableSpec,
    rows: &[Vec<Value>],
    run_id: &RunId,
) -> Result<(), PipelineError> {
    let count = apply_policy(
        report,
        Stage::Persist,
        store.replace_table(spec, rows, run_id.as_str()),
    )?
    .ok_or_else(|| cannot_degrade(Stage::Persist))?;
    info!(table = spec.name, rows = count, "table replaced");
    report.tables.push((spec.name.to_string(), count));
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_table_matches_contract() {
        assert_eq!(failure_class(Stage::PrimaryExtract), FailureClass::Fatal);
        assert_eq!(failure_class(Stage::PrimaryValidate), FailureClass::Fatal);
        assert_eq!(failure_class(Stage::FuelScrape), FailureClass::Degradable);
        assert_eq!(failure_class(Stage::PopulationScrape), FailureClass::Degradable);
        assert_eq!(failure_class(Stage::WeatherFetch), FailureClass::Degradable);
        assert_eq!(failure_class(Stage::Reconcile), FailureClass::Fatal);
        assert_eq!(failure_class(Stage::Persist), FailureClass::Fatal);
    }

    #[test]
    fn run_id_is_opaque_and_stable() {
        let id = RunId::new("run-42");
        assert_eq!(id.as_str(), "run-42");
        assert_eq!(id.to_string(), "run-42");

        let generated = RunId::from_env_or_new();
        assert!(!generated.as_str().is_empty());
    }

    #[test]
    fn degraded_stage_is_reported_and_warned() {
        let run_id = RunId::new("r");
        let mut report = RunReport::new(&run_id);
        let result: Option<()> =
            apply_policy(&mut report, Stage::FuelScrape, Err::<(), _>("boom")).unwrap();
        assert!(result.is_none());
        assert!(report.is_degraded());
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("boom"));
    }

    #[test]
    fn fatal_stage_aborts() {
        let run_id = RunId::new("r");
        let mut report = RunReport::new(&run_id);
        let err = apply_policy::<(), _>(&mut report, Stage::Persist, Err("disk full")).unwrap_err();
        assert!(matches!(err, PipelineError::Stage { stage: Stage::Persist, .. }));
    }
}
