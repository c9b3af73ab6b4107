//! Domain contracts: one validation schema per source, the persisted table
//! layouts, and the conversions between validated records and the typed
//! shapes the reconciliation engine and the store consume.

use std::collections::BTreeMap;

use shipdash_recon::{FuelQuote, MasterRecord, PrimaryRow, WeatherReading};
use shipdash_schema::{FieldKind, FieldSpec, RawRecord, Schema, ValidatedRecord, Value};
use shipdash_store::{ColumnKind, ColumnSpec, TableSpec};

// ---------------------------------------------------------------------------
// Validation schemas
// ---------------------------------------------------------------------------

fn text(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        required: true,
        kind: FieldKind::Text {
            min_len: None,
            max_len: None,
            uppercase: false,
        },
    }
}

fn state_key(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        required: true,
        kind: FieldKind::Text {
            min_len: None,
            max_len: None,
            uppercase: true,
        },
    }
}

fn positive(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        required: true,
        kind: FieldKind::Float {
            gt: Some(0.0),
            ge: None,
            le: None,
        },
    }
}

pub fn shipping_schema() -> Schema {
    Schema {
        name: "shipping_stats",
        fields: vec![
            FieldSpec {
                name: "rank",
                required: true,
                kind: FieldKind::Integer { min: Some(1) },
            },
            state_key("state"),
            FieldSpec {
                name: "postal",
                required: true,
                kind: FieldKind::Text {
                    min_len: Some(2),
                    max_len: Some(2),
                    uppercase: true,
                },
            },
            positive("population"),
        ],
    }
}

pub fn fuel_schema() -> Schema {
    Schema {
        name: "fuel_prices",
        fields: vec![
            state_key("state"),
            positive("regular"),
            positive("mid_grade"),
            positive("premium"),
            positive("diesel"),
        ],
    }
}

pub fn population_schema() -> Schema {
    Schema {
        name: "population_reference",
        fields: vec![state_key("state"), positive("population")],
    }
}

pub fn weather_schema() -> Schema {
    Schema {
        name: "weather_data",
        fields: vec![
            state_key("state"),
            FieldSpec {
                name: "temperature",
                required: true,
                kind: FieldKind::Float {
                    gt: None,
                    ge: None,
                    le: None,
                },
            },
            FieldSpec {
                name: "condition",
                required: true,
                kind: FieldKind::Text {
                    min_len: Some(1),
                    max_len: None,
                    uppercase: false,
                },
            },
            FieldSpec {
                name: "humidity",
                required: true,
                kind: FieldKind::Float {
                    gt: None,
                    ge: Some(0.0),
                    le: Some(100.0),
                },
            },
            FieldSpec {
                name: "wind_speed",
                required: true,
                kind: FieldKind::Float {
                    gt: None,
                    ge: Some(0.0),
                    le: None,
                },
            },
            FieldSpec {
                name: "feels_like",
                required: true,
                kind: FieldKind::Float {
                    gt: None,
                    ge: None,
                    le: None,
                },
            },
            text("data_source"),
        ],
    }
}

// ---------------------------------------------------------------------------
// Persisted table layouts
// ---------------------------------------------------------------------------

const fn col(name: &'static str, kind: ColumnKind) -> ColumnSpec {
    ColumnSpec { name, kind }
}

pub const SHIPPING_STATS: TableSpec = TableSpec {
    name: "shipping_stats",
    columns: &[
        col("rank", ColumnKind::Integer),
        col("state", ColumnKind::Text),
        col("postal", ColumnKind::Text),
        col("population", ColumnKind::Real),
        col("population_per_rank", ColumnKind::Real),
    ],
};

pub const FUEL_PRICES: TableSpec = TableSpec {
    name: "fuel_prices",
    columns: &[
        col("state", ColumnKind::Text),
        col("regular", ColumnKind::Real),
        col("mid_grade", ColumnKind::Real),
        col("premium", ColumnKind::Real),
        col("diesel", ColumnKind::Real),
        col("scraped_at", ColumnKind::Text),
        col("data_source", ColumnKind::Text),
    ],
};

pub const WEATHER_DATA: TableSpec = TableSpec {
    name: "weather_data",
    columns: &[
        col("state", ColumnKind::Text),
        col("temperature", ColumnKind::Real),
        col("condition", ColumnKind::Text),
        col("humidity", ColumnKind::Real),
        col("wind_speed", ColumnKind::Real),
        col("feels_like", ColumnKind::Real),
        col("data_source", ColumnKind::Text),
    ],
};

pub const MASTER_SHIPPING_DATA: TableSpec = TableSpec {
    name: "master_shipping_data",
    columns: &[
        col("state", ColumnKind::Text),
        col("rank", ColumnKind::Integer),
        col("postal", ColumnKind::Text),
        col("population", ColumnKind::Real),
        col("population_per_rank", ColumnKind::Real),
        col("diesel", ColumnKind::Real),
        col("population_per_dollar", ColumnKind::Real),
        col("temperature", ColumnKind::Real),
        col("condition", ColumnKind::Text),
        col("humidity", ColumnKind::Real),
        col("wind_speed", ColumnKind::Real),
        col("feels_like", ColumnKind::Real),
        col("weather_source", ColumnKind::Text),
    ],
};

// ---------------------------------------------------------------------------
// Raw-record cleanup
// ---------------------------------------------------------------------------

pub const FUEL_MONEY_FIELDS: &[&str] = &["regular", "mid_grade", "premium", "diesel"];

/// Normalize scraped money cells: drop currency symbols and thousands
/// separators; dash and empty placeholders become null.
pub fn scrub_money_fields(record: &mut RawRecord, fields: &[&str]) {
    for field in fields {
        let Some(serde_json::Value::String(s)) = record.get(*field) else {
            continue;
        };
        let cleaned = s.replace(['$', ','], "");
        let cleaned = cleaned.trim();
        let value = match cleaned {
            "" | "\u{2014}" | "-" => serde_json::Value::Null,
            _ => serde_json::Value::String(cleaned.to_string()),
        };
        record.insert(field.to_string(), value);
    }
}

/// Strip thousands separators from a scraped numeric cell.
pub fn scrub_number_field(record: &mut RawRecord, field: &str) {
    if let Some(serde_json::Value::String(s)) = record.get(field) {
        let cleaned = s.replace(',', "");
        record.insert(field.to_string(), serde_json::Value::String(cleaned));
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn primary_row(record: &ValidatedRecord) -> Option<PrimaryRow> {
    Some(PrimaryRow {
        state: record.str_field("state")?.to_string(),
        rank: record.i64_field("rank")?,
        postal: record.str_field("postal")?.to_string(),
        population: record.f64_field("population")?,
        population_per_rank: record.f64_field("population_per_rank")?,
    })
}

pub fn shipping_values(record: &ValidatedRecord) -> Vec<Value> {
    vec![
        Value::from(record.i64_field("rank")),
        Value::from(record.str_field("state").map(String::from)),
        Value::from(record.str_field("postal").map(String::from)),
        Value::from(record.f64_field("population")),
        Value::from(record.f64_field("population_per_rank")),
    ]
}

pub fn fuel_values(record: &ValidatedRecord, scraped_at: &str, label: &str) -> Vec<Value> {
    vec![
        Value::from(record.str_field("state").map(String::from)),
        Value::from(record.f64_field("regular")),
        Value::from(record.f64_field("mid_grade")),
        Value::from(record.f64_field("premium")),
        Value::from(record.f64_field("diesel")),
        Value::from(scraped_at),
        Value::from(label),
    ]
}

pub fn fuel_quote(record: &ValidatedRecord) -> Option<(String, FuelQuote)> {
    Some((
        record.str_field("state")?.to_string(),
        FuelQuote {
            regular: record.f64_field("regular")?,
            mid_grade: record.f64_field("mid_grade")?,
            premium: record.f64_field("premium")?,
            diesel: record.f64_field("diesel")?,
        },
    ))
}

pub fn population_entry(record: &ValidatedRecord) -> Option<(String, f64)> {
    Some((
        record.str_field("state")?.to_string(),
        record.f64_field("population")?,
    ))
}

pub fn population_map(records: &[ValidatedRecord]) -> BTreeMap<String, f64> {
    records.iter().filter_map(population_entry).collect()
}

pub fn weather_values(record: &ValidatedRecord) -> Vec<Value> {
    vec![
        Value::from(record.str_field("state").map(String::from)),
        Value::from(record.f64_field("temperature")),
        Value::from(record.str_field("condition").map(String::from)),
        Value::from(record.f64_field("humidity")),
        Value::from(record.f64_field("wind_speed")),
        Value::from(record.f64_field("feels_like")),
        Value::from(record.str_field("data_source").map(String::from)),
    ]
}

pub fn weather_reading(record: &ValidatedRecord) -> Option<(String, WeatherReading)> {
    Some((
        record.str_field("state")?.to_string(),
        WeatherReading {
            temperature: record.f64_field("temperature")?,
            condition: record.str_field("condition")?.to_string(),
            humidity: record.f64_field("humidity")?,
            wind_speed: record.f64_field("wind_speed")?,
            feels_like: record.f64_field("feels_like")?,
            source: record.str_field("data_source")?.to_string(),
        },
    ))
}

pub fn master_values(row: &MasterRecord) -> Vec<Value> {
    vec![
        Value::from(row.state.as_str()),
        Value::from(row.rank),
        Value::from(row.postal.clone()),
        Value::from(row.population),
        Value::from(row.population_per_rank),
        Value::from(row.diesel),
        Value::from(row.population_per_dollar),
        Value::from(row.temperature),
        Value::from(row.condition.clone()),
        Value::from(row.humidity),
        Value::from(row.wind_speed),
        Value::from(row.feels_like),
        Value::from(row.weather_source.clone()),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
