use std::collections::{BTreeMap, BTreeSet};

use crate::model::{MasterRecord, MergeInput, MergeOutput, MergeSummary};

/// Merge all sources into the master record set.
///
/// Output key set is the union of every source's key set, one row per
/// distinct key, sorted, so re-running over unchanged inputs yields an
/// identical table. Secondary sources left-join onto the keys: a key a
/// secondary does not cover keeps `None` in that source's fields.
pub fn merge(input: &MergeInput) -> MergeOutput {
    let mut warnings = Vec::new();
    let mut summary = MergeSummary::default();

    let mut primary_by_key: BTreeMap<&str, &crate::model::PrimaryRow> = BTreeMap::new();
    for row in &input.primary {
        if primary_by_key.contains_key(row.state.as_str()) {
            warnings.push(format!(
                "duplicate primary key '{}'; keeping first occurrence",
                row.state
            ));
        } else {
            primary_by_key.insert(&row.state, row);
        }
    }
    summary.primary_rows = primary_by_key.len();

    if input.population.is_none() {
        warnings.push("population reference unavailable; keeping primary values".into());
    }
    if input.fuel.is_none() {
        warnings.push("fuel prices unavailable; fuel columns will be null".into());
    }
    if input.weather.is_none() {
        warnings.push("weather data unavailable; weather columns will be null".into());
    }

    let mut keys: BTreeSet<&str> = primary_by_key.keys().copied().collect();
    if let Some(m) = input.population.as_ref() {
        keys.extend(m.keys().map(String::as_str));
    }
    if let Some(m) = input.fuel.as_ref() {
        keys.extend(m.keys().map(String::as_str));
    }
    if let Some(m) = input.weather.as_ref() {
        keys.extend(m.keys().map(String::as_str));
    }

    let mut rows = Vec::with_capacity(keys.len());
    for key in keys {
        let primary = primary_by_key.get(key).copied();
        if primary.is_none() {
            summary.secondary_only += 1;
        }

        let authoritative = input
            .population
            .as_ref()
            .and_then(|m| m.get(key))
            .copied();
        if authoritative.is_some() && primary.is_some() {
            summary.population_overridden += 1;
        }
        // Coalesce: the fresher source wins only when it has a value.
        let population = authoritative.or_else(|| primary.map(|p| p.population));

        let fuel = input.fuel.as_ref().and_then(|m| m.get(key));
        if fuel.is_some() {
            summary.fuel_matched += 1;
        }
        let diesel = fuel.map(|f| f.diesel);

        let weather = input.weather.as_ref().and_then(|m| m.get(key));
        if weather.is_some() {
            summary.weather_matched += 1;
        }

        let population_per_dollar = match (population, diesel) {
            (Some(p), Some(d)) if d != 0.0 => Some(p / d),
            _ => None,
        };

        rows.push(MasterRecord {
            state: key.to_string(),
            rank: primary.map(|p| p.rank),
            postal: primary.map(|p| p.postal.clone()),
            population,
            population_per_rank: primary.map(|p| p.population_per_rank),
            diesel,
            population_per_dollar,
            temperature: weather.map(|w| w.temperature),
            condition: weather.map(|w| w.condition.clone()),
            humidity: weather.map(|w| w.humidity),
            wind_speed: weather.map(|w| w.wind_speed),
            feels_like: weather.map(|w| w.feels_like),
            weather_source: weather.map(|w| w.source.clone()),
        });
    }

    summary.total_rows = rows.len();

    MergeOutput {
        rows,
        summary,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FuelQuote, PrimaryRow, WeatherReading};

    fn primary(state: &str, rank: i64, population: f64) -> PrimaryRow {
        PrimaryRow {
            state: state.into(),
            rank,
            postal: state.chars().take(2).collect(),
            population,
            population_per_rank: population / rank as f64,
        }
    }

    fn fuel(diesel: f64) -> FuelQuote {
        FuelQuote {
            regular: diesel - 0.5,
            mid_grade: diesel - 0.3,
            premium: diesel - 0.1,
            diesel,
        }
    }

    fn weather(temp: f64) -> WeatherReading {
        WeatherReading {
            temperature: temp,
            condition: "Clear".into(),
            humidity: 40.0,
            wind_speed: 5.0,
            feels_like: temp + 2.0,
            source: "test".into(),
        }
    }

    #[test]
    fn left_join_keeps_uncovered_primary_rows() {
        let input = MergeInput {
            primary: vec![
                primary("CALIFORNIA", 1, 100.0),
                primary("TEXAS", 2, 200.0),
                primary("OHIO", 3, 300.0),
            ],
            fuel: Some(BTreeMap::from([("TEXAS".to_string(), fuel(4.0))])),
            ..Default::default()
        };
        let output = merge(&input);

        assert_eq!(output.rows.len(), 3);
        let texas = output.rows.iter().find(|r| r.state == "TEXAS").unwrap();
        assert_eq!(texas.diesel, Some(4.0));
        let ohio = output.rows.iter().find(|r| r.state == "OHIO").unwrap();
        assert_eq!(ohio.diesel, None);
        assert_eq!(ohio.population_per_dollar, None);
    }

    #[test]
    fn key_set_is_union_of_all_sources() {
        let input = MergeInput {
            primary: vec![primary("TEXAS", 1, 200.0)],
            weather: Some(BTreeMap::from([("ALASKA".to_string(), weather(20.0))])),
            ..Default::default()
        };
        let output = merge(&input);

        assert_eq!(output.rows.len(), 2);
        assert_eq!(output.summary.secondary_only, 1);
        let alaska = output.rows.iter().find(|r| r.state == "ALASKA").unwrap();
        assert_eq!(alaska.rank, None);
        assert_eq!(alaska.population, None);
        assert_eq!(alaska.temperature, Some(20.0));
    }

    #[test]
    fn authoritative_population_coalesces_not_overwrites() {
        let input = MergeInput {
            primary: vec![primary("TEXAS", 1, 200.0), primary("OHIO", 2, 300.0)],
            population: Some(BTreeMap::from([("TEXAS".to_string(), 250.0)])),
            ..Default::default()
        };
        let output = merge(&input);

        let texas = output.rows.iter().find(|r| r.state == "TEXAS").unwrap();
        assert_eq!(texas.population, Some(250.0));
        // No reference value: the primary population survives.
        let ohio = output.rows.iter().find(|r| r.state == "OHIO").unwrap();
        assert_eq!(ohio.population, Some(300.0));
        assert_eq!(output.summary.population_overridden, 1);
    }

    #[test]
    fn derived_metric_is_null_on_zero_or_missing_denominator() {
        let input = MergeInput {
            primary: vec![primary("TEXAS", 1, 200.0), primary("OHIO", 2, 300.0)],
            fuel: Some(BTreeMap::from([
                ("TEXAS".to_string(), fuel(0.0)),
                ("OHIO".to_string(), fuel(4.0)),
            ])),
            ..Default::default()
        };
        let output = merge(&input);

        let texas = output.rows.iter().find(|r| r.state == "TEXAS").unwrap();
        assert_eq!(texas.population_per_dollar, None);
        let ohio = output.rows.iter().find(|r| r.state == "OHIO").unwrap();
        assert_eq!(ohio.population_per_dollar, Some(75.0));
    }

    #[test]
    fn missing_sources_warn_but_still_merge() {
        let input = MergeInput {
            primary: vec![primary("TEXAS", 1, 200.0)],
            ..Default::default()
        };
        let output = merge(&input);

        assert_eq!(output.rows.len(), 1);
        assert_eq!(output.warnings.len(), 3);
        assert!(output.warnings.iter().any(|w| w.contains("fuel")));
        let texas = &output.rows[0];
        assert_eq!(texas.diesel, None);
        assert_eq!(texas.temperature, None);
        assert_eq!(texas.population, Some(200.0));
    }

    #[test]
    fn duplicate_primary_key_keeps_first_and_warns() {
        let input = MergeInput {
            primary: vec![primary("TEXAS", 1, 200.0), primary("TEXAS", 9, 999.0)],
            ..Default::default()
        };
        let output = merge(&input);

        assert_eq!(output.rows.len(), 1);
        assert_eq!(output.rows[0].rank, Some(1));
        assert!(output.warnings.iter().any(|w| w.contains("duplicate")));
    }

    #[test]
    fn output_is_sorted_and_deterministic() {
        let input = MergeInput {
            primary: vec![
                primary("TEXAS", 2, 200.0),
                primary("ALASKA", 1, 100.0),
                primary("OHIO", 3, 300.0),
            ],
            ..Default::default()
        };
        let first = merge(&input);
        let second = merge(&input);

        let states: Vec<&str> = first.rows.iter().map(|r| r.state.as_str()).collect();
        assert_eq!(states, vec!["ALASKA", "OHIO", "TEXAS"]);
        assert_eq!(first.rows, second.rows);
    }
}
