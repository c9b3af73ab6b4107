use crate::error::RejectReason;
use crate::record::{RawRecord, ValidatedRecord};
use crate::value::Value;

// ---------------------------------------------------------------------------
// Declaration
// ---------------------------------------------------------------------------

/// Declarative per-source contract: field names, required types, bounds, and
/// string normalization. One schema per source.
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: &'static str,
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    Integer {
        min: Option<i64>,
    },
    Float {
        gt: Option<f64>,
        ge: Option<f64>,
        le: Option<f64>,
    },
    Text {
        min_len: Option<usize>,
        max_len: Option<usize>,
        uppercase: bool,
    },
}

// ---------------------------------------------------------------------------
// Batch output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RowReject {
    pub row: usize,
    pub reason: RejectReason,
}

/// Outcome of validating a whole batch. Rejected rows never abort the pass;
/// they are excluded and reported here with their index and reason.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub valid: Vec<ValidatedRecord>,
    pub rejected: Vec<RowReject>,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Schema {
    /// Validate one row. Pure: no side effects, input untouched.
    pub fn validate(&self, raw: &RawRecord) -> Result<ValidatedRecord, RejectReason> {
        let mut out = ValidatedRecord::new();
        for spec in &self.fields {
            let value = coerce(spec, raw.get(spec.name))?;
            if value.is_null() && spec.required {
                return Err(RejectReason::MissingField(spec.name.to_string()));
            }
            out.set(spec.name, value);
        }
        Ok(out)
    }

    /// Validate every row independently. One bad row excludes that row only.
    pub fn validate_batch(&self, rows: &[RawRecord]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (row, raw) in rows.iter().enumerate() {
            match self.validate(raw) {
                Ok(record) => outcome.valid.push(record),
                Err(reason) => outcome.rejected.push(RowReject { row, reason }),
            }
        }
        outcome
    }
}

fn coerce(spec: &FieldSpec, cell: Option<&serde_json::Value>) -> Result<Value, RejectReason> {
    let cell = match cell {
        None | Some(serde_json::Value::Null) => return Ok(Value::Null),
        Some(cell) => cell,
    };

    match &spec.kind {
        FieldKind::Integer { min } => {
            let n = match cell {
                serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                    (Some(i), _) => Some(i),
                    (None, Some(f)) if f.fract() == 0.0 => Some(f as i64),
                    _ => None,
                },
                serde_json::Value::String(s) => {
                    let s = s.trim();
                    if s.is_empty() {
                        return Ok(Value::Null);
                    }
                    s.parse::<i64>().ok()
                }
                _ => None,
            };
            let n = n.ok_or_else(|| mismatch(spec.name, cell))?;
            if let Some(min) = min {
                if n < *min {
                    return Err(violation(spec.name, format!(">= {min}")));
                }
            }
            Ok(Value::Int(n))
        }
        FieldKind::Float { gt, ge, le } => {
            let x = match cell {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => {
                    let s = s.trim();
                    if s.is_empty() {
                        return Ok(Value::Null);
                    }
                    s.parse::<f64>().ok()
                }
                _ => None,
            };
            let x = x.ok_or_else(|| mismatch(spec.name, cell))?;
            if !x.is_finite() {
                return Err(mismatch(spec.name, cell));
            }
            if let Some(gt) = gt {
                if x <= *gt {
                    return Err(violation(spec.name, format!("> {gt}")));
                }
            }
            if let Some(ge) = ge {
                if x < *ge {
                    return Err(violation(spec.name, format!(">= {ge}")));
                }
            }
            if let Some(le) = le {
                if x > *le {
                    return Err(violation(spec.name, format!("<= {le}")));
                }
            }
            Ok(Value::Float(x))
        }
        FieldKind::Text {
            min_len,
            max_len,
            uppercase,
        } => {
            let s = match cell {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                _ => return Err(mismatch(spec.name, cell)),
            };
            let mut s = s.trim().to_string();
            if *uppercase {
                s = s.to_uppercase();
            }
            if s.is_empty() {
                return Ok(Value::Null);
            }
            let len = s.chars().count();
            if min_len.is_some_and(|min| len < min) || max_len.is_some_and(|max| len > max) {
                let rule = match (min_len, max_len) {
                    (Some(min), Some(max)) => format!("length within {min}..={max}"),
                    (Some(min), None) => format!("length >= {min}"),
                    (None, Some(max)) => format!("length <= {max}"),
                    (None, None) => unreachable!(),
                };
                return Err(violation(spec.name, rule));
            }
            Ok(Value::Text(s))
        }
    }
}

fn mismatch(field: &str, cell: &serde_json::Value) -> RejectReason {
    let value = match cell {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    RejectReason::TypeMismatch {
        field: field.to_string(),
        value,
    }
}

fn violation(field: &str, rule: String) -> RejectReason {
    RejectReason::ConstraintViolation {
        field: field.to_string(),
        rule,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_schema() -> Schema {
        Schema {
            name: "test",
            fields: vec![
                FieldSpec {
                    name: "rank",
                    required: true,
                    kind: FieldKind::Integer { min: Some(1) },
                },
                FieldSpec {
                    name: "state",
                    required: true,
                    kind: FieldKind::Text {
                        min_len: None,
                        max_len: None,
                        uppercase: true,
                    },
                },
                FieldSpec {
                    name: "postal",
                    required: true,
                    kind: FieldKind::Text {
                        min_len: Some(2),
                        max_len: Some(2),
                        uppercase: true,
                    },
                },
                FieldSpec {
                    name: "population",
                    required: true,
                    kind: FieldKind::Float {
                        gt: Some(0.0),
                        ge: None,
                        le: None,
                    },
                },
            ],
        }
    }

    fn row(rank: &str, state: &str, postal: &str, population: &str) -> RawRecord {
        RawRecord::from([
            ("rank".to_string(), serde_json::json!(rank)),
            ("state".to_string(), serde_json::json!(state)),
            ("postal".to_string(), serde_json::json!(postal)),
            ("population".to_string(), serde_json::json!(population)),
        ])
    }

    #[test]
    fn valid_row_is_normalized() {
        let record = test_schema().validate(&row("2", " Texas ", "tx", "200")).unwrap();
        assert_eq!(record.str_field("state"), Some("TEXAS"));
        assert_eq!(record.str_field("postal"), Some("TX"));
        assert_eq!(record.i64_field("rank"), Some(2));
        assert_eq!(record.f64_field("population"), Some(200.0));
    }

    #[test]
    fn normalization_is_idempotent() {
        let schema = test_schema();
        let first = schema.validate(&row("1", " California ", "ca", "100")).unwrap();
        let renormalized = schema
            .validate(&row(
                "1",
                first.str_field("state").unwrap(),
                first.str_field("postal").unwrap(),
                "100",
            ))
            .unwrap();
        assert_eq!(first, renormalized);
    }

    #[test]
    fn rejects_low_rank_and_nonpositive_population() {
        let schema = test_schema();
        assert!(matches!(
            schema.validate(&row("0", "X", "XX", "1")),
            Err(RejectReason::ConstraintViolation { ref field, .. }) if field == "rank"
        ));
        assert!(matches!(
            schema.validate(&row("1", "X", "XX", "0")),
            Err(RejectReason::ConstraintViolation { ref field, .. }) if field == "population"
        ));
        assert!(matches!(
            schema.validate(&row("1", "X", "XX", "-1")),
            Err(RejectReason::ConstraintViolation { ref field, .. }) if field == "population"
        ));
    }

    #[test]
    fn rejects_missing_and_mistyped_fields() {
        let schema = test_schema();

        let mut no_state = row("1", "", "XX", "1");
        assert!(matches!(
            schema.validate(&no_state),
            Err(RejectReason::MissingField(ref f)) if f == "state"
        ));
        no_state.remove("state");
        assert!(matches!(
            schema.validate(&no_state),
            Err(RejectReason::MissingField(ref f)) if f == "state"
        ));

        assert!(matches!(
            schema.validate(&row("abc", "X", "XX", "1")),
            Err(RejectReason::TypeMismatch { ref field, .. }) if field == "rank"
        ));
    }

    #[test]
    fn rejects_bad_postal_length() {
        let err = test_schema().validate(&row("1", "NY", "NYX", "1")).unwrap_err();
        assert!(matches!(
            err,
            RejectReason::ConstraintViolation { ref field, .. } if field == "postal"
        ));
    }

    #[test]
    fn accepts_json_numbers_directly() {
        let raw = RawRecord::from([
            ("rank".to_string(), serde_json::json!(3)),
            ("state".to_string(), serde_json::json!("Ohio")),
            ("postal".to_string(), serde_json::json!("OH")),
            ("population".to_string(), serde_json::json!(11.7)),
        ]);
        let record = test_schema().validate(&raw).unwrap();
        assert_eq!(record.i64_field("rank"), Some(3));
        assert_eq!(record.f64_field("population"), Some(11.7));
    }

    #[test]
    fn batch_continues_past_rejects() {
        let rows = vec![
            row("1", "California", "CA", "100"),
            row("0", "", "XX", "-1"),
            row("2", " Texas ", "TX", "200"),
            row("3", "NY", "NYX", "300"),
        ];
        let outcome = test_schema().validate_batch(&rows);
        assert_eq!(outcome.valid.len(), 2);
        assert_eq!(outcome.rejected.len(), 2);

        let states: Vec<&str> = outcome
            .valid
            .iter()
            .filter_map(|r| r.str_field("state"))
            .collect();
        assert_eq!(states, vec!["CALIFORNIA", "TEXAS"]);

        let rejected_rows: Vec<usize> = outcome.rejected.iter().map(|r| r.row).collect();
        assert_eq!(rejected_rows, vec![1, 3]);
    }

    #[test]
    fn humidity_style_range_bounds() {
        let schema = Schema {
            name: "bounded",
            fields: vec![FieldSpec {
                name: "humidity",
                required: true,
                kind: FieldKind::Float {
                    gt: None,
                    ge: Some(0.0),
                    le: Some(100.0),
                },
            }],
        };
        let ok = RawRecord::from([("humidity".to_string(), serde_json::json!(55.0))]);
        assert!(schema.validate(&ok).is_ok());

        let over = RawRecord::from([("humidity".to_string(), serde_json::json!(101.0))]);
        let err = schema.validate(&over).unwrap_err();
        assert_eq!(err.to_string(), "field 'humidity': violates <= 100");
    }
}
