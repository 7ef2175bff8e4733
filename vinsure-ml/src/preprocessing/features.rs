//! Deterministic feature engineering on [`DataBatch`]es.
//!
//! A [`FeaturePipeline`] is an ordered list of [`FeatureStep`]s applied to the
//! input-feature table of each split independently. Nothing here is fitted, so
//! train and test are transformed identically.

use crate::data::DataBatch;
use crate::data::csv_io::format_cell;
use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Column holding the two-valued gender category.
pub const GENDER_COLUMN: &str = "Gender";

/// One-hot columns whose generated names are not identifier-safe.
pub const ONE_HOT_RENAMES: &[(&str, &str)] = &[
    ("Vehicle_Age_< 1 Year", "Vehicle_Age_lt_1_Year"),
    ("Vehicle_Age_> 2 Years", "Vehicle_Age_gt_2_Years"),
];

/// Indicator columns stored as integers after encoding.
pub const INTEGER_INDICATORS: &[&str] = &[
    "Vehicle_Age_lt_1_Year",
    "Vehicle_Age_gt_2_Years",
    "Vehicle_Damage_Yes",
];

/// A feature engineering step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureStep {
    /// Map exactly two known string values to 0 and 1. Cells already holding
    /// 0 or 1 are left as they are; anything else is an error.
    MapBinary {
        column: String,
        negative: String,
        positive: String,
    },
    /// Remove a column; no-op when absent.
    DropColumn { column: String },
    /// One-hot encode every column holding strings.
    OneHot { drop_first: bool },
    /// Rename columns that are present.
    RenameColumns { renames: Vec<(String, String)> },
    /// Coerce columns that are present to integers.
    CastToInt { columns: Vec<String> },
}

/// An ordered sequence of feature steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    pub steps: Vec<FeatureStep>,
}

impl FeaturePipeline {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn add_step(mut self, step: FeatureStep) -> Self {
        self.steps.push(step);
        self
    }

    /// The vehicle insurance sequence: gender map, identifier drop, one-hot
    /// (first level dropped), then renames and integer casts.
    pub fn vehicle_insurance(drop_column: &str) -> Self {
        Self::new()
            .add_step(gender_step())
            .add_step(FeatureStep::DropColumn {
                column: drop_column.to_string(),
            })
            .add_step(FeatureStep::OneHot { drop_first: true })
            .add_step(FeatureStep::RenameColumns {
                renames: ONE_HOT_RENAMES
                    .iter()
                    .map(|(from, to)| (from.to_string(), to.to_string()))
                    .collect(),
            })
            .add_step(FeatureStep::CastToInt {
                columns: INTEGER_INDICATORS.iter().map(|c| c.to_string()).collect(),
            })
    }

    /// Apply every step in order.
    pub fn apply(&self, mut batch: DataBatch) -> Result<DataBatch, PipelineError> {
        for step in &self.steps {
            batch = apply_step(batch, step)?;
        }
        Ok(batch)
    }
}

/// The `Gender` mapping: `Female` -> 0, `Male` -> 1.
pub fn gender_step() -> FeatureStep {
    FeatureStep::MapBinary {
        column: GENDER_COLUMN.to_string(),
        negative: "Female".to_string(),
        positive: "Male".to_string(),
    }
}

pub fn apply_step(mut batch: DataBatch, step: &FeatureStep) -> Result<DataBatch, PipelineError> {
    match step {
        FeatureStep::MapBinary {
            column,
            negative,
            positive,
        } => {
            map_binary(&mut batch, column, negative, positive)?;
            Ok(batch)
        }
        FeatureStep::DropColumn { column } => {
            if batch.drop_column(column) {
                tracing::debug!(column = %column, "Dropped column");
            }
            Ok(batch)
        }
        FeatureStep::OneHot { drop_first } => one_hot(batch, *drop_first),
        FeatureStep::RenameColumns { renames } => {
            for (from, to) in renames {
                batch.rename_column(from, to);
            }
            Ok(batch)
        }
        FeatureStep::CastToInt { columns } => {
            for column in columns {
                cast_to_int(&mut batch, column)?;
            }
            Ok(batch)
        }
    }
}

fn map_binary(
    batch: &mut DataBatch,
    column: &str,
    negative: &str,
    positive: &str,
) -> Result<(), PipelineError> {
    let idx = batch.require_column(column)?;
    for (row_idx, row) in batch.rows.iter_mut().enumerate() {
        let mapped = match &row[idx] {
            Value::String(s) if s == negative => 0,
            Value::String(s) if s == positive => 1,
            Value::Number(n) if matches!(n.as_i64(), Some(0 | 1)) => continue,
            other => {
                return Err(PipelineError::transformation(format!(
                    "column '{column}' row {row_idx}: value {other} is neither '{negative}' nor '{positive}'"
                )));
            }
        };
        row[idx] = Value::from(mapped);
    }
    Ok(())
}

/// Replace every string-holding column with indicator columns.
///
/// Levels are sorted; with `drop_first` the first level becomes the reference
/// and gets no column. Nulls encode as all-false. Generated columns are named
/// `<column>_<level>` and appended after the untouched columns.
fn one_hot(batch: DataBatch, drop_first: bool) -> Result<DataBatch, PipelineError> {
    let categorical: Vec<usize> = (0..batch.column_count())
        .filter(|&i| batch.column_values(i).any(Value::is_string))
        .collect();
    if categorical.is_empty() {
        return Ok(batch);
    }

    let mut encoded: Vec<(usize, Vec<String>)> = Vec::with_capacity(categorical.len());
    for &idx in &categorical {
        let levels: BTreeSet<String> = batch
            .column_values(idx)
            .filter(|v| !v.is_null())
            .map(format_cell)
            .collect();
        let kept: Vec<String> = levels
            .into_iter()
            .skip(usize::from(drop_first))
            .collect();
        encoded.push((idx, kept));
    }

    let plain: Vec<usize> = (0..batch.column_count())
        .filter(|i| !categorical.contains(i))
        .collect();

    let mut columns: Vec<String> = plain.iter().map(|&i| batch.columns[i].clone()).collect();
    for (idx, levels) in &encoded {
        for level in levels {
            columns.push(format!("{}_{}", batch.columns[*idx], level));
        }
    }

    let rows = batch
        .rows
        .iter()
        .map(|row| {
            let mut out: Vec<Value> = plain.iter().map(|&i| row[i].clone()).collect();
            for (idx, levels) in &encoded {
                let cell = &row[*idx];
                let text = (!cell.is_null()).then(|| format_cell(cell));
                for level in levels {
                    out.push(Value::Bool(text.as_deref() == Some(level.as_str())));
                }
            }
            out
        })
        .collect();

    tracing::debug!(
        encoded = encoded.len(),
        columns = columns.len(),
        "One-hot encoded categorical columns"
    );
    DataBatch::new(columns, rows)
}

fn cast_to_int(batch: &mut DataBatch, column: &str) -> Result<(), PipelineError> {
    let Some(idx) = batch.column_index(column) else {
        return Ok(());
    };
    for (row_idx, row) in batch.rows.iter_mut().enumerate() {
        let cast = match &row[idx] {
            Value::Bool(b) => i64::from(*b),
            Value::Number(n) if n.is_i64() => continue,
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.fract() == 0.0 => f as i64,
                _ => {
                    return Err(PipelineError::transformation(format!(
                        "column '{column}' row {row_idx}: {n} is not integral"
                    )));
                }
            },
            other => {
                return Err(PipelineError::transformation(format!(
                    "column '{column}' row {row_idx}: cannot cast {other} to int"
                )));
            }
        };
        row[idx] = Value::from(cast);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batch::tests::batch_from_json;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn policies() -> DataBatch {
        batch_from_json(
            &["id", "Gender", "Age", "Vehicle_Age", "Vehicle_Damage"],
            json!([
                [1, "Male", 44, "> 2 Years", "Yes"],
                [2, "Female", 21, "< 1 Year", "No"],
                [3, "Male", 36, "1-2 Year", "Yes"],
            ]),
        )
    }

    #[test]
    fn test_map_gender() {
        let batch = apply_step(policies(), &gender_step()).unwrap();
        let idx = batch.require_column("Gender").unwrap();
        let values: Vec<_> = batch.column_values(idx).cloned().collect();
        assert_eq!(values, vec![json!(1), json!(0), json!(1)]);
    }

    #[test]
    fn test_map_gender_twice_is_noop() {
        let once = apply_step(policies(), &gender_step()).unwrap();
        let twice = apply_step(once.clone(), &gender_step()).unwrap();
        assert_eq!(twice, once);
    }

    #[test]
    fn test_map_gender_rejects_other_numbers() {
        let mut batch = policies();
        batch.rows[0][1] = json!(2);
        let err = apply_step(batch, &gender_step()).unwrap_err();
        assert!(err.to_string().contains("neither 'Female' nor 'Male'"));
    }

    #[test]
    fn test_map_gender_rejects_unknown_and_null() {
        let mut batch = policies();
        batch.rows[1][1] = json!("Other");
        assert!(apply_step(batch, &gender_step()).is_err());

        let mut batch = policies();
        batch.rows[2][1] = Value::Null;
        assert!(apply_step(batch, &gender_step()).is_err());
    }

    #[test]
    fn test_map_gender_requires_column() {
        let mut batch = policies();
        batch.drop_column("Gender");
        assert!(apply_step(batch, &gender_step()).is_err());
    }

    #[test]
    fn test_drop_column_is_noop_when_absent() {
        let step = FeatureStep::DropColumn {
            column: "policy_id".into(),
        };
        let batch = apply_step(policies(), &step).unwrap();
        assert_eq!(batch, policies());
    }

    #[test]
    fn test_one_hot_drop_first() {
        let batch = FeaturePipeline::new()
            .add_step(gender_step())
            .add_step(FeatureStep::OneHot { drop_first: true })
            .apply(policies())
            .unwrap();

        assert_eq!(
            batch.columns,
            vec![
                "id",
                "Gender",
                "Age",
                "Vehicle_Age_< 1 Year",
                "Vehicle_Age_> 2 Years",
                "Vehicle_Damage_Yes",
            ]
        );
        assert_eq!(
            batch.rows[0][3..].to_vec(),
            vec![json!(false), json!(true), json!(true)]
        );
        // "1-2 Year" is the reference level: all indicators false.
        assert_eq!(
            batch.rows[2][3..5].to_vec(),
            vec![json!(false), json!(false)]
        );
    }

    #[test]
    fn test_one_hot_keeps_all_levels_without_drop_first() {
        let batch = apply_step(
            apply_step(policies(), &gender_step()).unwrap(),
            &FeatureStep::OneHot { drop_first: false },
        )
        .unwrap();
        assert!(batch.has_column("Vehicle_Age_1-2 Year"));
        assert!(batch.has_column("Vehicle_Damage_No"));
        assert_eq!(batch.column_count(), 3 + 3 + 2);
    }

    #[test]
    fn test_one_hot_null_is_all_false() {
        let mut batch = apply_step(policies(), &gender_step()).unwrap();
        batch.rows[0][4] = Value::Null;
        let batch = apply_step(batch, &FeatureStep::OneHot { drop_first: true }).unwrap();
        let idx = batch.require_column("Vehicle_Damage_Yes").unwrap();
        assert_eq!(batch.rows[0][idx], json!(false));
    }

    #[test]
    fn test_vehicle_insurance_sequence() {
        let batch = FeaturePipeline::vehicle_insurance("id")
            .apply(policies())
            .unwrap();
        assert_eq!(
            batch.columns,
            vec![
                "Gender",
                "Age",
                "Vehicle_Age_lt_1_Year",
                "Vehicle_Age_gt_2_Years",
                "Vehicle_Damage_Yes",
            ]
        );
        assert_eq!(
            batch.rows[0],
            vec![json!(1), json!(44), json!(0), json!(1), json!(1)]
        );
        assert_eq!(
            batch.rows[1],
            vec![json!(0), json!(21), json!(1), json!(0), json!(0)]
        );
    }

    #[test]
    fn test_cast_rejects_fractional() {
        let batch = DataBatch::new(vec!["x".into()], vec![vec![json!(1.5)]]).unwrap();
        let step = FeatureStep::CastToInt {
            columns: vec!["x".into()],
        };
        assert!(apply_step(batch, &step).is_err());

        let batch = DataBatch::new(vec!["x".into()], vec![vec![json!(2.0)]]).unwrap();
        let cast = apply_step(batch, &step).unwrap();
        assert_eq!(cast.rows[0][0], json!(2));
    }
}
