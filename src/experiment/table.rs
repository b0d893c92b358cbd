// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Aggregated results table.
//!
//! One row per task with namespaced columns: `config.*` (the flattened run
//! document), `args.*` (the task's arguments), `results.*` (the optimization
//! result) and `successful`. Missing cells are null.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use super::args::{add_prefix, flatten, ArgMap};
use super::runner::TaskResult;
use crate::error::{Error, Result};
use crate::integrals::{LossArgs, LossKind};
use crate::pulses::{Pulse, PulseConfig, PulseFactory};

/// Fields of an optimization result, in column order.
const RESULT_FIELDS: [&str; 9] = [
    "x",
    "fun",
    "success",
    "status",
    "message",
    "nit",
    "nfev",
    "constraint_violation",
    "strategy",
];

/// Column-oriented table of task results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl ResultTable {
    /// Tabulate `results` of a run described by `document`.
    pub fn from_results(document: &Value, results: &[TaskResult]) -> Result<Self> {
        let config = match document {
            Value::Object(map) => add_prefix(flatten(map, "."), "config"),
            Value::Null => ArgMap::new(),
            other => {
                return Err(Error::Serialization(format!(
                    "run document must serialize to an object, got {}",
                    other
                )))
            }
        };

        let mut columns: Vec<String> = config.keys().cloned().collect();
        let mut records = Vec::with_capacity(results.len());
        for result in results {
            let mut record = config.clone();
            record.extend(add_prefix(flatten(&result.loss_arg, "."), "args"));
            if let Some(res) = &result.res {
                if let Value::Object(map) = serde_json::to_value(res)? {
                    record.extend(add_prefix(map, "results"));
                }
            }
            record.insert("successful".into(), Value::Bool(result.successful));
            for key in record.keys() {
                if !columns.contains(key) && !key.starts_with("results.") && key != "successful" {
                    columns.push(key.clone());
                }
            }
            records.push(record);
        }
        columns.extend(RESULT_FIELDS.iter().map(|f| format!("results.{}", f)));
        columns.push("successful".into());

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows whose `successful` cell is true.
    pub fn successful_count(&self) -> usize {
        (0..self.len())
            .filter(|&row| self.get(row, "successful") == Some(&Value::Bool(true)))
            .count()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `row`, `column`; `None` if either does not exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }

    /// Row as a column-name keyed map.
    pub fn row(&self, row: usize) -> Option<ArgMap> {
        let values = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .cloned()
                .zip(values.iter().cloned())
                .collect(),
        )
    }

    /// Append a column, or replace it if it already exists.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(Error::Serialization(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        match self.column_index(name) {
            Some(index) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[index] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Render as CSV. Arrays and objects are written as JSON text.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        let header: Vec<String> = self.columns.iter().map(|c| csv_field(c)).collect();
        out.push_str(&header.join(","));
        out.push('\n');
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(csv_cell).collect();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }

    pub fn save_csv(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_csv())?;
        info!(path = %path.display(), rows = self.len(), "Saved results table");
        Ok(())
    }

    /// Lossless JSON form: column names plus row arrays.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string(self)?)?;
        info!(path = %path.display(), rows = self.len(), "Saved results table");
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let table: Self = serde_json::from_str(&content)?;
        if let Some(bad) = table.rows.iter().position(|r| r.len() != table.columns.len()) {
            return Err(Error::Serialization(format!(
                "row {} has {} cells for {} columns",
                bad,
                table.rows[bad].len(),
                table.columns.len()
            )));
        }
        Ok(table)
    }
}

fn csv_field(text: &str) -> String {
    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => csv_field(s),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => csv_field(&other.to_string()),
    }
}

// ============================================================================
// Pulse reconstruction
// ============================================================================

/// Rebuild the optimized pulse of one table row, without verification.
///
/// The pulse family comes from `config.content.factory` with the keyword
/// arguments named in `config.content.factory_args`, each read from the
/// matching `args.*` cell. Rows of documents without a factory fall back to
/// the family of `config.content.loss`. Coefficients come from `results.x`.
pub fn pulse_from_row(row: &ArgMap) -> Result<Pulse> {
    let config = match row.get("config.content.factory").and_then(Value::as_str) {
        Some(factory) => {
            let mut kwargs = ArgMap::new();
            let names = row
                .get("config.content.factory_args")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            for name in names.iter().filter_map(Value::as_str) {
                match row.get(&format!("args.{}", name)) {
                    Some(Value::Null) | None => {}
                    Some(value) => {
                        kwargs.insert(name.to_string(), value.clone());
                    }
                }
            }
            PulseConfig::from_factory(factory, Value::Object(kwargs))?
        }
        None => {
            let loss = row
                .get("config.content.loss")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::Config("row names neither a factory nor a loss".into()))?;
            let kind = LossKind::from_name(loss)
                .ok_or_else(|| Error::Config(format!("unknown loss '{}'", loss)))?;
            let args: ArgMap = row
                .iter()
                .filter_map(|(k, v)| k.strip_prefix("args.").map(|k| (k.to_string(), v.clone())))
                .filter(|(_, v)| !v.is_null())
                .collect();
            kind.pulse_config(&LossArgs::from_map(&args)?)
        }
    };

    let coefficients: Vec<f64> = match row.get("results.x") {
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| {
                v.as_f64()
                    .ok_or_else(|| Error::Serialization(format!("non-numeric coefficient {}", v)))
            })
            .collect::<Result<_>>()?,
        _ => return Err(Error::Config("row has no optimized coefficients".into())),
    };

    PulseFactory::with_checks(config, false)?.sample(&coefficients)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::{OptimizationResult, Strategy};
    use crate::pulses::PowerConfig;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use serde_json::json;

    fn result(a: f64, x: Option<Vec<f64>>) -> TaskResult {
        let mut loss_arg = ArgMap::new();
        loss_arg.insert("n".into(), json!(3));
        loss_arg.insert("a".into(), json!(a));
        TaskResult {
            res: x.map(|x| OptimizationResult {
                x,
                fun: 0.125,
                success: true,
                status: 1,
                message: "converged, \"gradient\" small".into(),
                nit: 3,
                nfev: 40,
                constraint_violation: 0.0,
                strategy: Strategy::Hard,
            }),
            loss_arg,
            successful: true,
        }
    }

    fn document() -> Value {
        json!({
            "name": "power_small",
            "description": "test",
            "content": {
                "loss": "PowerLoss",
                "factory": "PowerFactory",
                "factory_args": ["n", "shift"],
                "static_args": {"n": 3},
                "variable_args": {"a": [1.0, 2.0]}
            }
        })
    }

    #[test]
    fn test_from_results_columns() {
        let results = vec![result(1.0, Some(vec![1.0, 0.0, 0.0, 0.0])), {
            let mut failed = result(2.0, None);
            failed.successful = false;
            failed
        }];
        let table = ResultTable::from_results(&document(), &results).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.columns()[0], "config.name");
        assert!(table.column_index("config.content.loss").is_some());
        assert!(table.column_index("args.a").is_some());
        assert_eq!(table.columns().last().unwrap(), "successful");

        assert_eq!(table.get(0, "results.fun"), Some(&json!(0.125)));
        assert_eq!(table.get(0, "successful"), Some(&json!(true)));
        for field in RESULT_FIELDS {
            assert_eq!(table.get(1, &format!("results.{}", field)), Some(&Value::Null));
        }
        assert_eq!(table.get(1, "successful"), Some(&json!(false)));
        assert_eq!(table.get(1, "args.a"), Some(&json!(2.0)));
        assert_eq!(table.successful_count(), 1);
    }

    #[test]
    fn test_all_failed_still_has_result_columns() {
        let mut failed = result(1.0, None);
        failed.successful = false;
        let table = ResultTable::from_results(&document(), &[failed]).unwrap();
        assert_eq!(table.get(0, "results.x"), Some(&Value::Null));
    }

    #[test]
    fn test_csv_quoting() {
        let table = ResultTable::from_results(&Value::Null, &[result(1.0, Some(vec![1.0, 0.5]))]).unwrap();
        let csv = table.to_csv();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "args.n,args.a,results.x,results.fun,results.success,results.status,results.message,\
             results.nit,results.nfev,results.constraint_violation,results.strategy,successful"
        );
        assert_eq!(
            lines.next().unwrap(),
            "3,1.0,\"[1.0,0.5]\",0.125,true,1,\"converged, \"\"gradient\"\" small\",3,40,0.0,hard,true"
        );
    }

    #[test]
    fn test_json_round_trip_is_exact() {
        let x = vec![0.1 + 0.2, 1.0 / 3.0, -2.5e-17, 7.0];
        let table = ResultTable::from_results(&document(), &[result(1.0, Some(x))]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        table.save_json(&path).unwrap();
        assert_eq!(ResultTable::load_json(&path).unwrap(), table);

        table.save_csv(&dir.path().join("results.csv")).unwrap();
        assert!(dir.path().join("results.csv").exists());
    }

    #[test]
    fn test_json_round_trip_preserves_float_bits() {
        let mut rng = StdRng::seed_from_u64(11);
        let x: Vec<f64> = (0..4000)
            .map(|_| {
                let mantissa: f64 = rng.gen_range(-1.0..1.0);
                mantissa * 10f64.powi(rng.gen_range(-12..12))
            })
            .collect();
        let table =
            ResultTable::from_results(&document(), &[result(1.0, Some(x.clone()))]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        table.save_json(&path).unwrap();

        let loaded = ResultTable::load_json(&path).unwrap();
        let values = loaded.get(0, "results.x").unwrap().as_array().unwrap();
        assert_eq!(values.len(), x.len());
        for (value, expected) in values.iter().zip(&x) {
            assert_eq!(value.as_f64().unwrap().to_bits(), expected.to_bits());
        }
        assert_eq!(loaded, table);
    }

    #[test]
    fn test_load_json_rejects_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"columns":["a","b"],"rows":[[1]]}"#).unwrap();
        assert!(matches!(ResultTable::load_json(&path), Err(Error::Serialization(_))));
    }

    #[test]
    fn test_set_column() {
        let mut table = ResultTable::from_results(&Value::Null, &[result(1.0, None)]).unwrap();
        table.set_column("metric.x", vec![json!(1.5)]).unwrap();
        assert_eq!(table.get(0, "metric.x"), Some(&json!(1.5)));
        table.set_column("metric.x", vec![json!(2.5)]).unwrap();
        assert_eq!(table.get(0, "metric.x"), Some(&json!(2.5)));
        assert!(table.set_column("metric.y", vec![]).is_err());
    }

    #[test]
    fn test_pulse_from_row_with_factory() {
        let table = ResultTable::from_results(&document(), &[result(1.0, Some(vec![1.0, 0.0, 0.0, 0.0]))])
            .unwrap();
        let pulse = pulse_from_row(&table.row(0).unwrap()).unwrap();
        assert_eq!(pulse.coefficients(), &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(pulse.basis().number_of_functions(), 4);
        assert_relative_eq!(pulse.parametrization(1.0), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pulse_from_row_skips_verification() {
        let table = ResultTable::from_results(&document(), &[result(1.0, Some(vec![0.0; 4]))]).unwrap();
        assert!(pulse_from_row(&table.row(0).unwrap()).is_ok());
    }

    #[test]
    fn test_pulse_from_row_loss_fallback() {
        let mut doc = document();
        let content = doc["content"].as_object_mut().unwrap();
        content.remove("factory");
        content.remove("factory_args");
        let table = ResultTable::from_results(&doc, &[result(1.0, Some(vec![1.0, 0.0, 0.0, 0.0]))]).unwrap();
        let pulse = pulse_from_row(&table.row(0).unwrap()).unwrap();
        assert_eq!(
            pulse.basis().number_of_functions(),
            PulseConfig::Power(PowerConfig::default()).build_basis().unwrap().number_of_functions()
        );
    }

    #[test]
    fn test_pulse_from_row_without_result() {
        let table = ResultTable::from_results(&document(), &[result(1.0, None)]).unwrap();
        assert!(matches!(pulse_from_row(&table.row(0).unwrap()), Err(Error::Config(_))));
    }
}
