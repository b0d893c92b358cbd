// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Loss metrics for finished runs.
//!
//! For every successful row the optimized pulse is rebuilt and the raw
//! integrals are summed under each named weighting scheme. No norm is
//! applied. Results land in `metric.{scheme}_loss` columns.

use std::f64::consts::PI;

use serde_json::Value;
use tracing::{debug, warn};

use super::integrand::{Integrand, WeightScheme};
use super::integrator::Integrator;
use crate::error::Result;
use crate::experiment::table::{pulse_from_row, ResultTable};
use crate::pulses::Pulse;

/// Schemes reported as metrics.
pub const METRIC_SCHEMES: [WeightScheme; 5] = [
    WeightScheme::Equal,
    WeightScheme::Variance,
    WeightScheme::Covariance,
    WeightScheme::Deterministic,
    WeightScheme::VariancePlusDeterministic,
];

/// Column name of the metric for `scheme`.
pub fn metric_column(scheme: WeightScheme) -> String {
    format!("metric.{}_loss", scheme.name())
}

/// `Σ_k w_k · ∫ integrand_k` for one pulse.
pub fn weighted_sum(
    integrator: &dyn Integrator,
    pulse: &Pulse,
    scheme: WeightScheme,
    theta: f64,
    a: f64,
) -> Result<f64> {
    let weights = scheme.weights();
    let mut total = 0.0;
    for integrand in Integrand::ALL {
        let weight = weights[integrand.index()];
        if weight != 0.0 {
            total += weight * integrator.integrate(integrand, pulse, theta, a)?;
        }
    }
    Ok(total)
}

/// Append one metric column per scheme in [`METRIC_SCHEMES`].
///
/// Rows that were unsuccessful, or whose pulse cannot be rebuilt or
/// integrated, get null.
pub fn enrich(table: &mut ResultTable, integrator: &dyn Integrator) -> Result<()> {
    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(table.len()); METRIC_SCHEMES.len()];

    for index in 0..table.len() {
        let metrics = row_metrics(table, index, integrator);
        for (column, value) in columns.iter_mut().zip(metrics) {
            column.push(value.map(Value::from).unwrap_or(Value::Null));
        }
    }

    for (scheme, values) in METRIC_SCHEMES.iter().zip(columns) {
        table.set_column(&metric_column(*scheme), values)?;
    }
    debug!(rows = table.len(), "Enriched results table");
    Ok(())
}

fn row_metrics(
    table: &ResultTable,
    index: usize,
    integrator: &dyn Integrator,
) -> Vec<Option<f64>> {
    let none = vec![None; METRIC_SCHEMES.len()];
    if table.get(index, "successful") != Some(&Value::Bool(true)) {
        return none;
    }
    let Some(row) = table.row(index) else {
        return none;
    };
    let pulse = match pulse_from_row(&row) {
        Ok(pulse) => pulse,
        Err(e) => {
            warn!(row = index, error = %e, "Cannot rebuild pulse");
            return none;
        }
    };
    let theta = row.get("args.theta").and_then(Value::as_f64).unwrap_or(PI / 2.0);
    let a = row.get("args.a").and_then(Value::as_f64).unwrap_or(1.0);

    METRIC_SCHEMES
        .iter()
        .map(|scheme| match weighted_sum(integrator, &pulse, *scheme, theta, a) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(row = index, scheme = scheme.name(), error = %e, "Metric failed");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{ArgMap, TaskResult};
    use crate::optimize::{OptimizationResult, Strategy};
    use crate::test_utils::ConstantIntegrator;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn row(x: Option<Vec<f64>>, successful: bool) -> TaskResult {
        let mut loss_arg = ArgMap::new();
        loss_arg.insert("n".into(), json!(3));
        TaskResult {
            res: x.map(|x| OptimizationResult {
                x,
                fun: 1.0,
                success: true,
                status: 1,
                message: String::new(),
                nit: 1,
                nfev: 1,
                constraint_violation: 0.0,
                strategy: Strategy::Hard,
            }),
            loss_arg,
            successful,
        }
    }

    fn table(results: &[TaskResult]) -> ResultTable {
        let document = json!({"name": "t", "content": {"loss": "PowerLoss"}});
        ResultTable::from_results(&document, results).unwrap()
    }

    #[test]
    fn test_metric_columns() {
        assert_eq!(metric_column(WeightScheme::Equal), "metric.equal_loss");
        assert_eq!(
            metric_column(WeightScheme::VariancePlusDeterministic),
            "metric.variance_plus_deterministic_loss"
        );
    }

    #[test]
    fn test_enrich_sums_weights() {
        let mut table = table(&[
            row(Some(vec![1.0, 0.0, 0.0, 0.0]), true),
            row(None, false),
            row(Some(vec![1.0, 0.0, 0.0, 0.0]), false),
        ]);
        let integrator = ConstantIntegrator::new(0.5);
        enrich(&mut table, &integrator).unwrap();

        // weight totals: equal 8, variance 3, covariance 4, deterministic 3, v+d 6
        let expected = [4.0, 1.5, 2.0, 1.5, 3.0];
        for (scheme, value) in METRIC_SCHEMES.iter().zip(expected) {
            let column = metric_column(*scheme);
            assert_relative_eq!(table.get(0, &column).unwrap().as_f64().unwrap(), value);
            assert_eq!(table.get(1, &column), Some(&Value::Null));
            assert_eq!(table.get(2, &column), Some(&Value::Null));
        }
    }

    #[test]
    fn test_enrich_is_idempotent() {
        let mut table = table(&[row(Some(vec![1.0, 0.0, 0.0, 0.0]), true)]);
        let integrator = ConstantIntegrator::new(1.0);
        enrich(&mut table, &integrator).unwrap();
        let width = table.columns().len();
        enrich(&mut table, &integrator).unwrap();
        assert_eq!(table.columns().len(), width);
    }
}
