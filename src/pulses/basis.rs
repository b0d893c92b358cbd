// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Basis functions, their antiderivatives and the linear constraints that
//! normalize a waveform on [0, 1].

use std::sync::OnceLock;

use ndarray::{Array1, Array2};
use rand::Rng;
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use tracing::{debug, warn};

use crate::error::{Error, PulseError, Result};
use crate::numerics::linalg;

/// Default tolerance for the area check.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Areas below this magnitude are not used for default coefficients.
const MIN_DEFAULT_AREA: f64 = 1e-3;

/// Random prototypes whose area falls below this magnitude are redrawn.
const MIN_RANDOM_AREA: f64 = 1e-9;

/// Maximum residual accepted from the special coefficient system.
const SPECIAL_RESIDUAL_TOLERANCE: f64 = 1e-6;

/// One basis function `f` together with its antiderivative `F`.
#[derive(Debug, Clone, PartialEq)]
pub enum BasisFunction {
    /// `x^power`, antiderivative `x^(power+1) / (power+1)`
    Monomial { power: i32 },
    /// `h·cos(h x)`, antiderivative `sin(h x)`
    FourierCos { frequency: f64 },
    /// `h·sin(h x)`, antiderivative `1 − cos(h x)`
    FourierSin { frequency: f64 },
    /// Normal density, antiderivative `Φ(x) − Φ(0)`
    Gaussian(Normal),
}

impl BasisFunction {
    /// Evaluate `f(x)`.
    pub fn value(&self, x: f64) -> f64 {
        match self {
            BasisFunction::Monomial { power } => x.powi(*power),
            BasisFunction::FourierCos { frequency } => frequency * (frequency * x).cos(),
            BasisFunction::FourierSin { frequency } => frequency * (frequency * x).sin(),
            BasisFunction::Gaussian(normal) => normal.pdf(x),
        }
    }

    /// Evaluate `F(x)`.
    pub fn antiderivative(&self, x: f64) -> f64 {
        match self {
            BasisFunction::Monomial { power } => {
                let next = power + 1;
                x.powi(next) / next as f64
            }
            BasisFunction::FourierCos { frequency } => (frequency * x).sin(),
            BasisFunction::FourierSin { frequency } => 1.0 - (frequency * x).cos(),
            BasisFunction::Gaussian(normal) => normal.cdf(x) - normal.cdf(0.0),
        }
    }
}

/// Optional lower and upper limit on one coefficient.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bound {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Bound {
    /// No limit in either direction.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// `[lower, ∞)`
    pub fn at_least(lower: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: None,
        }
    }

    /// Project `x` into the bound.
    pub fn clamp(&self, x: f64) -> f64 {
        let x = match self.lower {
            Some(lo) if x < lo => lo,
            _ => x,
        };
        match self.upper {
            Some(hi) if x > hi => hi,
            _ => x,
        }
    }
}

/// Linear equality constraint `row · c = target` on the coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualityConstraint {
    pub name: &'static str,
    pub row: Vec<f64>,
    pub target: f64,
}

impl EqualityConstraint {
    /// Residual that vanishes at a feasible point.
    pub fn residual(&self, coefficients: &[f64]) -> f64 {
        dot(&self.row, coefficients) - self.target
    }
}

/// Finite function basis on [0, 1] with a constant shift.
#[derive(Debug)]
pub struct Basis {
    functions: Vec<BasisFunction>,
    shift: f64,
    bounds: Vec<Bound>,
    has_vanishing_endpoints: bool,
    areas: OnceLock<Vec<f64>>,
}

impl Basis {
    /// Create a basis. `bounds` must have one entry per function.
    pub fn new(
        functions: Vec<BasisFunction>,
        shift: f64,
        bounds: Vec<Bound>,
        has_vanishing_endpoints: bool,
    ) -> Result<Self> {
        if functions.is_empty() {
            return Err(Error::Config("basis must contain at least one function".into()));
        }
        if functions.len() != bounds.len() {
            return Err(Error::Config(format!(
                "basis has {} functions but {} bounds",
                functions.len(),
                bounds.len()
            )));
        }
        if !shift.is_finite() {
            return Err(Error::Config(format!("shift must be finite, got {}", shift)));
        }
        Ok(Self {
            functions,
            shift,
            bounds,
            has_vanishing_endpoints,
            areas: OnceLock::new(),
        })
    }

    pub fn number_of_functions(&self) -> usize {
        self.functions.len()
    }

    pub fn functions(&self) -> &[BasisFunction] {
        &self.functions
    }

    pub fn shift(&self) -> f64 {
        self.shift
    }

    pub fn bounds(&self) -> &[Bound] {
        &self.bounds
    }

    pub fn has_vanishing_endpoints(&self) -> bool {
        self.has_vanishing_endpoints
    }

    /// Integral of each shifted basis function over [0, 1], computed once.
    pub fn areas(&self) -> &[f64] {
        self.areas.get_or_init(|| {
            self.functions
                .iter()
                .map(|f| f.antiderivative(1.0 - self.shift) - f.antiderivative(0.0 - self.shift))
                .collect()
        })
    }

    /// Total area of the waveform built from `coefficients`.
    pub fn area_of_waveform(coefficients: &[f64], areas: &[f64]) -> f64 {
        dot(coefficients, areas)
    }

    /// `Σ c_i f_i(x − shift)`
    pub fn waveform_at(&self, coefficients: &[f64], x: f64) -> f64 {
        self.functions
            .iter()
            .zip(coefficients)
            .map(|(f, c)| c * f.value(x - self.shift))
            .sum()
    }

    /// `Σ c_i (F_i(x − shift) − F_i(−shift))`
    pub fn parametrization_at(&self, coefficients: &[f64], x: f64) -> f64 {
        self.functions
            .iter()
            .zip(coefficients)
            .map(|(f, c)| {
                c * (f.antiderivative(x - self.shift) - f.antiderivative(0.0 - self.shift))
            })
            .sum()
    }

    /// Whether `coefficients` produce a waveform of area one within `tolerance`.
    ///
    /// Mismatches are logged, never raised.
    pub fn coefficient_are_valid(&self, coefficients: &[f64], tolerance: f64) -> bool {
        if coefficients.len() != self.number_of_functions() {
            warn!(
                expected = self.number_of_functions(),
                found = coefficients.len(),
                "Coefficient length does not match basis"
            );
            return false;
        }

        let area = Self::area_of_waveform(coefficients, self.areas());
        if !area.is_finite() || (area - 1.0).abs() > tolerance {
            warn!(area, tolerance, "Coefficients do not normalize the waveform");
            return false;
        }

        true
    }

    /// Row of basis values at `x`, i.e. `waveform(x) = row · c`.
    fn evaluation_row(&self, x: f64) -> Vec<f64> {
        self.functions
            .iter()
            .map(|f| f.value(x - self.shift))
            .collect()
    }

    /// Equality constraints every admissible coefficient vector satisfies.
    ///
    /// Always `area = 1`; with vanishing endpoints also `waveform(0) = 0` and
    /// `waveform(1) = 0`.
    pub fn constraints(&self) -> Vec<EqualityConstraint> {
        let mut constraints = vec![EqualityConstraint {
            name: "area",
            row: self.areas().to_vec(),
            target: 1.0,
        }];
        if self.has_vanishing_endpoints {
            constraints.push(EqualityConstraint {
                name: "waveform(0)",
                row: self.evaluation_row(0.0),
                target: 0.0,
            });
            constraints.push(EqualityConstraint {
                name: "waveform(1)",
                row: self.evaluation_row(1.0),
                target: 0.0,
            });
        }
        constraints
    }

    /// Single nonzero entry `1/area_i` at the first function with usable area.
    pub fn default_coefficients(&self) -> Result<Vec<f64>> {
        let areas = self.areas();
        let mut coefficients = vec![0.0; areas.len()];
        match areas.iter().position(|a| a.abs() > MIN_DEFAULT_AREA) {
            Some(i) => {
                coefficients[i] = 1.0 / areas[i];
                Ok(coefficients)
            }
            None => Err(PulseError::VanishingAreas(areas.to_vec()).into()),
        }
    }

    /// Uniform `[-1, 1]` entries rescaled to unit area.
    pub fn random_coefficients<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let areas = self.areas();
        loop {
            let prototype: Vec<f64> = (0..areas.len())
                .map(|_| rng.gen_range(-1.0..=1.0))
                .collect();
            let area = Self::area_of_waveform(&prototype, areas);
            if area.abs() >= MIN_RANDOM_AREA {
                return prototype.into_iter().map(|c| c / area).collect();
            }
            debug!(area, "Redrawing random coefficients with vanishing area");
        }
    }

    /// Minimum-norm solution of `waveform(0) = 0`, `waveform(1) = 0`, `area = 1`.
    ///
    /// Fails with [`PulseError::InsufficientDegreesOfFreedom`] when the system
    /// is singular or its residual exceeds `1e-6`.
    pub fn special_coefficients(&self) -> Result<Vec<f64>> {
        let n = self.number_of_functions();
        let mut a = Array2::<f64>::zeros((3, n));
        for (j, value) in self.evaluation_row(0.0).into_iter().enumerate() {
            a[[0, j]] = value;
        }
        for (j, value) in self.evaluation_row(1.0).into_iter().enumerate() {
            a[[1, j]] = value;
        }
        for (j, value) in self.areas().iter().enumerate() {
            a[[2, j]] = *value;
        }
        let b = Array1::from(vec![0.0, 0.0, 1.0]);

        let x = linalg::min_norm_solve(&a, &b).ok_or(PulseError::InsufficientDegreesOfFreedom {
            functions: n,
            residual: f64::INFINITY,
        })?;

        let residual = linalg::norm(&(a.dot(&x) - &b));
        if !residual.is_finite() || residual > SPECIAL_RESIDUAL_TOLERANCE {
            return Err(PulseError::InsufficientDegreesOfFreedom {
                functions: n,
                residual,
            }
            .into());
        }

        Ok(x.to_vec())
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
