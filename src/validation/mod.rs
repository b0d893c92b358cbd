// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shape checks for sampled pulses.
//!
//! Each check takes a [`Pulse`] and fails with a [`ValidationError`] that
//! names the violated property.

use crate::error::{Result, ValidationError};
use crate::numerics::GaussLegendre;
use crate::pulses::Pulse;

/// Default precision of the checks.
pub const DEFAULT_EPSILON: f64 = 1e-6;

const QUADRATURE_ORDER: usize = 12;
const QUADRATURE_PANELS: usize = 16;

fn quadrature() -> GaussLegendre {
    GaussLegendre::new(QUADRATURE_ORDER)
}

/// The waveform integrates to one on [0, 1].
pub fn pulse_integrates_to_one(pulse: &Pulse, epsilon: f64) -> Result<()> {
    let total = quadrature().integrate(|x| pulse.waveform(x), 0.0, 1.0, QUADRATURE_PANELS);
    if !total.is_finite() || (total - 1.0).abs() >= epsilon {
        return Err(ValidationError::PhysicsConstraint(format!(
            "pulse integrates to {} instead of 1",
            total
        ))
        .into());
    }
    Ok(())
}

/// The waveform is nonnegative on `check_n_points` grid points.
pub fn pulse_is_non_negative(pulse: &Pulse, check_n_points: usize, epsilon: f64) -> Result<()> {
    for x in linspace(0.0, 1.0, check_n_points) {
        let value = pulse.waveform(x);
        if value < -epsilon {
            return Err(ValidationError::PhysicsConstraint(format!(
                "waveform is negative at x = {}: {}",
                x, value
            ))
            .into());
        }
    }
    Ok(())
}

/// The parametrization starts at 0 and ends at 1.
pub fn parametrization_has_valid_endpoints(pulse: &Pulse, epsilon: f64) -> Result<()> {
    let start = pulse.parametrization(0.0);
    if start.abs() >= epsilon {
        return Err(ValidationError::Field {
            field: "parametrization(0)".into(),
            message: format!("expected 0, found {}", start),
        }
        .into());
    }
    let end = pulse.parametrization(1.0);
    if (end - 1.0).abs() >= epsilon {
        return Err(ValidationError::Field {
            field: "parametrization(1)".into(),
            message: format!("expected 1, found {}", end),
        }
        .into());
    }
    Ok(())
}

/// The parametrization does not decrease by more than `epsilon` over steps of `1e-3`.
pub fn parametrization_is_monotone(pulse: &Pulse, check_n_points: usize, epsilon: f64) -> Result<()> {
    const STEP: f64 = 1e-3;
    for x in linspace(0.0, 1.0 - STEP, check_n_points) {
        let here = pulse.parametrization(x);
        let next = pulse.parametrization(x + STEP);
        if next + epsilon < here {
            return Err(ValidationError::PhysicsConstraint(format!(
                "parametrization decreases after x = {}: {} -> {}",
                x, here, next
            ))
            .into());
        }
    }
    Ok(())
}

/// The integral of the waveform over each sub-interval matches the
/// parametrization difference.
pub fn pulse_and_parametrization_are_compatible(
    pulse: &Pulse,
    check_n_intervals: usize,
    epsilon: f64,
) -> Result<()> {
    if check_n_intervals == 0 {
        return Err(ValidationError::Field {
            field: "check_n_intervals".into(),
            message: "must check at least one interval".into(),
        }
        .into());
    }

    let rule = quadrature();
    let grid = linspace(0.0, 1.0, check_n_intervals + 2);
    for window in grid.windows(2) {
        let (start, end) = (window[0], window[1]);
        let integral = rule.integrate(|x| pulse.waveform(x), start, end, 2);
        let expected = pulse.parametrization(end) - pulse.parametrization(start);
        if (integral - expected).abs() >= epsilon {
            return Err(ValidationError::PhysicsConstraint(format!(
                "waveform and parametrization disagree on [{}, {}]: {} vs {}",
                start, end, integral, expected
            ))
            .into());
        }
    }
    Ok(())
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + i as f64 * step).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::pulses::{GaussianConfig, PowerConfig, PulseConfig, PulseFactory};

    fn gaussian_pulse() -> Pulse {
        let factory = PulseFactory::new(PulseConfig::Gaussian(GaussianConfig {
            n: 3,
            scale: 0.25,
            has_vanishing_endpoints: false,
        }))
        .unwrap();
        let c = factory.basis().default_coefficients().unwrap();
        factory.sample(&c).unwrap()
    }

    fn sine_like_pulse() -> Pulse {
        // 1 + 6(x - 0.5) is negative near x = 0 and still has unit area.
        let factory = PulseFactory::new(PulseConfig::Power(PowerConfig {
            shift: 0.5,
            n: 1,
            has_vanishing_endpoints: false,
        }))
        .unwrap();
        factory.sample(&[1.0, 6.0]).unwrap()
    }

    #[test]
    fn test_valid_pulse_passes_all_checks() {
        let pulse = gaussian_pulse();
        assert!(pulse_integrates_to_one(&pulse, DEFAULT_EPSILON).is_ok());
        assert!(pulse_is_non_negative(&pulse, 50, DEFAULT_EPSILON).is_ok());
        assert!(parametrization_has_valid_endpoints(&pulse, DEFAULT_EPSILON).is_ok());
        assert!(parametrization_is_monotone(&pulse, 50, DEFAULT_EPSILON).is_ok());
        assert!(pulse_and_parametrization_are_compatible(&pulse, 10, DEFAULT_EPSILON).is_ok());
    }

    #[test]
    fn test_negative_pulse_detected() {
        let pulse = sine_like_pulse();
        assert!(pulse_integrates_to_one(&pulse, DEFAULT_EPSILON).is_ok());
        let err = pulse_is_non_negative(&pulse, 10, DEFAULT_EPSILON).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::PhysicsConstraint(_))
        ));
        assert!(parametrization_is_monotone(&pulse, 10, DEFAULT_EPSILON).is_err());
    }

    #[test]
    fn test_compatibility_needs_an_interval() {
        let pulse = gaussian_pulse();
        let err = pulse_and_parametrization_are_compatible(&pulse, 0, DEFAULT_EPSILON).unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::Field { .. })));
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(0.0, 1.0, 3), vec![0.0, 0.5, 1.0]);
        assert_eq!(linspace(0.0, 1.0, 1), vec![0.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }
}
