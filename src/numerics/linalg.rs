// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Small dense linear algebra on `ndarray` matrices.
//!
//! The systems solved here are tiny (at most a few dozen unknowns), so plain
//! Gaussian elimination with partial pivoting is sufficient. Singular systems
//! are reported as `None` instead of being patched up.

use ndarray::{s, Array1, Array2};

/// Relative pivot threshold below which a matrix is treated as singular.
const SINGULAR_PIVOT: f64 = 1e-13;

/// Solve `A X = B` for square `A` and a block of right-hand sides `B`.
///
/// Returns `None` when `A` is (numerically) singular or the shapes disagree.
pub fn solve_many(a: &Array2<f64>, b: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.nrows() {
        return None;
    }
    let m = b.ncols();
    if n == 0 {
        return Some(Array2::zeros((0, m)));
    }

    let scale = a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 {
        return None;
    }

    // Augmented matrix [A | B]
    let mut aug = Array2::zeros((n, n + m));
    aug.slice_mut(s![.., ..n]).assign(a);
    aug.slice_mut(s![.., n..]).assign(b);

    for col in 0..n {
        let mut max_val = 0.0;
        let mut max_row = col;
        for row in col..n {
            let val = aug[[row, col]].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if max_val <= SINGULAR_PIVOT * scale {
            return None;
        }

        if max_row != col {
            for j in 0..(n + m) {
                aug.swap([col, j], [max_row, j]);
            }
        }

        let pivot = aug[[col, col]];
        for row in (col + 1)..n {
            let factor = aug[[row, col]] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in col..(n + m) {
                let val = aug[[col, j]];
                aug[[row, j]] -= factor * val;
            }
        }
    }

    // Back substitution
    let mut x = Array2::<f64>::zeros((n, m));
    for col in (0..n).rev() {
        let pivot = aug[[col, col]];
        for j in 0..m {
            let mut sum = aug[[col, n + j]];
            for k in (col + 1)..n {
                sum -= aug[[col, k]] * x[[k, j]];
            }
            x[[col, j]] = sum / pivot;
        }
    }
    Some(x)
}

/// Solve `A x = b` for square `A`.
pub fn solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let rhs = b.view().insert_axis(ndarray::Axis(1)).to_owned();
    solve_many(a, &rhs).map(|x| x.column(0).to_owned())
}

/// Least-squares solution of `A x = b` with minimum norm.
///
/// Underdetermined and square systems use `x = Aᵀ (A Aᵀ)⁻¹ b`, overdetermined
/// systems use the normal equations `(AᵀA) x = Aᵀ b`. Rank-deficient systems
/// yield `None`.
pub fn min_norm_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    if a.nrows() != b.len() {
        return None;
    }
    if a.nrows() <= a.ncols() {
        let gram = a.dot(&a.t());
        let y = solve(&gram, b)?;
        Some(a.t().dot(&y))
    } else {
        let gram = a.t().dot(a);
        let rhs = a.t().dot(b);
        solve(&gram, &rhs)
    }
}

/// Orthogonal projector onto the null space of `A`: `I - Aᵀ (A Aᵀ)⁻¹ A`.
pub fn null_space_projector(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.ncols();
    let gram = a.dot(&a.t());
    let inv_a = solve_many(&gram, a)?;
    Some(Array2::eye(n) - a.t().dot(&inv_a))
}

/// Euclidean norm.
pub fn norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_solve_identity() {
        let a = Array2::eye(3);
        let b = array![1.0, -2.0, 3.5];
        let x = solve(&a, &b).unwrap();
        assert_relative_eq!(x[0], 1.0);
        assert_relative_eq!(x[1], -2.0);
        assert_relative_eq!(x[2], 3.5);
    }

    #[test]
    fn test_solve_requires_pivoting() {
        // Zero in the leading position forces a row swap.
        let a = array![[0.0, 2.0], [3.0, 1.0]];
        let b = array![4.0, 5.0];
        let x = solve(&a, &b).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-14);
        assert_relative_eq!(x[1], 2.0, epsilon = 1e-14);
    }

    #[test]
    fn test_solve_singular_is_none() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        let b = array![1.0, 2.0];
        assert!(solve(&a, &b).is_none());
    }

    #[test]
    fn test_solve_shape_mismatch_is_none() {
        let a = array![[1.0, 2.0, 3.0], [2.0, 4.0, 5.0]];
        let b = array![1.0, 2.0];
        assert!(solve(&a, &b).is_none());
    }

    #[test]
    fn test_min_norm_underdetermined() {
        // x + y = 2 has minimum-norm solution (1, 1).
        let a = array![[1.0, 1.0]];
        let b = array![2.0];
        let x = min_norm_solve(&a, &b).unwrap();
        assert_relative_eq!(x[0], 1.0, epsilon = 1e-14);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_min_norm_overdetermined_least_squares() {
        // Fit x to [1, 2, 3]: least-squares answer is the mean.
        let a = array![[1.0], [1.0], [1.0]];
        let b = array![1.0, 2.0, 3.0];
        let x = min_norm_solve(&a, &b).unwrap();
        assert_relative_eq!(x[0], 2.0, epsilon = 1e-14);
    }

    #[test]
    fn test_projector_annihilates_rows() {
        let a = array![[1.0, 1.0, 1.0], [1.0, 0.0, -1.0]];
        let p = null_space_projector(&a).unwrap();
        let ap = a.dot(&p);
        for v in ap.iter() {
            assert!(v.abs() < 1e-12);
        }
        // Idempotent
        let pp = p.dot(&p);
        for (x, y) in pp.iter().zip(p.iter()) {
            assert_relative_eq!(*x, *y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_norm() {
        assert_relative_eq!(norm(&array![3.0, 4.0]), 5.0);
    }
}
