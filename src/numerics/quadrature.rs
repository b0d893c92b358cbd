// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Composite Gauss–Legendre quadrature.
//!
//! Nodes and weights are found by Newton iteration on the Legendre
//! polynomial recurrence.
//!
//! Ref: Press et al., "Numerical Recipes" (2007), §4.6.1 (gauleg).

use std::f64::consts::PI;

/// Gauss–Legendre rule on the reference interval [-1, 1].
#[derive(Debug, Clone)]
pub struct GaussLegendre {
    nodes: Vec<f64>,
    weights: Vec<f64>,
}

impl GaussLegendre {
    /// Build an `order`-point rule. Exact for polynomials of degree `2·order − 1`.
    pub fn new(order: usize) -> Self {
        let order = order.max(1);
        let mut nodes = vec![0.0; order];
        let mut weights = vec![0.0; order];
        let m = (order + 1) / 2;
        let n = order as f64;

        for i in 0..m {
            // Chebyshev-like initial guess for the i-th root
            let mut z = (PI * (i as f64 + 0.75) / (n + 0.5)).cos();
            let mut pp = 0.0;
            for _ in 0..100 {
                let mut p1 = 1.0;
                let mut p2 = 0.0;
                for j in 0..order {
                    let p3 = p2;
                    p2 = p1;
                    let jf = j as f64;
                    p1 = ((2.0 * jf + 1.0) * z * p2 - jf * p3) / (jf + 1.0);
                }
                pp = n * (z * p1 - p2) / (z * z - 1.0);
                let z1 = z;
                z = z1 - p1 / pp;
                if (z - z1).abs() <= 1e-15 {
                    break;
                }
            }
            nodes[i] = -z;
            nodes[order - 1 - i] = z;
            let w = 2.0 / ((1.0 - z * z) * pp * pp);
            weights[i] = w;
            weights[order - 1 - i] = w;
        }

        Self { nodes, weights }
    }

    /// Number of points in the rule.
    pub fn order(&self) -> usize {
        self.nodes.len()
    }

    /// Integrate `f` over `[a, b]` split into `panels` equal sub-intervals.
    pub fn integrate<F>(&self, f: F, a: f64, b: f64, panels: usize) -> f64
    where
        F: Fn(f64) -> f64,
    {
        let panels = panels.max(1);
        let width = (b - a) / panels as f64;
        let half = 0.5 * width;

        let mut total = 0.0;
        for p in 0..panels {
            let mid = a + (p as f64 + 0.5) * width;
            let panel: f64 = self
                .nodes
                .iter()
                .zip(&self.weights)
                .map(|(x, w)| w * f(mid + half * x))
                .sum();
            total += half * panel;
        }
        total
    }
}
