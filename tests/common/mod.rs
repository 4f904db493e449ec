#![allow(dead_code)]

use colormix::mixer::{mix_color, squared_error};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seeded generator so property tests are reproducible
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

pub fn random_color(rng: &mut StdRng) -> [f64; 3] {
    [
        rng.gen_range(0.0..1.0),
        rng.gen_range(0.0..1.0),
        rng.gen_range(0.0..1.0),
    ]
}

pub fn random_palette(rng: &mut StdRng, size: usize) -> Vec<[f64; 3]> {
    (0..size).map(|_| random_color(rng)).collect()
}

/// Frank-Wolfe gap `gᵀw − min_j g_j`, an upper bound on how far `weights`
/// are from the optimal objective
pub fn optimality_gap(palette: &[[f64; 3]], target: &[f64], weights: &[f64]) -> f64 {
    let mixed = mix_color(palette, weights);
    let residual: Vec<f64> = mixed.iter().zip(target).map(|(m, t)| m - t).collect();
    let gradient: Vec<f64> = palette
        .iter()
        .map(|entry| 2.0 * entry.iter().zip(&residual).map(|(a, r)| a * r).sum::<f64>())
        .collect();
    let lowest = gradient.iter().copied().fold(f64::INFINITY, f64::min);
    gradient.iter().zip(weights).map(|(g, w)| g * w).sum::<f64>() - lowest
}

/// Objective value of `weights` for `palette` and `target`
pub fn objective(palette: &[[f64; 3]], target: &[f64], weights: &[f64]) -> f64 {
    squared_error(&mix_color(palette, weights), target)
}

/// Smallest objective over a grid of simplex points with spacing 1/steps
///
/// Only meant for palettes of two or three colors.
pub fn brute_force_minimum(palette: &[[f64; 3]], target: &[f64], steps: usize) -> f64 {
    let mut best = f64::INFINITY;

    match palette.len() {
        2 => {
            for i in 0..=steps {
                let a = i as f64 / steps as f64;
                best = best.min(objective(palette, target, &[a, 1.0 - a]));
            }
        }
        3 => {
            for i in 0..=steps {
                for j in 0..=(steps - i) {
                    let a = i as f64 / steps as f64;
                    let b = j as f64 / steps as f64;
                    let c = (1.0 - a - b).max(0.0);
                    best = best.min(objective(palette, target, &[a, b, c]));
                }
            }
        }
        n => panic!("brute force reference supports 2 or 3 colors, got {}", n),
    }

    best
}

/// Panics unless `weights` lie on the probability simplex
pub fn assert_on_simplex(weights: &[f64]) {
    for &w in weights {
        assert!((0.0..=1.0).contains(&w), "weight {} out of [0, 1]", w);
    }
    let sum: f64 = weights.iter().sum();
    assert!((sum - 1.0).abs() <= 1e-6, "weights sum to {}", sum);
}
