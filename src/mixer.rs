//! Palette mixing solver.
//!
//! Finds the weights `w` that minimize `‖Σ w_i · palette[i] − target‖²`
//! subject to `w_i ≥ 0` and `Σ w_i = 1`. Expanding the squared error gives
//! the convex quadratic program
//!
//! ```text
//! minimize   wᵀQw − 2bᵀw + tᵀt      Q = AᵀA, b = Aᵀt
//! subject to 1ᵀw = 1, 0 ≤ w ≤ 1
//! ```
//!
//! where the columns of `A` are the palette entries. The feasible region is
//! the probability simplex, so every stationary point is a global optimum.
//! Geometrically the mix is the point of the palette's convex hull nearest
//! the target, which Wolfe's minimum-norm-point method finds exactly with an
//! active set of at most D + 1 palette entries.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;
use tracing::{debug, trace};

/// Allowed deviation of the weight sum from 1
pub const SUM_TOLERANCE: f64 = 1e-6;

/// Slack allowed on the `[0, 1]` weight bounds when renormalizing
const BOUNDS_TOLERANCE: f64 = 1e-9;

/// Singular values below this are treated as zero
const EPSILON: f64 = 1e-12;

/// Corral weights at or below this are dropped
const DROP_TOLERANCE: f64 = 1e-14;

/// Errors reported by the solver before any numerical work starts
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MixError {
    /// Empty palette, zero-channel colors, non-finite values or bad options
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// A color does not have the same channel count as the others
    #[error("Dimension mismatch: {location} has {found} channels, expected {expected}")]
    DimensionMismatch {
        expected: usize,
        found: usize,
        location: String,
    },
}

impl MixError {
    fn invalid(message: impl Into<String>) -> Self {
        MixError::InvalidInput {
            message: message.into(),
        }
    }
}

/// Stopping rules for the iterative search
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    /// Bound on the optimality gap `f(w) − f(w*)` at which the search stops,
    /// relative to the squared magnitude of the largest channel difference
    /// between the palette and the target
    pub tolerance: f64,
    /// Maximum number of active-set solves
    pub max_iterations: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-9,
            max_iterations: 200,
        }
    }
}

impl SolverOptions {
    fn validate(&self) -> Result<(), MixError> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(MixError::invalid(format!(
                "tolerance must be a positive finite number (got: {})",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(MixError::invalid("max_iterations must be at least 1"));
        }
        Ok(())
    }
}

/// The solver's answer for a single target
#[derive(Debug, Clone, PartialEq)]
pub struct Mixture {
    /// One weight per palette entry, in palette order
    pub weights: Vec<f64>,
    /// Weighted sum of the palette
    pub mixed: Vec<f64>,
    /// Squared distance between `mixed` and the target
    pub error: f64,
    /// Active-set solves performed
    pub iterations: usize,
    /// Whether the optimality gap fell below the tolerance
    pub converged: bool,
}

/// Compute the mixing weights for `target` with default options
///
/// # Arguments
/// * `palette` - N colors of D channels each
/// * `target` - The color to approximate, also D channels
///
/// # Returns
/// N weights in `[0, 1]` summing to 1, aligned with `palette`
pub fn solve<P: AsRef<[f64]>>(palette: &[P], target: &[f64]) -> Result<Vec<f64>, MixError> {
    solve_with_options(palette, target, &SolverOptions::default())
}

/// Compute the mixing weights for `target` with custom stopping rules
pub fn solve_with_options<P: AsRef<[f64]>>(
    palette: &[P],
    target: &[f64],
    options: &SolverOptions,
) -> Result<Vec<f64>, MixError> {
    mix(palette, target, options).map(|mixture| mixture.weights)
}

/// Solve for the weights and report the resulting mix
pub fn mix<P: AsRef<[f64]>>(
    palette: &[P],
    target: &[f64],
    options: &SolverOptions,
) -> Result<Mixture, MixError> {
    options.validate()?;
    validate_input(palette, target)?;

    let (weights, iterations, converged) = if palette.len() == 1 {
        (vec![1.0], 0, true)
    } else {
        match Problem::new(palette, target) {
            Some(problem) => problem.minimize(options),
            None => (vec![1.0 / palette.len() as f64; palette.len()], 0, true),
        }
    };

    let mixed = mix_color(palette, &weights);
    let error = squared_error(&mixed, target);

    Ok(Mixture {
        weights,
        mixed,
        error,
        iterations,
        converged,
    })
}

/// Weighted sum of palette colors
///
/// Entries beyond the shorter of `palette` and `weights` are ignored.
pub fn mix_color<P: AsRef<[f64]>>(palette: &[P], weights: &[f64]) -> Vec<f64> {
    let channels = palette.first().map_or(0, |entry| entry.as_ref().len());
    let mut mixed = vec![0.0; channels];

    for (entry, &weight) in palette.iter().zip(weights) {
        for (channel, &value) in mixed.iter_mut().zip(entry.as_ref()) {
            *channel += weight * value;
        }
    }

    mixed
}

/// Sum of squared channel differences
pub fn squared_error(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

fn validate_input<P: AsRef<[f64]>>(palette: &[P], target: &[f64]) -> Result<(), MixError> {
    let first = palette
        .first()
        .ok_or_else(|| MixError::invalid("palette must contain at least one color"))?;

    let channels = first.as_ref().len();
    if channels == 0 {
        return Err(MixError::invalid("colors must have at least one channel"));
    }

    for (i, entry) in palette.iter().enumerate() {
        let entry = entry.as_ref();
        if entry.len() != channels {
            return Err(MixError::DimensionMismatch {
                expected: channels,
                found: entry.len(),
                location: format!("palette entry {}", i + 1),
            });
        }
        if let Some(value) = entry.iter().find(|value| !value.is_finite()) {
            return Err(MixError::invalid(format!(
                "palette entry {} contains a non-finite value ({})",
                i + 1,
                value
            )));
        }
    }

    if target.len() != channels {
        return Err(MixError::DimensionMismatch {
            expected: channels,
            found: target.len(),
            location: "target".to_string(),
        });
    }
    if let Some(value) = target.iter().find(|value| !value.is_finite()) {
        return Err(MixError::invalid(format!(
            "target contains a non-finite value ({})",
            value
        )));
    }

    Ok(())
}

/// The problem in shifted, rescaled coordinates
///
/// Palette entry `i` becomes `p_i = (a_i − t) / s`, where `s` is the largest
/// absolute channel difference. The squared error of a mix is then
/// `s²·‖Σ w_i p_i‖²`, and finding the weights is finding the point of the
/// convex hull of the `p_i` closest to the origin. Every threshold below is
/// relative to the input's own magnitude.
struct Problem {
    /// Gram matrix of the shifted points, `PᵀP` (N×N)
    gram: DMatrix<f64>,
}

impl Problem {
    /// Returns `None` when every palette entry is the same color, which
    /// makes the objective flat over the simplex
    fn new<P: AsRef<[f64]>>(palette: &[P], target: &[f64]) -> Option<Self> {
        let channels = target.len();
        let shifted = DMatrix::from_fn(channels, palette.len(), |row, col| {
            palette[col].as_ref()[row] - target[row]
        });

        let flat = (1..shifted.ncols())
            .all(|col| (0..channels).all(|row| shifted[(row, col)] == shifted[(row, 0)]));
        if flat {
            return None;
        }

        // Distinct entries guarantee a nonzero difference somewhere
        let points = &shifted / shifted.amax();
        Some(Self {
            gram: points.transpose() * &points,
        })
    }

    fn size(&self) -> usize {
        self.gram.nrows()
    }

    /// Frank-Wolfe gap `gᵀw − min_j g_j` of the scaled objective
    ///
    /// With `x = Pw` the gradient is `g = 2Pᵀx`, so this is
    /// `2(xᵀx − min_j p_jᵀx)`, an upper bound on the distance to the optimum.
    fn optimality_gap(&self, weights: &DVector<f64>) -> f64 {
        let products = &self.gram * weights;
        let lowest = products.iter().copied().fold(f64::INFINITY, f64::min);
        2.0 * (weights.dot(&products) - lowest)
    }

    /// Weights of the point of smallest norm on the affine hull of `corral`
    fn affine_minimizer(&self, corral: &[usize]) -> Option<DVector<f64>> {
        // [G_SS 1; 1ᵀ 0] [α; μ] = [0; 1]
        let m = corral.len();
        let mut kkt = DMatrix::<f64>::zeros(m + 1, m + 1);
        let mut rhs = DVector::<f64>::zeros(m + 1);
        for (row, &i) in corral.iter().enumerate() {
            for (col, &j) in corral.iter().enumerate() {
                kkt[(row, col)] = self.gram[(i, j)];
            }
            kkt[(row, m)] = 1.0;
            kkt[(m, row)] = 1.0;
        }
        rhs[m] = 1.0;

        let solution = match kkt.clone().lu().solve(&rhs) {
            Some(solution) => solution,
            None => kkt.pseudo_inverse(EPSILON).ok()? * &rhs,
        };
        if solution.iter().any(|value| !value.is_finite()) {
            return None;
        }

        Some(solution.rows(0, m).into_owned())
    }

    /// Wolfe's minimum-norm-point method
    ///
    /// Keeps a "corral" of affinely independent palette entries whose
    /// weights are all positive. Each major step adds the entry that most
    /// decreases the objective. Minor steps move toward the corral's affine
    /// minimizer and drop the first entry whose weight reaches zero. The
    /// weights stay on the simplex throughout, and the method terminates at
    /// the exact optimum.
    ///
    /// Returns the weights, the number of affine solves and convergence.
    fn minimize(&self, options: &SolverOptions) -> (Vec<f64>, usize, bool) {
        let n = self.size();

        // Start at the palette entry closest to the target
        let start = (0..n)
            .min_by(|&a, &b| self.gram[(a, a)].total_cmp(&self.gram[(b, b)]))
            .unwrap_or(0);
        let mut weights = DVector::<f64>::zeros(n);
        weights[start] = 1.0;
        let mut corral = vec![start];

        let mut iterations = 0;
        let mut converged = false;

        'major: loop {
            let products = &self.gram * &weights;
            let norm_sq = weights.dot(&products);
            let (entering, lowest) = products
                .iter()
                .copied()
                .enumerate()
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .unwrap_or((start, norm_sq));

            if 2.0 * (norm_sq - lowest) <= options.tolerance {
                converged = true;
                break;
            }
            if corral.contains(&entering) {
                // Rounding stalled the search short of the tolerance
                trace!(entering, gap = 2.0 * (norm_sq - lowest), "entering entry already in corral");
                break;
            }
            if iterations >= options.max_iterations {
                break;
            }
            corral.push(entering);

            loop {
                if iterations >= options.max_iterations {
                    break 'major;
                }
                iterations += 1;

                let Some(affine) = self.affine_minimizer(&corral) else {
                    debug!(corral = ?corral, "singular affine system, stopping search");
                    break 'major;
                };

                if affine.iter().all(|&a| a > 0.0) {
                    weights.fill(0.0);
                    for (&i, &a) in corral.iter().zip(affine.iter()) {
                        weights[i] = a;
                    }
                    break;
                }

                // Walk toward the affine minimizer until a weight hits zero
                let mut theta = 1.0;
                let mut leaving = 0;
                for (k, (&i, &a)) in corral.iter().zip(affine.iter()).enumerate() {
                    if a <= 0.0 {
                        let current = weights[i];
                        let step = if current - a > 0.0 {
                            current / (current - a)
                        } else {
                            0.0
                        };
                        if step < theta {
                            theta = step;
                            leaving = k;
                        }
                    }
                }

                for (&i, &a) in corral.iter().zip(affine.iter()) {
                    weights[i] = theta * a + (1.0 - theta) * weights[i];
                }
                weights[corral[leaving]] = 0.0;
                corral.retain(|&i| {
                    if weights[i] <= DROP_TOLERANCE {
                        weights[i] = 0.0;
                        false
                    } else {
                        true
                    }
                });
                trace!(corral = ?corral, theta, "dropped entries from corral");
            }
        }

        if !converged {
            debug!(
                iterations,
                gap = self.optimality_gap(&weights),
                "search stopped before reaching the tolerance, returning current feasible point"
            );
        }

        (finalize(weights), iterations, converged)
    }
}

/// Renormalize a sum that drifted past [`SUM_TOLERANCE`], as long as the
/// result still respects the bounds
fn finalize(weights: DVector<f64>) -> Vec<f64> {
    let sum = weights.sum();
    if (sum - 1.0).abs() > SUM_TOLERANCE && sum > 0.0 {
        let renormalized = &weights / sum;
        if renormalized
            .iter()
            .all(|w| (-BOUNDS_TOLERANCE..=1.0 + BOUNDS_TOLERANCE).contains(w))
        {
            return renormalized.iter().map(|w| w.clamp(0.0, 1.0)).collect();
        }
        debug!(sum, "weight sum outside tolerance, returning raw weights");
    }
    // Only rounding can push a weight past 1 here
    weights.iter().map(|w| w.clamp(0.0, 1.0)).collect()
}
