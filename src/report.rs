use std::fmt;

use crate::color::{Color, NormalizedColor, denormalize_color, format_hex};
use crate::mixer::Mixture;

/// Weights at or below this are left out of the printed breakdown
pub const NEGLIGIBLE_WEIGHT: f64 = 1e-3;

/// Palette indices whose weight exceeds `threshold`, in palette order
pub fn significant_components(weights: &[f64], threshold: f64) -> Vec<(usize, f64)> {
    weights
        .iter()
        .copied()
        .enumerate()
        .filter(|&(_, w)| w > threshold)
        .collect()
}

/// A mixture paired with the inputs it was solved for, ready to print
pub struct MixtureReport<'a> {
    pub palette: &'a [Color],
    pub target: Color,
    pub mixture: &'a Mixture,
    /// Components with weights at or below this are omitted
    pub threshold: f64,
}

impl fmt::Display for MixtureReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Target {} (RGB {})",
            format_hex(self.target),
            format_rgb(self.target)
        )?;

        for (i, weight) in significant_components(&self.mixture.weights, self.threshold) {
            if let Some(&color) = self.palette.get(i) {
                writeln!(
                    f,
                    "  Color {} ({}, RGB {}): {:.2}%",
                    i + 1,
                    format_hex(color),
                    format_rgb(color),
                    weight * 100.0
                )?;
            }
        }

        let mixed = to_rgb(&self.mixture.mixed);
        writeln!(
            f,
            "  Mixed: {} (RGB {}), squared error {:.6}",
            format_hex(mixed),
            format_rgb(mixed),
            self.mixture.error
        )?;

        if !self.mixture.converged {
            writeln!(
                f,
                "  Note: stopped after {} iterations before reaching the tolerance",
                self.mixture.iterations
            )?;
        }

        Ok(())
    }
}

/// Render a mixture as human-readable text
///
/// # Arguments
/// * `palette` - The palette the mixture was solved against
/// * `target` - The requested color
/// * `mixture` - The solver result for `target`
/// * `threshold` - Components with weights at or below this are omitted
pub fn format_mixture(
    palette: &[Color],
    target: Color,
    mixture: &Mixture,
    threshold: f64,
) -> String {
    MixtureReport {
        palette,
        target,
        mixture,
        threshold,
    }
    .to_string()
}

fn format_rgb(color: Color) -> String {
    format!("{},{},{}", color[0], color[1], color[2])
}

fn to_rgb(channels: &[f64]) -> Color {
    let mut normalized: NormalizedColor = [0.0; 3];
    for (slot, &value) in normalized.iter_mut().zip(channels) {
        *slot = value;
    }
    denormalize_color(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixture(weights: Vec<f64>, mixed: Vec<f64>, converged: bool) -> Mixture {
        Mixture {
            weights,
            mixed,
            error: 0.0,
            iterations: 7,
            converged,
        }
    }

    #[test]
    fn test_significant_components() {
        let weights = [0.5, 0.0005, 0.001, 0.4985];
        assert_eq!(
            significant_components(&weights, NEGLIGIBLE_WEIGHT),
            vec![(0, 0.5), (3, 0.4985)]
        );
        assert_eq!(significant_components(&weights, 0.0).len(), 4);
    }

    #[test]
    fn test_format_mixture() {
        let palette = [[255, 0, 0], [0, 255, 0], [0, 0, 255]];
        let result = mixture(vec![0.25, 0.75, 0.0], vec![0.25, 0.75, 0.0], true);

        let text = format_mixture(&palette, [64, 191, 0], &result, NEGLIGIBLE_WEIGHT);

        assert!(text.starts_with("Target #40bf00 (RGB 64,191,0)\n"));
        assert!(text.contains("  Color 1 (#ff0000, RGB 255,0,0): 25.00%\n"));
        assert!(text.contains("  Color 2 (#00ff00, RGB 0,255,0): 75.00%\n"));
        assert!(!text.contains("Color 3"));
        assert!(text.contains("  Mixed: #40bf00 (RGB 64,191,0), squared error 0.000000\n"));
        assert!(!text.contains("Note:"));
    }

    #[test]
    fn test_report_writes_into_formatter() {
        let palette = [[0, 0, 0], [255, 255, 255]];
        let result = mixture(vec![0.5, 0.5], vec![0.5, 0.5, 0.5], true);
        let report = MixtureReport {
            palette: &palette,
            target: [128, 128, 128],
            mixture: &result,
            threshold: NEGLIGIBLE_WEIGHT,
        };

        let text = format!("{}", report);
        assert_eq!(text, format_mixture(&palette, [128, 128, 128], &result, NEGLIGIBLE_WEIGHT));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_format_mixture_reports_iteration_cap() {
        let palette = [[0, 0, 0], [255, 255, 255]];
        let result = mixture(vec![0.5, 0.5], vec![0.5, 0.5, 0.5], false);

        let text = format_mixture(&palette, [128, 128, 128], &result, NEGLIGIBLE_WEIGHT);

        assert!(text.contains("Note: stopped after 7 iterations"));
    }
}
