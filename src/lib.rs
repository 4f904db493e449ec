pub mod color;
pub mod mixer;
pub mod palette;
pub mod report;

use anyhow::{Context, Result};
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::debug;

use crate::color::{Color, NormalizedColor, normalize_color};
use crate::mixer::{Mixture, SolverOptions, mix};

/// Solve the mix for every target against the same palette
///
/// Targets are solved in parallel; results come back in target order.
pub fn mix_targets(
    palette: &[Color],
    targets: &[Color],
    options: &SolverOptions,
) -> Result<Vec<Mixture>> {
    if palette.is_empty() {
        anyhow::bail!("The palette is empty, add colors with --palette or --color");
    }

    let palette_normalized: Vec<NormalizedColor> =
        palette.iter().map(|&color| normalize_color(color)).collect();

    debug!(
        palette_size = palette.len(),
        targets = targets.len(),
        "mixing targets"
    );

    let progress = create_progress_bar(targets.len() as u64)?;

    let mixtures = targets
        .par_iter()
        .enumerate()
        .progress_with(progress.clone())
        .map(|(i, &target)| {
            mix(&palette_normalized, &normalize_color(target), options)
                .with_context(|| format!("Failed to mix target #{}", i + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    progress.finish_and_clear();

    Ok(mixtures)
}

/// Create a progress bar with consistent styling
fn create_progress_bar(total: u64) -> Result<ProgressBar> {
    let progress = ProgressBar::new(total);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} targets ({percent}%)")?
            .progress_chars("#>-")
    );
    progress.set_message("Mixing targets...");
    Ok(progress)
}
