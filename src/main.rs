use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use colormix::{
    color::{Color, parse_hex_color},
    mix_targets,
    mixer::SolverOptions,
    palette::{load_palette, save_palette},
    report::{MixtureReport, NEGLIGIBLE_WEIGHT},
};

#[derive(Parser, Debug)]
#[command(
    name = "colormix",
    about = "Find the mix of palette colors that best reproduces a target color",
    version,
    disable_version_flag = true
)]
struct Args {
    /// Palette file to import: one "r,g,b" line (0-255) per color
    #[arg(short = 'p', long = "palette", value_name = "FILE")]
    palette: Option<PathBuf>,

    /// Extra palette colors in hex format (e.g., f00, ff0000, #ff0000),
    /// appended after any imported palette
    #[arg(short = 'c', long = "color", num_args = 1.., value_name = "COLOR")]
    colors: Vec<String>,

    /// Target colors in hex format. Each target is mixed independently.
    #[arg(short = 't', long = "target", num_args = 1.., value_name = "COLOR")]
    targets: Vec<String>,

    /// File of target colors, in the same "r,g,b" format as palettes
    #[arg(short = 'T', long = "targets-file", value_name = "FILE")]
    targets_file: Option<PathBuf>,

    /// Write the combined palette to this file
    #[arg(short = 'e', long = "export", value_name = "FILE")]
    export: Option<PathBuf>,

    /// Weights at or below this (0.0-1.0) are left out of the breakdown.
    /// Default: 0.001 (0.1%)
    #[arg(long = "threshold", value_name = "FLOAT")]
    threshold: Option<f64>,

    /// Stop once the solution is provably within this of the optimum,
    /// relative to the squared size of the color differences
    #[arg(long = "tolerance", value_name = "FLOAT")]
    tolerance: Option<f64>,

    /// Maximum number of solver iterations per target
    #[arg(long = "max-iterations", value_name = "N")]
    max_iterations: Option<usize>,

    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// Print version
    #[arg(short = 'v', short_alias = 'V', long = "version", action = clap::ArgAction::Version)]
    version: (),
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level);

    if let Some(threshold) = args.threshold
        && (!(0.0..=1.0).contains(&threshold))
    {
        anyhow::bail!("Threshold must be between 0.0 and 1.0, got: {}", threshold);
    }

    let palette = build_palette(&args)?;
    if palette.is_empty() {
        anyhow::bail!("At least one palette color must be given with --palette or --color");
    }

    if let Some(export) = &args.export {
        save_palette(export, &palette)?;
        println!(
            "✓ Exported {} palette colors to {}",
            palette.len(),
            export.display()
        );
    }

    let targets = collect_targets(&args)?;
    if targets.is_empty() {
        if args.export.is_some() {
            return Ok(());
        }
        anyhow::bail!("At least one target color must be given with --target or --targets-file");
    }

    let options = solver_options(&args);
    let mixtures = mix_targets(&palette, &targets, &options)?;

    let threshold = args.threshold.unwrap_or(NEGLIGIBLE_WEIGHT);
    for (i, (target, mixture)) in targets.iter().zip(&mixtures).enumerate() {
        if i > 0 {
            println!();
        }
        let report = MixtureReport {
            palette: &palette,
            target: *target,
            mixture,
            threshold,
        };
        print!("{}", report);
    }

    Ok(())
}

/// Initialize the tracing subscriber, preferring RUST_LOG over `log_level`
fn init_tracing(log_level: &str) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(val) => val,
        Err(_) => log_level.to_string(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Imported palette first, then any --color entries
fn build_palette(args: &Args) -> Result<Vec<Color>> {
    let mut palette = match &args.palette {
        Some(path) => {
            let imported = load_palette(path)?;
            println!(
                "✓ Imported {} palette colors from {}",
                imported.len(),
                path.file_name().unwrap_or_default().to_string_lossy()
            );
            imported
        }
        None => Vec::new(),
    };

    palette.extend(parse_hex_colors(&args.colors, "palette color")?);

    Ok(palette)
}

/// Targets from --target first, then from --targets-file
fn collect_targets(args: &Args) -> Result<Vec<Color>> {
    let mut targets = parse_hex_colors(&args.targets, "target color")?;

    if let Some(path) = &args.targets_file {
        targets.extend(load_palette(path).context("Invalid targets file")?);
    }

    Ok(targets)
}

/// Parse hex colors from command line arguments, naming the failing one
fn parse_hex_colors(color_strings: &[String], kind: &str) -> Result<Vec<Color>> {
    color_strings
        .iter()
        .enumerate()
        .map(|(i, color_str)| {
            parse_hex_color(color_str)
                .with_context(|| format!("Invalid {} #{}: {}", kind, i + 1, color_str))
        })
        .collect()
}

fn solver_options(args: &Args) -> SolverOptions {
    let defaults = SolverOptions::default();
    SolverOptions {
        tolerance: args.tolerance.unwrap_or(defaults.tolerance),
        max_iterations: args.max_iterations.unwrap_or(defaults.max_iterations),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_build_palette_appends_colors_after_import() {
        let temp_dir = TempDir::new().unwrap();
        let palette_path = temp_dir.path().join("palette.txt");
        fs::write(&palette_path, "255,0,0\n0,255,0\n").unwrap();

        let args = parse(&[
            "colormix",
            "--palette",
            palette_path.to_str().unwrap(),
            "--color",
            "00f",
            "#ffffff",
        ]);

        let palette = build_palette(&args).unwrap();
        assert_eq!(
            palette,
            vec![[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 255]]
        );
    }

    #[test]
    fn test_collect_targets_from_args_and_file() {
        let temp_dir = TempDir::new().unwrap();
        let targets_path = temp_dir.path().join("targets.txt");
        fs::write(&targets_path, "10,20,30\n").unwrap();

        let args = parse(&[
            "colormix",
            "--target",
            "f80",
            "--targets-file",
            targets_path.to_str().unwrap(),
        ]);

        let targets = collect_targets(&args).unwrap();
        assert_eq!(targets, vec![[255, 136, 0], [10, 20, 30]]);
    }

    #[test]
    fn test_invalid_color_names_argument() {
        let args = parse(&["colormix", "--color", "f00", "nope"]);
        let err = build_palette(&args).unwrap_err();
        assert!(err.to_string().contains("Invalid palette color #2: nope"));
    }

    #[test]
    fn test_solver_options_overrides() {
        let args = parse(&["colormix", "--tolerance", "1e-6", "--max-iterations", "50"]);
        assert_eq!(
            solver_options(&args),
            SolverOptions {
                tolerance: 1e-6,
                max_iterations: 50,
            }
        );

        let args = parse(&["colormix"]);
        assert_eq!(solver_options(&args), SolverOptions::default());
    }
}
