use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::color::Color;

/// Parse a palette from text: one `r,g,b` entry per line, 0-255 each
///
/// Blank lines are skipped. Any other malformed line is an error that names
/// its 1-based line number.
pub fn parse_palette(text: &str) -> Result<Vec<Color>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            parse_palette_line(line).with_context(|| format!("Invalid palette line {}: {}", i + 1, line))
        })
        .collect()
}

fn parse_palette_line(line: &str) -> Result<Color> {
    let components: Vec<&str> = line.trim().split(',').map(str::trim).collect();
    if components.len() != 3 {
        anyhow::bail!(
            "Expected 3 comma-separated components, got {}",
            components.len()
        );
    }

    let mut color = [0u8; 3];
    for (channel, component) in color.iter_mut().zip(&components) {
        *channel = component
            .parse::<u8>()
            .with_context(|| format!("Component must be an integer in 0-255 (got: {})", component))?;
    }

    Ok(color)
}

/// Serialize a palette as one `r,g,b` line per entry
pub fn format_palette(colors: &[Color]) -> String {
    colors
        .iter()
        .map(|c| format!("{},{},{}\n", c[0], c[1], c[2]))
        .collect()
}

/// Load a palette file
pub fn load_palette<P: AsRef<Path>>(path: P) -> Result<Vec<Color>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read palette file: {}", path.display()))?;

    parse_palette(&text)
        .with_context(|| format!("Failed to parse palette file: {}", path.display()))
}

/// Write a palette file, replacing any existing content
pub fn save_palette<P: AsRef<Path>>(path: P, colors: &[Color]) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, format_palette(colors))
        .with_context(|| format!("Failed to write palette file: {}", path.display()))
}
