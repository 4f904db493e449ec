use anyhow::{Context, Result};

/// Multiplier to expand hex color shorthand (e.g., F -> FF)
const HEX_SHORTHAND_MULTIPLIER: u8 = 17;

/// RGB color represented as [R, G, B] with values 0-255
pub type Color = [u8; 3];

/// Normalized RGB color with values 0.0-1.0
pub type NormalizedColor = [f64; 3];

/// Parse a hex color string into RGB
/// Supports: "#ff0000", "ff0000", "#f00", "f00"
pub fn parse_hex_color(hex: &str) -> Result<Color> {
    let hex = hex.trim().trim_start_matches('#');

    if !hex.is_ascii() {
        anyhow::bail!("Hex color must only contain ASCII characters (got: {})", hex);
    }

    let (r, g, b) = match hex.len() {
        3 => {
            // Expand shorthand: "f00" -> "ff0000"
            let r = u8::from_str_radix(&hex[0..1], 16).context("Invalid red component")?;
            let g = u8::from_str_radix(&hex[1..2], 16).context("Invalid green component")?;
            let b = u8::from_str_radix(&hex[2..3], 16).context("Invalid blue component")?;
            (
                r * HEX_SHORTHAND_MULTIPLIER,
                g * HEX_SHORTHAND_MULTIPLIER,
                b * HEX_SHORTHAND_MULTIPLIER,
            )
        }
        6 => {
            let r = u8::from_str_radix(&hex[0..2], 16).context("Invalid red component")?;
            let g = u8::from_str_radix(&hex[2..4], 16).context("Invalid green component")?;
            let b = u8::from_str_radix(&hex[4..6], 16).context("Invalid blue component")?;
            (r, g, b)
        }
        _ => anyhow::bail!("Hex color must be 3 or 6 characters long (got: {})", hex),
    };

    Ok([r, g, b])
}

/// Format a color as `#rrggbb`
pub fn format_hex(color: Color) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

/// Convert a Color to NormalizedColor
pub fn normalize_color(color: Color) -> NormalizedColor {
    [
        color[0] as f64 / 255.0,
        color[1] as f64 / 255.0,
        color[2] as f64 / 255.0,
    ]
}

/// Convert a NormalizedColor back to Color
///
/// Out-of-range channels (a mix can land slightly outside [0, 1] after
/// rounding) are clamped.
pub fn denormalize_color(color: NormalizedColor) -> Color {
    [
        (color[0] * 255.0).round().clamp(0.0, 255.0) as u8,
        (color[1] * 255.0).round().clamp(0.0, 255.0) as u8,
        (color[2] * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}
