//! Diagram themes and accessibility validation.

use repolens_config::ThemeId;
use repolens_utils::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Color and typography profile for one theme id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub id: ThemeId,
    /// `#rrggbb`
    pub foreground: String,
    pub background: String,
    pub accent: String,
    pub font_size_pt: u32,
}

/// Minimum WCAG AA contrast between foreground and background.
const MIN_CONTRAST_RATIO: f64 = 4.5;
const MIN_FONT_SIZE_PT: u32 = 10;

/// Resolve a theme id to its palette. `auto` resolves to the light palette;
/// consumers that can detect a dark host substitute `dark` before calling.
#[must_use]
pub fn resolve_theme(id: ThemeId) -> Theme {
    match id {
        ThemeId::Light | ThemeId::Auto => Theme {
            id,
            foreground: "#1a1a1a".to_string(),
            background: "#ffffff".to_string(),
            accent: "#0550ae".to_string(),
            font_size_pt: 12,
        },
        ThemeId::Dark => Theme {
            id,
            foreground: "#e6e6e6".to_string(),
            background: "#16161d".to_string(),
            accent: "#6cb6ff".to_string(),
            font_size_pt: 12,
        },
    }
}

/// Enforce the accessibility constraints. A violation is fatal to the run.
pub fn validate_theme(theme: &Theme) -> Result<(), ConfigError> {
    let ratio = contrast_ratio(&theme.foreground, &theme.background).ok_or_else(|| {
        ConfigError::InvalidValue {
            field: format!("diagrams.theme.{}", theme.id),
            reason: "theme colors are not #rrggbb".to_string(),
        }
    })?;
    if ratio < MIN_CONTRAST_RATIO {
        return Err(ConfigError::InvalidValue {
            field: format!("diagrams.theme.{}", theme.id),
            reason: format!(
                "foreground/background contrast {ratio:.2} is below the required {MIN_CONTRAST_RATIO}"
            ),
        });
    }
    if theme.font_size_pt < MIN_FONT_SIZE_PT {
        return Err(ConfigError::InvalidValue {
            field: format!("diagrams.theme.{}", theme.id),
            reason: format!(
                "font size {}pt is below the required {MIN_FONT_SIZE_PT}pt",
                theme.font_size_pt
            ),
        });
    }
    Ok(())
}

/// WCAG relative-luminance contrast ratio between two `#rrggbb` colors.
fn contrast_ratio(foreground: &str, background: &str) -> Option<f64> {
    let fg = relative_luminance(foreground)?;
    let bg = relative_luminance(background)?;
    let (lighter, darker) = if fg > bg { (fg, bg) } else { (bg, fg) };
    Some((lighter + 0.05) / (darker + 0.05))
}

fn relative_luminance(hex: &str) -> Option<f64> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| -> Option<f64> {
        let value = u8::from_str_radix(&hex[range], 16).ok()?;
        let srgb = f64::from(value) / 255.0;
        Some(if srgb <= 0.04045 {
            srgb / 12.92
        } else {
            ((srgb + 0.055) / 1.055).powf(2.4)
        })
    };
    let r = channel(0..2)?;
    let g = channel(2..4)?;
    let b = channel(4..6)?;
    Some(0.2126 * r + 0.7152 * g + 0.0722 * b)
}
