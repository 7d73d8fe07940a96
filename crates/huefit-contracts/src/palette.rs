use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Every analysis returns exactly this many suggestions.
pub const PALETTE_SIZE: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSuggestion {
    pub hex: String,
    pub name: Option<String>,
}

impl ColorSuggestion {
    /// Channel split of the hex code; malformed digits read as zero.
    pub fn rgb(&self) -> (u8, u8, u8) {
        let digits = self.hex.strip_prefix('#').unwrap_or(&self.hex);
        let channel = |range: std::ops::Range<usize>| {
            digits
                .get(range)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .unwrap_or(0)
        };
        (channel(0..2), channel(2..4), channel(4..6))
    }
}

/// Accepts `aabbcc` or `#AABBCC`, normalizes to uppercase `#RRGGBB`.
pub fn normalize_hex(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if digits.len() != 6 || !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("#{}", digits.to_ascii_uppercase()))
}

/// Parses the analysis wire payload. Two shapes are accepted, matching what
/// the remote model actually emits:
/// - `{"colors": ["#aabbcc", ...]}`
/// - `{"colors": [{"hex": "#aabbcc", "name": "Dusty Rose"}, ...]}`
/// Anything else, a wrong entry count, or an invalid hex is a parse failure.
pub fn parse_palette(payload: &Value) -> Result<Vec<ColorSuggestion>, String> {
    let rows = payload
        .get("colors")
        .and_then(Value::as_array)
        .ok_or_else(|| "palette payload missing 'colors' array".to_string())?;

    let mut suggestions = Vec::with_capacity(rows.len());
    for row in rows {
        let suggestion = match row {
            Value::String(raw) => ColorSuggestion {
                hex: normalize_hex(raw).ok_or_else(|| format!("invalid hex color '{raw}'"))?,
                name: None,
            },
            Value::Object(entry) => {
                let raw = entry
                    .get("hex")
                    .and_then(Value::as_str)
                    .ok_or_else(|| "palette entry missing 'hex'".to_string())?;
                ColorSuggestion {
                    hex: normalize_hex(raw).ok_or_else(|| format!("invalid hex color '{raw}'"))?,
                    name: entry
                        .get("name")
                        .and_then(Value::as_str)
                        .map(str::trim)
                        .filter(|value| !value.is_empty())
                        .map(str::to_string),
                }
            }
            other => return Err(format!("unexpected palette entry: {other}")),
        };
        suggestions.push(suggestion);
    }

    if suggestions.len() != PALETTE_SIZE {
        return Err(format!(
            "expected {PALETTE_SIZE} palette entries, got {}",
            suggestions.len()
        ));
    }
    Ok(suggestions)
}
