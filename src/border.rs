//! Border and grid settings
//!
//! The settings panel state shared by the grid preview and the border compositor.

use serde::{Deserialize, Serialize};

/// Default fill colour for cells that do not show the image
pub const DEFAULT_FILL_COLOR: &str = "#f9a8d4";

/// Border/grid configuration edited by the settings panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorderSettings {
    /// Thickness of the composited border strips in pixels
    pub border_width: u32,
    /// Number of grid columns
    pub grid_count_x: u32,
    /// Number of grid rows
    pub grid_count_y: u32,
    /// Edge length of one grid cell in pixels
    pub grid_size: u32,
    /// Show the image in the border ring instead of the centre
    #[serde(default)]
    pub is_reversed: bool,
    /// CSS hex colour for cells without the image
    #[serde(default = "default_fill_color")]
    pub filling_color: String,
}

fn default_fill_color() -> String {
    DEFAULT_FILL_COLOR.to_string()
}

impl Default for BorderSettings {
    fn default() -> Self {
        Self {
            border_width: 40,
            grid_count_x: 8,
            grid_count_y: 5,
            grid_size: 60,
            is_reversed: false,
            filling_color: default_fill_color(),
        }
    }
}

impl BorderSettings {
    /// Merge a partial update; fields absent from the update are kept.
    pub fn apply(&mut self, update: &BorderSettingsUpdate) {
        if let Some(v) = update.border_width {
            self.border_width = v;
        }
        if let Some(v) = update.grid_count_x {
            self.grid_count_x = v;
        }
        if let Some(v) = update.grid_count_y {
            self.grid_count_y = v;
        }
        if let Some(v) = update.grid_size {
            self.grid_size = v;
        }
        if let Some(v) = update.is_reversed {
            self.is_reversed = v;
        }
        if let Some(v) = &update.filling_color {
            self.filling_color = v.clone();
        }
    }

    /// Parsed fill colour, falling back to the default pink on bad input
    pub fn fill_rgba(&self) -> [u8; 4] {
        parse_hex_color(&self.filling_color)
            .or_else(|| parse_hex_color(DEFAULT_FILL_COLOR))
            .unwrap_or([0xf9, 0xa8, 0xd4, 0xff])
    }
}

/// Partial settings update (PUT /api/settings)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorderSettingsUpdate {
    pub border_width: Option<u32>,
    pub grid_count_x: Option<u32>,
    pub grid_count_y: Option<u32>,
    pub grid_size: Option<u32>,
    pub is_reversed: Option<bool>,
    pub filling_color: Option<String>,
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` into RGBA bytes.
pub fn parse_hex_color(input: &str) -> Option<[u8; 4]> {
    let hex = input.trim().strip_prefix('#')?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut out = [0xff; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(out)
        }
        6 => Some([byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?, 0xff]),
        8 => Some([byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?, byte(&hex[6..8])?]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = BorderSettings::default();
        assert_eq!(s.border_width, 40);
        assert_eq!(s.grid_count_x, 8);
        assert_eq!(s.grid_count_y, 5);
        assert_eq!(s.grid_size, 60);
        assert!(!s.is_reversed);
        assert_eq!(s.filling_color, "#f9a8d4");
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let mut s = BorderSettings::default();
        s.apply(&BorderSettingsUpdate {
            grid_count_x: Some(12),
            is_reversed: Some(true),
            ..Default::default()
        });
        assert_eq!(s.grid_count_x, 12);
        assert!(s.is_reversed);
        assert_eq!(s.grid_count_y, 5);
        assert_eq!(s.border_width, 40);
    }

    #[test]
    fn test_camel_case_json() {
        let json = serde_json::to_value(BorderSettings::default()).unwrap();
        assert_eq!(json["borderWidth"], 40);
        assert_eq!(json["gridCountX"], 8);
        assert_eq!(json["fillingColor"], "#f9a8d4");

        let parsed: BorderSettings =
            serde_json::from_str(r#"{"borderWidth":10,"gridCountX":4,"gridCountY":3,"gridSize":20}"#).unwrap();
        assert!(!parsed.is_reversed);
        assert_eq!(parsed.filling_color, DEFAULT_FILL_COLOR);
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#f9a8d4"), Some([0xf9, 0xa8, 0xd4, 0xff]));
        assert_eq!(parse_hex_color("#fff"), Some([0xff, 0xff, 0xff, 0xff]));
        assert_eq!(parse_hex_color("#00000080"), Some([0, 0, 0, 0x80]));
        assert_eq!(parse_hex_color("f9a8d4"), None);
        assert_eq!(parse_hex_color("#zzz"), None);
        assert_eq!(parse_hex_color("#12345"), None);
    }

    #[test]
    fn test_bad_fill_color_falls_back() {
        let s = BorderSettings {
            filling_color: "pink".to_string(),
            ..Default::default()
        };
        assert_eq!(s.fill_rgba(), [0xf9, 0xa8, 0xd4, 0xff]);
    }
}
