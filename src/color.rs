use std::collections::{BTreeMap, BTreeSet};

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, LinSrgb, Mix, Srgb};

use crate::data::model::CellValue;

/// Colour for rows whose mapped value is missing.
pub const MISSING_COLOR: Color32 = Color32::GRAY;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            to_color32(rgb)
        })
        .collect()
}

fn to_color32(rgb: Srgb) -> Color32 {
    let [r, g, b] = [rgb.red, rgb.green, rgb.blue].map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
    Color32::from_rgb(r, g, b)
}

// ---------------------------------------------------------------------------
// Discrete mapping: categorical value → Color32
// ---------------------------------------------------------------------------

/// Maps unique values of a chosen column to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<CellValue, Color32>,
    default_color: Color32,
}

impl ColorMap {
    /// Build a colour map for the given column from its unique values.
    /// Nulls are left out and fall back to the default colour.
    pub fn new(unique_values: &BTreeSet<CellValue>) -> Self {
        let levels: Vec<&CellValue> = unique_values.iter().filter(|v| !v.is_null()).collect();
        let palette = generate_palette(levels.len());
        let mapping: BTreeMap<CellValue, Color32> = levels
            .into_iter()
            .zip(palette)
            .map(|(v, c)| (v.clone(), c))
            .collect();

        ColorMap {
            mapping,
            default_color: MISSING_COLOR,
        }
    }

    /// Look up the colour for a given value.
    pub fn color_for(&self, value: &CellValue) -> Color32 {
        self.mapping
            .get(value)
            .copied()
            .unwrap_or(self.default_color)
    }

    /// Return the legend entries (value label → colour) for the UI.
    pub fn legend_entries(&self) -> Vec<(String, Color32)> {
        self.mapping
            .iter()
            .map(|(v, c)| (v.to_string(), *c))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Continuous mapping: position in [0, 1] → Color32
// ---------------------------------------------------------------------------

/// Piecewise-linear gradient interpolated in linear RGB.
#[derive(Debug, Clone)]
pub struct ColorGradient {
    stops: Vec<LinSrgb>,
}

impl Default for ColorGradient {
    /// Viridis-like ramp: dark purple → teal → yellow.
    fn default() -> Self {
        Self::from_srgb8(&[(68, 1, 84), (59, 82, 139), (33, 145, 140), (94, 201, 98), (253, 231, 37)])
    }
}

impl ColorGradient {
    pub fn from_srgb8(stops: &[(u8, u8, u8)]) -> Self {
        let stops = stops
            .iter()
            .map(|&(r, g, b)| Srgb::new(r, g, b).into_format::<f32>().into_linear())
            .collect();
        ColorGradient { stops }
    }

    /// Colour at `t`, clamped to `[0, 1]`.
    pub fn at(&self, t: f32) -> Color32 {
        match self.stops.len() {
            0 => MISSING_COLOR,
            1 => to_color32(Srgb::from_linear(self.stops[0])),
            n => {
                let scaled = t.clamp(0.0, 1.0) * (n - 1) as f32;
                let lo = (scaled.floor() as usize).min(n - 2);
                let frac = scaled - lo as f32;
                let mixed = self.stops[lo].mix(self.stops[lo + 1], frac);
                to_color32(Srgb::from_linear(mixed))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_requested_size() {
        assert!(generate_palette(0).is_empty());
        let colors = generate_palette(4);
        assert_eq!(colors.len(), 4);
        assert_ne!(colors[0], colors[1]);
    }

    #[test]
    fn color_map_skips_nulls() {
        let values = BTreeSet::from([
            CellValue::Null,
            CellValue::String("ComplexA".into()),
            CellValue::String("ComplexB".into()),
        ]);
        let map = ColorMap::new(&values);
        assert_eq!(map.legend_entries().len(), 2);
        assert_eq!(map.color_for(&CellValue::Null), MISSING_COLOR);
        assert_ne!(
            map.color_for(&CellValue::String("ComplexA".into())),
            MISSING_COLOR
        );
    }

    #[test]
    fn gradient_hits_its_end_stops() {
        let gradient = ColorGradient::from_srgb8(&[(0, 0, 0), (255, 255, 255)]);
        assert_eq!(gradient.at(0.0), Color32::from_rgb(0, 0, 0));
        assert_eq!(gradient.at(1.0), Color32::from_rgb(255, 255, 255));
        assert_eq!(gradient.at(7.0), Color32::from_rgb(255, 255, 255));
        let mid = gradient.at(0.5);
        assert!(mid.r() > 0 && mid.r() < 255);
    }
}
