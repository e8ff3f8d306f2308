//! Visual mapper: turns a row's value in a chosen column into a colour,
//! a point radius or an opacity.
//!
//! Categorical columns map through a discrete scale (sorted unique values,
//! evenly spaced), numeric columns through min-max normalisation.  Nothing
//! here is cached beyond the scale itself; rebuilding a mapping always
//! starts from the current table.

use std::collections::BTreeMap;
use std::fmt;

use eframe::egui::Color32;

use crate::color::{ColorGradient, ColorMap, MISSING_COLOR};
use crate::config::AnnotatorConfig;
use crate::data::model::{CellValue, DataTable, NULL_CELL};

// ---------------------------------------------------------------------------
// Scale: value → position in [0, 1]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Scale {
    /// Sorted non-null levels; position = rank / (levels - 1).
    Discrete { levels: BTreeMap<CellValue, usize> },
    Continuous { min: f64, max: f64 },
}

impl Scale {
    /// `None` if the column is unknown or holds only nulls.
    pub fn from_column(table: &DataTable, column: &str) -> Option<Scale> {
        let values = table.unique_values.get(column)?;
        if table.is_numeric_column(column) {
            let (min, max) = values
                .iter()
                .filter_map(CellValue::as_f64)
                .filter(|v| v.is_finite())
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                });
            if min > max {
                return None;
            }
            return Some(Scale::Continuous { min, max });
        }
        let levels: BTreeMap<CellValue, usize> = values
            .iter()
            .filter(|v| !v.is_null())
            .cloned()
            .enumerate()
            .map(|(i, v)| (v, i))
            .collect();
        if levels.is_empty() {
            return None;
        }
        Some(Scale::Discrete { levels })
    }

    /// Normalised position of `value`, `None` for nulls and unknown levels.
    pub fn position(&self, value: &CellValue) -> Option<f32> {
        match self {
            Scale::Continuous { min, max } => {
                let v = value.as_f64().filter(|v| v.is_finite())?;
                let range = max - min;
                if range <= 0.0 {
                    return Some(0.0);
                }
                Some(((v - min) / range).clamp(0.0, 1.0) as f32)
            }
            Scale::Discrete { levels } => {
                let rank = *levels.get(value)?;
                if levels.len() < 2 {
                    return Some(0.0);
                }
                Some(rank as f32 / (levels.len() - 1) as f32)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Channel {
    Color,
    Size,
    Alpha,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Color, Channel::Size, Channel::Alpha];
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Color => write!(f, "Color by"),
            Channel::Size => write!(f, "Size by"),
            Channel::Alpha => write!(f, "Opacity by"),
        }
    }
}

/// Which column (if any) drives each channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisualEncoding {
    pub color: Option<String>,
    pub size: Option<String>,
    pub alpha: Option<String>,
}

impl VisualEncoding {
    pub fn get(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Color => self.color.as_deref(),
            Channel::Size => self.size.as_deref(),
            Channel::Alpha => self.alpha.as_deref(),
        }
    }

    pub fn set(&mut self, channel: Channel, column: Option<String>) {
        match channel {
            Channel::Color => self.color = column,
            Channel::Size => self.size = column,
            Channel::Alpha => self.alpha = column,
        }
    }
}

/// A numeric channel (size or alpha) bound to one column.
#[derive(Debug, Clone)]
pub struct ChannelMapping {
    pub column: usize,
    pub scale: Scale,
    pub range: [f32; 2],
}

impl ChannelMapping {
    fn build(table: &DataTable, column: &str, range: [f32; 2]) -> Option<Self> {
        Some(ChannelMapping {
            column: table.column_index(column)?,
            scale: Scale::from_column(table, column)?,
            range,
        })
    }

    /// Linear interpolation into `range`; `None` when the value is missing.
    pub fn map(&self, value: &CellValue) -> Option<f32> {
        let t = self.scale.position(value)?;
        let [lo, hi] = self.range;
        if t >= 1.0 {
            return Some(hi);
        }
        Some((lo + t * (hi - lo)).min(hi))
    }
}

#[derive(Debug, Clone)]
pub enum ColorScale {
    Discrete(ColorMap),
    Continuous { min: f64, max: f64, gradient: ColorGradient },
}

#[derive(Debug, Clone)]
pub struct ColorMapping {
    pub column: usize,
    pub scale: Scale,
    pub colors: ColorScale,
}

impl ColorMapping {
    fn build(table: &DataTable, column: &str) -> Option<Self> {
        let index = table.column_index(column)?;
        let scale = Scale::from_column(table, column)?;
        let colors = match &scale {
            Scale::Continuous { min, max } => ColorScale::Continuous {
                min: *min,
                max: *max,
                gradient: ColorGradient::default(),
            },
            Scale::Discrete { .. } => {
                ColorScale::Discrete(ColorMap::new(table.unique_values.get(column)?))
            }
        };
        Some(ColorMapping {
            column: index,
            scale,
            colors,
        })
    }

    pub fn color_for(&self, value: &CellValue) -> Color32 {
        match &self.colors {
            ColorScale::Discrete(map) => map.color_for(value),
            ColorScale::Continuous { gradient, .. } => self
                .scale
                .position(value)
                .map(|t| gradient.at(t))
                .unwrap_or(MISSING_COLOR),
        }
    }

    /// Value label → colour; continuous scales show their end points.
    pub fn legend_entries(&self) -> Vec<(String, Color32)> {
        match &self.colors {
            ColorScale::Discrete(map) => map.legend_entries(),
            ColorScale::Continuous { min, max, gradient } => vec![
                (format!("{min:.3}"), gradient.at(0.0)),
                (format!("{max:.3}"), gradient.at(1.0)),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// VisualMapper: per-row style
// ---------------------------------------------------------------------------

/// Rendering attributes of a single point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointStyle {
    pub color: Color32,
    pub radius: f32,
    pub alpha: f32,
}

impl PointStyle {
    /// Colour with the alpha applied, ready to hand to the plot.
    pub fn to_color32(self) -> Color32 {
        let a = (self.alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        Color32::from_rgba_unmultiplied(self.color.r(), self.color.g(), self.color.b(), a)
    }
}

#[derive(Debug, Clone)]
pub struct VisualMapper {
    pub color: Option<ColorMapping>,
    pub size: Option<ChannelMapping>,
    pub alpha: Option<ChannelMapping>,
    pub default_color: Color32,
    pub default_radius: f32,
    pub default_alpha: f32,
}

impl VisualMapper {
    /// Build every channel of `encoding` from scratch against `table`.
    /// Columns that cannot be mapped leave the channel at its default.
    pub fn new(table: &DataTable, encoding: &VisualEncoding, config: &AnnotatorConfig) -> Self {
        let color = encoding
            .color
            .as_deref()
            .and_then(|c| ColorMapping::build(table, c));
        let size = encoding
            .size
            .as_deref()
            .and_then(|c| ChannelMapping::build(table, c, config.size_range));
        let alpha = encoding
            .alpha
            .as_deref()
            .and_then(|c| ChannelMapping::build(table, c, config.alpha_range));

        for channel in Channel::ALL {
            if let Some(column) = encoding.get(channel) {
                let mapped = match channel {
                    Channel::Color => color.is_some(),
                    Channel::Size => size.is_some(),
                    Channel::Alpha => alpha.is_some(),
                };
                if !mapped {
                    log::warn!("{channel} '{column}': column has no mappable values");
                }
            }
        }

        VisualMapper {
            color,
            size,
            alpha,
            default_color: Color32::LIGHT_BLUE,
            default_radius: config.point_radius,
            default_alpha: config.alpha_range[1],
        }
    }

    pub fn style_for(&self, row: &[CellValue]) -> PointStyle {
        let cell = |col: usize| row.get(col).unwrap_or(&NULL_CELL);
        let color = match &self.color {
            Some(m) => m.color_for(cell(m.column)),
            None => self.default_color,
        };
        let radius = self
            .size
            .as_ref()
            .and_then(|m| m.map(cell(m.column)))
            .unwrap_or(self.default_radius);
        let alpha = self
            .alpha
            .as_ref()
            .and_then(|m| m.map(cell(m.column)))
            .unwrap_or(self.default_alpha);
        PointStyle {
            color,
            radius,
            alpha,
        }
    }

    pub fn legend_entries(&self) -> Vec<(String, Color32)> {
        self.color
            .as_ref()
            .map(ColorMapping::legend_entries)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    fn table() -> DataTable {
        DataTable::from_rows(
            vec!["id".into(), "peak".into(), "complex".into()],
            vec![
                vec![s("P1"), CellValue::Float(0.9), s("ComplexB")],
                vec![s("P2"), CellValue::Float(0.5), s("ComplexA")],
                vec![s("P3"), CellValue::Integer(0), CellValue::Null],
                vec![s("P4"), CellValue::Null, s("ComplexA")],
            ],
        )
    }

    fn config() -> AnnotatorConfig {
        AnnotatorConfig {
            size_range: [2.0, 10.0],
            alpha_range: [0.2, 1.0],
            point_radius: 4.0,
            ..AnnotatorConfig::default()
        }
    }

    #[test]
    fn numeric_columns_scale_continuously() {
        let scale = Scale::from_column(&table(), "peak").unwrap();
        assert_eq!(scale, Scale::Continuous { min: 0.0, max: 0.9 });
        assert_eq!(scale.position(&CellValue::Integer(0)), Some(0.0));
        assert_eq!(scale.position(&CellValue::Float(0.9)), Some(1.0));
        assert_eq!(scale.position(&CellValue::Null), None);
    }

    #[test]
    fn categorical_columns_scale_discretely_in_sorted_order() {
        let scale = Scale::from_column(&table(), "complex").unwrap();
        assert!(matches!(scale, Scale::Discrete { .. }));
        assert_eq!(scale.position(&s("ComplexA")), Some(0.0));
        assert_eq!(scale.position(&s("ComplexB")), Some(1.0));
        assert_eq!(scale.position(&s("ComplexC")), None);
    }

    #[test]
    fn all_null_and_unknown_columns_do_not_scale() {
        let t = DataTable::from_rows(vec!["empty".into()], vec![vec![CellValue::Null]]);
        assert_eq!(Scale::from_column(&t, "empty"), None);
        assert_eq!(Scale::from_column(&t, "missing"), None);
    }

    #[test]
    fn constant_column_maps_to_range_start() {
        let t = DataTable::from_rows(
            vec!["v".into()],
            vec![vec![CellValue::Float(3.0)], vec![CellValue::Float(3.0)]],
        );
        let scale = Scale::from_column(&t, "v").unwrap();
        assert_eq!(scale.position(&CellValue::Float(3.0)), Some(0.0));
    }

    #[test]
    fn tiny_but_real_ranges_still_spread() {
        let t = DataTable::from_rows(
            vec!["v".into()],
            vec![
                vec![CellValue::Float(1e-20)],
                vec![CellValue::Float(2e-20)],
                vec![CellValue::Float(3e-20)],
            ],
        );
        let scale = Scale::from_column(&t, "v").unwrap();
        assert_eq!(scale.position(&CellValue::Float(1e-20)), Some(0.0));
        let mid = scale.position(&CellValue::Float(2e-20)).unwrap();
        assert!((mid - 0.5).abs() < 1e-6, "mid = {mid}");
        assert_eq!(scale.position(&CellValue::Float(3e-20)), Some(1.0));
    }

    #[test]
    fn continuous_mapping_is_monotonic() {
        let values: Vec<f64> = vec![-3.0, 0.1, 0.1, 0.25, 0.7, 2.0, 9.5];
        let t = DataTable::from_rows(
            vec!["v".into()],
            values.iter().map(|&v| vec![CellValue::Float(v)]).collect(),
        );
        let mapping = ChannelMapping::build(&t, "v", [2.0, 10.0]).unwrap();
        for a in &values {
            for b in &values {
                if a < b {
                    let ma = mapping.map(&CellValue::Float(*a)).unwrap();
                    let mb = mapping.map(&CellValue::Float(*b)).unwrap();
                    assert!(ma <= mb, "{a} -> {ma} but {b} -> {mb}");
                }
            }
        }
        assert_eq!(mapping.map(&CellValue::Float(-3.0)), Some(2.0));
        assert_eq!(mapping.map(&CellValue::Float(9.5)), Some(10.0));
    }

    #[test]
    fn mapper_styles_rows_and_falls_back_for_missing_values() {
        let t = table();
        let encoding = VisualEncoding {
            color: Some("complex".into()),
            size: Some("peak".into()),
            alpha: Some("peak".into()),
        };
        let mapper = VisualMapper::new(&t, &encoding, &config());

        let p1 = mapper.style_for(&t.rows[0]);
        assert_eq!(p1.radius, 10.0);
        assert_eq!(p1.alpha, 1.0);

        let p3 = mapper.style_for(&t.rows[2]);
        assert_eq!(p3.color, MISSING_COLOR);
        assert_eq!(p3.radius, 2.0);

        let p4 = mapper.style_for(&t.rows[3]);
        assert_eq!(p4.radius, 4.0);
        assert_ne!(p4.color, MISSING_COLOR);

        assert_eq!(mapper.legend_entries().len(), 2);
    }

    #[test]
    fn unmapped_encoding_uses_defaults() {
        let t = table();
        let mapper = VisualMapper::new(&t, &VisualEncoding::default(), &config());
        let style = mapper.style_for(&t.rows[0]);
        assert_eq!(style.color, Color32::LIGHT_BLUE);
        assert_eq!(style.radius, 4.0);
        assert_eq!(style.alpha, 1.0);
        assert!(mapper.legend_entries().is_empty());
    }
}
