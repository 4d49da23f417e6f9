use std::collections::{HashMap, HashSet};

use tiny_skia::Color;
use tracing::debug;

use super::{RenderReport, TextLayer};
use crate::error::CompositeError;
use crate::render::{
    FontBook, LineStyle, Outline, ResolvedFont, check_line_geometry, draw_line, parse_color,
};
use crate::surface::PixelSurface;

struct PreparedLayer<'a> {
    layer: &'a TextLayer,
    font: ResolvedFont,
    fill: Color,
    stroke: Color,
    pixel_x: f32,
    pixel_y: f32,
    outline: Outline,
}

/// Draw each layer at its own percentage anchor, in list order.
///
/// Layers are single lines: no wrapping and no shrinking, so text wider than
/// the image overflows. An empty list leaves the surface untouched.
pub fn compose_layers(
    surface: &mut PixelSurface,
    layers: &[TextLayer],
    fonts: &FontBook,
) -> Result<RenderReport, CompositeError> {
    let prepared = prepare_layers(layers, fonts, surface.width(), surface.height())?;

    let mut report = RenderReport::default();
    for entry in &prepared {
        let layer = entry.layer;
        debug!(
            "drawing layer '{}' at ({:.1}, {:.1}) in {}",
            layer.id,
            entry.pixel_x,
            entry.pixel_y,
            entry.font.family()
        );
        let style = LineStyle {
            font: &entry.font,
            font_size: layer.font_size,
            fill: entry.fill,
            stroke: entry.stroke,
            outline: entry.outline,
        };
        draw_line(surface, &layer.text, entry.pixel_x, entry.pixel_y, &style)?;
        report.lines_drawn += 1;
        report.fonts.push(entry.font.resolution().clone());
    }
    Ok(report)
}

/// Validate and resolve every layer, including the derived pixel anchor and
/// pen width, so nothing is drawn unless every layer can be.
fn prepare_layers<'a>(
    layers: &'a [TextLayer],
    fonts: &FontBook,
    width: u32,
    height: u32,
) -> Result<Vec<PreparedLayer<'a>>, CompositeError> {
    let mut seen_ids = HashSet::new();
    let mut resolved: HashMap<&str, ResolvedFont> = HashMap::new();
    let mut prepared = Vec::with_capacity(layers.len());
    for layer in layers {
        validate_layer(layer)?;
        let pixel_x = layer.x / 100.0 * width as f32;
        let pixel_y = layer.y / 100.0 * height as f32;
        let outline = Outline::Doubled(layer.stroke_width);
        check_line_geometry(pixel_x, pixel_y, layer.font_size, outline)?;
        if !layer.id.is_empty() && !seen_ids.insert(layer.id.as_str()) {
            return Err(CompositeError::validation(format!(
                "duplicate layer id '{}'",
                layer.id
            )));
        }
        let fill = parse_color(&layer.color)?;
        let stroke = parse_color(&layer.stroke_color)?;
        let font = match resolved.get(layer.font_family.as_str()) {
            Some(font) => font.clone(),
            None => {
                let font = fonts.resolve(&layer.font_family)?;
                resolved.insert(layer.font_family.as_str(), font.clone());
                font
            }
        };
        prepared.push(PreparedLayer {
            layer,
            font,
            fill,
            stroke,
            pixel_x,
            pixel_y,
            outline,
        });
    }
    Ok(prepared)
}

fn validate_layer(layer: &TextLayer) -> Result<(), CompositeError> {
    let label = if layer.id.is_empty() {
        "layer".to_string()
    } else {
        format!("layer '{}'", layer.id)
    };
    for (name, value) in [("x", layer.x), ("y", layer.y)] {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(CompositeError::geometry(format!(
                "{} {} must be a percentage in [0, 100], got {}",
                label, name, value
            )));
        }
    }
    if !layer.font_size.is_finite() || layer.font_size <= 0.0 {
        return Err(CompositeError::geometry(format!(
            "{} font size must be positive, got {}",
            label, layer.font_size
        )));
    }
    if !layer.stroke_width.is_finite() || layer.stroke_width < 0.0 {
        return Err(CompositeError::geometry(format!(
            "{} stroke width must not be negative, got {}",
            label, layer.stroke_width
        )));
    }
    Ok(())
}
