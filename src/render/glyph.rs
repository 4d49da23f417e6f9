use tiny_skia::{Color, FillRule, LineJoin, Paint, Path, PathBuilder, Stroke, Transform};
use ttf_parser::OutlineBuilder;

use super::font::{ResolvedFont, glyph_run};
use crate::error::CompositeError;
use crate::surface::PixelSurface;

const STROKE_MITER_LIMIT: f32 = 2.0;

/// Outline thickness requested by a compositor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outline {
    /// A nominal width drawn at twice its value so the outline stays legible
    /// at small sizes.
    Doubled(f32),
    /// A pen width used as-is.
    Exact(f32),
}

impl Outline {
    pub fn pen_width(self) -> f32 {
        match self {
            Self::Doubled(width) => width * 2.0,
            Self::Exact(width) => width,
        }
    }
}

pub struct LineStyle<'a> {
    pub font: &'a ResolvedFont,
    pub font_size: f32,
    pub fill: Color,
    pub stroke: Color,
    pub outline: Outline,
}

/// Draw one uppercased line of text centered on `(anchor_x, anchor_y)`:
/// outline stroke first, fill on top.
pub fn draw_line(
    surface: &mut PixelSurface,
    text: &str,
    anchor_x: f32,
    anchor_y: f32,
    style: &LineStyle<'_>,
) -> Result<(), CompositeError> {
    check_line_geometry(anchor_x, anchor_y, style.font_size, style.outline)?;
    let pen_width = style.outline.pen_width();

    let text = text.to_uppercase();
    let Some(path) = line_path(&text, anchor_x, anchor_y, style)? else {
        return Ok(());
    };

    let pixmap = surface.pixmap_mut();
    if pen_width > 0.0 {
        let stroke = Stroke {
            width: pen_width,
            miter_limit: STROKE_MITER_LIMIT,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        pixmap.stroke_path(
            &path,
            &solid_paint(style.stroke),
            &stroke,
            Transform::identity(),
            None,
        );
    }
    pixmap.fill_path(
        &path,
        &solid_paint(style.fill),
        FillRule::Winding,
        Transform::identity(),
        None,
    );
    Ok(())
}

/// Reject anchors, sizes and pen widths that cannot be rasterized. Compositors
/// call this for every line before the first draw.
pub fn check_line_geometry(
    anchor_x: f32,
    anchor_y: f32,
    font_size: f32,
    outline: Outline,
) -> Result<(), CompositeError> {
    check_finite("anchor x", anchor_x)?;
    check_finite("anchor y", anchor_y)?;
    check_finite("font size", font_size)?;
    let pen_width = outline.pen_width();
    check_finite("stroke width", pen_width)?;
    if font_size <= 0.0 {
        return Err(CompositeError::geometry(format!(
            "font size must be positive, got {}",
            font_size
        )));
    }
    if pen_width < 0.0 {
        return Err(CompositeError::geometry(format!(
            "stroke width must not be negative, got {}",
            pen_width
        )));
    }
    Ok(())
}

fn check_finite(label: &str, value: f32) -> Result<(), CompositeError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CompositeError::geometry(format!(
            "{} must be finite, got {}",
            label, value
        )))
    }
}

fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    paint
}

/// All glyph outlines of `text` as one device-space path, or `None` when the
/// line has no visible ink (empty text or whitespace only).
fn line_path(
    text: &str,
    anchor_x: f32,
    anchor_y: f32,
    style: &LineStyle<'_>,
) -> Result<Option<Path>, CompositeError> {
    let face = style.font.face()?;
    let scale = style.font.scale(style.font_size);
    let run = glyph_run(&face, text);
    let run_width: f32 = run.iter().map(|(_, advance)| f32::from(*advance)).sum::<f32>() * scale;

    let baseline = anchor_y + style.font.cap_height_px(style.font_size) / 2.0;
    let mut pen_x = anchor_x - run_width / 2.0;
    let mut builder = GlyphPathBuilder::new(scale, baseline);
    for (glyph, advance) in run {
        builder.origin_x = pen_x;
        face.outline_glyph(glyph, &mut builder);
        pen_x += f32::from(advance) * scale;
    }
    Ok(builder.finish())
}

/// Maps font units (y up) into device pixels (y down) around a pen position.
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    baseline: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(scale: f32, baseline: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x: 0.0,
            baseline,
            scale,
        }
    }

    fn x(&self, x: f32) -> f32 {
        self.origin_x + x * self.scale
    }

    fn y(&self, y: f32) -> f32 {
        self.baseline - y * self.scale
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = (self.x(x), self.y(y));
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = (self.x(x), self.y(y));
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1, x, y) = (self.x(x1), self.y(y1), self.x(x), self.y(y));
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = (self.x(x1), self.y(y1));
        let (x2, y2) = (self.x(x2), self.y(y2));
        let (x, y) = (self.x(x), self.y(y));
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{ink_bounds, system_fonts};

    #[test]
    fn doubled_outline_uses_twice_the_nominal_width() {
        assert_eq!(Outline::Doubled(3.0).pen_width(), 6.0);
        assert_eq!(Outline::Exact(3.0).pen_width(), 3.0);
    }

    #[test]
    fn doubled_outline_overflow_is_rejected() {
        let err = check_line_geometry(10.0, 10.0, 20.0, Outline::Doubled(3e38))
            .expect_err("pen width overflows");
        assert!(matches!(err, CompositeError::InvalidGeometry(_)));
        assert!(check_line_geometry(10.0, 10.0, 20.0, Outline::Doubled(3.0)).is_ok());
    }

    #[test]
    fn non_finite_anchor_fails_before_drawing() {
        let Some(fonts) = system_fonts() else {
            return;
        };
        let font = fonts.resolve("sans-serif").expect("font");
        let mut surface = PixelSurface::filled(20, 20, [255, 255, 255]).expect("surface");
        let style = LineStyle {
            font: &font,
            font_size: 12.0,
            fill: Color::BLACK,
            stroke: Color::WHITE,
            outline: Outline::Exact(1.0),
        };
        let err = draw_line(&mut surface, "x", f32::NAN, 10.0, &style).expect_err("nan anchor");
        assert!(matches!(err, CompositeError::InvalidGeometry(_)));
        assert_eq!(ink_bounds(&surface, |px| px != [255, 255, 255, 255]), None);
    }

    #[test]
    fn glyph_run_is_centered_on_anchor() {
        let Some(fonts) = system_fonts() else {
            return;
        };
        let font = fonts.resolve("sans-serif").expect("font");
        let mut surface = PixelSurface::filled(200, 120, [255, 255, 255]).expect("surface");
        let style = LineStyle {
            font: &font,
            font_size: 60.0,
            fill: Color::BLACK,
            stroke: Color::BLACK,
            outline: Outline::Exact(0.0),
        };
        draw_line(&mut surface, "h", 100.0, 60.0, &style).expect("draw");
        let (min_x, min_y, max_x, max_y) =
            ink_bounds(&surface, |px| px[0] < 128).expect("ink drawn");
        let center_x = (min_x + max_x + 1) as f32 / 2.0;
        let center_y = (min_y + max_y + 1) as f32 / 2.0;
        assert!((center_x - 100.0).abs() <= 1.5, "center x {center_x}");
        assert!((center_y - 60.0).abs() <= 1.0, "center y {center_y}");
    }

    #[test]
    fn stroke_is_painted_under_fill() {
        let Some(fonts) = system_fonts() else {
            return;
        };
        let font = fonts.resolve("sans-serif").expect("font");
        let mut surface = PixelSurface::filled(200, 120, [0, 0, 255]).expect("surface");
        let style = LineStyle {
            font: &font,
            font_size: 80.0,
            fill: Color::WHITE,
            stroke: Color::BLACK,
            outline: Outline::Exact(4.0),
        };
        draw_line(&mut surface, "I", 100.0, 60.0, &style).expect("draw");
        assert_eq!(surface.pixel(100, 60), Some([255, 255, 255, 255]));
        let black = ink_bounds(&surface, |px| px == [0, 0, 0, 255]);
        assert!(black.is_some(), "outline should be visible around the fill");
    }
}
