use tiny_skia::Color;
use tracing::debug;

use super::{Caption, CaptionPosition, RenderReport};
use crate::error::CompositeError;
use crate::render::{FontBook, LineStyle, Outline, check_line_geometry, draw_line};
use crate::surface::PixelSurface;

/// Horizontal room kept free on each side when wrapping.
const SIDE_MARGIN_PX: f32 = 20.0;
const LINE_HEIGHT_FACTOR: f32 = 1.2;
const BAND_MARGIN_FACTOR: f32 = 0.8;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedLine {
    pub text: String,
    pub pixel_y: f32,
}

/// Where one caption's lines land, before anything is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayout {
    pub font_size: f32,
    pub stroke_width: f32,
    pub lines: Vec<RenderedLine>,
}

/// `caption.font_size`, or `floor(width / 15)` (at least 1px) when absent
/// or zero.
pub fn caption_font_size(caption: &Caption, width: u32) -> f32 {
    caption
        .font_size
        .filter(|size| *size != 0.0)
        .unwrap_or_else(|| (width / 15).max(1) as f32)
}

/// Vertical center of the line block for a band.
pub fn band_anchor(position: CaptionPosition, font_size: f32, height: u32) -> f32 {
    let height = height as f32;
    let margin = font_size * BAND_MARGIN_FACTOR;
    match position {
        CaptionPosition::Top => margin + font_size / 2.0,
        CaptionPosition::Bottom => height - margin - font_size / 2.0,
        CaptionPosition::Center => height / 2.0,
    }
}

/// Greedy word wrap: keep appending words while the measured line fits in
/// `max_width`. Words are never split, so a single overlong word gets a line
/// of its own and overflows.
pub fn wrap_words<F>(
    text: &str,
    max_width: f32,
    measure: F,
) -> Result<Vec<String>, CompositeError>
where
    F: Fn(&str) -> Result<f32, CompositeError>,
{
    let mut words = text.split_whitespace();
    let Some(first) = words.next() else {
        return Ok(Vec::new());
    };
    let mut lines = Vec::new();
    let mut current = first.to_string();
    for word in words {
        let candidate = format!("{} {}", current, word);
        if measure(&candidate)? > max_width {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }
    lines.push(current);
    Ok(lines)
}

/// Lay out one caption on a `width`x`height` image. `measure(text, font_size)`
/// returns the rendered width of `text`. Every line position is checked, so a
/// layout that comes back `Ok` can be drawn.
pub fn layout_caption<F>(
    caption: &Caption,
    width: u32,
    height: u32,
    measure: F,
) -> Result<CaptionLayout, CompositeError>
where
    F: Fn(&str, f32) -> Result<f32, CompositeError>,
{
    let font_size = caption_font_size(caption, width);
    let anchor_y = band_anchor(caption.position, font_size, height);
    let max_width = width as f32 - SIDE_MARGIN_PX * 2.0;
    let text = caption.text.to_uppercase();
    let wrapped = wrap_words(&text, max_width, |line| measure(line, font_size))?;

    let line_height = font_size * LINE_HEIGHT_FACTOR;
    let line_count = wrapped.len().max(1) as f32;
    let start_y = anchor_y - (line_count - 1.0) * line_height / 2.0;
    let stroke_width = (font_size / 10.0).floor();
    let center_x = width as f32 / 2.0;
    let lines = wrapped
        .into_iter()
        .enumerate()
        .map(|(idx, text)| {
            let pixel_y = start_y + idx as f32 * line_height;
            check_line_geometry(center_x, pixel_y, font_size, Outline::Exact(stroke_width))?;
            Ok(RenderedLine { text, pixel_y })
        })
        .collect::<Result<Vec<_>, CompositeError>>()?;
    Ok(CaptionLayout {
        font_size,
        stroke_width,
        lines,
    })
}

/// Draw each caption in its band with the classic palette: white fill over a
/// black outline of `floor(font_size / 10)` pixels.
pub fn compose_captions(
    surface: &mut PixelSurface,
    captions: &[Caption],
    fonts: &FontBook,
    family: &str,
) -> Result<RenderReport, CompositeError> {
    let mut report = RenderReport::default();
    if captions.is_empty() {
        return Ok(report);
    }
    for caption in captions {
        if let Some(size) = caption.font_size {
            if !size.is_finite() || size < 0.0 {
                return Err(CompositeError::geometry(format!(
                    "caption font size must not be negative, got {}",
                    size
                )));
            }
        }
    }

    let font = fonts.resolve(family)?;
    let width = surface.width();
    let height = surface.height();
    let layouts = captions
        .iter()
        .map(|caption| {
            layout_caption(caption, width, height, |text, size| {
                font.measure_width(text, size)
            })
        })
        .collect::<Result<Vec<_>, CompositeError>>()?;

    let center_x = width as f32 / 2.0;
    for layout in &layouts {
        debug!(
            "drawing caption: {} line(s) at {}px in {}",
            layout.lines.len(),
            layout.font_size,
            font.family()
        );
        let style = LineStyle {
            font: &font,
            font_size: layout.font_size,
            fill: Color::WHITE,
            stroke: Color::BLACK,
            outline: Outline::Exact(layout.stroke_width),
        };
        for line in &layout.lines {
            draw_line(surface, &line.text, center_x, line.pixel_y, &style)?;
            report.lines_drawn += 1;
        }
        report.fonts.push(font.resolution().clone());
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{ink_bounds, system_fonts};

    fn caption(text: &str, position: CaptionPosition) -> Caption {
        Caption {
            text: text.to_string(),
            position,
            font_size: None,
        }
    }

    /// Ten pixels per character, independent of size.
    fn mono(text: &str, _size: f32) -> Result<f32, CompositeError> {
        Ok(text.chars().count() as f32 * 10.0)
    }

    fn mono_width(text: &str) -> f32 {
        text.chars().count() as f32 * 10.0
    }

    #[test]
    fn font_size_derives_from_width() {
        let derived = caption("hi", CaptionPosition::Top);
        assert_eq!(caption_font_size(&derived, 300), 20.0);
        assert_eq!(caption_font_size(&derived, 400), 26.0);
        let explicit = Caption {
            font_size: Some(33.0),
            ..derived
        };
        assert_eq!(caption_font_size(&explicit, 300), 33.0);
        let zero = Caption {
            font_size: Some(0.0),
            ..explicit
        };
        assert_eq!(caption_font_size(&zero, 300), 20.0);
    }

    #[test]
    fn bands_anchor_top_bottom_and_center() {
        assert!((band_anchor(CaptionPosition::Top, 26.0, 400) - 33.8).abs() < 1e-4);
        assert!((band_anchor(CaptionPosition::Bottom, 26.0, 400) - 366.2).abs() < 1e-4);
        assert_eq!(band_anchor(CaptionPosition::Center, 26.0, 400), 200.0);
    }

    #[test]
    fn wrap_keeps_lines_within_budget() {
        let lines =
            wrap_words("ONE TWO THREE FOUR FIVE", 100.0, |text| mono(text, 0.0)).expect("wrap");
        assert_eq!(lines, vec!["ONE TWO", "THREE FOUR", "FIVE"]);
        for line in &lines {
            assert!(mono_width(line) <= 100.0);
        }
    }

    #[test]
    fn overlong_word_gets_its_own_line() {
        let lines =
            wrap_words("A SUPERCALIFRAGILISTIC B", 60.0, |text| mono(text, 0.0)).expect("wrap");
        assert_eq!(lines, vec!["A", "SUPERCALIFRAGILISTIC", "B"]);
    }

    #[test]
    fn blank_caption_has_no_lines() {
        let lines = wrap_words("  \t ", 100.0, |text| mono(text, 0.0)).expect("wrap");
        assert!(lines.is_empty());
        let layout = layout_caption(&caption("   ", CaptionPosition::Center), 300, 300, mono)
            .expect("layout");
        assert!(layout.lines.is_empty());
    }

    #[test]
    fn multi_line_block_is_centered_on_band_anchor() {
        let layout = layout_caption(
            &Caption {
                text: "aaaa bbbb cccc".to_string(),
                position: CaptionPosition::Center,
                font_size: Some(20.0),
            },
            100,
            200,
            mono,
        )
        .expect("layout");
        let texts: Vec<&str> = layout.lines.iter().map(|line| line.text.as_str()).collect();
        assert_eq!(texts, vec!["AAAA", "BBBB", "CCCC"]);
        let ys: Vec<f32> = layout.lines.iter().map(|line| line.pixel_y).collect();
        for (actual, expected) in ys.iter().zip([76.0, 100.0, 124.0]) {
            assert!((actual - expected).abs() < 1e-3, "{actual} != {expected}");
        }
        assert_eq!(layout.stroke_width, 2.0);
    }

    #[test]
    fn hello_world_top_caption_on_400px_square() {
        let layout = layout_caption(&caption("hello world", CaptionPosition::Top), 400, 400, mono)
            .expect("layout");
        assert_eq!(layout.font_size, 26.0);
        assert_eq!(layout.stroke_width, 2.0);
        assert_eq!(layout.lines.len(), 1);
        assert_eq!(layout.lines[0].text, "HELLO WORLD");
        assert!((layout.lines[0].pixel_y - 33.8).abs() < 1e-4);
    }

    #[test]
    fn real_font_wrap_respects_width_budget() {
        let Some(fonts) = system_fonts() else {
            return;
        };
        let font = fonts.resolve("sans-serif").expect("font");
        let text = "when the build passes on the first try and nobody believes you";
        let width = 300;
        let layout = layout_caption(&caption(text, CaptionPosition::Bottom), width, 300, |t, s| {
            font.measure_width(t, s)
        })
        .expect("layout");
        assert!(layout.lines.len() >= 2);
        for line in &layout.lines {
            let measured = font
                .measure_width(&line.text, layout.font_size)
                .expect("measure");
            assert!(measured <= width as f32 - 40.0);
            assert_eq!(line.text, line.text.to_uppercase());
        }
    }

    #[test]
    fn empty_captions_leave_surface_untouched() {
        let fonts = FontBook::from_database(usvg::fontdb::Database::new(), Vec::new());
        let mut surface = PixelSurface::filled(30, 30, [9, 9, 9]).expect("surface");
        let report = compose_captions(&mut surface, &[], &fonts, "Impact").expect("no-op");
        assert_eq!(report.lines_drawn, 0);
        assert_eq!(surface.pixel(0, 0), Some([9, 9, 9, 255]));
    }

    #[test]
    fn invalid_font_size_override_fails_fast() {
        let fonts = FontBook::from_database(usvg::fontdb::Database::new(), Vec::new());
        let mut surface = PixelSurface::filled(30, 30, [9, 9, 9]).expect("surface");
        let bad = Caption {
            font_size: Some(f32::INFINITY),
            ..caption("x", CaptionPosition::Top)
        };
        let err = compose_captions(&mut surface, &[bad], &fonts, "Impact").expect_err("inf");
        assert!(matches!(err, CompositeError::InvalidGeometry(_)));
    }

    #[test]
    fn zero_font_size_override_means_derived_size() {
        let fonts = FontBook::from_database(usvg::fontdb::Database::new(), Vec::new());
        let mut surface = PixelSurface::filled(30, 30, [9, 9, 9]).expect("surface");
        let zero = Caption {
            font_size: Some(0.0),
            ..caption("x", CaptionPosition::Top)
        };
        // Passes validation and reaches font resolution.
        let err = compose_captions(&mut surface, &[zero], &fonts, "Impact").expect_err("no fonts");
        assert!(matches!(err, CompositeError::FontUnavailable(_)));
    }

    #[test]
    fn overflowing_line_position_fails_before_earlier_captions_draw() {
        let Some(fonts) = system_fonts() else {
            return;
        };
        let mut surface = PixelSurface::filled(200, 200, [0, 128, 0]).expect("surface");
        let huge = Caption {
            font_size: Some(3e38),
            ..caption("boom", CaptionPosition::Top)
        };
        let err = compose_captions(
            &mut surface,
            &[caption("fine", CaptionPosition::Bottom), huge],
            fonts,
            "Impact",
        )
        .expect_err("anchor overflows");
        assert!(matches!(err, CompositeError::InvalidGeometry(_)));
        assert_eq!(ink_bounds(&surface, |px| px != [0, 128, 0, 255]), None);
    }

    #[test]
    fn top_caption_draws_white_over_black_near_the_top() {
        let Some(fonts) = system_fonts() else {
            return;
        };
        let mut surface = PixelSurface::filled(400, 400, [0, 128, 0]).expect("surface");
        let report = compose_captions(
            &mut surface,
            &[caption("hello world", CaptionPosition::Top)],
            fonts,
            "Impact",
        )
        .expect("draw");
        assert_eq!(report.lines_drawn, 1);
        let (_, min_y, _, max_y) =
            ink_bounds(&surface, |px| px == [255, 255, 255, 255]).expect("white fill");
        let center_y = (min_y + max_y + 1) as f32 / 2.0;
        assert!((center_y - 33.8).abs() <= 2.0, "fill centered at {center_y}");
        assert!(ink_bounds(&surface, |px| px == [0, 0, 0, 255]).is_some());
        assert_eq!(surface.pixel(200, 300), Some([0, 128, 0, 255]));
    }
}
