//! The two compositing policies over the shared glyph renderer.
//!
//! Both entry points validate every entry and resolve every font before the
//! first draw, so a failing call never leaves a half-rendered surface behind.

mod captions;
mod layers;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::CompositeError;
use crate::render::{FontBook, FontResolution};
use crate::surface::PixelSurface;

pub use captions::{
    CaptionLayout, RenderedLine, band_anchor, caption_font_size, compose_captions, layout_caption,
    wrap_words,
};
pub use layers::compose_layers;

/// One independently positioned text item. `x` and `y` are percentages of the
/// image width and height.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLayer {
    #[serde(default)]
    pub id: String,
    pub text: String,
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_layer_font_size")]
    pub font_size: f32,
    #[serde(default = "default_layer_color")]
    pub color: String,
    #[serde(default = "default_layer_font_family")]
    pub font_family: String,
    #[serde(default = "default_layer_stroke_color")]
    pub stroke_color: String,
    #[serde(default = "default_layer_stroke_width")]
    pub stroke_width: f32,
}

fn default_layer_font_size() -> f32 {
    48.0
}

fn default_layer_color() -> String {
    "#FFFFFF".to_string()
}

fn default_layer_font_family() -> String {
    "Impact".to_string()
}

fn default_layer_stroke_color() -> String {
    "#000000".to_string()
}

fn default_layer_stroke_width() -> f32 {
    3.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionPosition {
    Top,
    Bottom,
    Center,
}

/// Text bound to a vertical band, always horizontally centered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caption {
    pub text: String,
    pub position: CaptionPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct RenderReport {
    /// Font resolution per drawn layer or caption, in input order.
    pub fonts: Vec<FontResolution>,
    pub lines_drawn: usize,
}

impl RenderReport {
    /// Human-readable notes for every font substitution, deduplicated.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings: Vec<String> = Vec::new();
        for resolution in &self.fonts {
            if let FontResolution::FallbackUsed { requested, family } = resolution {
                let message = format!("font '{}' unavailable; used '{}'", requested, family);
                if !warnings.contains(&message) {
                    warnings.push(message);
                }
            }
        }
        warnings
    }
}

/// An encoded composite plus what happened while drawing it.
#[derive(Debug, Clone)]
pub struct Composite {
    pub image: String,
    pub report: RenderReport,
}

/// Draw `layers` onto `surface` and encode the result as a PNG data URL.
pub fn render_layers(
    mut surface: PixelSurface,
    layers: &[TextLayer],
    fonts: &FontBook,
) -> Result<Composite, CompositeError> {
    let report = compose_layers(&mut surface, layers, fonts)?;
    let image = codec::encode(&surface)?;
    Ok(Composite { image, report })
}

/// Draw `captions` onto `surface` in `family` and encode the result as a PNG data URL.
pub fn render_captions(
    mut surface: PixelSurface,
    captions: &[Caption],
    fonts: &FontBook,
    family: &str,
) -> Result<Composite, CompositeError> {
    let report = compose_captions(&mut surface, captions, fonts, family)?;
    let image = codec::encode(&surface)?;
    Ok(Composite { image, report })
}
