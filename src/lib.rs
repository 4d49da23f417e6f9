use anyhow::{Context, Result};
use std::path::Path;

pub mod codec;
pub mod compose;
pub mod error;
pub mod logging;
pub mod render;
pub mod server;
pub mod settings;
pub mod surface;
#[cfg(test)]
mod test_util;

pub use compose::{
    Caption, CaptionPosition, Composite, RenderReport, TextLayer, compose_captions,
    compose_layers, render_captions, render_layers,
};
pub use error::CompositeError;
pub use render::{FontBook, FontResolution};
pub use surface::PixelSurface;

/// Loads an image from a local file, or from a data URL, bare base64, or
/// http(s) URL when `input` is not an existing path.
pub async fn load_image(input: &str) -> Result<PixelSurface> {
    let path = Path::new(input);
    if path.is_file() {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read image file: {}", path.display()))?;
        return Ok(codec::decode_bytes(&bytes)?);
    }
    Ok(codec::decode(input).await?)
}

/// Writes `surface` to `path` as PNG.
pub async fn write_png(path: &Path, surface: &PixelSurface) -> Result<()> {
    let bytes = codec::encode_png_bytes(surface)?;
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write output: {}", path.display()))?;
    Ok(())
}

/// Reads a JSON array of text layers from a file.
pub fn read_layers(path: &Path) -> Result<Vec<TextLayer>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read layers file: {}", path.display()))?;
    let layers = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse layers file: {}", path.display()))?;
    Ok(layers)
}
