use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::io::Cursor;
use tracing::debug;

use crate::error::CompositeError;
use crate::surface::PixelSurface;

pub const PNG_MIME: &str = "image/png";

/// Where an input image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Bytes carried in the request, from a data URL or a bare base64 payload.
    Inline {
        mime: Option<String>,
        bytes: Vec<u8>,
    },
    /// An `http(s)://` URL fetched at decode time.
    Remote(String),
}

impl ImageSource {
    pub fn parse(raw: &str) -> Result<Self, CompositeError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CompositeError::validation("image source is empty"));
        }
        if let Some(rest) = strip_prefix_ignore_case(raw, "data:") {
            return parse_data_url(rest);
        }
        if strip_prefix_ignore_case(raw, "http://").is_some()
            || strip_prefix_ignore_case(raw, "https://").is_some()
        {
            return Ok(Self::Remote(raw.to_string()));
        }
        let bytes = decode_base64(raw)?;
        Ok(Self::Inline { mime: None, bytes })
    }
}

fn parse_data_url(rest: &str) -> Result<ImageSource, CompositeError> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| CompositeError::decode("data URL has no payload"))?;
    let mut parts = header.split(';');
    let mime = parts
        .next()
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty());
    if !parts.any(|part| part.trim().eq_ignore_ascii_case("base64")) {
        return Err(CompositeError::decode(
            "only base64-encoded data URLs are supported",
        ));
    }
    let bytes = decode_base64(payload)?;
    Ok(ImageSource::Inline { mime, bytes })
}

fn decode_base64(payload: &str) -> Result<Vec<u8>, CompositeError> {
    let compact: String = payload.chars().filter(|ch| !ch.is_whitespace()).collect();
    BASE64
        .decode(compact.as_bytes())
        .map_err(|err| CompositeError::decode(format!("invalid base64 payload: {}", err)))
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}

/// Resolve `raw` (data URL, bare base64, or remote URL) into a surface.
///
/// Remote sources are fetched without a timeout or retry; both belong to the caller.
/// Pixel decoding runs on the blocking pool.
pub async fn decode(raw: &str) -> Result<PixelSurface, CompositeError> {
    let bytes = match ImageSource::parse(raw)? {
        ImageSource::Inline { mime, bytes } => {
            debug!(
                "decoding inline image ({} bytes, declared {})",
                bytes.len(),
                mime.as_deref().unwrap_or("none")
            );
            bytes
        }
        ImageSource::Remote(url) => fetch_remote(&url).await?,
    };
    tokio::task::spawn_blocking(move || decode_bytes(&bytes))
        .await
        .map_err(|err| CompositeError::decode(format!("decode task failed: {}", err)))?
}

async fn fetch_remote(url: &str) -> Result<Vec<u8>, CompositeError> {
    debug!("fetching remote image {}", url);
    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| CompositeError::decode(format!("failed to fetch {}: {}", url, err)))?;
    let status = response.status();
    if !status.is_success() {
        return Err(CompositeError::decode(format!(
            "failed to fetch {}: HTTP {}",
            url, status
        )));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|err| CompositeError::decode(format!("failed to read {}: {}", url, err)))?;
    Ok(bytes.to_vec())
}

pub fn decode_bytes(bytes: &[u8]) -> Result<PixelSurface, CompositeError> {
    if bytes.is_empty() {
        return Err(CompositeError::decode("image data is empty"));
    }
    let sniffed = sniff_image_mime(bytes);
    let image = image::load_from_memory(bytes).map_err(|err| {
        CompositeError::decode(format!(
            "unsupported or corrupt image ({}): {}",
            sniffed.unwrap_or("unknown format"),
            err
        ))
    })?;
    PixelSurface::from_rgba(image.to_rgba8())
}

fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    infer::get(bytes).map(|kind| kind.mime_type())
}

pub fn encode_png_bytes(surface: &PixelSurface) -> Result<Vec<u8>, CompositeError> {
    let image = surface.to_rgba_image();
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(|err| CompositeError::Encode(err.to_string()))?;
    Ok(bytes)
}

/// Encode as a `data:image/png;base64,...` URL.
pub fn encode(surface: &PixelSurface) -> Result<String, CompositeError> {
    let bytes = encode_png_bytes(surface)?;
    Ok(format!("data:{};base64,{}", PNG_MIME, BASE64.encode(bytes)))
}
