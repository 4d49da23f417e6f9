use image::RgbaImage;
use tiny_skia::{ColorU8, Pixmap};

use crate::error::CompositeError;

/// The raster a single render call draws onto.
///
/// A surface is owned by exactly one render call. Drawing goes through
/// [`PixelSurface::pixmap_mut`]; until the first draw the decoded pixels are kept
/// as-is so an untouched surface re-encodes to exactly the decoded input.
pub struct PixelSurface {
    pixmap: Pixmap,
    pristine: Option<RgbaImage>,
}

impl PixelSurface {
    pub fn from_rgba(image: RgbaImage) -> Result<Self, CompositeError> {
        let (width, height) = image.dimensions();
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            CompositeError::decode(format!("image has no pixels ({}x{})", width, height))
        })?;
        for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels()) {
            let [r, g, b, a] = src.0;
            *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
        }
        Ok(Self {
            pixmap,
            pristine: Some(image),
        })
    }

    /// A surface filled with one opaque color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, CompositeError> {
        let [r, g, b] = rgb;
        Self::from_rgba(RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([r, g, b, 255]),
        ))
    }

    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub(crate) fn pixmap_mut(&mut self) -> &mut Pixmap {
        self.pristine = None;
        &mut self.pixmap
    }

    /// Straight-alpha RGBA value at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if let Some(image) = self.pristine.as_ref() {
            return image.get_pixel_checked(x, y).map(|pixel| pixel.0);
        }
        let color = self.pixmap.pixel(x, y)?.demultiply();
        Some([color.red(), color.green(), color.blue(), color.alpha()])
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        if let Some(image) = self.pristine.as_ref() {
            return image.clone();
        }
        let mut data = Vec::with_capacity(self.pixmap.data().len());
        for pixel in self.pixmap.pixels() {
            let color = pixel.demultiply();
            data.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
        }
        RgbaImage::from_raw(self.width(), self.height(), data)
            .unwrap_or_else(|| RgbaImage::new(self.width(), self.height()))
    }
}
