mod color;
mod font;
mod glyph;

pub use color::parse_color;
pub use font::{FontBook, FontResolution, ResolvedFont};
pub use glyph::{LineStyle, Outline, check_line_geometry, draw_line};
