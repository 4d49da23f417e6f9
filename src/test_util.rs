use std::sync::{Arc, OnceLock};

use crate::render::FontBook;
use crate::settings::FontSettings;
use crate::surface::PixelSurface;

pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&std::path::Path) -> R,
{
    static HOME_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
    let _guard = HOME_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let old_home = std::env::var("HOME").ok();
    // SAFETY: HOME is only touched while HOME_MUTEX is held.
    unsafe { std::env::set_var("HOME", dir.path()) };
    let result = func(dir.path());
    unsafe {
        match old_home {
            Some(old) => std::env::set_var("HOME", old),
            None => std::env::remove_var("HOME"),
        }
    }
    result
}

/// System fonts loaded once per test binary; `None` on hosts without fonts,
/// where font-dependent tests return early.
pub(crate) fn system_fonts() -> Option<&'static FontBook> {
    let fonts = loaded_fonts();
    if fonts.is_empty() {
        eprintln!("skipping: no system fonts available");
        None
    } else {
        Some(fonts.as_ref())
    }
}

/// Same book as [`system_fonts`], shared the way the server holds it.
pub(crate) fn shared_fonts() -> Option<Arc<FontBook>> {
    system_fonts().map(|_| Arc::clone(loaded_fonts()))
}

fn loaded_fonts() -> &'static Arc<FontBook> {
    static FONTS: OnceLock<Arc<FontBook>> = OnceLock::new();
    FONTS.get_or_init(|| Arc::new(FontBook::load(&FontSettings::default())))
}

/// Bounding box `(min_x, min_y, max_x, max_y)` of pixels matching `predicate`.
pub(crate) fn ink_bounds<F>(surface: &PixelSurface, predicate: F) -> Option<(u32, u32, u32, u32)>
where
    F: Fn([u8; 4]) -> bool,
{
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for y in 0..surface.height() {
        for x in 0..surface.width() {
            let Some(pixel) = surface.pixel(x, y) else {
                continue;
            };
            if !predicate(pixel) {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((min_x, min_y, max_x, max_y)) => {
                    (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
                }
            });
        }
    }
    bounds
}
