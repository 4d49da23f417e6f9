use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};
use ttf_parser::{Face, GlyphId, name_id};
use usvg::fontdb;

use crate::error::CompositeError;
use crate::settings::FontSettings;

/// Read-only font registry shared by every render call.
///
/// Faces reachable through the fallback chain (and the caption family) are
/// loaded once at construction; other families are read from the database on
/// each resolution.
pub struct FontBook {
    db: fontdb::Database,
    fallback_families: Vec<String>,
    preloaded: HashMap<fontdb::ID, ResolvedFont>,
}

/// How a requested family was satisfied. A fallback is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontResolution {
    Resolved {
        family: String,
    },
    FallbackUsed {
        requested: String,
        family: String,
    },
}

impl FontResolution {
    pub fn family(&self) -> &str {
        match self {
            Self::Resolved { family } | Self::FallbackUsed { family, .. } => family,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::FallbackUsed { .. })
    }
}

#[derive(Clone)]
pub struct ResolvedFont {
    data: Arc<Vec<u8>>,
    face_index: u32,
    units_per_em: u16,
    cap_height: f32,
    resolution: FontResolution,
}

impl FontBook {
    pub fn load(settings: &FontSettings) -> Self {
        let mut db = fontdb::Database::new();
        if settings.load_system {
            db.load_system_fonts();
        }
        for dir in &settings.dirs {
            db.load_fonts_dir(Path::new(dir));
        }
        for file in &settings.files {
            if let Err(err) = db.load_font_file(Path::new(file)) {
                warn!("failed to load font file {}: {}", file, err);
            }
        }
        debug!("font registry holds {} faces", db.len());
        let mut book = Self::from_database(db, settings.fallback_families.clone());
        book.preload(&settings.caption_family);
        book
    }

    pub fn from_database(db: fontdb::Database, fallback_families: Vec<String>) -> Self {
        let mut book = Self {
            db,
            fallback_families,
            preloaded: HashMap::new(),
        };
        let families = book.fallback_families.clone();
        for family in families.iter().map(String::as_str).chain(["sans-serif"]) {
            book.preload(family);
        }
        if let Some(id) = book.any_face() {
            book.preload_face(id);
        }
        book
    }

    fn preload(&mut self, family: &str) {
        if let Some(id) = self.query(family) {
            self.preload_face(id);
        }
    }

    fn preload_face(&mut self, id: fontdb::ID) {
        if self.preloaded.contains_key(&id) {
            return;
        }
        match self.load_face(id) {
            Ok(font) => {
                self.preloaded.insert(id, font);
            }
            Err(err) => warn!("failed to preload font face: {}", err),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Find a bold face for `family`, falling back through the configured
    /// families, the generic sans-serif family, and finally any face at all.
    pub fn resolve(&self, family: &str) -> Result<ResolvedFont, CompositeError> {
        let requested = family.trim();
        if !requested.is_empty() {
            if let Some(id) = self.query(requested) {
                return self.face(id);
            }
        }

        let fallback = self
            .fallback_families
            .iter()
            .map(String::as_str)
            .filter(|candidate| !candidate.eq_ignore_ascii_case(requested))
            .chain(std::iter::once("sans-serif"))
            .find_map(|candidate| self.query(candidate))
            .or_else(|| self.any_face());
        let Some(id) = fallback else {
            return Err(CompositeError::FontUnavailable(format!(
                "font registry is empty (requested '{}')",
                requested
            )));
        };
        let mut resolved = self.face(id)?;
        resolved.resolution = FontResolution::FallbackUsed {
            requested: requested.to_string(),
            family: resolved.resolution.family().to_string(),
        };
        warn!(
            "font '{}' unavailable; using '{}'",
            requested,
            resolved.resolution.family()
        );
        Ok(resolved)
    }

    fn query(&self, family: &str) -> Option<fontdb::ID> {
        let families = [generic_family(family)];
        let query = fontdb::Query {
            families: &families,
            weight: fontdb::Weight::BOLD,
            ..Default::default()
        };
        self.db.query(&query)
    }

    fn any_face(&self) -> Option<fontdb::ID> {
        let mut faces = self.db.faces();
        let first = faces.next()?;
        if first.weight >= fontdb::Weight::BOLD {
            return Some(first.id);
        }
        Some(
            faces
                .find(|face| face.weight >= fontdb::Weight::BOLD)
                .map(|face| face.id)
                .unwrap_or(first.id),
        )
    }

    fn face(&self, id: fontdb::ID) -> Result<ResolvedFont, CompositeError> {
        match self.preloaded.get(&id) {
            Some(font) => Ok(font.clone()),
            None => self.load_face(id),
        }
    }

    fn load_face(&self, id: fontdb::ID) -> Result<ResolvedFont, CompositeError> {
        let (data, face_index) = self
            .db
            .with_face_data(id, |data, index| (data.to_vec(), index))
            .ok_or_else(|| CompositeError::FontUnavailable("failed to load font data".into()))?;
        let face = Face::parse(&data, face_index)
            .map_err(|err| CompositeError::FontUnavailable(format!("failed to parse font: {}", err)))?;
        let family = extract_family_name(&face)
            .or_else(|| {
                self.db
                    .face(id)
                    .and_then(|info| info.families.first().map(|(name, _)| name.clone()))
            })
            .unwrap_or_else(|| "unknown".to_string());
        let units_per_em = face.units_per_em().max(1);
        let cap_height = face
            .capital_height()
            .filter(|value| *value > 0)
            .map(f32::from)
            .unwrap_or_else(|| f32::from(face.ascender()) * 0.7);
        Ok(ResolvedFont {
            data: Arc::new(data),
            face_index,
            units_per_em,
            cap_height,
            resolution: FontResolution::Resolved { family },
        })
    }
}

fn generic_family(family: &str) -> fontdb::Family<'_> {
    match family.to_ascii_lowercase().as_str() {
        "sans-serif" => fontdb::Family::SansSerif,
        "serif" => fontdb::Family::Serif,
        "monospace" => fontdb::Family::Monospace,
        "cursive" => fontdb::Family::Cursive,
        "fantasy" => fontdb::Family::Fantasy,
        _ => fontdb::Family::Name(family),
    }
}

impl ResolvedFont {
    pub fn resolution(&self) -> &FontResolution {
        &self.resolution
    }

    pub fn family(&self) -> &str {
        self.resolution.family()
    }

    pub(crate) fn face(&self) -> Result<Face<'_>, CompositeError> {
        Face::parse(&self.data, self.face_index)
            .map_err(|err| CompositeError::FontUnavailable(format!("failed to parse font: {}", err)))
    }

    pub(crate) fn scale(&self, font_size: f32) -> f32 {
        font_size / f32::from(self.units_per_em)
    }

    /// Height of capital letters at `font_size`, in pixels.
    pub(crate) fn cap_height_px(&self, font_size: f32) -> f32 {
        self.cap_height * self.scale(font_size)
    }

    /// Advance width of `text` at `font_size`, in pixels. No kerning.
    pub fn measure_width(&self, text: &str, font_size: f32) -> Result<f32, CompositeError> {
        let face = self.face()?;
        let units: u32 = glyph_run(&face, text)
            .iter()
            .map(|(_, advance)| u32::from(*advance))
            .sum();
        Ok(units as f32 * self.scale(font_size))
    }
}

/// Glyph ids and advances (font units) for `text`, one per character.
/// Characters the face lacks map to `.notdef`.
pub(crate) fn glyph_run(face: &Face<'_>, text: &str) -> Vec<(GlyphId, u16)> {
    let fallback_advance = face.units_per_em() / 2;
    text.chars()
        .filter(|ch| !ch.is_control())
        .map(|ch| {
            let glyph = face.glyph_index(ch).unwrap_or(GlyphId(0));
            let advance = face.glyph_hor_advance(glyph).unwrap_or(fallback_advance);
            (glyph, advance)
        })
        .collect()
}

fn extract_family_name(face: &Face<'_>) -> Option<String> {
    let mut fallback = None;
    for name in face.names() {
        if name.name_id == name_id::TYPOGRAPHIC_FAMILY {
            if let Some(value) = name.to_string() {
                return Some(value);
            }
        } else if name.name_id == name_id::FAMILY && fallback.is_none() {
            fallback = name.to_string();
        }
    }
    fallback
}
