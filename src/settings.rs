use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_addr: String,
    /// Request body limit for the HTTP server, in bytes.
    pub server_max_body_bytes: usize,
    pub fonts: FontSettings,
}

#[derive(Debug, Clone)]
pub struct FontSettings {
    /// Family used by the caption-band compositor.
    pub caption_family: String,
    /// Tried in order when a requested family is missing.
    pub fallback_families: Vec<String>,
    pub dirs: Vec<String>,
    pub files: Vec<String>,
    pub load_system: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:3000".to_string(),
            server_max_body_bytes: 32 * 1024 * 1024,
            fonts: FontSettings::default(),
        }
    }
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            caption_family: "Impact".to_string(),
            fallback_families: vec![
                "Impact".to_string(),
                "Arial Black".to_string(),
                "Anton".to_string(),
                "Arial".to_string(),
                "Liberation Sans".to_string(),
                "DejaVu Sans".to_string(),
                "Noto Sans".to_string(),
            ],
            dirs: Vec::new(),
            files: Vec::new(),
            load_system: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    server: Option<ServerSettings>,
    fonts: Option<FontsSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
    max_body_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct FontsSection {
    caption_family: Option<String>,
    fallback_families: Option<Vec<String>>,
    dirs: Option<Vec<String>>,
    files: Option<Vec<String>>,
    load_system: Option<bool>,
}

/// Merge the embedded defaults with `settings.toml` / `settings.local.toml` from
/// the working directory and the home settings directory, then `extra_path`.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings.merge_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge_str(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(server) = incoming.server {
            if let Some(addr) = server.addr {
                if !addr.trim().is_empty() {
                    self.server_addr = addr;
                }
            }
            if let Some(limit) = server.max_body_bytes {
                if limit > 0 {
                    self.server_max_body_bytes = limit;
                }
            }
        }
        if let Some(fonts) = incoming.fonts {
            if let Some(family) = fonts.caption_family {
                if !family.trim().is_empty() {
                    self.fonts.caption_family = family;
                }
            }
            if let Some(families) = fonts.fallback_families {
                let families: Vec<String> = families
                    .into_iter()
                    .filter(|family| !family.trim().is_empty())
                    .collect();
                if !families.is_empty() {
                    self.fonts.fallback_families = families;
                }
            }
            if let Some(dirs) = fonts.dirs {
                self.fonts.dirs = dirs;
            }
            if let Some(files) = fonts.files {
                self.fonts.files = files;
            }
            if let Some(load_system) = fonts.load_system {
                self.fonts.load_system = load_system;
            }
        }
    }
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".meme-compositor-rust"))
        }
    })
}
