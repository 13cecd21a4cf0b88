use image::Rgba;
use std::path::{Path, PathBuf};

use crate::editor::{ShadowStyle, TextStyle};
use crate::io::ExportName;

// ============================================================================
// OVERLAY CATALOG
// ============================================================================

/// One selectable overlay: a display name and the image file behind it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OverlayEntry {
    pub name: String,
    pub path: PathBuf,
}

impl OverlayEntry {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Parse `Name|path/to/image.png`.
    fn from_config_value(val: &str) -> Option<Self> {
        let (name, path) = val.split_once('|')?;
        let (name, path) = (name.trim(), path.trim());
        if name.is_empty() || path.is_empty() {
            return None;
        }
        Some(Self::new(name, path))
    }
}

/// Overlays offered to the user, in display order. Supplied as configuration
/// at start-up; the UI adds its own "None" choice.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OverlayCatalog {
    entries: Vec<OverlayEntry>,
}

impl OverlayCatalog {
    /// Add an entry; a later entry with the same name replaces the earlier one.
    pub fn push(&mut self, entry: OverlayEntry) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.name == entry.name) {
            *existing = entry;
        } else {
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[OverlayEntry] {
        &self.entries
    }

    pub fn find(&self, name: &str) -> Option<&OverlayEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Start-up configuration read from the settings file
#[derive(Clone, Debug, PartialEq)]
pub struct AppSettings {
    /// Style new posts start with
    pub style: TextStyle,
    /// Shadow parameters, remembered even while the shadow is switched off
    pub shadow: ShadowStyle,
    pub shadow_enabled: bool,
    /// Preferred system font family (empty = fallback list)
    pub font_family: String,
    /// Explicit font file; wins over `font_family` when it loads
    pub font_path: Option<PathBuf>,
    pub export_name: ExportName,
    pub overlays: OverlayCatalog,
}

impl Default for AppSettings {
    fn default() -> Self {
        let style = TextStyle::default();
        Self {
            shadow: style.shadow.unwrap_or_default(),
            shadow_enabled: style.shadow.is_some(),
            style,
            font_family: "Inter".to_string(),
            font_path: None,
            export_name: ExportName::Fixed,
            overlays: OverlayCatalog::default(),
        }
    }
}

impl AppSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/postcreator/postcreator_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\PostCreator\postcreator_settings.cfg
    /// On macOS:   ~/Library/Application Support/PostCreator/postcreator_settings.cfg
    /// Fallback:   same directory as the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("postcreator");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("postcreator_settings.cfg"));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            let config_dir = PathBuf::from(appdata).join("PostCreator");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("postcreator_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            let config_dir = PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("PostCreator");
            let _ = std::fs::create_dir_all(&config_dir);
            return Some(config_dir.join("postcreator_settings.cfg"));
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("postcreator_settings.cfg")))
        }
    }

    /// The style new posts start with, shadow included when enabled.
    pub fn text_style(&self) -> TextStyle {
        TextStyle {
            shadow: self.shadow_enabled.then_some(self.shadow),
            ..self.style
        }
    }

    /// Parse a color from "r,g,b,a"
    fn str_to_color(s: &str) -> Option<Rgba<u8>> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() == 4 {
            let r = parts[0].trim().parse::<u8>().ok()?;
            let g = parts[1].trim().parse::<u8>().ok()?;
            let b = parts[2].trim().parse::<u8>().ok()?;
            let a = parts[3].trim().parse::<u8>().ok()?;
            Some(Rgba([r, g, b, a]))
        } else {
            None
        }
    }

    /// Parse settings text. Unknown keys are ignored and invalid values keep
    /// their defaults, so a damaged file never prevents start-up.
    pub fn from_config_str(content: &str) -> Self {
        use crate::editor::{
            parse_font_size, parse_line_height, parse_padding_ratio, parse_shadow_blur,
            parse_shadow_offset,
        };

        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let val = val.trim();
            match key {
                "font_size" => {
                    if let Ok(v) = parse_font_size(val) {
                        s.style.font_size = v;
                    }
                }
                "padding_ratio" => {
                    if let Ok(v) = parse_padding_ratio(val) {
                        s.style.padding_ratio = v;
                    }
                }
                "line_height" => {
                    if let Ok(v) = parse_line_height(val) {
                        s.style.line_height = v;
                    }
                }
                "text_color" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.style.color = c;
                    }
                }
                "background_color" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.style.background = c;
                    }
                }
                "shadow_enabled" => {
                    s.shadow_enabled = val == "true";
                }
                "shadow_color" => {
                    if let Some(c) = Self::str_to_color(val) {
                        s.shadow.color = c;
                    }
                }
                "shadow_blur" => {
                    if let Ok(v) = parse_shadow_blur(val) {
                        s.shadow.blur = v;
                    }
                }
                "shadow_offset_x" => {
                    if let Ok(v) = parse_shadow_offset(val) {
                        s.shadow.offset_x = v;
                    }
                }
                "shadow_offset_y" => {
                    if let Ok(v) = parse_shadow_offset(val) {
                        s.shadow.offset_y = v;
                    }
                }
                "font_family" => {
                    s.font_family = val.to_string();
                }
                "font_path" => {
                    s.font_path = (!val.is_empty()).then(|| PathBuf::from(val));
                }
                "export_name" => {
                    s.export_name = ExportName::from_config_str(val);
                }
                "overlay" => match OverlayEntry::from_config_value(val) {
                    Some(entry) => s.overlays.push(entry),
                    None => {
                        crate::log_warn!("Ignoring malformed overlay entry \"{}\"", val);
                    }
                },
                _ => {}
            }
        }

        s.style.shadow = s.shadow_enabled.then_some(s.shadow);
        s
    }

    /// Load settings from disk (returns default if file missing)
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_config_str(&content),
            Err(_) => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_post() {
        let s = AppSettings::default();
        assert_eq!(s.style.font_size, 50.0);
        assert_eq!(s.style.padding_ratio, 0.06);
        assert!(s.text_style().shadow.is_some());
        assert!(s.overlays.is_empty());
    }

    #[test]
    fn settings_text_is_parsed() {
        let parsed = AppSettings::from_config_str(
            "font_size=72\n\
             padding_ratio=0.1\n\
             text_color=1,2,3,4\n\
             shadow_enabled=false\n\
             shadow_blur=12\n\
             font_family=DejaVu Sans\n\
             font_path=/fonts/Inter.ttf\n\
             export_name=unique\n\
             overlay=Gradient|/overlays/gradient.png\n\
             overlay=Frame|/overlays/frame.png\n",
        );
        assert_eq!(parsed.style.font_size, 72.0);
        assert_eq!(parsed.style.padding_ratio, 0.1);
        assert_eq!(parsed.style.color, Rgba([1, 2, 3, 4]));
        assert!(!parsed.shadow_enabled);
        assert!(parsed.text_style().shadow.is_none());
        assert_eq!(parsed.shadow.blur, 12.0);
        assert_eq!(parsed.font_family, "DejaVu Sans");
        assert_eq!(parsed.font_path, Some(PathBuf::from("/fonts/Inter.ttf")));
        assert_eq!(parsed.export_name, ExportName::Unique);
        let names: Vec<&str> = parsed.overlays.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Gradient", "Frame"]);
    }

    #[test]
    fn extreme_shadow_values_are_clamped() {
        use crate::editor::{MAX_SHADOW_BLUR, MAX_SHADOW_OFFSET};

        let parsed = AppSettings::from_config_str(
            "shadow_blur=1e9\nshadow_offset_x=-1e30\nshadow_offset_y=7\n",
        );
        assert_eq!(parsed.shadow.blur, MAX_SHADOW_BLUR);
        assert_eq!(parsed.shadow.offset_x, -MAX_SHADOW_OFFSET);
        assert_eq!(parsed.shadow.offset_y, 7.0);
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let parsed = AppSettings::from_config_str(
            "font_size=-4\npadding_ratio=9\ntext_color=red\nshadow_blur=NaN\nnot a line\nmystery=1\n",
        );
        let d = AppSettings::default();
        assert_eq!(parsed.style.font_size, d.style.font_size);
        assert_eq!(parsed.style.padding_ratio, 1.0);
        assert_eq!(parsed.style.color, d.style.color);
        assert_eq!(parsed.shadow.blur, d.shadow.blur);
    }

    #[test]
    fn overlay_lines() {
        let parsed = AppSettings::from_config_str(
            "overlay=Frame|/a/frame.png\noverlay=broken\noverlay=Frame|/b/frame.png\noverlay=Dots | dots.png\n",
        );
        assert_eq!(parsed.overlays.len(), 2);
        assert_eq!(parsed.overlays.find("Frame").unwrap().path, PathBuf::from("/b/frame.png"));
        assert_eq!(parsed.overlays.find("Dots").unwrap().path, PathBuf::from("dots.png"));
        assert!(parsed.overlays.find("broken").is_none());
        assert_eq!(parsed.overlays.entries()[0].name, "Frame");
    }

    #[test]
    fn load_from_file() {
        let path = std::env::temp_dir().join(format!(
            "postcreator-settings-{}.cfg",
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::write(&path, "line_height=1.5\n").unwrap();
        assert_eq!(AppSettings::load_from(&path).style.line_height, 1.5);
        let _ = std::fs::remove_file(&path);
        assert_eq!(AppSettings::load_from(&path), AppSettings::default());
    }
}
