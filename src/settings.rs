use std::path::{Path, PathBuf};

use image::Rgba;

use crate::components::colors::{parse_hex, to_hex, WHITE};
use crate::io::MIN_JPEG_QUALITY;
use crate::ops::shapes::DrawStyle;
use crate::log_warn;

/// User defaults, persisted as a plain `key=value` file.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Fill for new documents and `clear`.
    pub background: Rgba<u8>,
    pub brush_size: f32,
    /// 0..=1, multiplied into the paint color's alpha.
    pub brush_opacity: f32,
    /// JPEG quality, 10..=100.
    pub export_quality: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            canvas_width: 800,
            canvas_height: 600,
            background: WHITE,
            brush_size: 5.0,
            brush_opacity: 1.0,
            export_quality: 90,
        }
    }
}

impl Settings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/rasterfe/rasterfe_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\RasterFE\rasterfe_settings.cfg
    /// On macOS:   ~/Library/Application Support/RasterFE/rasterfe_settings.cfg
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA").or_else(|_| std::env::var("USERPROFILE")).ok()?;
            return Some(PathBuf::from(appdata).join("RasterFE").join("rasterfe_settings.cfg"));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").ok()?;
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("RasterFE")
                    .join("rasterfe_settings.cfg"),
            );
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let config_dir = match std::env::var("XDG_CONFIG_HOME") {
                Ok(xdg) => PathBuf::from(xdg),
                Err(_) => PathBuf::from(std::env::var("HOME").ok()?).join(".config"),
            };
            Some(config_dir.join("rasterfe").join("rasterfe_settings.cfg"))
        }
    }

    /// Load from the default location (defaults if missing or unreadable).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from `path`; a missing file gives the defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse `key=value` lines.  Unknown keys are ignored and bad values keep
    /// their default.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "canvas_width" => match val.parse::<u32>() {
                    Ok(w) if w > 0 => s.canvas_width = w,
                    _ => {
                        log_warn!("settings: bad canvas_width '{}'", val);
                    }
                },
                "canvas_height" => match val.parse::<u32>() {
                    Ok(h) if h > 0 => s.canvas_height = h,
                    _ => {
                        log_warn!("settings: bad canvas_height '{}'", val);
                    }
                },
                "background" => match parse_hex(val) {
                    Some(c) => s.background = c,
                    None => {
                        log_warn!("settings: bad background '{}'", val);
                    }
                },
                "brush_size" => match val.parse::<f32>() {
                    Ok(v) if v.is_finite() && v > 0.0 => s.brush_size = v,
                    _ => {
                        log_warn!("settings: bad brush_size '{}'", val);
                    }
                },
                "brush_opacity" => match val.parse::<f32>() {
                    Ok(v) if v.is_finite() => s.brush_opacity = v.clamp(0.0, 1.0),
                    _ => {
                        log_warn!("settings: bad brush_opacity '{}'", val);
                    }
                },
                "export_quality" => match val.parse::<u8>() {
                    Ok(q) => s.export_quality = q.clamp(MIN_JPEG_QUALITY, 100),
                    _ => {
                        log_warn!("settings: bad export_quality '{}'", val);
                    }
                },
                _ => {}
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "canvas_width={}\n\
             canvas_height={}\n\
             background={}\n\
             brush_size={}\n\
             brush_opacity={}\n\
             export_quality={}\n",
            self.canvas_width,
            self.canvas_height,
            to_hex(self.background),
            self.brush_size,
            self.brush_opacity,
            self.export_quality,
        )
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_config_string())
    }

    /// Brush style in `color` at the configured size and opacity.
    pub fn brush_style(&self, color: Rgba<u8>) -> DrawStyle {
        DrawStyle::new(color, self.brush_size).with_opacity(self.brush_opacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_fresh_canvas() {
        let s = Settings::default();
        assert_eq!((s.canvas_width, s.canvas_height), (800, 600));
        assert_eq!(s.background, WHITE);
        assert_eq!(s.brush_size, 5.0);
        assert_eq!(s.export_quality, 90);
    }

    #[test]
    fn parse_ignores_junk_and_keeps_defaults_for_bad_values() {
        let s = Settings::parse(
            "# comment\n\
             canvas_width = 320\n\
             canvas_height=0\n\
             background=#102030\n\
             brush_opacity=7\n\
             export_quality=abc\n\
             export_quality=3\n\
             not a pair\n\
             theme=dark\n",
        );
        assert_eq!(s.canvas_width, 320);
        assert_eq!(s.canvas_height, 600);
        assert_eq!(s.background, Rgba([0x10, 0x20, 0x30, 255]));
        assert_eq!(s.brush_opacity, 1.0);
        assert_eq!(s.export_quality, 10);
    }

    #[test]
    fn save_then_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rasterfe_settings.cfg");
        let s = Settings {
            canvas_width: 64,
            canvas_height: 48,
            background: Rgba([0, 0, 0, 255]),
            brush_size: 2.5,
            brush_opacity: 0.5,
            export_quality: 70,
        };
        s.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), s);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load_from(&dir.path().join("nope.cfg")), Settings::default());
    }

    #[test]
    fn brush_style_uses_size_and_opacity() {
        let s = Settings { brush_size: 3.0, brush_opacity: 0.5, ..Settings::default() };
        let style = s.brush_style(Rgba([255, 0, 0, 255]));
        assert_eq!(style.stroke_width, 3.0);
        assert_eq!(style.opacity, 0.5);
    }
}
