use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Viewer tuning knobs. Every field falls back to its default when missing
/// from a settings file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerSettings {
    /// Logical dots per inch before the device pixel ratio is applied.
    pub base_dpi: f64,
    /// Overrides the platform surface's pixel ratio when set.
    pub device_pixel_ratio: Option<f64>,
    /// Pointer pick distance, in inches on screen.
    pub mouse_hit_distance_inches: f64,
    pub line_thickness_for_editing: f64,
    pub arrowhead_length: f64,
    pub layout_editing_enabled: bool,
    pub incremental_dragging_mode_always: bool,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            base_dpi: 96.0,
            device_pixel_ratio: None,
            mouse_hit_distance_inches: 0.05,
            line_thickness_for_editing: 2.0,
            arrowhead_length: 5.0,
            layout_editing_enabled: true,
            incremental_dragging_mode_always: false,
            min_zoom: 0.1,
            max_zoom: 4.0,
        }
    }
}

impl ViewerSettings {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read viewer settings {}", path.display()))?;
        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse viewer settings {}", path.display()))?;
        tracing::info!("Viewer settings loaded from {:?}", path);
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write viewer settings {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        std::fs::write(&path, r#"{ "max_zoom": 8.0, "device_pixel_ratio": 2.0 }"#).unwrap();

        let settings = ViewerSettings::load(&path).unwrap();
        assert_eq!(settings.max_zoom, 8.0);
        assert_eq!(settings.device_pixel_ratio, Some(2.0));
        assert_eq!(settings.base_dpi, 96.0);
        assert!(settings.layout_editing_enabled);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.json");
        let settings = ViewerSettings {
            layout_editing_enabled: false,
            ..Default::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(ViewerSettings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ViewerSettings::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read viewer settings"));
    }
}
