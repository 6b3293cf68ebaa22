use graphview_core::{Size, ViewerError};

use crate::options::LabelOptions;

/// Label measurement collaborator. Must return the same size for the same
/// text under the same options.
pub trait TextMeasurer {
    fn set_options(&mut self, options: &LabelOptions);
    fn measure(&self, text: &str) -> Result<Size, ViewerError>;
}

/// Deterministic measurer for headless use: every character is the same width.
#[derive(Debug, Clone)]
pub struct MonospaceMeasurer {
    options: LabelOptions,
}

impl MonospaceMeasurer {
    const CHAR_WIDTH_EM: f64 = 0.6;
    const LINE_HEIGHT_EM: f64 = 1.2;

    pub fn new() -> Self {
        Self {
            options: LabelOptions::default(),
        }
    }

    pub fn options(&self) -> &LabelOptions {
        &self.options
    }
}

impl Default for MonospaceMeasurer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextMeasurer for MonospaceMeasurer {
    fn set_options(&mut self, options: &LabelOptions) {
        self.options = options.clone();
    }

    fn measure(&self, text: &str) -> Result<Size, ViewerError> {
        let font_size = self.options.font_size;
        let lines: Vec<&str> = text.lines().collect();
        let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let line_count = lines.len().max(1);
        Ok(Size::new(
            widest as f64 * font_size * Self::CHAR_WIDTH_EM,
            line_count as f64 * font_size * Self::LINE_HEIGHT_EM,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monospace_measure() {
        let measurer = MonospaceMeasurer::new();
        let size = measurer.measure("abcd").unwrap();
        assert!((size.width - 4.0 * 16.0 * 0.6).abs() < 1e-9);
        assert!((size.height - 16.0 * 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_font_size_scales_measurement() {
        let mut measurer = MonospaceMeasurer::new();
        let before = measurer.measure("label").unwrap();
        measurer.set_options(&LabelOptions {
            font_size: 32.0,
            ..LabelOptions::default()
        });
        let after = measurer.measure("label").unwrap();
        assert!((after.width - before.width * 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_multiline_uses_widest_line() {
        let measurer = MonospaceMeasurer::new();
        let size = measurer.measure("ab\nabcdef").unwrap();
        assert!((size.width - 6.0 * 16.0 * 0.6).abs() < 1e-9);
        assert!((size.height - 2.0 * 16.0 * 1.2).abs() < 1e-9);
    }
}
