use serde::{Deserialize, Serialize};

/// Font settings that drive label measurement. Compared by value: any field
/// difference means every label has to be measured again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelOptions {
    pub font_family: String,
    pub font_size: f64,
    pub font_style: String,
    pub font_weight: String,
}

impl Default for LabelOptions {
    fn default() -> Self {
        Self {
            font_family: "sans-serif".to_string(),
            font_size: 16.0,
            font_style: "normal".to_string(),
            font_weight: "normal".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LayoutType {
    #[default]
    Layered,
    Grid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LayoutDirection {
    #[default]
    TopToBottom,
    LeftToRight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    pub label: Option<LabelOptions>,
    pub layout_type: LayoutType,
    pub direction: LayoutDirection,
    pub node_separation: f64,
    pub layer_separation: f64,
    /// Space between a node's label and its border.
    pub node_padding: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            label: None,
            layout_type: LayoutType::default(),
            direction: LayoutDirection::default(),
            node_separation: 40.0,
            layer_separation: 80.0,
            node_padding: 8.0,
        }
    }
}

impl LayoutOptions {
    pub fn with_label(label: LabelOptions) -> Self {
        Self {
            label: Some(label),
            ..Self::default()
        }
    }

    /// Label settings to hand to the measurer; a missing sub-config means defaults.
    pub fn label_or_default(&self) -> LabelOptions {
        self.label.clone().unwrap_or_default()
    }

    pub fn label_changed(&self, other: &LayoutOptions) -> bool {
        self.label != other.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_changed_is_deep_equality() {
        let a = LayoutOptions::with_label(LabelOptions::default());
        let mut b = a.clone();
        b.node_separation = 10.0;
        assert!(!a.label_changed(&b));

        let mut c = a.clone();
        c.label.as_mut().unwrap().font_size = 20.0;
        assert!(a.label_changed(&c));
    }

    #[test]
    fn test_missing_label_differs_from_default_label() {
        let none = LayoutOptions::default();
        let some = LayoutOptions::with_label(LabelOptions::default());
        assert!(none.label_changed(&some));
        assert!(!none.label_changed(&LayoutOptions::default()));
    }

    #[test]
    fn test_partial_options_document() {
        let options: LayoutOptions =
            serde_json::from_str(r#"{"direction":"LeftToRight","label":{"font_size":12}}"#)
                .unwrap();
        assert_eq!(options.direction, LayoutDirection::LeftToRight);
        assert_eq!(options.label.unwrap().font_family, "sans-serif");
        assert_eq!(options.node_separation, 40.0);
    }
}
