//! Layer definition types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hierarchical layer identity, e.g. `Eye_L/EyeL_Iris`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The group segment (`Eye_L` for `Eye_L/EyeL_Iris`), or the whole id
    /// when it has no separator
    pub fn group(&self) -> &str {
        self.0.split_once('/').map(|(g, _)| g).unwrap_or(&self.0)
    }

    /// The last path segment (`EyeL_Iris` for `Eye_L/EyeL_Iris`)
    pub fn part(&self) -> &str {
        self.0.rsplit_once('/').map(|(_, p)| p).unwrap_or(&self.0)
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A single catalog entry describing one character part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDefinition {
    pub id: LayerId,
    #[serde(default)]
    pub required: bool,
    /// Stacking key; smaller values sit farther back
    pub z_order: i32,
    /// Human-readable name
    pub label: String,
    /// Japanese name, preferred for document layer names
    #[serde(default)]
    pub label_ja: Option<String>,
    /// Base generation prompt for the part
    pub prompt: String,
    /// Things the generator should leave out
    #[serde(default)]
    pub negative_prompt: Option<String>,
}

impl LayerDefinition {
    /// Layer name in exported documents, `<label> (<id>)`
    pub fn document_name(&self) -> String {
        let label = self
            .label_ja
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or(&self.label);
        format!("{} ({})", label, self.id)
    }
}

/// TOML catalog file format
#[derive(Debug, Deserialize)]
pub(crate) struct CatalogFile {
    #[serde(default)]
    pub layer: Vec<LayerDefinition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_id_segments() {
        let id = LayerId::new("Eye_L/EyeL_Iris");
        assert_eq!(id.group(), "Eye_L");
        assert_eq!(id.part(), "EyeL_Iris");

        let flat = LayerId::new("Reference");
        assert_eq!(flat.group(), "Reference");
        assert_eq!(flat.part(), "Reference");
    }

    #[test]
    fn test_definition_serde() {
        let toml_str = r#"
[[layer]]
id = "Mouth/Mouth_A"
required = true
z_order = 35
label = "Mouth (A, open)"
label_ja = "口（あ・開き）"
prompt = "anime open mouth shape"
negative_prompt = "face, skin, nose"

[[layer]]
id = "Hair_Front/Ahoge"
z_order = 75
label = "Ahoge"
prompt = "anime ahoge"
"#;
        let file: CatalogFile = toml::from_str(toml_str).unwrap();
        assert_eq!(file.layer.len(), 2);
        assert_eq!(file.layer[0].id.as_str(), "Mouth/Mouth_A");
        assert!(file.layer[0].required);
        assert_eq!(file.layer[0].negative_prompt.as_deref(), Some("face, skin, nose"));
        assert!(!file.layer[1].required);
        assert_eq!(file.layer[1].negative_prompt, None);

        assert_eq!(file.layer[0].document_name(), "口（あ・開き） (Mouth/Mouth_A)");
        // Falls back to the English label
        assert_eq!(file.layer[1].label_ja, None);
        assert_eq!(file.layer[1].document_name(), "Ahoge (Hair_Front/Ahoge)");
    }
}
