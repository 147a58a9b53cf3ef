//! Ordered catalog of layer definitions

use crate::types::{CatalogFile, LayerDefinition, LayerId};
use rigsmith_core::{Result, RigError};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../catalog/live2d.layers.toml");

/// Catalog of layer definitions.
///
/// Iteration follows declaration order; batch generation walks the catalog in
/// this order, not in z-order.
#[derive(Debug, Default, Clone)]
pub struct LayerCatalog {
    definitions: Vec<LayerDefinition>,
    /// Identity to position in `definitions`
    index: HashMap<LayerId, usize>,
}

impl LayerCatalog {
    /// The Live2D part table shipped with rigsmith
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    /// Load a catalog from a `.layers.toml` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| {
            RigError::CatalogError(format!("{}: {}", path.display(), e))
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content)?;
        Self::from_definitions(file.layer)
    }

    /// Build a catalog, rejecting empty and duplicate identities
    pub fn from_definitions(definitions: Vec<LayerDefinition>) -> Result<Self> {
        let mut index = HashMap::with_capacity(definitions.len());
        for (i, def) in definitions.iter().enumerate() {
            if def.id.as_str().trim().is_empty() {
                return Err(RigError::CatalogError(format!(
                    "layer #{} has an empty id",
                    i + 1
                )));
            }
            if index.insert(def.id.clone(), i).is_some() {
                return Err(RigError::CatalogError(format!(
                    "duplicate layer id '{}'",
                    def.id
                )));
            }
        }
        Ok(Self { definitions, index })
    }

    /// All definitions in declaration order
    pub fn definitions(&self) -> &[LayerDefinition] {
        &self.definitions
    }

    /// Required definitions in declaration order
    pub fn required(&self) -> Vec<&LayerDefinition> {
        self.definitions.iter().filter(|d| d.required).collect()
    }

    pub fn get(&self, id: &LayerId) -> Option<&LayerDefinition> {
        self.index.get(id).map(|&i| &self.definitions[i])
    }

    /// Definitions sorted back-to-front; ties keep declaration order
    pub fn sorted_by_z(&self) -> Vec<&LayerDefinition> {
        let mut sorted: Vec<&LayerDefinition> = self.definitions.iter().collect();
        sorted.sort_by_key(|d| d.z_order);
        sorted
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(id: &str, required: bool, z_order: i32) -> LayerDefinition {
        LayerDefinition {
            id: LayerId::new(id),
            required,
            z_order,
            label: id.to_string(),
            label_ja: None,
            prompt: format!("prompt for {}", id),
            negative_prompt: None,
        }
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = LayerCatalog::builtin().unwrap();
        assert_eq!(catalog.len(), 29);
        assert_eq!(catalog.required().len(), 21);

        let iris = catalog.get(&LayerId::new("Eye_L/EyeL_Iris")).unwrap();
        assert!(iris.required);
        assert_eq!(iris.z_order, 42);
        assert!(iris.negative_prompt.is_some());
        assert_eq!(iris.document_name(), "左目：虹彩 (Eye_L/EyeL_Iris)");
        assert!(catalog.definitions().iter().all(|d| d.label_ja.is_some()));
    }

    #[test]
    fn test_builtin_declaration_order() {
        let catalog = LayerCatalog::builtin().unwrap();
        let ids: Vec<&str> = catalog.definitions().iter().take(3).map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["Body/BodyBase", "Body/Clothes_Main", "Body/Clothes_Over"]);

        // Required iteration preserves declaration order too
        let first_required = catalog.required()[0];
        assert_eq!(first_required.id.as_str(), "Body/BodyBase");
    }

    #[test]
    fn test_sorted_by_z_is_stable() {
        let catalog = LayerCatalog::from_definitions(vec![
            def("A/a", true, 20),
            def("B/b", true, 5),
            def("C/c", false, 20),
        ])
        .unwrap();
        let ids: Vec<&str> = catalog.sorted_by_z().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["B/b", "A/a", "C/c"]);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = LayerCatalog::from_definitions(vec![def("A/a", true, 1), def("A/a", false, 2)])
            .unwrap_err();
        assert!(matches!(err, RigError::CatalogError(_)));
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(LayerCatalog::from_definitions(vec![def("  ", true, 1)]).is_err());
    }

    #[test]
    fn test_get_missing() {
        let catalog = LayerCatalog::builtin().unwrap();
        assert!(catalog.get(&LayerId::new("Tail/Tail")).is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("rigsmith_catalog_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("custom.layers.toml");
        std::fs::write(
            &path,
            r#"
[[layer]]
id = "Tail/Tail"
required = true
z_order = 1
label = "Tail"
prompt = "fox tail"
"#,
        )
        .unwrap();

        let catalog = LayerCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get(&LayerId::new("Tail/Tail")).is_some());

        std::fs::remove_dir_all(&dir).ok();
    }
}
