//! Generated layers keyed by identity
//!
//! A slot records where the latest generation attempt for an identity stands.
//! The last successfully generated layer is kept separately, so a
//! regeneration that is in flight or has failed never loses it.

use rigsmith_catalog::LayerId;
use rigsmith_compose::Placement;
use rigsmith_core::RasterBuffer;
use std::collections::BTreeMap;

/// A generated part buffer and, for face-attached parts, where it goes
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedLayer {
    pub id: LayerId,
    pub image: RasterBuffer,
    pub placement: Option<Placement>,
}

/// State of the latest generation attempt for one identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerSlot {
    Empty,
    InFlight,
    Ready,
    Failed { message: String },
}

#[derive(Debug)]
struct Entry {
    slot: LayerSlot,
    layer: Option<GeneratedLayer>,
}

/// At most one generated layer per identity
#[derive(Debug, Default)]
pub struct LayerStore {
    entries: BTreeMap<LayerId, Entry>,
}

impl LayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: &LayerId) -> LayerSlot {
        self.entries
            .get(id)
            .map(|e| e.slot.clone())
            .unwrap_or(LayerSlot::Empty)
    }

    /// The newest good layer for `id`, even if a later attempt is running or
    /// failed
    pub fn get(&self, id: &LayerId) -> Option<&GeneratedLayer> {
        self.entries.get(id).and_then(|e| e.layer.as_ref())
    }

    /// Mark `id` as being generated
    pub fn begin(&mut self, id: &LayerId) {
        self.entries
            .entry(id.clone())
            .and_modify(|e| e.slot = LayerSlot::InFlight)
            .or_insert(Entry {
                slot: LayerSlot::InFlight,
                layer: None,
            });
    }

    /// Store a finished layer, replacing any previous one for its identity
    pub fn complete(&mut self, layer: GeneratedLayer) {
        self.entries.insert(
            layer.id.clone(),
            Entry {
                slot: LayerSlot::Ready,
                layer: Some(layer),
            },
        );
    }

    pub fn fail(&mut self, id: &LayerId, message: impl Into<String>) {
        let slot = LayerSlot::Failed {
            message: message.into(),
        };
        self.entries
            .entry(id.clone())
            .and_modify(|e| e.slot = slot.clone())
            .or_insert(Entry { slot, layer: None });
    }

    /// Every identity with a usable layer, ordered by identity
    pub fn ready_layers(&self) -> Vec<&GeneratedLayer> {
        self.entries.values().filter_map(|e| e.layer.as_ref()).collect()
    }

    pub fn ready_count(&self) -> usize {
        self.entries.values().filter(|e| e.layer.is_some()).count()
    }

    /// Identities currently in the `Failed` state
    pub fn failed(&self) -> Vec<(&LayerId, &str)> {
        self.entries
            .iter()
            .filter_map(|(id, e)| match &e.slot {
                LayerSlot::Failed { message } => Some((id, message.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn layer(id: &str, shade: u8) -> GeneratedLayer {
        GeneratedLayer {
            id: LayerId::new(id),
            image: RasterBuffer::from_pixel(2, 2, Rgba([shade, shade, shade, 255])),
            placement: None,
        }
    }

    #[test]
    fn test_lifecycle() {
        let mut store = LayerStore::new();
        let id = LayerId::new("Body/BodyBase");
        assert_eq!(store.state(&id), LayerSlot::Empty);

        store.begin(&id);
        assert_eq!(store.state(&id), LayerSlot::InFlight);
        assert!(store.get(&id).is_none());

        store.complete(layer("Body/BodyBase", 10));
        assert_eq!(store.state(&id), LayerSlot::Ready);
        assert_eq!(store.ready_count(), 1);
    }

    #[test]
    fn test_failed_regeneration_keeps_last_good_layer() {
        let mut store = LayerStore::new();
        let id = LayerId::new("Rig/eyes");
        store.complete(layer("Rig/eyes", 10));

        store.begin(&id);
        assert_eq!(store.get(&id).unwrap().image.get_pixel(0, 0).0[0], 10);

        store.fail(&id, "quota exceeded");
        assert_eq!(
            store.state(&id),
            LayerSlot::Failed {
                message: "quota exceeded".to_string()
            }
        );
        assert!(store.get(&id).is_some());
        assert_eq!(store.failed(), vec![(&id, "quota exceeded")]);
    }

    #[test]
    fn test_complete_replaces() {
        let mut store = LayerStore::new();
        store.complete(layer("Rig/mouth", 1));
        store.complete(layer("Rig/mouth", 2));
        assert_eq!(store.ready_count(), 1);
        let current = store.get(&LayerId::new("Rig/mouth")).unwrap();
        assert_eq!(current.image.get_pixel(0, 0).0[0], 2);
    }

    #[test]
    fn test_failure_without_prior_layer() {
        let mut store = LayerStore::new();
        let id = LayerId::new("Hair_Back/HairBack");
        store.fail(&id, "boom");
        assert_eq!(store.ready_count(), 0);
        assert!(store.ready_layers().is_empty());

        store.clear();
        assert_eq!(store.state(&id), LayerSlot::Empty);
    }
}
