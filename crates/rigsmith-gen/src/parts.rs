//! The five parts a rigging run generates

use crate::provider::AspectRatio;
use rigsmith_catalog::LayerId;
use rigsmith_compose::{AttachKind, Tolerance};
use std::fmt;

/// One isolated body part generated from a master image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartKind {
    BackHair,
    BodySkin,
    FrontHair,
    Eyes,
    Mouth,
}

impl PartKind {
    /// Generation order
    pub const ALL: [PartKind; 5] = [
        PartKind::BackHair,
        PartKind::BodySkin,
        PartKind::FrontHair,
        PartKind::Eyes,
        PartKind::Mouth,
    ];

    /// Bottom-to-top order in the exported document
    pub const DOCUMENT_ORDER: [PartKind; 5] = [
        PartKind::BackHair,
        PartKind::BodySkin,
        PartKind::Mouth,
        PartKind::Eyes,
        PartKind::FrontHair,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            PartKind::BackHair => "back_hair",
            PartKind::BodySkin => "body_skin",
            PartKind::FrontHair => "front_hair",
            PartKind::Eyes => "eyes",
            PartKind::Mouth => "mouth",
        }
    }

    /// Store identity, `Rig/<key>`
    pub fn layer_id(&self) -> LayerId {
        LayerId::new(format!("Rig/{}", self.key()))
    }

    pub fn document_name(&self) -> &'static str {
        match self {
            PartKind::BackHair => "Back Hair (後ろ髪)",
            PartKind::BodySkin => "Body & Head (素体)",
            PartKind::FrontHair => "Front Hair (前髪)",
            PartKind::Eyes => "Eyes (目)",
            PartKind::Mouth => "Mouth (口)",
        }
    }

    /// Hair keeps soft shadows near white and needs a looser key
    pub fn default_tolerance(&self) -> Tolerance {
        match self {
            PartKind::BackHair | PartKind::FrontHair => Tolerance::SOFT,
            PartKind::BodySkin | PartKind::Eyes | PartKind::Mouth => Tolerance::SHARP,
        }
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        match self {
            PartKind::BackHair | PartKind::BodySkin => AspectRatio::Portrait3x4,
            _ => AspectRatio::Square,
        }
    }

    pub fn attach(&self) -> AttachKind {
        match self {
            PartKind::BackHair | PartKind::BodySkin => AttachKind::Canvas,
            PartKind::FrontHair => AttachKind::FrontHair,
            PartKind::Eyes => AttachKind::Eyes,
            PartKind::Mouth => AttachKind::Mouth,
        }
    }

    pub(crate) fn subject(&self) -> &'static str {
        match self {
            PartKind::BackHair => "Back hair only. Hair flowing behind the head. No face, no body.",
            PartKind::BodySkin => "Body base (skin) and clothes only. Head shape but faceless (no eyes, no mouth, no hair). Neck, shoulders, torso.",
            PartKind::FrontHair => "Front hair (bangs) only. Floating hair texture. No face, no eyes.",
            PartKind::Eyes => "Anime eyes pair (left and right). High detail, beautiful eyes. Floating. No face skin.",
            PartKind::Mouth => "Anime mouth (lips and open mouth). Floating. No face skin.",
        }
    }

    pub(crate) fn exclusions(&self) -> &'static str {
        match self {
            PartKind::BackHair => "face, eyes, mouth, skin, front hair, body",
            PartKind::BodySkin => "eyes, mouth, nose, hair, eyebrows",
            PartKind::FrontHair => "face, eyes, mouth, skin, back hair, body",
            PartKind::Eyes => "nose, mouth, face skin, hair, eyebrows",
            PartKind::Mouth => "eyes, nose, face skin, hair",
        }
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orders_cover_every_part() {
        for part in PartKind::ALL {
            assert!(PartKind::DOCUMENT_ORDER.contains(&part));
        }
        assert_eq!(PartKind::DOCUMENT_ORDER.last(), Some(&PartKind::FrontHair));
    }

    #[test]
    fn test_part_properties() {
        assert_eq!(PartKind::Eyes.layer_id().as_str(), "Rig/eyes");
        assert_eq!(PartKind::FrontHair.default_tolerance(), Tolerance::SOFT);
        assert_eq!(PartKind::Mouth.default_tolerance(), Tolerance::SHARP);
        assert_eq!(PartKind::BodySkin.aspect_ratio(), AspectRatio::Portrait3x4);
        assert_eq!(PartKind::FrontHair.aspect_ratio(), AspectRatio::Square);
        assert_eq!(PartKind::BackHair.attach(), AttachKind::Canvas);
    }
}
