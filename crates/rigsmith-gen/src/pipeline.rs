//! The rigging pipeline: source image to master character to layered PSD
//!
//! A session moves through
//! `Idle -> Detecting -> Cropping -> Refining -> Idle` when extracting a
//! master character, and `Idle|Completed -> GeneratingParts -> Assembling ->
//! Completed` when generating parts. Any failure returns the session to
//! `Idle` holding the master it had before the action started.

use crate::config::ToleranceTable;
use crate::export::{write_document, ExportedDocument};
use crate::parts::PartKind;
use crate::prompt::{master_prompt, part_prompt};
use crate::provider::{AspectRatio, GenerationProvider};
use crate::store::{GeneratedLayer, LayerStore};
use image::imageops;
use rigsmith_compose::{
    extract_alpha, fit_to_frame, place, placement::crop_box, FaceFrame, LayerRecord,
    LayeredDocument, Placement,
};
use rigsmith_core::{BoundingBox, PixelRect, RasterBuffer, Result, RigError, RiggingAnalysis};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opacity of the hidden reference layer at the bottom of the document
const REFERENCE_OPACITY: f32 = 0.4;
const REFERENCE_NAME: &str = "Original Ref (Reference)";

/// Data-free tag of a [`RiggingState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiggingStep {
    Idle,
    Detecting,
    Cropping,
    Refining,
    GeneratingParts,
    Assembling,
    Completed,
}

impl fmt::Display for RiggingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiggingStep::Idle => "idle",
            RiggingStep::Detecting => "detecting",
            RiggingStep::Cropping => "cropping",
            RiggingStep::Refining => "refining",
            RiggingStep::GeneratingParts => "generating parts",
            RiggingStep::Assembling => "assembling",
            RiggingStep::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// A normalized, front-facing character image and what is known about it
#[derive(Debug, Clone, PartialEq)]
pub struct MasterCharacter {
    pub image: RasterBuffer,
    /// Description of the cropped source the master was generated from
    pub description: String,
    pub analysis: RiggingAnalysis,
}

/// Where the session is, with only the data valid at that point
#[derive(Debug, Clone)]
pub enum RiggingState {
    Idle {
        master: Option<Arc<MasterCharacter>>,
    },
    Detecting,
    Cropping {
        detected: BoundingBox,
    },
    Refining {
        crop: PixelRect,
    },
    GeneratingParts {
        master: Arc<MasterCharacter>,
    },
    /// Carries the five parts as the provider returned them, before keying
    Assembling {
        master: Arc<MasterCharacter>,
        parts: Vec<(PartKind, RasterBuffer)>,
    },
    Completed {
        master: Arc<MasterCharacter>,
        document: ExportedDocument,
    },
}

impl RiggingState {
    pub fn step(&self) -> RiggingStep {
        match self {
            RiggingState::Idle { .. } => RiggingStep::Idle,
            RiggingState::Detecting => RiggingStep::Detecting,
            RiggingState::Cropping { .. } => RiggingStep::Cropping,
            RiggingState::Refining { .. } => RiggingStep::Refining,
            RiggingState::GeneratingParts { .. } => RiggingStep::GeneratingParts,
            RiggingState::Assembling { .. } => RiggingStep::Assembling,
            RiggingState::Completed { .. } => RiggingStep::Completed,
        }
    }

    pub fn master(&self) -> Option<&MasterCharacter> {
        match self {
            RiggingState::Idle { master } => master.as_deref(),
            RiggingState::GeneratingParts { master }
            | RiggingState::Assembling { master, .. }
            | RiggingState::Completed { master, .. } => Some(master),
            _ => None,
        }
    }
}

type Observer<'a> = Box<dyn FnMut(RiggingStep, &str) + 'a>;

/// One source image's trip through the rigging pipeline
pub struct RiggingSession<'a> {
    provider: Arc<dyn GenerationProvider>,
    output_dir: PathBuf,
    tolerances: ToleranceTable,
    state: RiggingState,
    status: String,
    parts: LayerStore,
    observer: Option<Observer<'a>>,
}

impl<'a> RiggingSession<'a> {
    pub fn new(provider: Arc<dyn GenerationProvider>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            output_dir: output_dir.into(),
            tolerances: ToleranceTable::default(),
            state: RiggingState::Idle { master: None },
            status: "Waiting for a source image.".to_string(),
            parts: LayerStore::new(),
            observer: None,
        }
    }

    /// Override per-part keying tolerances
    pub fn with_tolerances(mut self, tolerances: ToleranceTable) -> Self {
        self.tolerances = tolerances;
        self
    }

    /// Called with the new step and status on every transition
    pub fn with_observer(mut self, observer: impl FnMut(RiggingStep, &str) + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> &RiggingState {
        &self.state
    }

    pub fn step(&self) -> RiggingStep {
        self.state.step()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn master(&self) -> Option<&MasterCharacter> {
        self.state.master()
    }

    /// The generated parts, keyed `Rig/<part>`
    pub fn parts(&self) -> &LayerStore {
        &self.parts
    }

    /// Start over with a new source image
    pub fn reset(&mut self) {
        self.parts.clear();
        self.transition(RiggingState::Idle { master: None }, "Waiting for a source image.");
    }

    /// Detect, crop and refine `source` into a master character.
    ///
    /// Only valid from `Idle`. On failure the previous master (if any) is
    /// kept.
    pub fn extract(&mut self, source: &RasterBuffer) -> Result<()> {
        let previous = match &self.state {
            RiggingState::Idle { master } => master.clone(),
            _ => return Err(self.invalid("extract a master character")),
        };
        if source.width() == 0 || source.height() == 0 {
            return Err(RigError::InvalidRequest("source image is empty".to_string()));
        }

        match self.run_extract(source) {
            Ok(master) => {
                self.transition(
                    RiggingState::Idle {
                        master: Some(Arc::new(master)),
                    },
                    "Clean master image ready.",
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "master extraction failed");
                self.transition(
                    RiggingState::Idle { master: previous },
                    format!("Character extraction failed: {}", e),
                );
                Err(e)
            }
        }
    }

    fn run_extract(&mut self, source: &RasterBuffer) -> Result<MasterCharacter> {
        self.transition(RiggingState::Detecting, "Locating the main character...");
        let detected = self.provider.detect_bounding_box(source)?;

        self.transition(
            RiggingState::Cropping { detected },
            format!("Cropping to {}...", detected),
        );
        let crop = crop_box(&detected).to_pixel_rect(source.width(), source.height());
        let cropped = imageops::crop_imm(source, crop.x, crop.y, crop.width, crop.height).to_image();

        self.transition(
            RiggingState::Refining { crop },
            "Generating a clean full-body master image...",
        );
        let description = self.provider.describe(&cropped)?;
        let image = self
            .provider
            .generate_image(&master_prompt(&description), AspectRatio::Portrait3x4)?;
        let analysis = self.provider.analyze_face(&image)?;

        Ok(MasterCharacter {
            image,
            description,
            analysis,
        })
    }

    /// Generate the five parts from the current master, assemble them and
    /// write `Live2D_Model_<timestamp>.psd`.
    ///
    /// Valid from `Idle` with a master, or from `Completed` to regenerate.
    pub fn generate_parts(&mut self) -> Result<ExportedDocument> {
        let master = match &self.state {
            RiggingState::Idle {
                master: Some(master),
            }
            | RiggingState::Completed { master, .. } => Arc::clone(master),
            _ => return Err(self.invalid("generate parts")),
        };

        match self.run_parts(&master) {
            Ok(document) => {
                let status = format!("Exported {}", document.path.display());
                self.transition(
                    RiggingState::Completed {
                        master,
                        document: document.clone(),
                    },
                    status,
                );
                Ok(document)
            }
            Err(e) => {
                tracing::warn!(error = %e, "part generation failed");
                self.transition(
                    RiggingState::Idle {
                        master: Some(master),
                    },
                    format!("Part generation failed: {}", e),
                );
                Err(e)
            }
        }
    }

    fn run_parts(&mut self, master: &Arc<MasterCharacter>) -> Result<ExportedDocument> {
        self.transition(
            RiggingState::GeneratingParts {
                master: Arc::clone(master),
            },
            "Generating parts (body, back hair, front hair, eyes, mouth)...",
        );
        for part in PartKind::ALL {
            self.parts.begin(&part.layer_id());
        }

        let generated = self
            .provider
            .describe(&master.image)
            .and_then(|description| generate_all(self.provider.as_ref(), &description));
        let generated = match generated {
            Ok(generated) => generated,
            Err(e) => {
                self.fail_parts(&e);
                return Err(e);
            }
        };

        self.transition(
            RiggingState::Assembling {
                master: Arc::clone(master),
                parts: generated,
            },
            "Assembling the PSD (keying and placement)...",
        );
        let assembled = match &self.state {
            RiggingState::Assembling { master, parts } => {
                assemble(master, parts, &self.tolerances, &self.output_dir)
            }
            _ => Err(self.invalid("assemble parts")),
        };

        // The store only takes layers that made it into a written document
        match assembled {
            Ok((exported, layers)) => {
                for layer in layers {
                    self.parts.complete(layer);
                }
                Ok(exported)
            }
            Err(e) => {
                self.fail_parts(&e);
                Err(e)
            }
        }
    }

    fn fail_parts(&mut self, error: &RigError) {
        for part in PartKind::ALL {
            self.parts.fail(&part.layer_id(), error.to_string());
        }
    }

    fn transition(&mut self, state: RiggingState, status: impl Into<String>) {
        self.state = state;
        self.status = status.into();
        let step = self.state.step();
        tracing::info!(step = %step, status = %self.status, "rigging step");
        if let Some(observer) = self.observer.as_mut() {
            observer(step, &self.status);
        }
    }

    fn invalid(&self, action: &str) -> RigError {
        RigError::InvalidTransition {
            action: action.to_string(),
            step: self.state.step().to_string(),
        }
    }
}

/// Key, place and stack the generated parts over the master, then write the
/// document. Returns the placed layers alongside the written file.
fn assemble(
    master: &MasterCharacter,
    parts: &[(PartKind, RasterBuffer)],
    tolerances: &ToleranceTable,
    output_dir: &Path,
) -> Result<(ExportedDocument, Vec<GeneratedLayer>)> {
    let (canvas_w, canvas_h) = master.image.dimensions();
    let face = FaceFrame::from_box(&master.analysis.face_box, canvas_w, canvas_h);
    let mut warnings = Vec::new();
    let mut layers = Vec::with_capacity(parts.len());

    for (part, image) in parts {
        let mut image = image.clone();
        let tolerance = tolerances.tolerance_for(part.key(), part.default_tolerance());
        let stats = extract_alpha(&mut image, tolerance);
        if stats.is_fully_transparent() {
            tracing::warn!(part = %part, tolerance = %tolerance, "part keyed to full transparency");
            warnings.push(format!(
                "{} is fully transparent after keying (tolerance {})",
                part.document_name(),
                tolerance
            ));
        }

        let (w, h) = image.dimensions();
        let frame = place(part.attach(), &face, w, h);
        let (image, placement) = fit_to_frame(image, &frame);
        layers.push(GeneratedLayer {
            id: part.layer_id(),
            image,
            placement: Some(placement),
        });
    }

    let mut document = LayeredDocument::new(canvas_w, canvas_h)?;
    document.push(
        LayerRecord::new(REFERENCE_NAME, master.image.clone())
            .hidden()
            .with_opacity(REFERENCE_OPACITY),
    );
    for part in PartKind::DOCUMENT_ORDER {
        let id = part.layer_id();
        let layer = layers
            .iter()
            .find(|l| l.id == id)
            .ok_or_else(|| RigError::AssemblyFailed(format!("missing generated part {}", part)))?;
        let placement = layer.placement.unwrap_or(Placement::ORIGIN);
        document.push(
            LayerRecord::new(part.document_name(), layer.image.clone())
                .at(placement.left, placement.top),
        );
    }

    let bytes = document.to_psd()?;
    let mut exported = write_document(&bytes, output_dir, "Live2D_Model")?;
    exported.warnings = warnings;
    tracing::info!(
        path = %exported.path.display(),
        hash = %exported.content_hash.short(),
        warnings = exported.warnings.len(),
        "exported rig document"
    );
    Ok((exported, layers))
}

/// Request all five parts at once and wait for every one of them.
///
/// The first failure in generation order is returned.
fn generate_all(
    provider: &dyn GenerationProvider,
    description: &str,
) -> Result<Vec<(PartKind, RasterBuffer)>> {
    let joined: Vec<(PartKind, std::thread::Result<Result<RasterBuffer>>)> =
        std::thread::scope(|scope| {
            let handles: Vec<_> = PartKind::ALL
                .iter()
                .map(|&part| {
                    let prompt = part_prompt(part, description);
                    let handle =
                        scope.spawn(move || provider.generate_image(&prompt, part.aspect_ratio()));
                    (part, handle)
                })
                .collect();
            handles
                .into_iter()
                .map(|(part, handle)| (part, handle.join()))
                .collect()
        });

    joined
        .into_iter()
        .map(|(part, result)| match result {
            Ok(Ok(image)) => Ok((part, image)),
            Ok(Err(e)) => {
                tracing::warn!(part = %part, error = %e, "part request failed");
                Err(e)
            }
            Err(_) => Err(RigError::GenerationFailed(format!(
                "{}: generation thread panicked",
                part
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::MockProvider;
    use crate::store::LayerSlot;
    use rigsmith_compose::psd;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("rigsmith_pipeline_test_{}", uuid::Uuid::new_v4()))
    }

    fn source() -> RasterBuffer {
        RasterBuffer::from_pixel(400, 600, image::Rgba([230, 200, 180, 255]))
    }

    #[test]
    fn test_full_run() {
        let dir = temp_dir();
        let provider = Arc::new(MockProvider::new());
        let steps = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&steps);
        let mut session = RiggingSession::new(provider.clone(), &dir)
            .with_observer(move |step, _status| seen.borrow_mut().push(step));

        session.extract(&source()).unwrap();
        assert_eq!(session.step(), RiggingStep::Idle);
        let master = session.master().unwrap();
        assert_eq!(
            master.image.dimensions(),
            MockProvider::dimensions(AspectRatio::Portrait3x4)
        );

        let exported = session.generate_parts().unwrap();
        assert_eq!(session.step(), RiggingStep::Completed);
        assert!(exported.warnings.is_empty());

        assert_eq!(
            *steps.borrow(),
            vec![
                RiggingStep::Detecting,
                RiggingStep::Cropping,
                RiggingStep::Refining,
                RiggingStep::Idle,
                RiggingStep::GeneratingParts,
                RiggingStep::Assembling,
                RiggingStep::Completed,
            ]
        );

        let doc = psd::decode(&std::fs::read(&exported.path).unwrap()).unwrap();
        let names: Vec<&str> = doc.layers().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Original Ref (Reference)",
                "Back Hair (後ろ髪)",
                "Body & Head (素体)",
                "Mouth (口)",
                "Eyes (目)",
                "Front Hair (前髪)",
            ]
        );
        assert!(doc.layers()[0].hidden);
        assert!(doc.layers()[1..].iter().all(|l| !l.hidden));
        assert_eq!(
            (doc.width(), doc.height()),
            MockProvider::dimensions(AspectRatio::Portrait3x4)
        );

        // Five part requests, one per part
        let part_calls = provider
            .calls()
            .iter()
            .filter(|c| c.contains("(Isolated)"))
            .count();
        assert_eq!(part_calls, 5);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_regeneration_keeps_five_parts() {
        let dir = temp_dir();
        let mut session = RiggingSession::new(Arc::new(MockProvider::new()), &dir);
        session.extract(&source()).unwrap();
        let first = session.generate_parts().unwrap();
        let second = session.generate_parts().unwrap();

        assert_eq!(session.parts().ready_count(), 5);
        assert_eq!(session.parts().ready_layers().len(), 5);
        assert_ne!(first.path, second.path);
        assert_eq!(session.step(), RiggingStep::Completed);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_face_parts_follow_face_box() {
        let dir = temp_dir();
        let analysis = RiggingAnalysis {
            face_box: BoundingBox::FULL,
            recommendations: "none".to_string(),
        };
        let mut session =
            RiggingSession::new(Arc::new(MockProvider::new().with_analysis(analysis)), &dir);
        session.extract(&source()).unwrap();
        session.generate_parts().unwrap();

        let (w, h) = MockProvider::dimensions(AspectRatio::Portrait3x4);
        let mouth = session.parts().get(&PartKind::Mouth.layer_id()).unwrap();
        // Square mock asset at 0.3 of the face width, centred at 0.75 height
        let expected_side = (w as f64 * 0.3).round() as u32;
        assert_eq!(mouth.image.dimensions(), (expected_side, expected_side));
        let placement = mouth.placement.unwrap();
        let center_y = placement.top as f64 + expected_side as f64 / 2.0;
        assert!((center_y - 0.75 * h as f64).abs() <= 1.0);

        let body = session.parts().get(&PartKind::BodySkin.layer_id()).unwrap();
        assert_eq!(body.placement, Some(Placement::ORIGIN));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_part_failure_returns_to_idle_with_master() {
        let dir = temp_dir();
        let provider = Arc::new(MockProvider::new().fail_on("Front hair (bangs)"));
        let mut session = RiggingSession::new(provider, &dir);
        session.extract(&source()).unwrap();
        let master_before = session.master().cloned();

        let err = session.generate_parts().unwrap_err();
        assert!(matches!(err, RigError::GenerationFailed(_)));
        assert!(err.to_string().contains("Front hair (bangs)"));
        assert!(!err.to_string().contains("Generation failed: Generation failed"));
        assert_eq!(session.step(), RiggingStep::Idle);
        assert_eq!(session.master().cloned(), master_before);

        for part in PartKind::ALL {
            assert!(matches!(
                session.parts().state(&part.layer_id()),
                LayerSlot::Failed { .. }
            ));
        }
        assert!(!dir.exists() || std::fs::read_dir(&dir).unwrap().next().is_none());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_extract_failure_keeps_previous_master() {
        let dir = temp_dir();
        let provider = Arc::new(MockProvider::new().fail_on("detect"));
        let mut session = RiggingSession::new(provider, &dir);

        let err = session.extract(&source()).unwrap_err();
        assert!(matches!(err, RigError::GenerationFailed(_)));
        assert_eq!(session.step(), RiggingStep::Idle);
        assert!(session.master().is_none());
        assert!(session.status().contains("failed"));
    }

    #[test]
    fn test_invalid_transitions() {
        let dir = temp_dir();
        let mut session = RiggingSession::new(Arc::new(MockProvider::new()), &dir);
        assert!(matches!(
            session.generate_parts().unwrap_err(),
            RigError::InvalidTransition { .. }
        ));

        session.extract(&source()).unwrap();
        session.generate_parts().unwrap();
        // A completed session needs a reset before taking a new source
        assert!(matches!(
            session.extract(&source()).unwrap_err(),
            RigError::InvalidTransition { .. }
        ));

        session.reset();
        assert!(session.master().is_none());
        assert_eq!(session.parts().ready_count(), 0);
        session.extract(&source()).unwrap();

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_blank_part_is_a_warning() {
        let dir = temp_dir();
        let provider = Arc::new(MockProvider::new().blank_on("Anime mouth"));
        let mut session = RiggingSession::new(provider, &dir);
        session.extract(&source()).unwrap();

        let exported = session.generate_parts().unwrap();
        assert_eq!(exported.warnings.len(), 1);
        assert!(exported.warnings[0].starts_with("Mouth"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_failed_write_discards_new_parts() {
        let dir = temp_dir();
        let mut session = RiggingSession::new(Arc::new(MockProvider::new()), &dir);
        session.extract(&source()).unwrap();
        session.generate_parts().unwrap();
        let previous = session.parts().get(&PartKind::Eyes.layer_id()).cloned();

        // Output directory replaced by a plain file
        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::write(&dir, b"not a directory").unwrap();

        let err = session.generate_parts().unwrap_err();
        assert!(matches!(err, RigError::IoError(_)));
        assert_eq!(session.step(), RiggingStep::Idle);
        assert!(session.master().is_some());
        for part in PartKind::ALL {
            assert!(matches!(
                session.parts().state(&part.layer_id()),
                LayerSlot::Failed { .. }
            ));
        }
        assert_eq!(session.parts().failed().len(), 5);
        // The layers of the last written document are still there
        assert_eq!(session.parts().get(&PartKind::Eyes.layer_id()).cloned(), previous);

        std::fs::remove_file(&dir).ok();
    }

    #[test]
    fn test_first_failed_write_leaves_no_layers() {
        let path = temp_dir();
        std::fs::write(&path, b"not a directory").unwrap();
        let mut session = RiggingSession::new(Arc::new(MockProvider::new()), &path);
        session.extract(&source()).unwrap();

        assert!(session.generate_parts().is_err());
        for part in PartKind::ALL {
            assert!(session.parts().get(&part.layer_id()).is_none());
        }

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_out_of_range_face_box_is_clamped() {
        let dir = temp_dir();
        let analysis: RiggingAnalysis = serde_json::from_str(
            r#"{"face_box": [100, 300, 300, 5000], "recommendations": "none"}"#,
        )
        .unwrap();
        assert_eq!(analysis.face_box.to_array(), [100, 300, 300, 1000]);

        let mut session =
            RiggingSession::new(Arc::new(MockProvider::new().with_analysis(analysis)), &dir);
        session.extract(&source()).unwrap();
        session.generate_parts().unwrap();

        let (w, _) = MockProvider::dimensions(AspectRatio::Portrait3x4);
        let eyes = session.parts().get(&PartKind::Eyes.layer_id()).unwrap();
        // 0.8 of a face spanning x 300..1000
        let expected = (w as f64 * 0.7 * 0.8).round() as u32;
        assert_eq!(eyes.image.width(), expected);
        assert!(eyes.image.width() <= w);

        // An inverted box never reaches the pipeline
        assert!(serde_json::from_str::<RiggingAnalysis>(
            r#"{"face_box": [300, 700, 100, 300], "recommendations": "none"}"#
        )
        .is_err());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_assembling_state_carries_parts() {
        let master = Arc::new(MasterCharacter {
            image: RasterBuffer::new(4, 4),
            description: "d".to_string(),
            analysis: RiggingAnalysis::default(),
        });
        let state = RiggingState::Assembling {
            master,
            parts: vec![(PartKind::Mouth, RasterBuffer::new(2, 2))],
        };
        assert_eq!(state.step(), RiggingStep::Assembling);
        assert_eq!(state.master().map(|m| m.description.as_str()), Some("d"));
        assert!(RiggingState::Detecting.master().is_none());
    }

    #[test]
    fn test_empty_source_rejected() {
        let mut session = RiggingSession::new(Arc::new(MockProvider::new()), temp_dir());
        assert!(matches!(
            session.extract(&RasterBuffer::new(0, 0)).unwrap_err(),
            RigError::InvalidRequest(_)
        ));
    }
}
