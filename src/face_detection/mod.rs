pub mod model_onnx;
pub mod skin_tone;

use core::fmt::Debug;

use tracing::warn;

use crate::error::Result;
use crate::frame::Frame;
use crate::preprocess::{preprocess, FACE_INPUT};
use crate::tensor::{Tensor, TensorLedger};

pub use model_onnx::OnnxFaceModel;
pub use skin_tone::SkinToneHeuristic;

/// A binary face/no-face classifier.
pub trait FacePresenceModel: Send + Sync {
    /// Returns the raw "face present" score for a `FACE_INPUT` tensor.
    fn face_score(&self, input: &Tensor) -> Result<f32>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "face-model"
    }
}

impl Debug for dyn FacePresenceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacePresenceModel")
            .field("name", &self.name())
            .finish()
    }
}

/// Face presence strategy, chosen once when the pipeline is built.
#[derive(Debug)]
pub enum FaceDetector {
    /// Model inference, with the skin-tone heuristic as a per-call fallback.
    ModelBacked {
        model: Box<dyn FacePresenceModel>,
        score_threshold: f32,
        heuristic: SkinToneHeuristic,
    },
    HeuristicFallback(SkinToneHeuristic),
}

impl FaceDetector {
    pub fn model_backed(
        model: Box<dyn FacePresenceModel>,
        score_threshold: f32,
        heuristic: SkinToneHeuristic,
    ) -> Self {
        FaceDetector::ModelBacked {
            model,
            score_threshold,
            heuristic,
        }
    }

    pub fn heuristic(heuristic: SkinToneHeuristic) -> Self {
        FaceDetector::HeuristicFallback(heuristic)
    }

    pub fn is_model_backed(&self) -> bool {
        matches!(self, FaceDetector::ModelBacked { .. })
    }

    /// Decides whether a face is present. Never fails: model errors fall back
    /// to the heuristic.
    pub fn detect_face(&self, frame: &Frame, ledger: &TensorLedger) -> bool {
        match self {
            FaceDetector::HeuristicFallback(heuristic) => heuristic.is_face_present(frame),
            FaceDetector::ModelBacked {
                model,
                score_threshold,
                heuristic,
            } => {
                let input = preprocess(frame, FACE_INPUT, ledger);
                match model.face_score(&input) {
                    Ok(score) => score > *score_threshold,
                    Err(e) => {
                        warn!(
                            "{} failed, falling back to skin tone detection: {}",
                            model.name(),
                            e
                        );
                        heuristic.is_face_present(frame)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct FixedScore(f32);

    impl FacePresenceModel for FixedScore {
        fn face_score(&self, input: &Tensor) -> Result<f32> {
            assert_eq!(input.shape(), FACE_INPUT.shape());
            Ok(self.0)
        }
    }

    struct Broken;

    impl FacePresenceModel for Broken {
        fn face_score(&self, _input: &Tensor) -> Result<f32> {
            Err(Error::Inference("boom".to_string()))
        }
    }

    fn skin_frame() -> Frame {
        Frame::uniform(64, 48, [200, 150, 100])
    }

    fn black_frame() -> Frame {
        Frame::uniform(64, 48, [0, 0, 0])
    }

    #[test]
    fn test_heuristic_variant() {
        let ledger = TensorLedger::new();
        let detector = FaceDetector::heuristic(SkinToneHeuristic::default());
        assert!(!detector.is_model_backed());
        assert!(detector.detect_face(&skin_frame(), &ledger));
        assert!(!detector.detect_face(&black_frame(), &ledger));
    }

    #[test]
    fn test_model_score_overrides_heuristic() {
        let ledger = TensorLedger::new();

        let confident = FaceDetector::model_backed(
            Box::new(FixedScore(0.9)),
            0.5,
            SkinToneHeuristic::default(),
        );
        assert!(confident.is_model_backed());
        assert!(confident.detect_face(&black_frame(), &ledger));

        let doubtful = FaceDetector::model_backed(
            Box::new(FixedScore(0.2)),
            0.5,
            SkinToneHeuristic::default(),
        );
        assert!(!doubtful.detect_face(&skin_frame(), &ledger));
        assert_eq!(ledger.live(), 0);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let ledger = TensorLedger::new();
        let detector = FaceDetector::model_backed(
            Box::new(FixedScore(0.5)),
            0.5,
            SkinToneHeuristic::default(),
        );
        assert!(!detector.detect_face(&skin_frame(), &ledger));
    }

    #[test]
    fn test_model_failure_falls_back_to_heuristic() {
        let ledger = TensorLedger::new();
        let detector =
            FaceDetector::model_backed(Box::new(Broken), 0.5, SkinToneHeuristic::default());
        assert!(detector.detect_face(&skin_frame(), &ledger));
        assert!(!detector.detect_face(&black_frame(), &ledger));
        assert_eq!(ledger.live(), 0);
    }
}
