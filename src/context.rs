use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ort::Environment;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::emotion::{EmotionClassifier, EmotionResult, EmotionSimulator, OnnxEmotionModel};
use crate::face_detection::{FaceDetector, OnnxFaceModel, SkinToneHeuristic};
use crate::frame::Frame;
use crate::onnx;
use crate::preprocess::{preprocess, EMOTION_INPUT};
use crate::tensor::TensorLedger;

/// What the pipeline concluded about the latest sampled frame.
///
/// `emotion` is only ever set together with `face_detected`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Observation {
    pub face_detected: bool,
    pub emotion: Option<EmotionResult>,
    pub detection_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelStatus {
    pub face_model_loaded: bool,
    pub emotion_model_loaded: bool,
}

/// Everything one running pipeline needs: the chosen detection strategies,
/// the tensor ledger, the running detection count and the published result.
pub struct PipelineContext {
    face_detector: FaceDetector,
    classifier: EmotionClassifier,
    ledger: TensorLedger,
    detection_count: AtomicU64,
    published: watch::Sender<Observation>,
}

impl PipelineContext {
    pub fn new(face_detector: FaceDetector, classifier: EmotionClassifier) -> Self {
        let (published, _) = watch::channel(Observation::default());
        Self {
            face_detector,
            classifier,
            ledger: TensorLedger::new(),
            detection_count: AtomicU64::new(0),
            published,
        }
    }

    /// Builds the context from the well-known model paths. Either model may be
    /// missing or broken; each one degrades to its fallback independently.
    pub fn from_config(config: &Config) -> Self {
        let face_path = config.face_model_path();
        let emotion_path = config.emotion_model_path();

        // only spin up the runtime when there is something to load
        let environment = if face_path.is_file() || emotion_path.is_file() {
            match onnx::environment() {
                Ok(environment) => Some(environment),
                Err(e) => {
                    warn!("could not start ONNX runtime, models disabled: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let heuristic = SkinToneHeuristic::new(config.skin_ratio_threshold);
        let face_detector = match load_face_model(environment.as_ref(), &face_path) {
            Some(model) => {
                FaceDetector::model_backed(Box::new(model), config.face_score_threshold, heuristic)
            }
            None => FaceDetector::heuristic(heuristic),
        };

        let classifier = match load_emotion_model(environment.as_ref(), &emotion_path) {
            Some(model) => EmotionClassifier::model_backed(Box::new(model), EmotionSimulator::new()),
            None => EmotionClassifier::simulated(EmotionSimulator::new()),
        };

        let context = Self::new(face_detector, classifier);
        let status = context.status();
        info!(
            "face detection: {}, emotion: {}",
            if status.face_model_loaded { "model" } else { "skin tone heuristic" },
            if status.emotion_model_loaded { "model" } else { "simulated" },
        );
        context
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            face_model_loaded: self.face_detector.is_model_backed(),
            emotion_model_loaded: self.classifier.is_model_backed(),
        }
    }

    pub fn ledger(&self) -> &TensorLedger {
        &self.ledger
    }

    pub fn detection_count(&self) -> u64 {
        self.detection_count.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> watch::Receiver<Observation> {
        self.published.subscribe()
    }

    pub fn latest(&self) -> Observation {
        *self.published.borrow()
    }

    /// Runs detect -> preprocess -> classify on one frame and publishes the outcome.
    pub fn process_frame(&self, frame: &Frame) -> Observation {
        let observation = if self.face_detector.detect_face(frame, &self.ledger) {
            let input = preprocess(frame, EMOTION_INPUT, &self.ledger);
            let emotion = self.classifier.classify(input);
            let detection_count = self.detection_count.fetch_add(1, Ordering::AcqRel) + 1;

            debug!(
                "frame {}: {} ({:.2})",
                frame.sequence, emotion.emotion, emotion.confidence
            );

            Observation {
                face_detected: true,
                emotion: Some(emotion),
                detection_count,
            }
        } else {
            debug!("frame {}: no face", frame.sequence);
            self.no_result()
        };

        self.published.send_replace(observation);
        observation
    }

    /// Publishes "no result", e.g. after a failed tick.
    pub fn publish_no_result(&self) -> Observation {
        let observation = self.no_result();
        self.published.send_replace(observation);
        observation
    }

    fn no_result(&self) -> Observation {
        Observation {
            face_detected: false,
            emotion: None,
            detection_count: self.detection_count(),
        }
    }
}

fn load_face_model(environment: Option<&Arc<Environment>>, path: &Path) -> Option<OnnxFaceModel> {
    let environment = environment?;
    match OnnxFaceModel::load(environment, path) {
        Ok(model) => Some(model),
        Err(e) => {
            warn!("could not load face detection model, using skin tone detection: {}", e);
            None
        }
    }
}

fn load_emotion_model(
    environment: Option<&Arc<Environment>>,
    path: &Path,
) -> Option<OnnxEmotionModel> {
    let environment = environment?;
    match OnnxEmotionModel::load(environment, path) {
        Ok(model) => Some(model),
        Err(e) => {
            warn!("could not load emotion model, using simulation: {}", e);
            None
        }
    }
}
