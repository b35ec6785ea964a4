pub mod model_onnx;
pub mod simulated;

use core::fmt::Debug;
use std::fmt;

use tracing::warn;

use crate::error::{Error, Result};
use crate::tensor::Tensor;

pub use model_onnx::OnnxEmotionModel;
pub use simulated::EmotionSimulator;

/// The seven FER-2013 categories, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    pub fn from_index(index: usize) -> Option<Emotion> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Emotion::Angry => "Angry",
            Emotion::Disgust => "Disgust",
            Emotion::Fear => "Fear",
            Emotion::Happy => "Happy",
            Emotion::Sad => "Sad",
            Emotion::Surprise => "Surprise",
            Emotion::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a result came from. Simulated results look the same from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Model,
    Simulated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionResult {
    pub emotion: Emotion,
    /// Raw model score (or simulated value), in [0, 1].
    pub confidence: f32,
    pub origin: Origin,
}

impl EmotionResult {
    /// Picks the strongest of exactly seven scores. Ties go to the lowest index.
    pub fn from_scores(scores: &[f32]) -> Result<Self> {
        if scores.len() != Emotion::ALL.len() {
            return Err(Error::UnexpectedOutput(format!(
                "expected {} emotion scores, got {}",
                Emotion::ALL.len(),
                scores.len()
            )));
        }

        let (index, confidence) = scores
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, score)| {
                if score > best.1 {
                    (i, score)
                } else {
                    best
                }
            });

        if !confidence.is_finite() {
            return Err(Error::UnexpectedOutput(
                "emotion scores are not finite".to_string(),
            ));
        }

        let emotion = Emotion::from_index(index)
            .ok_or_else(|| Error::UnexpectedOutput(format!("no emotion at index {}", index)))?;

        Ok(Self {
            emotion,
            confidence,
            origin: Origin::Model,
        })
    }
}

/// A multi-class emotion model over `EMOTION_INPUT` tensors.
pub trait EmotionModel: Send + Sync {
    fn scores(&self, input: &Tensor) -> Result<Vec<f32>>;

    fn name(&self) -> &str {
        "emotion-model"
    }
}

impl Debug for dyn EmotionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmotionModel")
            .field("name", &self.name())
            .finish()
    }
}

/// Emotion strategy, chosen once when the pipeline is built.
#[derive(Debug)]
pub enum EmotionClassifier {
    /// Model inference, simulated result when inference fails.
    ModelBacked {
        model: Box<dyn EmotionModel>,
        simulator: EmotionSimulator,
    },
    Simulated(EmotionSimulator),
}

impl EmotionClassifier {
    pub fn model_backed(model: Box<dyn EmotionModel>, simulator: EmotionSimulator) -> Self {
        EmotionClassifier::ModelBacked { model, simulator }
    }

    pub fn simulated(simulator: EmotionSimulator) -> Self {
        EmotionClassifier::Simulated(simulator)
    }

    pub fn is_model_backed(&self) -> bool {
        matches!(self, EmotionClassifier::ModelBacked { .. })
    }

    /// Classifies one preprocessed tensor. The tensor is consumed and
    /// released before the result is returned, whatever the outcome.
    pub fn classify(&self, input: Tensor) -> EmotionResult {
        match self {
            EmotionClassifier::Simulated(simulator) => {
                drop(input);
                simulator.simulate()
            }
            EmotionClassifier::ModelBacked { model, simulator } => {
                let outcome = model
                    .scores(&input)
                    .and_then(|scores| EmotionResult::from_scores(&scores));
                drop(input);

                match outcome {
                    Ok(result) => result,
                    Err(e) => {
                        warn!("{} failed, using simulation: {}", model.name(), e);
                        simulator.simulate()
                    }
                }
            }
        }
    }
}
