use std::path::Path;
use std::sync::Arc;

use ort::Environment;

use crate::error::{Error, Result};
use crate::face_detection::FacePresenceModel;
use crate::onnx::OnnxModel;
use crate::tensor::Tensor;

/// Binary face classifier exported to ONNX.
///
/// Takes `[1, 224, 224, 3]` RGB in [0, 1] and emits a single score, where
/// higher means "face present".
pub struct OnnxFaceModel {
    model: OnnxModel,
}

impl OnnxFaceModel {
    pub fn load(environment: &Arc<Environment>, path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            model: OnnxModel::load(environment, path)?,
        })
    }
}

impl FacePresenceModel for OnnxFaceModel {
    fn face_score(&self, input: &Tensor) -> Result<f32> {
        let scores = self.model.run(input)?;
        scores.first().copied().ok_or_else(|| {
            Error::UnexpectedOutput(format!(
                "{} returned an empty output",
                self.model.path().display()
            ))
        })
    }

    fn name(&self) -> &str {
        "onnx face model"
    }
}
