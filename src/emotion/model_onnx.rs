use std::path::Path;
use std::sync::Arc;

use ort::Environment;

use crate::emotion::EmotionModel;
use crate::error::Result;
use crate::onnx::OnnxModel;
use crate::tensor::Tensor;

/// FER-style CNN exported to ONNX: `[1, 48, 48, 1]` grayscale in, 7 scores out.
pub struct OnnxEmotionModel {
    model: OnnxModel,
}

impl OnnxEmotionModel {
    pub fn load(environment: &Arc<Environment>, path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            model: OnnxModel::load(environment, path)?,
        })
    }
}

impl EmotionModel for OnnxEmotionModel {
    fn scores(&self, input: &Tensor) -> Result<Vec<f32>> {
        self.model.run(input)
    }

    fn name(&self) -> &str {
        "onnx emotion model"
    }
}
