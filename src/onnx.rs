use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ort::tensor::OrtOwnedTensor;
use ort::{Environment, GraphOptimizationLevel, Session, SessionBuilder, Value};
use tracing::info;

use crate::error::{Error, Result};
use crate::tensor::Tensor;

/// Shared ONNX runtime environment. Build one per process.
pub fn environment() -> Result<Arc<Environment>> {
    let environment = Environment::builder()
        .with_name("emotion-sampler")
        .build()?
        .into_arc();
    Ok(environment)
}

/// A loaded single-input ONNX model.
pub struct OnnxModel {
    _environment: Arc<Environment>,
    session: Mutex<Session>,
    path: PathBuf,
}

impl OnnxModel {
    pub fn load(environment: &Arc<Environment>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::ModelLoad {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }

        let session = SessionBuilder::new(environment)
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level1))
            .and_then(|builder| builder.with_intra_threads(1))
            .and_then(|builder| builder.with_model_from_file(path))
            .map_err(|e| Error::ModelLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        info!("loaded model {}", path.display());

        Ok(Self {
            _environment: Arc::clone(environment),
            session: Mutex::new(session),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs the model on one tensor and returns its first output, flattened.
    pub fn run(&self, tensor: &Tensor) -> Result<Vec<f32>> {
        let session = self
            .session
            .lock()
            .map_err(|_| Error::Inference("session lock poisoned".to_string()))?;

        let input = tensor.as_cow_dyn();
        let inputs = vec![Value::from_array(session.allocator(), &input)?];
        let outputs: Vec<Value> = session.run(inputs)?;

        let first = outputs
            .first()
            .ok_or_else(|| Error::UnexpectedOutput("model produced no outputs".to_string()))?;
        let scores: OrtOwnedTensor<f32, _> = first.try_extract()?;
        let scores: Vec<f32> = scores.view().iter().copied().collect();

        Ok(scores)
    }
}
