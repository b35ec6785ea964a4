use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Which way the camera faces. `User` frames are mirrored like a selfie view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    User,
    Environment,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    pub facing: Facing,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            facing: Facing::User,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model_dir: PathBuf,
    pub emotion_model: String,
    pub face_model: String,
    pub interval_ms: u64,
    pub face_score_threshold: f32,
    pub skin_ratio_threshold: f32,
    pub camera: CameraConfig,
    pub detect_endpoint: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            emotion_model: "emotion_model.onnx".to_string(),
            face_model: "face_detection_model.onnx".to_string(),
            interval_ms: 500,
            face_score_threshold: 0.5,
            skin_ratio_threshold: 0.08,
            camera: CameraConfig::default(),
            detect_endpoint: "http://localhost:4000/detect-image/".to_string(),
        }
    }
}

impl Config {
    /// Reads a JSON config file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(Error::Config("interval_ms must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.skin_ratio_threshold) {
            return Err(Error::Config(format!(
                "skin_ratio_threshold {} is outside [0, 1]",
                self.skin_ratio_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.face_score_threshold) {
            return Err(Error::Config(format!(
                "face_score_threshold {} is outside [0, 1]",
                self.face_score_threshold
            )));
        }
        if self.detect_endpoint.trim().is_empty() {
            return Err(Error::Config("detect_endpoint must not be empty".to_string()));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::Config("camera resolution must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn with_model_dir(mut self, model_dir: impl Into<PathBuf>) -> Self {
        self.model_dir = model_dir.into();
        self
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn with_skin_ratio_threshold(mut self, threshold: f32) -> Self {
        self.skin_ratio_threshold = threshold;
        self
    }

    pub fn with_face_score_threshold(mut self, threshold: f32) -> Self {
        self.face_score_threshold = threshold;
        self
    }

    pub fn with_detect_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.detect_endpoint = endpoint.into();
        self
    }

    pub fn emotion_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.emotion_model)
    }

    pub fn face_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.face_model)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
