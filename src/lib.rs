pub mod config;
pub mod context;
pub mod emotion;
pub mod error;
pub mod face_detection;
pub mod frame;
pub mod logging;
pub mod object_detection;
pub mod onnx;
pub mod preprocess;
pub mod sampler;
pub mod source;
pub mod tensor;

#[cfg(feature = "webcam")]
pub mod webcam;

pub use config::Config;
pub use context::{ModelStatus, Observation, PipelineContext};
pub use error::{Error, Result};
pub use sampler::{Sampler, SamplerHandle, SamplerState, TickOutcome};
