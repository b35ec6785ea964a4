use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};

use emotion_sampler::emotion::Emotion;
use emotion_sampler::source::{FrameSource, StillSource};
use emotion_sampler::{logging, Config, Error, Observation, PipelineContext, Result, Sampler};

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    image: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--image" => {
                let path = args
                    .next()
                    .ok_or_else(|| Error::Config("--image needs a path".to_string()))?;
                parsed.image = Some(PathBuf::from(path));
            }
            flag if flag.starts_with("--") => {
                return Err(Error::Config(format!("unknown option {}", flag)));
            }
            path if parsed.config.is_none() => parsed.config = Some(PathBuf::from(path)),
            extra => return Err(Error::Config(format!("unexpected argument {}", extra))),
        }
    }
    Ok(parsed)
}

#[cfg(feature = "webcam")]
fn open_camera(config: &Config) -> Result<Box<dyn FrameSource>> {
    let camera = emotion_sampler::webcam::WebcamSource::open(&config.camera)?;
    let (width, height) = camera.resolution();
    info!("camera opened at {}x{}", width, height);
    Ok(Box::new(camera))
}

#[cfg(not(feature = "webcam"))]
fn open_camera(_config: &Config) -> Result<Box<dyn FrameSource>> {
    Err(Error::Config(
        "built without the `webcam` feature, pass --image <path>".to_string(),
    ))
}

fn open_source(config: &Config, image: Option<&Path>) -> Result<Box<dyn FrameSource>> {
    match image {
        Some(path) => {
            info!("sampling still image {}", path.display());
            Ok(Box::new(StillSource::open(path)?))
        }
        None => open_camera(config),
    }
}

/// Camera failures are fatal to sampling, but the user may fix them
/// (permissions, a busy device) and retry.
async fn open_source_with_retry(config: &Config, image: Option<&Path>) -> Result<Box<dyn FrameSource>> {
    let mut stdin = BufReader::new(tokio::io::stdin());
    loop {
        match open_source(config, image) {
            Err(Error::CameraUnavailable(reason)) => {
                error!("camera unavailable: {}", reason);
                eprintln!("Press Enter to retry, Ctrl-D to quit.");

                let mut line = String::new();
                if stdin.read_line(&mut line).await? == 0 {
                    return Err(Error::CameraUnavailable(reason));
                }
            }
            other => return other,
        }
    }
}

fn summary(observation: &Observation) -> Option<Emotion> {
    observation.emotion.map(|result| result.emotion)
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let context = Arc::new(PipelineContext::from_config(&config));
    let source = open_source_with_retry(&config, args.image.as_deref()).await?;

    let handle = Sampler::new(context, source).spawn(config.interval());
    let mut observations = handle.subscribe();
    let mut last = None;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = observations.changed() => {
                if changed.is_err() {
                    break;
                }
                let observation = *observations.borrow_and_update();
                debug!("{:?}", observation);

                let current = (observation.face_detected, summary(&observation));
                if last != Some(current) {
                    match observation.emotion {
                        Some(result) => info!(
                            "face detected: {} ({:.0}%, {:?}), {} detections",
                            result.emotion,
                            result.confidence * 100.0,
                            result.origin,
                            observation.detection_count
                        ),
                        None => info!("no face detected"),
                    }
                    last = Some(current);
                }
            }
            _ = &mut ctrl_c => {
                info!("shutting down");
                break;
            }
        }
    }

    handle.stop();
    Ok(())
}
