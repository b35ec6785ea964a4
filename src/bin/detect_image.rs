use std::path::PathBuf;

use tracing::info;

use emotion_sampler::object_detection::{draw_overlays, overlays, DetectionClient};
use emotion_sampler::{logging, Config, Error};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "detect_image".to_string());

    let mut image_path = None;
    let mut endpoint = Config::default().detect_endpoint;
    let mut out_path = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--endpoint" => {
                endpoint = args
                    .next()
                    .ok_or_else(|| Error::Config("--endpoint needs a URL".to_string()))?;
            }
            "--out" => {
                out_path = Some(PathBuf::from(
                    args.next()
                        .ok_or_else(|| Error::Config("--out needs a path".to_string()))?,
                ));
            }
            _ => image_path = Some(PathBuf::from(arg)),
        }
    }

    let Some(image_path) = image_path else {
        eprintln!("Usage: {} <image> [--endpoint URL] [--out annotated.png]", program);
        std::process::exit(2);
    };

    let bytes = std::fs::read(&image_path)?;
    let file_name = image_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let client = DetectionClient::new(endpoint)?;
    info!("posting {} to {}", file_name, client.endpoint());

    let detections = client.detect(bytes.clone(), &file_name).await;
    let overlays = overlays(&detections);
    if overlays.is_empty() {
        println!("no objects detected");
    }
    for overlay in &overlays {
        println!("{}", overlay);
    }

    if let Some(out_path) = out_path {
        let mut image = image::load_from_memory(&bytes)?.to_rgb8();
        draw_overlays(&mut image, &overlays);
        image.save(&out_path)?;
        info!("annotated image written to {}", out_path.display());
    }

    Ok(())
}
