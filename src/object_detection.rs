use std::fmt;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;

/// Backends send either a class name or a raw class id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DetectionClass {
    Name(String),
    Id(i64),
}

impl fmt::Display for DetectionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionClass::Name(name) => f.write_str(name),
            DetectionClass::Id(id) => write!(f, "{}", id),
        }
    }
}

/// One detected object. `bbox` is `[ymin, xmin, ymax, xmax]`, normalized to [0, 1].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ObjectDetection {
    #[serde(rename = "box")]
    pub bbox: [f64; 4],
    pub class: DetectionClass,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
struct DetectionResponse {
    results: Vec<ObjectDetection>,
}

/// A rectangle in percent of the image size, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
    pub label: String,
}

impl Overlay {
    pub fn from_detection(detection: &ObjectDetection) -> Self {
        let [ymin, xmin, ymax, xmax] = detection.bbox;
        Self {
            top: ymin * 100.0,
            left: xmin * 100.0,
            width: (xmax - xmin) * 100.0,
            height: (ymax - ymin) * 100.0,
            label: format!("{} {}", detection.class, two_decimals(detection.score)),
        }
    }

    /// Pixel rectangle inside a `width` x `height` image, or `None` if it
    /// falls completely outside.
    pub fn to_rect(&self, width: u32, height: u32) -> Option<Rect> {
        let to_px = |percent: f64, extent: u32| -> i64 {
            ((percent / 100.0) * extent as f64).round() as i64
        };

        let x0 = to_px(self.left, width).clamp(0, width as i64);
        let y0 = to_px(self.top, height).clamp(0, height as i64);
        let x1 = to_px(self.left + self.width, width).clamp(0, width as i64);
        let y1 = to_px(self.top + self.height, height).clamp(0, height as i64);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(Rect::at(x0 as i32, y0 as i32).of_size((x1 - x0) as u32, (y1 - y0) as u32))
    }
}

impl fmt::Display for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at top {:.1}% left {:.1}% ({:.1}% x {:.1}%)",
            self.label, self.top, self.left, self.width, self.height
        )
    }
}

/// Two decimal places, rounded from the exact value of `value` with exact
/// ties going up (`0.125` -> `0.13`, `0.745` -> `0.74`).
fn two_decimals(value: f64) -> String {
    // an exact tie at two decimals is always an odd multiple of 1/8
    let eighths = value * 8.0;
    if eighths.fract() == 0.0 && eighths % 2.0 != 0.0 {
        return format!("{:.2}", (value * 100.0).ceil() / 100.0);
    }
    format!("{:.2}", value)
}

pub fn overlays(detections: &[ObjectDetection]) -> Vec<Overlay> {
    detections.iter().map(Overlay::from_detection).collect()
}

const OVERLAY_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Burns every overlay into `image` as a two pixel red outline.
pub fn draw_overlays(image: &mut RgbImage, overlays: &[Overlay]) {
    let (width, height) = image.dimensions();
    for rect in overlays.iter().filter_map(|o| o.to_rect(width, height)) {
        draw_hollow_rect_mut(image, rect, OVERLAY_COLOR);
        if rect.width() > 2 && rect.height() > 2 {
            let inner = Rect::at(rect.left() + 1, rect.top() + 1)
                .of_size(rect.width() - 2, rect.height() - 2);
            draw_hollow_rect_mut(image, inner, OVERLAY_COLOR);
        }
    }
}

/// Forwards images to an external object detection service.
#[derive(Debug, Clone)]
pub struct DetectionClient {
    client: Client,
    endpoint: String,
}

impl DetectionClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Posts one image as the `file` part. Every failure comes back as an
    /// empty result set.
    pub async fn detect(&self, bytes: Vec<u8>, file_name: &str) -> Vec<ObjectDetection> {
        match self.try_detect(bytes, file_name).await {
            Ok(detections) => {
                debug!("{} objects detected in {}", detections.len(), file_name);
                detections
            }
            Err(e) => {
                warn!("object detection request to {} failed: {}", self.endpoint, e);
                Vec::new()
            }
        }
    }

    async fn try_detect(&self, bytes: Vec<u8>, file_name: &str) -> Result<Vec<ObjectDetection>> {
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        let body = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        let response: DetectionResponse = serde_json::from_slice(&body)?;
        Ok(response.results)
    }
}
