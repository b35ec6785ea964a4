// thin wrapper around openpnp_capture
use image::RgbImage;
use openpnp_sys::CapContext;
use openpnp_sys::CapFormatInfo;
use openpnp_sys::CapStream;
use tracing::{error, info};

use openpnp_capture_sys as openpnp_sys;

use crate::config::{CameraConfig, Facing};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::source::FrameSource;

/// Live camera frames through openpnp-capture (RGB24).
pub struct WebcamSource {
    ctx: CapContext,
    stream: CapStream,
    width: u32,
    height: u32,
    mirror: bool,
    buffer: Vec<u8>,
    sequence: u64,
}

// The context is only touched through &mut self or &self behind the sampler's
// source mutex, never from two threads at once.
unsafe impl Send for WebcamSource {}

impl WebcamSource {
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let ctx = unsafe { openpnp_sys::Cap_createContext() };
        if ctx.is_null() {
            return Err(Error::CameraUnavailable(
                "could not create capture context".to_string(),
            ));
        }

        match open_stream(ctx, config) {
            Ok((stream, format)) => {
                info!(
                    "camera {} streaming {}x{} @ {} fps",
                    config.device_index, format.width, format.height, format.fps
                );
                Ok(Self {
                    ctx,
                    stream,
                    width: format.width,
                    height: format.height,
                    mirror: config.facing == Facing::User,
                    buffer: vec![0u8; (format.width * format.height * 3) as usize],
                    sequence: 0,
                })
            }
            Err(e) => {
                unsafe { openpnp_sys::Cap_releaseContext(ctx) };
                Err(e)
            }
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn open_stream(ctx: CapContext, config: &CameraConfig) -> Result<(CapStream, CapFormatInfo)> {
    let device_count = unsafe { openpnp_sys::Cap_getDeviceCount(ctx) };
    if config.device_index >= device_count {
        return Err(Error::CameraUnavailable(format!(
            "no camera at index {} ({} found)",
            config.device_index, device_count
        )));
    }

    let (format_id, format) = closest_format(ctx, config.device_index, config.width, config.height)
        .ok_or_else(|| {
            Error::CameraUnavailable(format!(
                "camera {} reports no usable formats",
                config.device_index
            ))
        })?;

    let stream = unsafe { openpnp_sys::Cap_openStream(ctx, config.device_index, format_id) };
    if stream < 0 {
        return Err(Error::CameraUnavailable(format!(
            "could not open stream on camera {} (permission denied or device busy?)",
            config.device_index
        )));
    }

    Ok((stream, format))
}

fn read_format_info(ctx: CapContext, device: u32, format_id: u32) -> Option<CapFormatInfo> {
    let mut info: CapFormatInfo = unsafe { std::mem::zeroed() };
    let res = unsafe { openpnp_sys::Cap_getFormatInfo(ctx, device, format_id, &mut info) };
    if res == openpnp_sys::CAPRESULT_OK {
        Some(info)
    } else {
        None
    }
}

// pick the format whose resolution is nearest to the preferred one
fn closest_format(
    ctx: CapContext,
    device: u32,
    width: u32,
    height: u32,
) -> Option<(u32, CapFormatInfo)> {
    let count = unsafe { openpnp_sys::Cap_getNumFormats(ctx, device) };

    (0..count.max(0) as u32)
        .filter_map(|id| read_format_info(ctx, device, id).map(|info| (id, info)))
        .filter(|(_, info)| info.width > 0 && info.height > 0)
        .min_by_key(|(_, info)| info.width.abs_diff(width) + info.height.abs_diff(height))
}

impl FrameSource for WebcamSource {
    fn is_ready(&self) -> bool {
        unsafe { openpnp_sys::Cap_hasNewFrame(self.ctx, self.stream) == 1 }
    }

    fn capture(&mut self) -> Result<Frame> {
        let res = unsafe {
            openpnp_sys::Cap_captureFrame(
                self.ctx,
                self.stream,
                self.buffer.as_mut_ptr() as *mut _,
                self.buffer.len() as u32,
            )
        };
        if res != openpnp_sys::CAPRESULT_OK {
            return Err(Error::FrameCapture(format!(
                "capture returned result code {}",
                res
            )));
        }

        let image = RgbImage::from_raw(self.width, self.height, self.buffer.clone())
            .ok_or_else(|| Error::FrameCapture("frame buffer has the wrong size".to_string()))?;

        self.sequence += 1;
        let frame = Frame::new(image, self.sequence);

        Ok(if self.mirror { frame.mirrored() } else { frame })
    }
}

impl Drop for WebcamSource {
    fn drop(&mut self) {
        let res = unsafe { openpnp_sys::Cap_closeStream(self.ctx, self.stream) };
        if res != openpnp_sys::CAPRESULT_OK {
            error!("error closing camera stream. Result: {}", res);
        }
        unsafe { openpnp_sys::Cap_releaseContext(self.ctx) };
    }
}
