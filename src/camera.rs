// Camera module for webcam capture

use crate::error::{MoodCamError, Result};
use crate::models::Frame;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use std::path::Path;
use tracing::{error, info, warn};

/// Anything that can hand the main loop one frame at a time
pub trait FrameSource {
    /// Blocks until the next frame is available
    fn read(&mut self) -> Result<Frame>;
}

/// Tries each index in order and returns the first one that opens.
///
/// Later indices are only attempted after every earlier one failed.
pub fn open_with_fallback<T, F>(indices: &[u32], mut open: F) -> Result<(u32, T)>
where
    F: FnMut(u32) -> Result<T>,
{
    let mut tried = Vec::with_capacity(indices.len());
    let mut last_error = String::from("no capture indices configured");

    for &index in indices {
        tried.push(index);
        match open(index) {
            Ok(handle) => return Ok((index, handle)),
            Err(e) => {
                warn!("Capture device {} failed to open: {}", index, e);
                last_error = e.to_string();
            }
        }
    }

    Err(MoodCamError::DeviceUnavailable {
        tried,
        reason: last_error,
    })
}

/// Owns the webcam handle for the lifetime of the session
pub struct CameraManager {
    camera: Camera,
    index: u32,
}

impl CameraManager {
    /// Opens the first working device among `indices` and starts its stream
    pub fn open(indices: &[u32]) -> Result<Self> {
        let (index, camera) = open_with_fallback(indices, Self::try_open_camera).map_err(|e| {
            error!("Failed to initialize camera: {}", e);
            e
        })?;

        info!("Opened capture device {}", index);
        Ok(Self { camera, index })
    }

    /// Helper to try opening and streaming a camera at a specific index
    fn try_open_camera(index: u32) -> Result<Camera> {
        let requested_format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
        let mut camera = Camera::new(CameraIndex::Index(index), requested_format)
            .map_err(|e| MoodCamError::FrameCapture(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| MoodCamError::FrameCapture(e.to_string()))?;
        Ok(camera)
    }

    /// Index of the device that actually opened
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the camera information
    pub fn camera_info(&self) -> String {
        self.camera.info().human_name().to_string()
    }
}

impl FrameSource for CameraManager {
    fn read(&mut self) -> Result<Frame> {
        let frame_data = self.camera.frame()?;
        let buffer = frame_data.decode_image::<RgbFormat>()?;
        Ok(Frame::from(buffer))
    }
}

impl Drop for CameraManager {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            error!("Error stopping camera stream: {}", e);
        }
    }
}

/// Replays one decoded image forever; stands in for a camera
pub struct StillImageSource {
    frame: Frame,
}

impl StillImageSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let img = image::open(path.as_ref())?;
        info!("Using still image {:?} as frame source", path.as_ref());
        Ok(Self::from_frame(Frame::from(img.to_rgb8())))
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self { frame }
    }
}

impl FrameSource for StillImageSource {
    fn read(&mut self) -> Result<Frame> {
        Ok(self.frame.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    fn busy(index: u32) -> MoodCamError {
        MoodCamError::FrameCapture(format!("device {index} busy"))
    }

    #[test]
    fn first_index_wins_without_touching_the_second() {
        let mut attempts = Vec::new();
        let (index, handle) = open_with_fallback(&[0, 1], |i| {
            attempts.push(i);
            Ok(i * 10)
        })
        .unwrap();

        assert_eq!(index, 0);
        assert_eq!(handle, 0);
        assert_eq!(attempts, vec![0]);
    }

    #[test]
    fn falls_back_to_second_index_when_first_fails() {
        let mut attempts = Vec::new();
        let (index, _) = open_with_fallback(&[0, 1], |i| {
            attempts.push(i);
            if i == 0 {
                Err(busy(i))
            } else {
                Ok(())
            }
        })
        .unwrap();

        assert_eq!(index, 1);
        assert_eq!(attempts, vec![0, 1]);
    }

    #[test]
    fn device_unavailable_only_when_every_index_fails() {
        let mut attempts = Vec::new();
        let err = open_with_fallback::<(), _>(&[0, 1], |i| {
            attempts.push(i);
            Err(busy(i))
        })
        .unwrap_err();

        assert_eq!(attempts, vec![0, 1]);
        assert_eq!(err.kind(), FailureKind::DeviceUnavailable);
        match err {
            MoodCamError::DeviceUnavailable { tried, reason } => {
                assert_eq!(tried, vec![0, 1]);
                assert!(reason.contains("device 1 busy"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn still_image_repeats_the_same_frame() {
        let frame = Frame::filled(4, 3, [10, 20, 30]);
        let mut source = StillImageSource::from_frame(frame.clone());
        assert_eq!(source.read().unwrap(), frame);
        assert_eq!(source.read().unwrap(), frame);
    }

    #[test]
    fn still_image_missing_file_is_an_error() {
        assert!(StillImageSource::open("does/not/exist.png").is_err());
    }
}
