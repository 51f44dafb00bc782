// Error types for mood-cam

use thiserror::Error;

/// Main error type for mood-cam
#[derive(Debug, Error)]
pub enum MoodCamError {
    #[error("No capture device could be opened (tried indices {tried:?}): {reason}")]
    DeviceUnavailable { tried: Vec<u32>, reason: String },

    #[error("Frame capture failed: {0}")]
    FrameCapture(String),

    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Face detection failed: {0}")]
    FaceDetection(String),

    #[error("Emotion classification failed: {0}")]
    Classification(String),

    #[error("Publishing result failed: {0}")]
    Publish(String),

    #[error("Display failed: {0}")]
    Display(String),

    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(String),

    #[error("OpenCV error: {0}")]
    OpenCV(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    ImageDecode(#[from] image::ImageError),
}

/// Coarse failure classes the main loop distinguishes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    DeviceUnavailable,
    Classification,
    Publish,
    Other,
}

impl MoodCamError {
    /// Returns the failure class of this error
    pub fn kind(&self) -> FailureKind {
        match self {
            MoodCamError::DeviceUnavailable { .. } => FailureKind::DeviceUnavailable,
            MoodCamError::Classification(_) | MoodCamError::OnnxRuntime(_) => {
                FailureKind::Classification
            }
            MoodCamError::Publish(_) => FailureKind::Publish,
            _ => FailureKind::Other,
        }
    }
}

/// Result type alias for mood-cam operations
pub type Result<T> = std::result::Result<T, MoodCamError>;

// Conversion from nokhwa errors
impl From<nokhwa::NokhwaError> for MoodCamError {
    fn from(err: nokhwa::NokhwaError) -> Self {
        match err {
            nokhwa::NokhwaError::ReadFrameError(error) => MoodCamError::FrameCapture(error),
            nokhwa::NokhwaError::ProcessFrameError {
                destination, error, ..
            } => MoodCamError::FrameCapture(format!("decode to {destination}: {error}")),
            _ => MoodCamError::FrameCapture(err.to_string()),
        }
    }
}

// Conversion from OpenCV errors
impl From<opencv::Error> for MoodCamError {
    fn from(err: opencv::Error) -> Self {
        MoodCamError::OpenCV(err.to_string())
    }
}

// Conversion from ONNX Runtime errors
impl From<ort::Error> for MoodCamError {
    fn from(err: ort::Error) -> Self {
        MoodCamError::OnnxRuntime(err.to_string())
    }
}
