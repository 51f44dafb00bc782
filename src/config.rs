// Hard-coded runtime constants for mood-cam

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Capture indices tried in order when opening the webcam
pub const CAMERA_INDICES: [u32; 2] = [0, 1];
pub const CASCADE_PATH: &str = "assets/models/haarcascade_frontalface_default.xml";
pub const MODEL_PATH: &str = "assets/models/emotion.onnx";
pub const WINDOW_TITLE: &str = "Original video";
pub const QUIT_KEY: char = 'q';
pub const POLL_TIMEOUT_MS: i32 = 2;
pub const TX_PORT: u16 = 8000;
pub const RX_PORT: u16 = 8001;

/// Haar cascade parameters shared by the locator and the classifier model
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorParams {
    pub scale_factor: f64,
    pub min_neighbors: i32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 4,
        }
    }
}

/// Endpoint settings of the UDP result channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublisherConfig {
    pub ip: IpAddr,
    /// Port the peer listens on
    pub tx_port: u16,
    /// Local port bound for sending and, when enabled, receiving
    pub rx_port: u16,
    pub enable_rx: bool,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            tx_port: TX_PORT,
            rx_port: RX_PORT,
            enable_rx: false,
        }
    }
}

/// What the main loop does when the emotion model fails on a frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClassificationPolicy {
    /// Stop the loop and surface the error
    #[default]
    Abort,
    /// Log the failure, show the unannotated frame and keep going
    SkipFrame,
}

/// Where frames come from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Camera { indices: Vec<u32> },
    StillImage(PathBuf),
}

/// Full application configuration
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    pub source: SourceKind,
    pub cascade_path: PathBuf,
    pub model_path: PathBuf,
    pub detector: DetectorParams,
    pub window_title: String,
    pub quit_key: char,
    pub poll_timeout_ms: i32,
    /// `None` runs the variant without the network side channel
    pub publisher: Option<PublisherConfig>,
    pub on_classification_error: ClassificationPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Camera {
                indices: CAMERA_INDICES.to_vec(),
            },
            cascade_path: PathBuf::from(CASCADE_PATH),
            model_path: PathBuf::from(MODEL_PATH),
            detector: DetectorParams::default(),
            window_title: WINDOW_TITLE.to_string(),
            quit_key: QUIT_KEY,
            poll_timeout_ms: POLL_TIMEOUT_MS,
            publisher: Some(PublisherConfig::default()),
            on_classification_error: ClassificationPolicy::Abort,
        }
    }
}
