// Core data models for mood-cam

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Represents a single video frame with RGB data
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Raw RGB pixel data (width * height * 3 bytes)
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl Frame {
    /// Creates a new Frame with the given parameters
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Creates a frame filled with a single RGB color
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::new(data, width, height)
    }
}

impl From<image::RgbImage> for Frame {
    fn from(buffer: image::RgbImage) -> Self {
        let (width, height) = buffer.dimensions();
        Frame::new(buffer.into_raw(), width, height)
    }
}

/// Axis-aligned rectangle in frame coordinates believed to contain a face
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: i32,
    pub y: i32,
    #[serde(rename = "w")]
    pub width: i32,
    #[serde(rename = "h")]
    pub height: i32,
}

impl FaceRegion {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Opposite corner of the rectangle
    pub fn bottom_right(&self) -> (i32, i32) {
        (self.x + self.width, self.y + self.height)
    }

    pub fn area(&self) -> i64 {
        i64::from(self.width) * i64::from(self.height)
    }
}

/// Emotion vocabulary, in the output order of the classifier model
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    #[default]
    Neutral,
}

impl Emotion {
    /// All labels, indexed the way the model emits its logits
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];

    /// Maps a model output index to its label
    pub fn from_index(index: usize) -> Option<Emotion> {
        Self::ALL.get(index).copied()
    }

    /// The label as it is drawn and published
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
            Emotion::Fear => "fear",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Surprise => "surprise",
            Emotion::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emotion::ALL
            .iter()
            .find(|emotion| emotion.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("unknown emotion label: {s}"))
    }
}

/// Analysis of one subject as reported by the emotion model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceAnalysis {
    pub dominant_emotion: Emotion,
    /// Per-class scores in percent
    #[serde(default)]
    pub emotion: BTreeMap<Emotion, f32>,
    #[serde(default)]
    pub region: Option<FaceRegion>,
}

impl FaceAnalysis {
    pub fn new(dominant_emotion: Emotion) -> Self {
        Self {
            dominant_emotion,
            emotion: BTreeMap::new(),
            region: None,
        }
    }

    /// Score of the dominant emotion in percent, if the model reported scores
    pub fn confidence(&self) -> Option<f32> {
        self.emotion.get(&self.dominant_emotion).copied()
    }
}

/// What the emotion model hands back: one result, or one per detected subject.
///
/// `Many` is listed first so that untagged deserialization never tries to read
/// a JSON array as a struct.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalysisOutput {
    Many(Vec<FaceAnalysis>),
    Single(FaceAnalysis),
}

impl AnalysisOutput {
    /// Collapses either shape to the first subject's analysis
    pub fn into_primary(self) -> Option<FaceAnalysis> {
        match self {
            AnalysisOutput::Single(analysis) => Some(analysis),
            AnalysisOutput::Many(analyses) => analyses.into_iter().next(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            AnalysisOutput::Single(_) => 1,
            AnalysisOutput::Many(analyses) => analyses.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
