// Face location and emotion classification

use crate::config::DetectorParams;
use crate::error::{MoodCamError, Result};
use crate::models::{AnalysisOutput, Emotion, FaceAnalysis, FaceRegion, Frame};
use opencv::core::{Mat, Rect, Size, Vector};
use opencv::imgproc;
use opencv::objdetect::CascadeClassifier;
use opencv::prelude::*;
use ort::session::Session;
use ort::value::Tensor;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Side length of the square grayscale crop the emotion model expects
const MODEL_INPUT_SIZE: i32 = 48;

/// Finds face rectangles in a frame
pub trait FaceLocator {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>>;
}

/// Runs the emotion model over a whole frame.
///
/// Implementations report either a single analysis or one per detected subject.
pub trait EmotionModel {
    fn analyze(&mut self, frame: &Frame) -> Result<AnalysisOutput>;
}

/// Wraps an RGB frame into an owned 3-channel Mat
pub(crate) fn frame_to_mat(frame: &Frame) -> Result<Mat> {
    let expected = frame.width as usize * frame.height as usize * 3;
    if frame.data.len() != expected || expected == 0 {
        return Err(MoodCamError::FrameCapture(format!(
            "Frame buffer holds {} bytes, expected {} for {}x{} RGB",
            frame.data.len(),
            expected,
            frame.width,
            frame.height
        )));
    }

    let flat = Mat::from_slice(&frame.data)?;
    let shaped = flat.reshape(3, frame.height as i32)?;
    Ok(shaped.try_clone()?)
}

/// Converts an RGB frame to a single-channel grayscale Mat
fn frame_to_gray(frame: &Frame) -> Result<Mat> {
    let mat = frame_to_mat(frame)?;
    let mut gray = Mat::default();
    imgproc::cvt_color(
        &mat,
        &mut gray,
        imgproc::COLOR_RGB2GRAY,
        0,
        opencv::core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )
    .map_err(|e| MoodCamError::FaceDetection(format!("Failed to convert to grayscale: {e}")))?;
    Ok(gray)
}

/// Face detector using OpenCV Haar Cascade
pub struct FaceDetector {
    classifier: CascadeClassifier,
    params: DetectorParams,
}

impl FaceDetector {
    /// Creates a new FaceDetector by loading the Haar Cascade classifier
    pub fn new<P: AsRef<Path>>(cascade_path: P, params: DetectorParams) -> Result<Self> {
        let path = cascade_path.as_ref().to_string_lossy();
        let classifier = CascadeClassifier::new(&path).map_err(|e| {
            error!("Failed to load Haar Cascade: {}", e);
            MoodCamError::ModelLoad(format!("Haar Cascade load failed: {e}"))
        })?;

        if classifier.empty()? {
            return Err(MoodCamError::ModelLoad(format!(
                "Haar Cascade classifier at {path} is empty"
            )));
        }

        info!("Loaded Haar Cascade from {}", path);
        Ok(Self { classifier, params })
    }

    /// Runs the cascade over an already grayscale image
    fn detect_gray(&mut self, gray: &Mat) -> Result<Vec<FaceRegion>> {
        let mut faces = Vector::<Rect>::new();
        self.classifier
            .detect_multi_scale(
                gray,
                &mut faces,
                self.params.scale_factor,
                self.params.min_neighbors,
                0,
                Size::new(0, 0),
                Size::new(0, 0),
            )
            .map_err(|e| MoodCamError::FaceDetection(format!("Face detection failed: {e}")))?;

        Ok(faces
            .iter()
            .map(|r| FaceRegion::new(r.x, r.y, r.width, r.height))
            .collect())
    }
}

impl FaceLocator for FaceDetector {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<FaceRegion>> {
        let gray = frame_to_gray(frame)?;
        self.detect_gray(&gray)
    }
}

/// Crops, resizes and normalizes a grayscale region for model input
fn preprocess_region(gray: &Mat, region: FaceRegion) -> Result<Vec<f32>> {
    let rect = Rect::new(region.x, region.y, region.width, region.height);
    let roi = Mat::roi(gray, rect)
        .and_then(|roi| roi.try_clone())
        .map_err(|e| MoodCamError::Classification(format!("Failed to crop face region: {e}")))?;

    let mut resized = Mat::default();
    imgproc::resize(
        &roi,
        &mut resized,
        Size::new(MODEL_INPUT_SIZE, MODEL_INPUT_SIZE),
        0.0,
        0.0,
        imgproc::INTER_AREA,
    )
    .map_err(|e| MoodCamError::Classification(format!("Failed to resize face: {e}")))?;

    let data = resized
        .data_bytes()
        .map_err(|e| MoodCamError::Classification(format!("Failed to get resized data: {e}")))?;

    Ok(data.iter().map(|&pixel| pixel as f32 / 255.0).collect())
}

/// Converts raw logits to probabilities
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp_sum: f32 = logits.iter().map(|&x| (x - max_logit).exp()).sum();
    logits
        .iter()
        .map(|&x| (x - max_logit).exp() / exp_sum)
        .collect()
}

/// Builds a FaceAnalysis from one row of model logits
pub fn analysis_from_logits(logits: &[f32], region: Option<FaceRegion>) -> Result<FaceAnalysis> {
    let probabilities = softmax(logits);

    let (max_idx, _) = probabilities
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .ok_or_else(|| MoodCamError::Classification("No probabilities in output".to_string()))?;

    let dominant_emotion = Emotion::from_index(max_idx).unwrap_or_else(|| {
        warn!("Unknown emotion index: {}, defaulting to neutral", max_idx);
        Emotion::Neutral
    });

    let emotion: BTreeMap<Emotion, f32> = probabilities
        .iter()
        .enumerate()
        .filter_map(|(idx, p)| Emotion::from_index(idx).map(|e| (e, p * 100.0)))
        .collect();

    Ok(FaceAnalysis {
        dominant_emotion,
        emotion,
        region,
    })
}

/// Emotion model backed by ONNX Runtime.
///
/// Finds subjects with its own cascade and classifies each one. When nothing is
/// found the whole frame is classified as a single subject instead of failing.
pub struct OnnxEmotionModel {
    detector: FaceDetector,
    session: Session,
}

impl OnnxEmotionModel {
    /// Loads the cascade and the ONNX model
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(
        cascade_path: P,
        model_path: Q,
        params: DetectorParams,
    ) -> Result<Self> {
        let detector = FaceDetector::new(cascade_path, params)?;
        let session = Session::builder()
            .map_err(|e| {
                MoodCamError::ModelLoad(format!("Failed to create session builder: {e}"))
            })?
            .commit_from_file(model_path.as_ref())
            .map_err(|e| {
                error!("Failed to load ONNX model: {}", e);
                MoodCamError::ModelLoad(format!("ONNX model load failed: {e}"))
            })?;

        info!("Loaded emotion model from {:?}", model_path.as_ref());
        Ok(Self { detector, session })
    }

    /// Runs one preprocessed crop through the model
    fn infer(&mut self, input: Vec<f32>, region: FaceRegion) -> Result<FaceAnalysis> {
        let side = MODEL_INPUT_SIZE as usize;
        let input_array = ndarray::Array4::from_shape_vec((1, 1, side, side), input)
            .map_err(|e| {
                MoodCamError::Classification(format!("Failed to create input array: {e}"))
            })?;

        let input_tensor = Tensor::from_array(input_array)?;
        let outputs = self.session.run(ort::inputs![input_tensor])?;

        let (_, output_value) = outputs
            .iter()
            .next()
            .ok_or_else(|| MoodCamError::Classification("No output from model".to_string()))?;

        let (_, logits) = output_value.try_extract_tensor::<f32>()?;
        analysis_from_logits(logits, Some(region))
    }
}

/// Regions to classify: the detected faces in order, or the whole frame when
/// nothing was detected
pub fn subjects(faces: Vec<FaceRegion>, frame: &Frame) -> Vec<FaceRegion> {
    if faces.is_empty() {
        vec![FaceRegion::new(0, 0, frame.width as i32, frame.height as i32)]
    } else {
        faces
    }
}

impl EmotionModel for OnnxEmotionModel {
    fn analyze(&mut self, frame: &Frame) -> Result<AnalysisOutput> {
        let gray = frame_to_gray(frame)?;
        let faces = self.detector.detect_gray(&gray)?;
        let detected = !faces.is_empty();

        let mut analyses = Vec::with_capacity(faces.len().max(1));
        for region in subjects(faces, frame) {
            let input = preprocess_region(&gray, region)?;
            analyses.push(self.infer(input, region)?);
        }

        if detected {
            return Ok(AnalysisOutput::Many(analyses));
        }
        analyses
            .pop()
            .map(AnalysisOutput::Single)
            .ok_or_else(|| MoodCamError::Classification("Whole-frame analysis missing".into()))
    }
}

/// Reduces any model output to the label of its first subject
pub fn primary_emotion(output: AnalysisOutput) -> Emotion {
    match output.into_primary() {
        Some(analysis) => analysis.dominant_emotion,
        None => {
            warn!("Emotion model returned no subjects, using default label");
            Emotion::default()
        }
    }
}

/// Adapter the main loop talks to: one label per frame
pub struct EmotionClassifier {
    model: Box<dyn EmotionModel>,
}

impl EmotionClassifier {
    pub fn new(model: Box<dyn EmotionModel>) -> Self {
        Self { model }
    }

    /// Classifies the frame, failing only when the model itself fails
    pub fn classify(&mut self, frame: &Frame) -> Result<Emotion> {
        let output = self.model.analyze(frame).map_err(|e| match e {
            MoodCamError::Classification(_) => e,
            other => MoodCamError::Classification(other.to_string()),
        })?;

        let subjects = output.len();
        let emotion = primary_emotion(output);
        debug!("Dominant emotion {} ({} subject(s))", emotion, subjects);
        Ok(emotion)
    }
}
