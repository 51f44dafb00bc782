// Main capture/classify/display loop

use crate::annotate::{annotate, to_display_mat};
use crate::camera::{CameraManager, FrameSource, StillImageSource};
use crate::config::{AppConfig, ClassificationPolicy, SourceKind};
use crate::display::{HighGuiPresenter, Presenter};
use crate::emotion::{EmotionClassifier, FaceDetector, FaceLocator, OnnxEmotionModel};
use crate::error::{FailureKind, Result};
use crate::publisher::{ResultPublisher, UdpPublisher};
use tracing::{debug, error, info, warn};

/// Lifecycle of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Initializing,
    Running,
    Terminated,
}

/// Result of a single iteration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Quit,
}

/// Owns every resource the loop touches.
///
/// Dropping the session releases the device, window and socket, on the error
/// path as well as after a clean quit.
pub struct Session {
    source: Box<dyn FrameSource>,
    locator: Box<dyn FaceLocator>,
    classifier: EmotionClassifier,
    presenter: Box<dyn Presenter>,
    publisher: Option<Box<dyn ResultPublisher>>,
    policy: ClassificationPolicy,
    poll_timeout_ms: i32,
    state: LoopState,
    frames: u64,
}

impl Session {
    pub fn new(
        source: Box<dyn FrameSource>,
        locator: Box<dyn FaceLocator>,
        classifier: EmotionClassifier,
        presenter: Box<dyn Presenter>,
    ) -> Self {
        Self {
            source,
            locator,
            classifier,
            presenter,
            publisher: None,
            policy: ClassificationPolicy::default(),
            poll_timeout_ms: crate::config::POLL_TIMEOUT_MS,
            state: LoopState::Initializing,
            frames: 0,
        }
    }

    pub fn with_publisher(mut self, publisher: Box<dyn ResultPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_policy(mut self, policy: ClassificationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_poll_timeout(mut self, timeout_ms: i32) -> Self {
        self.poll_timeout_ms = timeout_ms;
        self
    }

    /// Opens the real device, models, window and socket described by `config`
    pub fn open(config: &AppConfig) -> Result<Self> {
        let source: Box<dyn FrameSource> = match &config.source {
            SourceKind::Camera { indices } => {
                let camera = CameraManager::open(indices)?;
                info!("Capturing from {} (index {})", camera.camera_info(), camera.index());
                Box::new(camera)
            }
            SourceKind::StillImage(path) => Box::new(StillImageSource::open(path)?),
        };

        let locator = FaceDetector::new(&config.cascade_path, config.detector)?;
        let model = OnnxEmotionModel::new(&config.cascade_path, &config.model_path, config.detector)?;
        let presenter = HighGuiPresenter::new(&config.window_title, config.quit_key)?;

        let mut session = Session::new(
            source,
            Box::new(locator),
            EmotionClassifier::new(Box::new(model)),
            Box::new(presenter),
        )
        .with_policy(config.on_classification_error)
        .with_poll_timeout(config.poll_timeout_ms);

        if let Some(publisher_config) = &config.publisher {
            session = session.with_publisher(Box::new(UdpPublisher::bind(publisher_config)?));
        }

        Ok(session)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    /// Runs one read → classify → locate → annotate → publish → show → poll pass
    pub fn step(&mut self) -> Result<StepOutcome> {
        let frame = self.source.read()?;

        let label = match self.classifier.classify(&frame) {
            Ok(label) => Some(label),
            Err(e)
                if e.kind() == FailureKind::Classification
                    && self.policy == ClassificationPolicy::SkipFrame =>
            {
                warn!("Skipping frame {}: {}", self.frames, e);
                None
            }
            Err(e) => return Err(e),
        };

        let img = match label {
            Some(label) => {
                let faces = self.locator.locate(&frame)?;
                debug!("Frame {}: {} face(s), label {}", self.frames, faces.len(), label);
                let img = annotate(&frame, &faces, label)?;
                if let Some(publisher) = self.publisher.as_mut() {
                    publisher.publish(label)?;
                }
                img
            }
            None => to_display_mat(&frame)?,
        };

        self.presenter.show(&img)?;
        let quit = self.presenter.poll_quit(self.poll_timeout_ms)?;
        self.frames += 1;

        Ok(if quit {
            StepOutcome::Quit
        } else {
            StepOutcome::Continue
        })
    }

    /// Loops until the quit key; returns the number of frames processed
    pub fn run(&mut self) -> Result<u64> {
        self.state = LoopState::Running;
        info!("Entering main loop");

        loop {
            match self.step() {
                Ok(StepOutcome::Continue) => {}
                Ok(StepOutcome::Quit) => {
                    self.state = LoopState::Terminated;
                    info!("Quit requested after {} frame(s)", self.frames);
                    return Ok(self.frames);
                }
                Err(e) => {
                    self.state = LoopState::Terminated;
                    error!("Main loop stopped after {} frame(s): {}", self.frames, e);
                    return Err(e);
                }
            }
        }
    }
}
