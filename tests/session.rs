use mood_cam::app::{LoopState, Session, StepOutcome};
use mood_cam::camera::FrameSource;
use mood_cam::config::ClassificationPolicy;
use mood_cam::display::Presenter;
use mood_cam::emotion::{EmotionClassifier, EmotionModel, FaceLocator};
use mood_cam::error::{FailureKind, MoodCamError, Result};
use mood_cam::models::{AnalysisOutput, Emotion, FaceAnalysis, FaceRegion, Frame};
use mood_cam::publisher::ResultPublisher;
use opencv::core::Mat;
use opencv::prelude::*;
use rstest::rstest;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

struct ScriptedSource {
    log: Log,
}

impl FrameSource for ScriptedSource {
    fn read(&mut self) -> Result<Frame> {
        self.log.borrow_mut().push("read".into());
        Ok(Frame::filled(160, 120, [0, 0, 0]))
    }
}

struct FixedLocator {
    log: Log,
    regions: Vec<FaceRegion>,
}

impl FaceLocator for FixedLocator {
    fn locate(&mut self, _frame: &Frame) -> Result<Vec<FaceRegion>> {
        self.log.borrow_mut().push("locate".into());
        Ok(self.regions.clone())
    }
}

/// Answers from a queue; `None` entries simulate a model crash
struct QueuedModel {
    log: Log,
    answers: VecDeque<Option<AnalysisOutput>>,
}

impl EmotionModel for QueuedModel {
    fn analyze(&mut self, _frame: &Frame) -> Result<AnalysisOutput> {
        self.log.borrow_mut().push("classify".into());
        match self.answers.pop_front().flatten() {
            Some(output) => Ok(output),
            None => Err(MoodCamError::Classification("model raised".into())),
        }
    }
}

struct RecordingPublisher {
    log: Log,
    sent: Rc<RefCell<Vec<Emotion>>>,
    fail: bool,
}

impl ResultPublisher for RecordingPublisher {
    fn publish(&mut self, label: Emotion) -> Result<()> {
        self.log.borrow_mut().push("publish".into());
        if self.fail {
            return Err(MoodCamError::Publish("network down".into()));
        }
        self.sent.borrow_mut().push(label);
        Ok(())
    }
}

/// Requests quit on the `quit_on`-th poll
struct ScriptedPresenter {
    log: Log,
    shown: Rc<RefCell<Vec<Mat>>>,
    polls: u32,
    quit_on: u32,
}

impl Presenter for ScriptedPresenter {
    fn show(&mut self, img: &Mat) -> Result<()> {
        self.log.borrow_mut().push("show".into());
        self.shown.borrow_mut().push(img.try_clone()?);
        Ok(())
    }

    fn poll_quit(&mut self, _timeout_ms: i32) -> Result<bool> {
        self.log.borrow_mut().push("poll".into());
        self.polls += 1;
        Ok(self.polls >= self.quit_on)
    }
}

struct Harness {
    log: Log,
    sent: Rc<RefCell<Vec<Emotion>>>,
    shown: Rc<RefCell<Vec<Mat>>>,
}

fn single(emotion: Emotion) -> Option<AnalysisOutput> {
    Some(AnalysisOutput::Single(FaceAnalysis::new(emotion)))
}

fn session(
    regions: Vec<FaceRegion>,
    answers: Vec<Option<AnalysisOutput>>,
    quit_on: u32,
    publisher_fails: Option<bool>,
) -> (Session, Harness) {
    let harness = Harness {
        log: Rc::new(RefCell::new(Vec::new())),
        sent: Rc::new(RefCell::new(Vec::new())),
        shown: Rc::new(RefCell::new(Vec::new())),
    };

    let mut session = Session::new(
        Box::new(ScriptedSource {
            log: harness.log.clone(),
        }),
        Box::new(FixedLocator {
            log: harness.log.clone(),
            regions,
        }),
        EmotionClassifier::new(Box::new(QueuedModel {
            log: harness.log.clone(),
            answers: answers.into(),
        })),
        Box::new(ScriptedPresenter {
            log: harness.log.clone(),
            shown: harness.shown.clone(),
            polls: 0,
            quit_on,
        }),
    );

    if let Some(fail) = publisher_fails {
        session = session.with_publisher(Box::new(RecordingPublisher {
            log: harness.log.clone(),
            sent: harness.sent.clone(),
            fail,
        }));
    }

    (session, harness)
}

#[test]
fn stages_run_in_pipeline_order() {
    let (mut session, harness) = session(
        vec![FaceRegion::new(10, 20, 30, 30)],
        vec![single(Emotion::Happy)],
        1,
        Some(false),
    );

    assert_eq!(session.step().unwrap(), StepOutcome::Quit);
    assert_eq!(
        *harness.log.borrow(),
        vec!["read", "classify", "locate", "publish", "show", "poll"]
    );
}

#[test]
fn runs_until_quit_key_and_publishes_every_frame() {
    let (mut session, harness) = session(
        vec![FaceRegion::new(50, 50, 40, 40)],
        vec![
            single(Emotion::Happy),
            single(Emotion::Sad),
            single(Emotion::Neutral),
        ],
        3,
        Some(false),
    );

    assert_eq!(session.state(), LoopState::Initializing);
    assert_eq!(session.run().unwrap(), 3);
    assert_eq!(session.state(), LoopState::Terminated);
    assert_eq!(session.frames_processed(), 3);
    assert_eq!(
        *harness.sent.borrow(),
        vec![Emotion::Happy, Emotion::Sad, Emotion::Neutral]
    );
    assert_eq!(harness.shown.borrow().len(), 3);
}

#[test]
fn first_subject_label_wins_for_many_results() {
    let many = AnalysisOutput::Many(vec![
        FaceAnalysis::new(Emotion::Sad),
        FaceAnalysis::new(Emotion::Angry),
    ]);
    let (mut session, harness) = session(
        vec![FaceRegion::new(0, 20, 20, 20), FaceRegion::new(60, 20, 20, 20)],
        vec![Some(many)],
        1,
        Some(false),
    );

    session.run().unwrap();
    assert_eq!(*harness.sent.borrow(), vec![Emotion::Sad]);
}

#[test]
fn frames_without_faces_are_shown_unannotated() {
    let (mut session, harness) = session(Vec::new(), vec![single(Emotion::Fear)], 1, None);

    session.run().unwrap();

    let shown = harness.shown.borrow();
    assert!(shown[0].data_bytes().unwrap().iter().all(|&b| b == 0));
}

#[test]
fn annotated_frame_reaches_the_presenter() {
    let (mut session, harness) = session(
        vec![FaceRegion::new(50, 50, 40, 40)],
        vec![single(Emotion::Happy)],
        1,
        None,
    );

    session.run().unwrap();

    let shown = harness.shown.borrow();
    assert!(shown[0].data_bytes().unwrap().iter().any(|&b| b != 0));
}

#[test]
fn runs_without_a_publisher() {
    let (mut session, harness) = session(
        vec![FaceRegion::new(5, 30, 10, 10)],
        vec![single(Emotion::Happy), single(Emotion::Happy)],
        2,
        None,
    );

    assert_eq!(session.run().unwrap(), 2);
    assert!(!harness.log.borrow().iter().any(|entry| entry == "publish"));
}

#[test]
fn classification_failure_aborts_by_default() {
    let (mut session, harness) = session(
        vec![FaceRegion::new(5, 30, 10, 10)],
        vec![single(Emotion::Happy), None, single(Emotion::Sad)],
        10,
        Some(false),
    );

    let err = session.run().unwrap_err();
    assert_eq!(err.kind(), FailureKind::Classification);
    assert_eq!(session.state(), LoopState::Terminated);
    assert_eq!(session.frames_processed(), 1);
    assert_eq!(*harness.sent.borrow(), vec![Emotion::Happy]);
}

#[test]
fn skip_policy_keeps_the_loop_alive() {
    let (session, harness) = session(
        vec![FaceRegion::new(5, 30, 10, 10)],
        vec![single(Emotion::Happy), None, single(Emotion::Sad)],
        3,
        Some(false),
    );
    let mut session = session.with_policy(ClassificationPolicy::SkipFrame);

    assert_eq!(session.run().unwrap(), 3);
    assert_eq!(*harness.sent.borrow(), vec![Emotion::Happy, Emotion::Sad]);
    assert_eq!(harness.shown.borrow().len(), 3);
}

#[rstest]
#[case(ClassificationPolicy::Abort)]
#[case(ClassificationPolicy::SkipFrame)]
fn publish_failure_always_aborts(#[case] policy: ClassificationPolicy) {
    let (session, _harness) = session(
        vec![FaceRegion::new(5, 30, 10, 10)],
        vec![single(Emotion::Happy)],
        5,
        Some(true),
    );
    let mut session = session.with_policy(policy);

    let err = session.run().unwrap_err();
    assert_eq!(err.kind(), FailureKind::Publish);
    assert_eq!(session.state(), LoopState::Terminated);
    assert_eq!(session.frames_processed(), 0);
}
