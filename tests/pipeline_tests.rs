use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use emotion_sampler::emotion::{
    Emotion, EmotionClassifier, EmotionModel, EmotionSimulator, Origin,
};
use emotion_sampler::face_detection::{FaceDetector, FacePresenceModel, SkinToneHeuristic};
use emotion_sampler::frame::Frame;
use emotion_sampler::source::{SequenceSource, StillSource};
use emotion_sampler::tensor::Tensor;
use emotion_sampler::{
    Config, Error, PipelineContext, Result, Sampler, SamplerState, TickOutcome,
};

const SKIN: [u8; 3] = [200, 150, 100];
const BLACK: [u8; 3] = [0, 0, 0];

fn no_models() -> Arc<PipelineContext> {
    let config = Config::default().with_model_dir("/nonexistent/models");
    Arc::new(PipelineContext::from_config(&config))
}

async fn run_tick(sampler: &Sampler) {
    match sampler.tick() {
        TickOutcome::Started(run) => run.await.unwrap(),
        other => panic!("expected a run, got {:?}", other),
    }
}

struct FaceScore(f32);

impl FacePresenceModel for FaceScore {
    fn face_score(&self, _input: &Tensor) -> Result<f32> {
        Ok(self.0)
    }
}

struct BrokenFace;

impl FacePresenceModel for BrokenFace {
    fn face_score(&self, _input: &Tensor) -> Result<f32> {
        Err(Error::Inference("face model crashed".to_string()))
    }
}

struct Scores(Vec<f32>);

impl EmotionModel for Scores {
    fn scores(&self, _input: &Tensor) -> Result<Vec<f32>> {
        Ok(self.0.clone())
    }
}

/// Blocks inference until released and records how many runs overlap.
struct SlowEmotion {
    gate: Mutex<mpsc::Receiver<()>>,
    running: AtomicUsize,
    max_running: Arc<AtomicUsize>,
}

impl EmotionModel for SlowEmotion {
    fn scores(&self, _input: &Tensor) -> Result<Vec<f32>> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        let released = self.gate.lock().unwrap().recv();
        self.running.fetch_sub(1, Ordering::SeqCst);

        released.map_err(|_| Error::Inference("gate closed".to_string()))?;
        Ok(vec![0.9, 0.0, 0.0, 0.0, 0.0, 0.0, 0.1])
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn skin_frame_without_models_yields_simulated_emotion() {
    let context = no_models();
    assert!(!context.status().face_model_loaded);
    assert!(!context.status().emotion_model_loaded);

    let sampler = Sampler::new(context.clone(), StillSource::new(Frame::uniform(640, 480, SKIN)));
    run_tick(&sampler).await;

    let observation = context.latest();
    assert!(observation.face_detected);
    let emotion = observation.emotion.expect("face frame must carry an emotion");
    assert!(Emotion::ALL.contains(&emotion.emotion));
    assert!((0.7..=1.0).contains(&emotion.confidence));
    assert_eq!(emotion.origin, Origin::Simulated);
    assert_eq!(observation.detection_count, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn black_frame_without_models_yields_no_result() {
    let context = no_models();
    let sampler = Sampler::new(context.clone(), StillSource::new(Frame::uniform(640, 480, BLACK)));
    run_tick(&sampler).await;

    let observation = context.latest();
    assert!(!observation.face_detected);
    assert_eq!(observation.emotion, None);
    assert_eq!(observation.detection_count, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_inference_never_overlaps() {
    let (release, gate) = mpsc::channel();
    let max_running = Arc::new(AtomicUsize::new(0));
    let model = SlowEmotion {
        gate: Mutex::new(gate),
        running: AtomicUsize::new(0),
        max_running: max_running.clone(),
    };

    let context = Arc::new(PipelineContext::new(
        FaceDetector::heuristic(SkinToneHeuristic::default()),
        EmotionClassifier::model_backed(Box::new(model), EmotionSimulator::seeded(3)),
    ));
    let sampler = Sampler::new(context.clone(), StillSource::new(Frame::uniform(64, 64, SKIN)));

    let TickOutcome::Started(run) = sampler.tick() else {
        panic!("first tick should start");
    };
    assert!(matches!(sampler.tick(), TickOutcome::Dropped));
    assert_eq!(sampler.state(), SamplerState::Sampling);

    release.send(()).unwrap();
    run.await.unwrap();

    assert_eq!(sampler.dropped_ticks(), 1);
    assert_eq!(max_running.load(Ordering::SeqCst), 1);
    assert_eq!(sampler.state(), SamplerState::Idle);

    let emotion = context.latest().emotion.unwrap();
    assert_eq!(emotion.emotion, Emotion::Angry);
    assert_eq!(emotion.origin, Origin::Model);
}

#[tokio::test(flavor = "multi_thread")]
async fn tensors_are_released_every_tick() {
    let context = Arc::new(PipelineContext::new(
        FaceDetector::model_backed(Box::new(FaceScore(0.9)), 0.5, SkinToneHeuristic::default()),
        EmotionClassifier::model_backed(
            Box::new(Scores(vec![0.0; 7])),
            EmotionSimulator::seeded(8),
        ),
    ));
    let frames = vec![
        Frame::uniform(320, 240, SKIN),
        Frame::uniform(17, 5, BLACK),
        Frame::uniform(1, 1, SKIN),
    ];
    let sampler = Sampler::new(context.clone(), SequenceSource::new(frames));

    for _ in 0..6 {
        run_tick(&sampler).await;
        assert_eq!(context.ledger().live(), 0);
    }
    assert_eq!(context.detection_count(), 6);
}

#[tokio::test(flavor = "multi_thread")]
async fn all_model_combinations_work() {
    let happy = || Box::new(Scores(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]));
    let cases: Vec<(FaceDetector, EmotionClassifier, Origin)> = vec![
        (
            FaceDetector::heuristic(SkinToneHeuristic::default()),
            EmotionClassifier::simulated(EmotionSimulator::seeded(1)),
            Origin::Simulated,
        ),
        (
            FaceDetector::model_backed(Box::new(FaceScore(0.8)), 0.5, SkinToneHeuristic::default()),
            EmotionClassifier::simulated(EmotionSimulator::seeded(2)),
            Origin::Simulated,
        ),
        (
            FaceDetector::heuristic(SkinToneHeuristic::default()),
            EmotionClassifier::model_backed(happy(), EmotionSimulator::seeded(3)),
            Origin::Model,
        ),
        (
            FaceDetector::model_backed(Box::new(BrokenFace), 0.5, SkinToneHeuristic::default()),
            EmotionClassifier::model_backed(happy(), EmotionSimulator::seeded(4)),
            Origin::Model,
        ),
    ];

    for (face, emotion, origin) in cases {
        let context = Arc::new(PipelineContext::new(face, emotion));
        let sampler = Sampler::new(context.clone(), StillSource::new(Frame::uniform(48, 48, SKIN)));
        run_tick(&sampler).await;

        let observation = context.latest();
        assert!(observation.face_detected);
        assert_eq!(observation.emotion.unwrap().origin, origin);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn face_model_below_threshold_means_no_face() {
    let context = Arc::new(PipelineContext::new(
        FaceDetector::model_backed(Box::new(FaceScore(0.5)), 0.5, SkinToneHeuristic::default()),
        EmotionClassifier::simulated(EmotionSimulator::seeded(6)),
    ));
    let sampler = Sampler::new(context.clone(), StillSource::new(Frame::uniform(48, 48, SKIN)));
    run_tick(&sampler).await;

    assert!(!context.latest().face_detected);
    assert_eq!(context.latest().emotion, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn stopped_sampler_stops_publishing() {
    let context = no_models();
    let handle = Sampler::new(context.clone(), StillSource::new(Frame::uniform(32, 32, SKIN)))
        .spawn(Duration::from_millis(10));
    let mut observations = handle.subscribe();

    tokio::time::timeout(Duration::from_secs(5), observations.changed())
        .await
        .expect("sampler never published")
        .unwrap();
    handle.stop();

    // let any run that was already in flight settle
    tokio::time::sleep(Duration::from_millis(100)).await;
    let settled = context.detection_count();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(context.detection_count(), settled);
}
