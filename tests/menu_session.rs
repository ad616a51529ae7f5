
use mock_input::{FakeHost, RecordingDriver};
use paint_prompter::calibration::{CalibrationStore, CanvasRect, ScreenPoint, ToolKind, ToolPositions};
use paint_prompter::llm::{GenerateError, ShapeGenerator};
use paint_prompter::menu::Session;
use paint_prompter::render::DragTimings;
use paint_prompter::shapes::ShapeRequest;
use paint_prompter::voice::{Transcriber, Transcription};
use std::cell::RefCell;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

struct FakeGenerator {
    shapes: Option<Vec<ShapeRequest>>,
    queries: RefCell<Vec<String>>,
}

impl FakeGenerator {
    fn returning(shapes: Vec<ShapeRequest>) -> Self {
        Self {
            shapes: Some(shapes),
            queries: RefCell::default(),
        }
    }

    fn failing() -> Self {
        Self {
            shapes: None,
            queries: RefCell::default(),
        }
    }
}

impl ShapeGenerator for FakeGenerator {
    fn generate(&self, query: &str) -> Result<Vec<ShapeRequest>, GenerateError> {
        self.queries.borrow_mut().push(query.to_string());
        self.shapes.clone().ok_or(GenerateError::EmptyResponse)
    }
}

struct FakeTranscriber(Transcription);

impl Transcriber for FakeTranscriber {
    fn listen(&mut self, _timeout: Duration, _phrase_limit: Duration) -> Transcription {
        self.0.clone()
    }
}

fn calibrated_store() -> (TempDir, CalibrationStore) {
    let dir = tempdir().unwrap();
    let store = CalibrationStore::new(dir.path().join("cal.json"));
    let mut tools = ToolPositions::new();
    tools.insert(ToolKind::Rectangle, ScreenPoint::new(10, 20));
    let canvas = CanvasRect {
        top_left: ScreenPoint::new(100, 50),
        bottom_right: ScreenPoint::new(900, 650),
    };
    store.save(Some(&tools), Some(&canvas)).unwrap();
    (dir, store)
}

#[test]
fn prompt_draws_generated_shapes() {
    let (_dir, store) = calibrated_store();
    let mut driver = RecordingDriver::default();
    let mut host = FakeHost::default();
    let generator =
        FakeGenerator::returning(vec![ShapeRequest::new("rectangle", 0.0, 0.0, 100.0, 100.0)]);
    let mut out = Vec::new();

    let report = Session {
        store: &store,
        driver: &mut driver,
        host: &mut host,
        timings: DragTimings::default(),
    }
    .draw_from_prompt("  a box  ", &generator, &mut out)
    .unwrap()
    .unwrap();

    assert_eq!(report.drawn(), 1);
    assert_eq!(*generator.queries.borrow(), vec!["a box"]);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Done: 1 drawn, 0 skipped, 0 failed"));
}

#[test]
fn empty_generation_draws_nothing() {
    let (_dir, store) = calibrated_store();
    let mut driver = RecordingDriver::default();
    let mut host = FakeHost::default();
    let generator = FakeGenerator::returning(Vec::new());
    let mut out = Vec::new();

    let report = Session {
        store: &store,
        driver: &mut driver,
        host: &mut host,
        timings: DragTimings::default(),
    }
    .draw_from_prompt("nothing", &generator, &mut out)
    .unwrap();

    assert!(report.is_none());
    assert_eq!(host.launches, 0);
    assert!(String::from_utf8(out).unwrap().contains("No shapes to draw."));
}

#[test]
fn generation_failure_is_reported() {
    let (_dir, store) = calibrated_store();
    let mut driver = RecordingDriver::default();
    let mut host = FakeHost::default();
    let generator = FakeGenerator::failing();
    let mut out = Vec::new();

    let report = Session {
        store: &store,
        driver: &mut driver,
        host: &mut host,
        timings: DragTimings::default(),
    }
    .draw_from_prompt("a house", &generator, &mut out)
    .unwrap();

    assert!(report.is_none());
    assert!(String::from_utf8(out)
        .unwrap()
        .contains("Could not generate shapes: model returned an empty response"));
}

#[test]
fn uncalibrated_run_is_aborted_with_message() {
    let dir = tempdir().unwrap();
    let store = CalibrationStore::new(dir.path().join("missing.json"));
    let mut driver = RecordingDriver::default();
    let mut host = FakeHost::default();
    let mut out = Vec::new();

    let report = Session {
        store: &store,
        driver: &mut driver,
        host: &mut host,
        timings: DragTimings::default(),
    }
    .draw(&[ShapeRequest::new("line", 0.0, 0.0, 1.0, 1.0)], &mut out)
    .unwrap();

    assert!(report.is_none());
    assert_eq!(host.launches, 0);
    assert!(String::from_utf8(out).unwrap().contains("Drawing aborted: no calibration found"));
}

#[test]
fn unheard_voice_returns_to_menu() {
    let (_dir, store) = calibrated_store();
    let mut driver = RecordingDriver::default();
    let mut host = FakeHost::default();
    let generator = FakeGenerator::returning(vec![ShapeRequest::new("rectangle", 0.0, 0.0, 1.0, 1.0)]);
    let mut out = Vec::new();

    for heard in [
        Transcription::NoSpeech,
        Transcription::Unintelligible,
        Transcription::ServiceUnavailable("offline".into()),
    ] {
        let report = Session {
            store: &store,
            driver: &mut driver,
            host: &mut host,
            timings: DragTimings::default(),
        }
        .draw_from_voice(
            &mut FakeTranscriber(heard),
            Duration::from_secs(5),
            Duration::from_secs(10),
            &generator,
            &mut out,
        )
        .unwrap();
        assert!(report.is_none());
    }

    assert!(generator.queries.borrow().is_empty());
    assert_eq!(host.launches, 0);
    assert!(String::from_utf8(out).unwrap().contains("Didn't catch that"));
}

#[test]
fn heard_voice_is_used_as_prompt() {
    let (_dir, store) = calibrated_store();
    let mut driver = RecordingDriver::default();
    let mut host = FakeHost::default();
    let generator = FakeGenerator::returning(vec![ShapeRequest::new("rectangle", 0.0, 0.0, 1.0, 1.0)]);
    let mut out = Vec::new();

    let report = Session {
        store: &store,
        driver: &mut driver,
        host: &mut host,
        timings: DragTimings::default(),
    }
    .draw_from_voice(
        &mut FakeTranscriber(Transcription::Heard("draw a small square".into())),
        Duration::from_secs(5),
        Duration::from_secs(10),
        &generator,
        &mut out,
    )
    .unwrap();

    assert_eq!(report.map(|r| r.drawn()), Some(1));
    assert_eq!(*generator.queries.borrow(), vec!["draw a small square"]);
    assert!(String::from_utf8(out).unwrap().contains("You said: draw a small square"));
}
