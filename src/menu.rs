use crate::calibration::CalibrationStore;
use crate::host::HostApp;
use crate::input::InputDriver;
use crate::llm::ShapeGenerator;
use crate::render::{DragTimings, RunReport, ShapeOutcome, Renderer};
use crate::shapes::ShapeRequest;
use crate::voice::Transcriber;
use std::io::Write;
use std::time::Duration;

pub const MENU: &str = "\
=== PAINT PROMPTER ===

Options:
1. Calibrate tool positions (recommended first time)
2. Calibrate canvas bounds
3. Draw test shapes
4. Automated calibration
5. Draw from a typed prompt
6. Draw from a spoken prompt
7. Exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    CalibrateTools,
    CalibrateCanvas,
    DrawTestShapes,
    AutoCalibrate,
    DrawFromPrompt,
    DrawFromVoice,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::CalibrateTools),
            "2" => Some(MenuChoice::CalibrateCanvas),
            "3" => Some(MenuChoice::DrawTestShapes),
            "4" => Some(MenuChoice::AutoCalibrate),
            "5" => Some(MenuChoice::DrawFromPrompt),
            "6" => Some(MenuChoice::DrawFromVoice),
            "7" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

/// A simple house: walls, roof, windows and a door.
pub fn test_shapes() -> Vec<ShapeRequest> {
    vec![
        ShapeRequest::new("rectangle", 200.0, 300.0, 600.0, 500.0),
        ShapeRequest::new("rectangle", 200.0, 100.0, 600.0, 300.0),
        ShapeRequest::new("line", 200.0, 100.0, 400.0, 0.0),
        ShapeRequest::new("line", 400.0, 0.0, 600.0, 100.0),
        ShapeRequest::new("rectangle", 250.0, 400.0, 350.0, 450.0),
        ShapeRequest::new("rectangle", 450.0, 400.0, 550.0, 450.0),
        ShapeRequest::new("rectangle", 250.0, 150.0, 350.0, 200.0),
        ShapeRequest::new("rectangle", 450.0, 150.0, 550.0, 200.0),
        ShapeRequest::new("rectangle", 350.0, 450.0, 450.0, 500.0),
    ]
}

/// Everything a drawing run needs, borrowed for the length of the session.
pub struct Session<'a> {
    pub store: &'a CalibrationStore,
    pub driver: &'a mut dyn InputDriver,
    pub host: &'a mut dyn HostApp,
    pub timings: DragTimings,
}

impl Session<'_> {
    /// Draw the requests and print a summary. Run-level failures are reported
    /// to the operator, not returned.
    pub fn draw(
        &mut self,
        requests: &[ShapeRequest],
        out: &mut dyn Write,
    ) -> anyhow::Result<Option<RunReport>> {
        if requests.is_empty() {
            writeln!(out, "No shapes to draw.")?;
            return Ok(None);
        }
        writeln!(out, "{}", serde_json::to_string(requests)?)?;

        let calibration = self.store.load();
        let mut renderer = Renderer::new(&mut *self.driver, self.timings.clone());
        match renderer.draw_all(requests, calibration.as_ref(), &mut *self.host) {
            Ok(report) => {
                for (i, outcome) in report.outcomes.iter().enumerate() {
                    match outcome {
                        ShapeOutcome::Drawn { kind, from, to } => {
                            writeln!(out, "  {}. {kind} {from} -> {to}", i + 1)?
                        }
                        ShapeOutcome::Skipped(reason) => {
                            writeln!(out, "  {}. skipped: {reason}", i + 1)?
                        }
                        ShapeOutcome::Failed(reason) => {
                            writeln!(out, "  {}. failed: {reason}", i + 1)?
                        }
                    }
                }
                writeln!(out, "Done: {report}")?;
                Ok(Some(report))
            }
            Err(e) => {
                writeln!(out, "Drawing aborted: {e}")?;
                Ok(None)
            }
        }
    }

    pub fn draw_from_prompt(
        &mut self,
        query: &str,
        generator: &dyn ShapeGenerator,
        out: &mut dyn Write,
    ) -> anyhow::Result<Option<RunReport>> {
        let query = query.trim();
        if query.is_empty() {
            writeln!(out, "Empty prompt; nothing to draw.")?;
            return Ok(None);
        }
        match generator.generate(query) {
            Ok(requests) => self.draw(&requests, out),
            Err(e) => {
                tracing::error!("shape generation failed: {e}");
                writeln!(out, "Could not generate shapes: {e}")?;
                Ok(None)
            }
        }
    }

    /// Listen for one phrase; with nothing heard the operator is sent back to
    /// the menu.
    pub fn draw_from_voice(
        &mut self,
        transcriber: &mut dyn Transcriber,
        timeout: Duration,
        phrase_limit: Duration,
        generator: &dyn ShapeGenerator,
        out: &mut dyn Write,
    ) -> anyhow::Result<Option<RunReport>> {
        writeln!(out, "Please speak now...")?;
        let Some(text) = transcriber.listen_for_text(timeout, phrase_limit) else {
            writeln!(out, "Didn't catch that; please try again.")?;
            return Ok(None);
        };
        writeln!(out, "You said: {text}")?;
        self.draw_from_prompt(&text, generator, out)
    }
}
