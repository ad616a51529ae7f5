//! Turns validated shape records into bounding-box drags inside the host
//! application.
//!
//! A drawing run moves through `NotStarted -> CalibrationLoaded -> HostOpened
//! -> HostFocused -> Drawing -> Done`. Anything that fails before `Drawing`
//! aborts the run with a [`DrawError`]; problems with individual shapes are
//! recorded in the [`RunReport`] and the run continues.

use crate::calibration::{CalibrationData, CanvasBounds, CanvasRect, ScreenPoint, ToolPositions};
use crate::host::HostApp;
use crate::input::InputDriver;
use crate::shapes::{ModelPoint, ShapeKind, ShapeRecord, ShapeRequest, SkipReason};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DrawError {
    #[error("no calibration found; calibrate the tool positions first")]
    NoCalibration,
    #[error("no canvas calibration found; calibrate the canvas bounds first")]
    NoCanvas,
    #[error("failed to launch the paint application: {0}")]
    HostLaunch(String),
    #[error("could not focus the paint window ({0}); click on the Paint window and run again")]
    HostFocus(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunStage {
    NotStarted,
    CalibrationLoaded,
    HostOpened,
    HostFocused,
    Drawing(usize),
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeOutcome {
    Drawn {
        kind: ShapeKind,
        from: ScreenPoint,
        to: ScreenPoint,
    },
    Skipped(SkipReason),
    /// The input driver gave up part-way through the gesture.
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub outcomes: Vec<ShapeOutcome>,
}

impl RunReport {
    pub fn drawn(&self) -> usize {
        self.count(|o| matches!(o, ShapeOutcome::Drawn { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ShapeOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ShapeOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&ShapeOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} drawn, {} skipped, {} failed",
            self.drawn(),
            self.skipped(),
            self.failed()
        )
    }
}

/// Pauses inserted between gesture steps so the host UI keeps up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragTimings {
    pub tool_hover_ms: u64,
    pub tool_settle_ms: u64,
    pub after_tool_ms: u64,
    pub focus_ms: u64,
    pub pre_press_ms: u64,
    pub drag_ms: u64,
    pub release_ms: u64,
    pub commit_ms: u64,
    pub start_delay_ms: u64,
    /// Distance inside the canvas top-left corner used for the focus click.
    pub focus_inset_px: i32,
}

impl Default for DragTimings {
    fn default() -> Self {
        Self {
            tool_hover_ms: 300,
            tool_settle_ms: 300,
            after_tool_ms: 100,
            focus_ms: 200,
            pre_press_ms: 100,
            drag_ms: 400,
            release_ms: 200,
            commit_ms: 200,
            start_delay_ms: 1000,
            focus_inset_px: 10,
        }
    }
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

pub fn resolve_bounds(canvas: Option<&CanvasRect>) -> Option<CanvasBounds> {
    canvas.map(CanvasRect::bounds)
}

/// Map a model coordinate to the screen by adding the canvas origin, then
/// clamp into the canvas.
///
/// This is an offset, not a scale. Prompts and stored calibrations assume
/// model coordinates are pixels relative to the canvas top-left corner, so
/// switching to proportional scaling requires recalibrating as well.
pub fn to_screen_point(point: ModelPoint, bounds: Option<CanvasBounds>) -> ScreenPoint {
    let Some(b) = bounds else {
        return ScreenPoint::new(point.x.round() as i32, point.y.round() as i32);
    };
    let x = (f64::from(b.left) + point.x).clamp(f64::from(b.left), f64::from(b.right));
    let y = (f64::from(b.top) + point.y).clamp(f64::from(b.top), f64::from(b.bottom));
    ScreenPoint::new(x.round() as i32, y.round() as i32)
}

pub fn select_tool(kind: ShapeKind, tools: &ToolPositions) -> Result<ScreenPoint, SkipReason> {
    let tool = kind.tool();
    tools
        .get(&tool)
        .copied()
        .ok_or(SkipReason::ToolNotCalibrated(tool))
}

pub struct Renderer<'a> {
    driver: &'a mut dyn InputDriver,
    timings: DragTimings,
}

impl<'a> Renderer<'a> {
    pub fn new(driver: &'a mut dyn InputDriver, timings: DragTimings) -> Self {
        Self { driver, timings }
    }

    /// Draw every request in order. Calibration is checked before the host is
    /// touched; per-shape problems never abort the batch.
    pub fn draw_all(
        &mut self,
        requests: &[ShapeRequest],
        calibration: Option<&CalibrationData>,
        host: &mut dyn HostApp,
    ) -> Result<RunReport, DrawError> {
        if requests.is_empty() {
            tracing::info!("no shapes to draw");
            return Ok(RunReport::default());
        }

        let mut stage = RunStage::NotStarted;
        let calibration = calibration.ok_or(DrawError::NoCalibration)?;
        let bounds = resolve_bounds(calibration.canvas.as_ref()).ok_or(DrawError::NoCanvas)?;
        advance(&mut stage, RunStage::CalibrationLoaded);

        host.launch().map_err(|e| {
            tracing::error!("failed to launch paint: {e:#}");
            DrawError::HostLaunch(format!("{e:#}"))
        })?;
        advance(&mut stage, RunStage::HostOpened);

        host.focus().map_err(|e| {
            tracing::error!("could not focus paint window: {e:#}");
            DrawError::HostFocus(format!("{e:#}"))
        })?;
        advance(&mut stage, RunStage::HostFocused);

        tracing::info!("starting to draw {} shapes", requests.len());
        self.driver.pause(ms(self.timings.start_delay_ms));

        let mut report = RunReport::default();
        for (i, request) in requests.iter().enumerate() {
            advance(&mut stage, RunStage::Drawing(i));
            tracing::info!(
                "drawing shape {}/{}: {}",
                i + 1,
                requests.len(),
                request.label()
            );
            let outcome = match request.validate() {
                Ok(record) => self.commit_drag_shape(&record, &calibration.tools, bounds),
                Err(reason) => ShapeOutcome::Skipped(reason),
            };
            match &outcome {
                ShapeOutcome::Skipped(reason) => {
                    tracing::warn!("skipping shape {}: {reason}", i + 1)
                }
                ShapeOutcome::Failed(reason) => {
                    tracing::error!("error drawing shape {}: {reason}", i + 1)
                }
                ShapeOutcome::Drawn { .. } => {}
            }
            report.outcomes.push(outcome);
        }
        advance(&mut stage, RunStage::Done);
        tracing::info!("drawing finished: {report}");
        Ok(report)
    }

    /// Select the tool, then press at the start point, drag to the end point,
    /// release and click the midpoint so the host commits the shape.
    pub fn commit_drag_shape(
        &mut self,
        record: &ShapeRecord,
        tools: &ToolPositions,
        bounds: CanvasBounds,
    ) -> ShapeOutcome {
        let tool = match select_tool(record.kind, tools) {
            Ok(point) => point,
            Err(reason) => return ShapeOutcome::Skipped(reason),
        };
        let from = to_screen_point(record.start, Some(bounds));
        let to = to_screen_point(record.end, Some(bounds));
        tracing::debug!("drawing {} from {from} to {to}", record.kind);

        match self.run_gesture(tool, from, to, bounds) {
            Ok(()) => ShapeOutcome::Drawn {
                kind: record.kind,
                from,
                to,
            },
            Err(e) => ShapeOutcome::Failed(format!("{e:#}")),
        }
    }

    fn run_gesture(
        &mut self,
        tool: ScreenPoint,
        from: ScreenPoint,
        to: ScreenPoint,
        bounds: CanvasBounds,
    ) -> anyhow::Result<()> {
        let t = self.timings.clone();

        self.driver.move_to(tool)?;
        self.driver.pause(ms(t.tool_hover_ms));
        self.driver.click()?;
        self.driver.pause(ms(t.tool_settle_ms));
        self.driver.pause(ms(t.after_tool_ms));

        let inset = t.focus_inset_px;
        self.driver.click_at(bounds.top_left().offset(inset, inset))?;
        self.driver.pause(ms(t.focus_ms));

        self.driver.move_to(from)?;
        self.driver.pause(ms(t.pre_press_ms));

        self.driver.button_down()?;
        let dragged = self.driver.glide_to(to, ms(t.drag_ms));
        // The button must come back up even if the drag was cut short.
        let released = self.driver.button_up();
        dragged?;
        released?;
        self.driver.pause(ms(t.release_ms));

        let mid = ScreenPoint::new((from.x + to.x) / 2, (from.y + to.y) / 2);
        self.driver.click_at(mid)?;
        self.driver.pause(ms(t.commit_ms));
        Ok(())
    }
}

fn advance(stage: &mut RunStage, next: RunStage) {
    tracing::debug!("draw run: {stage:?} -> {next:?}");
    *stage = next;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> CanvasBounds {
        CanvasBounds {
            left: 100,
            top: 200,
            right: 900,
            bottom: 600,
        }
    }

    #[test]
    fn offset_is_added_not_scaled() {
        let p = to_screen_point(ModelPoint::new(200.0, 300.0), Some(bounds()));
        assert_eq!(p, ScreenPoint::new(300, 500));
    }

    #[test]
    fn out_of_range_points_are_clamped() {
        let b = bounds();
        for (x, y) in [(-50.0, -50.0), (5000.0, 5000.0), (1000.0, -1.0), (0.0, 500.0)] {
            let p = to_screen_point(ModelPoint::new(x, y), Some(b));
            assert!(b.contains(p), "{p} outside {b:?}");
        }
        assert_eq!(
            to_screen_point(ModelPoint::new(-50.0, 5000.0), Some(b)),
            ScreenPoint::new(100, 600)
        );
    }

    #[test]
    fn without_bounds_points_are_rounded() {
        assert_eq!(
            to_screen_point(ModelPoint::new(10.4, 19.6), None),
            ScreenPoint::new(10, 20)
        );
    }

    #[test]
    fn resolve_bounds_absent_without_canvas() {
        assert_eq!(resolve_bounds(None), None);
    }

    #[test]
    fn select_tool_requires_calibration() {
        let tools = ToolPositions::from([(crate::calibration::ToolKind::Circle, ScreenPoint::new(1, 2))]);
        assert_eq!(select_tool(ShapeKind::Circle, &tools), Ok(ScreenPoint::new(1, 2)));
        assert_eq!(
            select_tool(ShapeKind::Diamond, &tools),
            Err(SkipReason::ToolNotCalibrated(crate::calibration::ToolKind::Diamond))
        );
    }

    #[test]
    fn report_counts_outcomes() {
        let report = RunReport {
            outcomes: vec![
                ShapeOutcome::Skipped(SkipReason::MissingKind),
                ShapeOutcome::Failed("boom".into()),
                ShapeOutcome::Drawn {
                    kind: ShapeKind::Line,
                    from: ScreenPoint::new(0, 0),
                    to: ScreenPoint::new(1, 1),
                },
            ],
        };
        assert_eq!(report.to_string(), "1 drawn, 1 skipped, 1 failed");
    }

    #[test]
    fn run_stage_advances_in_place() {
        let mut stage = RunStage::NotStarted;
        advance(&mut stage, RunStage::HostFocused);
        advance(&mut stage, RunStage::Drawing(3));
        assert_eq!(stage, RunStage::Drawing(3));
    }
}
