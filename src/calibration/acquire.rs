use crate::calibration::matcher;
use crate::calibration::{CalibrationStore, CanvasRect, ScreenPoint, ToolKind, ToolPositions};
use crate::input::{InputDriver, PointerPosition};
use anyhow::Context;
use image::GrayImage;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

/// Something calibration needs a screen position for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalibrationTarget {
    Tool(ToolKind),
    CanvasTopLeft,
    CanvasBottomRight,
}

impl CalibrationTarget {
    /// File stem of the reference image used by automated calibration.
    pub fn image_stem(&self) -> &'static str {
        match self {
            CalibrationTarget::Tool(tool) => tool.as_str(),
            CalibrationTarget::CanvasTopLeft => "canvas_top_left",
            CalibrationTarget::CanvasBottomRight => "canvas_bottom_right",
        }
    }
}

impl std::fmt::Display for CalibrationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalibrationTarget::Tool(tool) => write!(f, "{} tool", tool.as_str().to_uppercase()),
            CalibrationTarget::CanvasTopLeft => write!(f, "TOP-LEFT inside the canvas"),
            CalibrationTarget::CanvasBottomRight => write!(f, "BOTTOM-RIGHT inside the canvas"),
        }
    }
}

/// Strategy for turning a [`CalibrationTarget`] into a screen position.
pub trait PointAcquirer {
    /// Called once before a batch of targets.
    fn begin(&mut self, _heading: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// `Ok(None)` means the target was skipped or could not be found.
    fn acquire(&mut self, target: CalibrationTarget) -> anyhow::Result<Option<ScreenPoint>>;

    /// Whether found tools are merged into the stored map instead of
    /// replacing it.
    fn merges_tools(&self) -> bool {
        false
    }
}

/// Operator hovers the pointer over each target and confirms with Enter.
pub struct ManualAcquirer<'a, R, W> {
    input: R,
    output: W,
    pointer: &'a dyn PointerPosition,
}

impl<'a, R: BufRead, W: Write> ManualAcquirer<'a, R, W> {
    pub fn new(input: R, output: W, pointer: &'a dyn PointerPosition) -> Self {
        Self {
            input,
            output,
            pointer,
        }
    }

    fn read_line(&mut self) -> anyhow::Result<Option<String>> {
        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("read operator input")?;
        Ok((read > 0).then(|| line.trim().to_string()))
    }
}

impl<R: BufRead, W: Write> PointAcquirer for ManualAcquirer<'_, R, W> {
    fn begin(&mut self, heading: &str) -> anyhow::Result<()> {
        writeln!(self.output, "\n=== {heading} ===")?;
        writeln!(self.output, "Open Paint, then hover over each item and press Enter.")?;
        writeln!(self.output, "Type 'q' and press Enter to skip an item.")?;
        write!(self.output, "Press Enter when Paint is open and ready...")?;
        self.output.flush()?;
        self.read_line()?;
        Ok(())
    }

    fn acquire(&mut self, target: CalibrationTarget) -> anyhow::Result<Option<ScreenPoint>> {
        write!(
            self.output,
            "\nHover over the {target} and press Enter (or 'q' to skip): "
        )?;
        self.output.flush()?;
        let Some(answer) = self.read_line()? else {
            return Ok(None);
        };
        if answer.eq_ignore_ascii_case("q") {
            writeln!(self.output, "Skipped {target}")?;
            return Ok(None);
        }
        let pos = self.pointer.pointer_position()?;
        writeln!(self.output, "  -> {}: {}, {}", target.image_stem(), pos.x, pos.y)?;
        Ok(Some(pos))
    }
}

/// Grayscale capture of the display, with the screen position of its
/// top-left pixel.
pub struct ScreenFrame {
    pub image: GrayImage,
    pub origin: ScreenPoint,
}

pub trait ScreenSource {
    fn capture(&mut self) -> anyhow::Result<ScreenFrame>;
}

/// Primary display capture via the `screenshots` crate.
#[derive(Debug, Default)]
pub struct DisplayCapture;

impl ScreenSource for DisplayCapture {
    fn capture(&mut self) -> anyhow::Result<ScreenFrame> {
        #[cfg(not(target_os = "windows"))]
        {
            anyhow::bail!("screen capture is only supported on Windows");
        }

        #[cfg(target_os = "windows")]
        {
            let screen = screenshots::Screen::from_point(0, 0)?;
            let rgba = screen.capture()?;
            Ok(ScreenFrame {
                image: image::DynamicImage::ImageRgba8(rgba).to_luma8(),
                origin: ScreenPoint::new(screen.display_info.x, screen.display_info.y),
            })
        }
    }
}

/// Finds each target on screen from a reference image and clicks it.
pub struct ImageMatchAcquirer<'a> {
    screen: &'a mut dyn ScreenSource,
    driver: &'a mut dyn InputDriver,
    templates_dir: PathBuf,
    confidence: f32,
    click_settle: Duration,
}

impl<'a> ImageMatchAcquirer<'a> {
    pub fn new(
        screen: &'a mut dyn ScreenSource,
        driver: &'a mut dyn InputDriver,
        templates_dir: impl Into<PathBuf>,
        confidence: f32,
    ) -> Self {
        Self {
            screen,
            driver,
            templates_dir: templates_dir.into(),
            confidence,
            click_settle: Duration::from_millis(300),
        }
    }

    pub fn with_click_settle(mut self, settle: Duration) -> Self {
        self.click_settle = settle;
        self
    }

    fn template_path(&self, target: CalibrationTarget) -> PathBuf {
        self.templates_dir
            .join(format!("{}.png", target.image_stem()))
    }
}

impl PointAcquirer for ImageMatchAcquirer<'_> {
    fn acquire(&mut self, target: CalibrationTarget) -> anyhow::Result<Option<ScreenPoint>> {
        let path = self.template_path(target);
        let template = image::open(&path)
            .with_context(|| format!("open reference image {}", path.display()))?
            .to_luma8();
        let frame = self.screen.capture().context("capture screen")?;

        let Some(hit) = matcher::locate(&frame.image, &template, self.confidence) else {
            tracing::warn!("{target} not found on screen (confidence {})", self.confidence);
            return Ok(None);
        };
        let (cx, cy) = hit.center();
        let point = frame.origin.offset(cx as i32, cy as i32);
        tracing::info!("found {target} at {point} (score {:.3})", hit.score);

        self.driver.click_at(point)?;
        self.driver.pause(self.click_settle);
        Ok(Some(point))
    }

    /// A missing reference image must not erase a manually calibrated tool.
    fn merges_tools(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCalibrationSummary {
    pub recorded: ToolPositions,
    /// Tools that were skipped or could not be located.
    pub missed: Vec<ToolKind>,
    /// False when nothing was recorded and the stored tools were left alone.
    pub saved: bool,
}

/// Acquire every tool position and persist them while keeping the canvas.
/// One failing tool never stops the rest, and a run that records nothing
/// leaves the stored tools untouched.
pub fn calibrate_tools(
    acquirer: &mut dyn PointAcquirer,
    store: &CalibrationStore,
) -> anyhow::Result<ToolCalibrationSummary> {
    acquirer.begin("PAINT TOOL CALIBRATION")?;
    let mut summary = ToolCalibrationSummary::default();
    for tool in ToolKind::ALL {
        match acquirer.acquire(CalibrationTarget::Tool(tool)) {
            Ok(Some(point)) => {
                tracing::info!("{tool}: {point}");
                summary.recorded.insert(tool, point);
            }
            Ok(None) => {
                tracing::info!("{tool}: skipped");
                summary.missed.push(tool);
            }
            Err(e) => {
                tracing::warn!("{tool}: calibration failed: {e:#}");
                summary.missed.push(tool);
            }
        }
    }

    if summary.recorded.is_empty() {
        tracing::warn!("no tool positions recorded; keeping stored calibration");
        return Ok(summary);
    }
    let tools = if acquirer.merges_tools() {
        let mut tools = store.load().map(|d| d.tools).unwrap_or_default();
        tools.extend(summary.recorded.iter().map(|(k, v)| (*k, *v)));
        tools
    } else {
        summary.recorded.clone()
    };
    store.save(Some(&tools), None)?;
    summary.saved = true;
    tracing::info!(
        "saved {} tool positions to {}",
        tools.len(),
        store.path().display()
    );
    Ok(summary)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanvasCalibrationSummary {
    /// Set only when both corners were found and saved.
    pub canvas: Option<CanvasRect>,
    /// Corners that were not acquired, with the error when acquisition
    /// failed rather than being skipped.
    pub missed: Vec<(CalibrationTarget, Option<String>)>,
}

/// Acquire both canvas corners and persist them, keeping stored tools.
/// Nothing is saved unless both corners were found.
pub fn calibrate_canvas(
    acquirer: &mut dyn PointAcquirer,
    store: &CalibrationStore,
) -> anyhow::Result<CanvasCalibrationSummary> {
    acquirer.begin("PAINT CANVAS CALIBRATION")?;
    let mut summary = CanvasCalibrationSummary::default();
    let mut corner = |target: CalibrationTarget| match acquirer.acquire(target) {
        Ok(Some(point)) => Some(point),
        Ok(None) => {
            summary.missed.push((target, None));
            None
        }
        Err(e) => {
            tracing::warn!("{target}: calibration failed: {e:#}");
            summary.missed.push((target, Some(format!("{e:#}"))));
            None
        }
    };
    let top_left = corner(CalibrationTarget::CanvasTopLeft);
    let bottom_right = corner(CalibrationTarget::CanvasBottomRight);

    let (Some(top_left), Some(bottom_right)) = (top_left, bottom_right) else {
        tracing::warn!("canvas calibration incomplete; nothing saved");
        return Ok(summary);
    };
    let canvas = CanvasRect {
        top_left,
        bottom_right,
    };
    store.save(None, Some(&canvas))?;
    tracing::info!("saved canvas bounds to {}", store.path().display());
    summary.canvas = Some(canvas);
    Ok(summary)
}
