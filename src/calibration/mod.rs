pub mod acquire;
pub mod matcher;
pub mod store;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub use acquire::{CalibrationTarget, PointAcquirer};
pub use store::CalibrationStore;

/// Absolute pixel position on the operator's display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct ScreenPoint {
    pub x: i32,
    pub y: i32,
}

impl ScreenPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl From<[i32; 2]> for ScreenPoint {
    fn from(value: [i32; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

impl From<ScreenPoint> for [i32; 2] {
    fn from(value: ScreenPoint) -> Self {
        [value.x, value.y]
    }
}

impl std::fmt::Display for ScreenPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Paint tools that can be calibrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Pencil,
    Brush,
    Fill,
    Line,
    Rectangle,
    Triangle,
    Circle,
    Diamond,
    RightTriangle,
    Polygon,
}

impl ToolKind {
    /// Calibration order: paint tools, basic shapes, then advanced shapes.
    pub const ALL: [ToolKind; 10] = [
        ToolKind::Pencil,
        ToolKind::Brush,
        ToolKind::Fill,
        ToolKind::Line,
        ToolKind::Rectangle,
        ToolKind::Triangle,
        ToolKind::Circle,
        ToolKind::Diamond,
        ToolKind::RightTriangle,
        ToolKind::Polygon,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ToolKind::Pencil => "pencil",
            ToolKind::Brush => "brush",
            ToolKind::Fill => "fill",
            ToolKind::Line => "line",
            ToolKind::Rectangle => "rectangle",
            ToolKind::Triangle => "triangle",
            ToolKind::Circle => "circle",
            ToolKind::Diamond => "diamond",
            ToolKind::RightTriangle => "right_triangle",
            ToolKind::Polygon => "polygon",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type ToolPositions = BTreeMap<ToolKind, ScreenPoint>;

/// Canvas corners as recorded during calibration. The corners are not
/// guaranteed to be ordered; see [`CanvasRect::bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasRect {
    pub top_left: ScreenPoint,
    pub bottom_right: ScreenPoint,
}

impl CanvasRect {
    pub fn bounds(&self) -> CanvasBounds {
        let (x1, y1) = (self.top_left.x, self.top_left.y);
        let (x2, y2) = (self.bottom_right.x, self.bottom_right.y);
        CanvasBounds {
            left: x1.min(x2),
            top: y1.min(y2),
            right: x1.max(x2),
            bottom: y1.max(y2),
        }
    }
}

/// Normalized canvas rectangle with `left <= right` and `top <= bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasBounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl CanvasBounds {
    pub fn top_left(&self) -> ScreenPoint {
        ScreenPoint::new(self.left, self.top)
    }

    pub fn contains(&self, point: ScreenPoint) -> bool {
        (self.left..=self.right).contains(&point.x) && (self.top..=self.bottom).contains(&point.y)
    }
}

/// Persisted calibration: tool positions plus the optional canvas rectangle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationData {
    #[serde(default)]
    pub tools: ToolPositions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas: Option<CanvasRect>,
}

impl CalibrationData {
    pub fn from_value(value: &Value) -> Option<Self> {
        let (tools, canvas) = extract_tools_and_canvas(Some(value));
        if tools.is_none() && canvas.is_none() {
            return None;
        }
        Some(Self {
            tools: tools.unwrap_or_default(),
            canvas,
        })
    }
}

/// Split loaded calibration JSON into tool positions and canvas.
///
/// Accepts both the structured `{"tools": .., "canvas": ..}` layout and the
/// legacy layout where the whole file is the tool map.
pub fn extract_tools_and_canvas(
    data: Option<&Value>,
) -> (Option<ToolPositions>, Option<CanvasRect>) {
    let Some(data) = data else {
        return (None, None);
    };
    let Some(obj) = data.as_object() else {
        tracing::warn!("calibration data is not a JSON object; ignoring it");
        return (None, None);
    };

    if obj.contains_key("tools") || obj.contains_key("canvas") {
        let tools = obj.get("tools").and_then(parse_tool_map);
        let canvas = obj.get("canvas").and_then(parse_canvas);
        return (tools, canvas);
    }

    (parse_tool_map(data), None)
}

fn parse_tool_map(value: &Value) -> Option<ToolPositions> {
    let obj = value.as_object()?;
    let mut tools = ToolPositions::new();
    for (name, point) in obj {
        let Some(tool) = ToolKind::from_name(name) else {
            tracing::warn!("ignoring unknown tool '{name}' in calibration file");
            continue;
        };
        match serde_json::from_value::<ScreenPoint>(point.clone()) {
            Ok(point) => {
                tools.insert(tool, point);
            }
            Err(e) => tracing::warn!("ignoring malformed position for tool '{name}': {e}"),
        }
    }
    Some(tools)
}

fn parse_canvas(value: &Value) -> Option<CanvasRect> {
    if value.is_null() {
        return None;
    }
    match serde_json::from_value::<CanvasRect>(value.clone()) {
        Ok(canvas) => Some(canvas),
        Err(e) => {
            tracing::warn!("ignoring malformed canvas calibration: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn none_input_yields_nothing() {
        assert_eq!(extract_tools_and_canvas(None), (None, None));
    }

    #[test]
    fn legacy_flat_map_is_treated_as_tools() {
        let legacy = json!({ "rectangle": [120, 80], "line": [90, 80] });
        let (tools, canvas) = extract_tools_and_canvas(Some(&legacy));
        let tools = tools.expect("tools");
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[&ToolKind::Rectangle], ScreenPoint::new(120, 80));
        assert_eq!(canvas, None);
    }

    #[test]
    fn structured_layout_reads_both_keys() {
        let data = json!({
            "tools": { "circle": [10, 20] },
            "canvas": { "top_left": [5, 200], "bottom_right": [900, 700] }
        });
        let (tools, canvas) = extract_tools_and_canvas(Some(&data));
        assert_eq!(tools.expect("tools")[&ToolKind::Circle], ScreenPoint::new(10, 20));
        let canvas = canvas.expect("canvas");
        assert_eq!(canvas.top_left, ScreenPoint::new(5, 200));
    }

    #[test]
    fn canvas_only_layout_has_no_tools() {
        let data = json!({ "canvas": { "top_left": [0, 0], "bottom_right": [10, 10] } });
        let (tools, canvas) = extract_tools_and_canvas(Some(&data));
        assert!(tools.is_none());
        assert!(canvas.is_some());
    }

    #[test]
    fn unknown_tools_and_bad_points_are_dropped() {
        let data = json!({ "tools": { "eraser": [1, 2], "fill": "nope", "pencil": [3, 4] } });
        let (tools, _) = extract_tools_and_canvas(Some(&data));
        let tools = tools.expect("tools");
        assert_eq!(tools.len(), 1);
        assert!(tools.contains_key(&ToolKind::Pencil));
    }

    #[test]
    fn bounds_are_normalized_for_swapped_corners() {
        let rect = CanvasRect {
            top_left: ScreenPoint::new(800, 600),
            bottom_right: ScreenPoint::new(100, 150),
        };
        assert_eq!(
            rect.bounds(),
            CanvasBounds {
                left: 100,
                top: 150,
                right: 800,
                bottom: 600
            }
        );
    }

    #[test]
    fn tool_names_parse_case_insensitively() {
        assert_eq!(ToolKind::from_name("Right_Triangle"), Some(ToolKind::RightTriangle));
        assert_eq!(ToolKind::from_name("eraser"), None);
    }
}
