use crate::calibration::ToolKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shapes the renderer knows how to draw with a bounding-box drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Line,
    Rectangle,
    Triangle,
    Circle,
    Diamond,
    RightTriangle,
    Polygon,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 7] = [
        ShapeKind::Line,
        ShapeKind::Rectangle,
        ShapeKind::Triangle,
        ShapeKind::Circle,
        ShapeKind::Diamond,
        ShapeKind::RightTriangle,
        ShapeKind::Polygon,
    ];

    pub fn as_str(self) -> &'static str {
        self.tool().as_str()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }

    /// Paint tool that renders this shape.
    pub fn tool(self) -> ToolKind {
        match self {
            ShapeKind::Line => ToolKind::Line,
            ShapeKind::Rectangle => ToolKind::Rectangle,
            ShapeKind::Triangle => ToolKind::Triangle,
            ShapeKind::Circle => ToolKind::Circle,
            ShapeKind::Diamond => ToolKind::Diamond,
            ShapeKind::RightTriangle => ToolKind::RightTriangle,
            ShapeKind::Polygon => ToolKind::Polygon,
        }
    }
}

impl std::fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point in the model's coordinate space (roughly 0-1000 x 0-500).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPoint {
    pub x: f64,
    pub y: f64,
}

impl ModelPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Validated shape ready to be drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeRecord {
    pub kind: ShapeKind,
    pub start: ModelPoint,
    pub end: ModelPoint,
}

/// One entry of the model's shape list, as received. Fields are optional
/// because the model output is not trusted; see [`ShapeRequest::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingKind,
    UnknownKind(String),
    MissingCoordinate(&'static str),
    ToolNotCalibrated(ToolKind),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingKind => write!(f, "missing shape kind"),
            SkipReason::UnknownKind(kind) => write!(f, "unknown shape kind '{kind}'"),
            SkipReason::MissingCoordinate(field) => write!(f, "missing coordinate '{field}'"),
            SkipReason::ToolNotCalibrated(tool) => write!(f, "tool '{tool}' is not calibrated"),
        }
    }
}

impl ShapeRequest {
    pub fn new(shape: &str, start_x: f64, start_y: f64, end_x: f64, end_y: f64) -> Self {
        Self {
            shape: Some(shape.to_string()),
            start_x: Some(start_x),
            start_y: Some(start_y),
            end_x: Some(end_x),
            end_y: Some(end_y),
        }
    }

    /// Lenient conversion: anything that is not an object, or fields of the
    /// wrong type, come through as missing.
    pub fn from_value(value: &Value) -> Self {
        let number = |key: &str| value.get(key).and_then(Value::as_f64);
        Self {
            shape: value.get("shape").and_then(Value::as_str).map(str::to_string),
            start_x: number("start_x"),
            start_y: number("start_y"),
            end_x: number("end_x"),
            end_y: number("end_y"),
        }
    }

    pub fn validate(&self) -> Result<ShapeRecord, SkipReason> {
        let name = self.shape.as_deref().ok_or(SkipReason::MissingKind)?;
        let kind =
            ShapeKind::from_name(name).ok_or_else(|| SkipReason::UnknownKind(name.to_string()))?;
        let field = |value: Option<f64>, name: &'static str| {
            value.ok_or(SkipReason::MissingCoordinate(name))
        };
        Ok(ShapeRecord {
            kind,
            start: ModelPoint::new(field(self.start_x, "start_x")?, field(self.start_y, "start_y")?),
            end: ModelPoint::new(field(self.end_x, "end_x")?, field(self.end_y, "end_y")?),
        })
    }

    pub fn label(&self) -> &str {
        self.shape.as_deref().unwrap_or("<none>")
    }
}

pub fn requests_from_values(values: &[Value]) -> Vec<ShapeRequest> {
    values.iter().map(ShapeRequest::from_value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_entry_validates() {
        let req = ShapeRequest::from_value(&json!({
            "shape": "Rectangle", "start_x": 200, "start_y": 300, "end_x": 600, "end_y": 500.5
        }));
        let record = req.validate().expect("valid");
        assert_eq!(record.kind, ShapeKind::Rectangle);
        assert_eq!(record.end, ModelPoint::new(600.0, 500.5));
    }

    #[test]
    fn missing_end_y_is_reported() {
        let req = ShapeRequest::from_value(&json!({
            "shape": "line", "start_x": 1, "start_y": 2, "end_x": 3
        }));
        assert_eq!(req.validate(), Err(SkipReason::MissingCoordinate("end_y")));
    }

    #[test]
    fn non_numeric_coordinate_counts_as_missing() {
        let req = ShapeRequest::from_value(&json!({
            "shape": "line", "start_x": "10", "start_y": 2, "end_x": 3, "end_y": 4
        }));
        assert_eq!(req.validate(), Err(SkipReason::MissingCoordinate("start_x")));
    }

    #[test]
    fn unknown_kind_is_flagged_before_coordinates() {
        let req = ShapeRequest::from_value(&json!({ "shape": "star" }));
        assert_eq!(req.validate(), Err(SkipReason::UnknownKind("star".into())));
    }

    #[test]
    fn non_object_entry_has_no_kind() {
        let req = ShapeRequest::from_value(&json!("rectangle"));
        assert_eq!(req.validate(), Err(SkipReason::MissingKind));
    }

    #[test]
    fn every_shape_maps_to_its_tool() {
        for kind in ShapeKind::ALL {
            assert_eq!(kind.tool().as_str(), kind.as_str());
        }
    }
}
