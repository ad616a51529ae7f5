use crate::calibration::{CalibrationData, CanvasRect, ToolPositions};
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const CALIBRATION_FILE_NAME: &str = "paint_calibration.json";

/// Handle to the calibration file. Drawing code never touches the file
/// directly; it receives the [`CalibrationData`] returned by [`load`].
///
/// [`load`]: CalibrationStore::load
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored calibration. A missing, empty or unparsable file is
    /// reported as `None` ("no calibration yet") rather than an error.
    pub fn load(&self) -> Option<CalibrationData> {
        let raw = self.load_raw()?;
        CalibrationData::from_value(&raw)
    }

    /// Raw JSON as stored on disk, for callers that need to tell the legacy
    /// layout apart from the structured one.
    pub fn load_raw(&self) -> Option<Value> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("no calibration file at {}", self.path.display());
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    "failed to read calibration file {}: {e}",
                    self.path.display()
                );
                return None;
            }
        };
        if content.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(
                    "calibration file {} is corrupt, treating it as absent: {e}",
                    self.path.display()
                );
                None
            }
        }
    }

    /// Merge the given parts into what is currently on disk and overwrite the
    /// file. Passing `None` for a part keeps the stored value.
    pub fn save(
        &self,
        tools: Option<&ToolPositions>,
        canvas: Option<&CanvasRect>,
    ) -> Result<CalibrationData> {
        let mut data = self.load().unwrap_or_default();
        if let Some(tools) = tools {
            data.tools = tools.clone();
        }
        if let Some(canvas) = canvas {
            data.canvas = Some(*canvas);
        }
        self.write(&data)?;
        Ok(data)
    }

    fn write(&self, data: &CalibrationData) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("create calibration parent folder {}", parent.display())
            })?;
        }
        let json =
            serde_json::to_string_pretty(data).context("serialize calibration data")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("write calibration file {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{ScreenPoint, ToolKind};

    fn canvas() -> CanvasRect {
        CanvasRect {
            top_left: ScreenPoint::new(10, 150),
            bottom_right: ScreenPoint::new(1010, 650),
        }
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = CalibrationStore::new(dir.path().join(CALIBRATION_FILE_NAME));
        assert_eq!(store.load(), None);
    }

    #[test]
    fn corrupt_file_loads_as_none() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(CALIBRATION_FILE_NAME);
        std::fs::write(&path, "{ not json").expect("write");
        assert_eq!(CalibrationStore::new(path).load(), None);
    }

    #[test]
    fn saving_tools_keeps_existing_canvas() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = CalibrationStore::new(dir.path().join(CALIBRATION_FILE_NAME));
        store.save(None, Some(&canvas())).expect("save canvas");

        let tools = ToolPositions::from([(ToolKind::Line, ScreenPoint::new(300, 60))]);
        store.save(Some(&tools), None).expect("save tools");

        let loaded = store.load().expect("calibration");
        assert_eq!(loaded.tools, tools);
        assert_eq!(loaded.canvas, Some(canvas()));
    }

    #[test]
    fn saving_canvas_migrates_legacy_tool_map() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(CALIBRATION_FILE_NAME);
        std::fs::write(&path, r#"{"rectangle": [400, 70]}"#).expect("write");
        let store = CalibrationStore::new(&path);

        store.save(None, Some(&canvas())).expect("save");

        let raw = store.load_raw().expect("raw");
        assert!(raw.get("tools").is_some());
        assert!(raw.get("canvas").is_some());
        let loaded = store.load().expect("calibration");
        assert_eq!(loaded.tools[&ToolKind::Rectangle], ScreenPoint::new(400, 70));
    }
}
