use crate::calibration::matcher::DEFAULT_CONFIDENCE;
use crate::calibration::store::CALIBRATION_FILE_NAME;
use crate::host::HostSettings;
use crate::llm::DEFAULT_MODEL;
use crate::render::DragTimings;
use crate::voice::VoiceSettings;
use serde::{Deserialize, Serialize};

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSettings {
    /// Minimum template match score accepted during automated calibration.
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    /// Folder holding `<tool>.png`, `canvas_top_left.png` and
    /// `canvas_bottom_right.png`.
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
}

fn default_confidence() -> f32 {
    DEFAULT_CONFIDENCE
}

fn default_templates_dir() -> String {
    "calibration_images".into()
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            confidence: default_confidence(),
            templates_dir: default_templates_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_calibration_file")]
    pub calibration_file: String,
    /// When enabled the logger starts at debug level and honours `RUST_LOG`.
    #[serde(default)]
    pub debug_logging: bool,
    /// Optional file receiving a copy of the log output.
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default)]
    pub host: HostSettings,
    #[serde(default)]
    pub drawing: DragTimings,
    #[serde(default)]
    pub matching: MatchSettings,
    #[serde(default = "default_model")]
    pub model: String,
    /// Replaces the built-in system prompt when set and readable.
    #[serde(default)]
    pub system_prompt_path: Option<String>,
    #[serde(default)]
    pub voice: VoiceSettings,
}

fn default_calibration_file() -> String {
    CALIBRATION_FILE_NAME.into()
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            calibration_file: default_calibration_file(),
            debug_logging: false,
            log_file: None,
            host: HostSettings::default(),
            drawing: DragTimings::default(),
            matching: MatchSettings::default(),
            model: default_model(),
            system_prompt_path: None,
            voice: VoiceSettings::default(),
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(SETTINGS_FILE);
        let settings = Settings::load(path.to_str().expect("utf8")).expect("load");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.calibration_file, "paint_calibration.json");
        assert_eq!(settings.drawing.drag_ms, 400);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(
            &path,
            r#"{ "debug_logging": true, "drawing": { "drag_ms": 800 }, "host": { "window_title": "Paint 3D" } }"#,
        )
        .expect("write");
        let settings = Settings::load(path.to_str().expect("utf8")).expect("load");
        assert!(settings.debug_logging);
        assert_eq!(settings.drawing.drag_ms, 800);
        assert_eq!(settings.drawing.commit_ms, 200);
        assert_eq!(settings.host.window_title, "Paint 3D");
        assert_eq!(settings.host.command, "mspaint.exe");
        assert_eq!(settings.matching.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(SETTINGS_FILE);
        let path = path.to_str().expect("utf8");
        let mut settings = Settings::default();
        settings.voice.command = Some("recognize --wait {timeout}".into());
        settings.save(path).expect("save");
        assert_eq!(Settings::load(path).expect("load"), settings);
    }
}
