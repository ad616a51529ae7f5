pub mod calibration;
pub mod host;
pub mod input;
pub mod llm;
pub mod logging;
pub mod menu;
pub mod render;
pub mod settings;
pub mod shapes;
pub mod voice;
