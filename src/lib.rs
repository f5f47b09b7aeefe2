//! StyleGen: turn a reference image into an editable text template, paint an
//! inpainting mask over it and remix the background with a generative model.

pub mod ai;
pub mod cli;
pub mod coords;
pub mod data_uri;
pub mod editor;
pub mod logger;
pub mod mask;
pub mod model;
pub mod overlay;
pub mod render;
pub mod settings;

pub use editor::{AnalysisTicket, Editor, RemixRejected};
