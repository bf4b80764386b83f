//! Collaborator implementations for designloop.
//!
//! The reasoning provider implements `designloop_core::Provider`; perception,
//! spatial checks and image editing implement the matching core traits.

pub mod editor;
pub mod openai_compat;
pub mod vision;

pub use editor::HttpImageEditor;
pub use openai_compat::OpenAiCompatProvider;
pub use vision::{VisionPerceiver, VisionSpatialValidator};
