//! # designloop core
//!
//! Domain types, collaborator traits, and error definitions for the
//! designloop improvement agent. This crate has **no runtime wiring**; it
//! defines the model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (reasoning, perception, image editing,
//! spatial validation, summarization) is a trait here. Implementations live
//! in their respective crates, which keeps the run loop testable with
//! scripted stand-ins.

pub mod error;
pub mod message;
pub mod provider;
pub mod image;
pub mod perception;
pub mod decision;
pub mod analysis;
pub mod pattern;
pub mod execution;
pub mod agent;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use image::ImageRef;
pub use perception::{BoundingBox, DetectedObject, Perceiver};
pub use decision::{Action, Decision};
pub use analysis::IterationAnalysis;
pub use pattern::{LearnedPatterns, Pattern, PatternKind, Summarizer};
pub use execution::{ImageEditor, SpatialConstraints, SpatialValidator, SpatialVerdict};
pub use agent::{AgentState, OverallProgress, RunConfig, RunStatus};
pub use event::{DomainEvent, EventBus, EventBusObserver, NoopObserver, RunObserver};
