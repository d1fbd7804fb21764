//! # Graphs core: project engine for 2-D scientific plots
//!
//! The library behind the Graphs plotting application. It owns everything
//! about a project that is not drawing: the items (datasets, equations,
//! annotations), the figure settings, undo/redo and view history, data
//! operations, importers, and the project file format.
//!
//! ## Architecture
//!
//! - **Model**: [`model::ProjectModel`] holds the items and [`figure::FigureSettings`]
//! - **History**: [`history::HistoryEngine`] records reversible change batches;
//!   [`history::ViewHistory`] logs axis limits
//! - **Engine**: [`engine::ProjectEngine`] is the single mutable facade; every
//!   user action is one method call committing one history state
//! - **Parsers**: a registry of importers, run inline or on a worker thread
//!   with results handed back over a crossbeam channel
//! - **Events**: observers subscribe to [`events::ProjectEvent`]s by component id
//!
//! ## Configuration
//!
//! Preferences and the recent project list live in the platform data
//! directory under `io.github.graphs.core` (see [`config`]).
//!
//! ## Example
//!
//! ```ignore
//! use graphs_core::{engine::ProjectEngine, operations::Operation};
//!
//! let mut engine = ProjectEngine::default();
//! engine.import(&["spectrum.xrdml".into()])?;
//! engine.perform_operation(&Operation::Normalize)?;
//! engine.save(Some("spectrum.graphs".as_ref()))?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod export;
pub mod expression;
pub mod figure;
pub mod history;
pub mod item;
pub mod model;
pub mod operations;
pub mod parsers;
pub mod project;
pub mod scales;
pub mod style;
pub mod view;

// Re-export commonly used types
pub use config::{AppState, Preferences};
pub use engine::{Mode, ProjectEngine};
pub use error::{GraphsError, Result};
pub use events::{Notification, Notifier, ProjectEvent};
pub use figure::{Direction, FigureSettings, Limits};
pub use item::{Item, ItemType};
pub use model::ProjectModel;
pub use scales::Scale;
pub use style::StyleParams;
