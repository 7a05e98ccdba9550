//! Adaptive layout engine for entity-relationship graphs.
//!
//! The engine takes a dataset and settings and produces render-ready frames:
//! a bounded sample around a focus node, force-directed positions, a
//! level-of-detail profile, a progressive reveal schedule and keyboard
//! navigation. It performs no I/O.

pub mod export;
pub mod filter;
pub mod graph;
pub mod layout;
pub mod lod;
pub mod navigation;
pub mod reveal;
pub mod search;
pub mod session;
pub mod settings;
pub mod theme;
pub mod util;

pub use export::{ExportFormat, serialize};
pub use filter::{FilterConfig, VisibleGraph, select};
pub use graph::{GraphDataset, GraphMetrics, IngestReport, Link, Node, SizeScale};
pub use lod::{LevelOfDetailProfile, compute_profile};
pub use navigation::{AnnouncementSink, FocusObserver, NavigationCommand, NavigationCursor};
pub use session::{GraphSession, RenderFrame, ViewportState};
pub use settings::EngineSettings;
