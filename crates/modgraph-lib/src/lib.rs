//! Dependency and conflict analysis for directories of Minecraft mod archives.
//!
//! Archives are read through one of four manifest dialects and cached by content
//! hash. Analysis reports dependency problems alongside known incompatibilities.

pub mod analysis;
pub mod cache;
pub mod conflict;
pub mod dependency;
pub mod error;
pub mod loaders;
pub mod models;
pub mod progress;
pub mod scan;
pub mod storage;
pub mod version;

pub use analysis::{AnalysisReport, AnalysisService, AnalysisSummary, ServiceOptions};
pub use cache::{CacheResult, ContentCache, MetadataExtractor};
pub use conflict::ConflictAggregator;
pub use dependency::DependencyResult;
pub use error::{CacheError, ExtractError};
pub use progress::{ProgressReporter, SilentProgressReporter};
pub use scan::{ScanOptions, ScanOrchestrator, ScanResult};
pub use version::{Version, VersionConstraint};
