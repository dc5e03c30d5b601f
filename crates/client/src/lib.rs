//! Client code for webctx.
//!
//! This crate provides the HTTP fetch pipeline, text extraction, the fetch
//! orchestrator and the context assembler, plus the [`ContextEngine`] facade
//! the server exposes.

pub mod assemble;
pub mod engine;
pub mod extract;
pub mod fetch;
pub mod gather;

pub use assemble::{AssembleBudget, AssembledContext, Diagnostics, NoContentReason, TagDiagnostic, UrlFailure, assemble};
pub use engine::{ClearTagSummary, ContextEngine, EngineParts, HealthReport, HealthStatus, SweepSummary};
pub use extract::{ExtractedText, Extractor, HtmlTextExtractor};
pub use fetch::{FetchClient, FetchConfig, FetchFailure, FetchResponse, PageFetcher};
pub use gather::{FetchOutcome, GatherOptions, GatherReport, GatherSettings, Gatherer, TagResult, UrlResult};
