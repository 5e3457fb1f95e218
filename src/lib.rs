//! Catalog pipeline for affiliate review pages.
//!
//! One JSON product store is the source of truth. Scraped candidates are
//! reconciled into it, HTML fragments are rendered from it and spliced into
//! static pages, and golden-data hashes catch unreviewed drift before deploy.

pub mod affiliate;
pub mod audit;
pub mod config;
pub mod error;
pub mod golden;
pub mod images;
pub mod model;
pub mod reconcile;
pub mod render;
pub mod report;
pub mod splice;
pub mod store;
pub mod validate;

pub use affiliate::AffiliatePolicy;
pub use config::PipelineConfig;
pub use error::{LinkViolation, PipelineError, Result};
pub use golden::{DriftReport, Manifest};
pub use model::{PageMetadata, PriceTier, ProductRecord, ProductStore};
pub use reconcile::{CandidateRecord, ReconcileOutcome, reconcile};
pub use render::{Variant, generate};
pub use splice::{Region, SpliceOutcome, splice};
