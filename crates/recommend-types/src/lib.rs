//! # recommend-types
//!
//! Shared domain types for the assessment recommender.
//!
//! This crate defines the data structures passed between the catalog,
//! the search pipeline and the HTTP surface:
//! - Catalog items: the recommendable assessment products
//! - Ranked results: ordered search output with rank and score
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use recommend_types::{AssessmentSummary, CatalogItem};
//!
//! let item = CatalogItem::default();
//! let summary = AssessmentSummary::from(&item);
//! assert!(summary.name.is_empty());
//! ```

pub mod catalog;
pub mod config;
pub mod error;

pub use catalog::{AssessmentSummary, CatalogItem, RankedItem, RankedResult};
pub use config::{ResidencyPolicy, ResolverSettings, Settings};
pub use error::RecommendTypesError;
