//! Listing traversal and record extraction.

pub mod driver;
pub mod enricher;
pub mod extractor;
pub mod models;
pub mod normalize;
pub mod selectors;

pub use driver::{DriverSettings, DriverState, NextControl, PaginationDriver};
pub use enricher::{DetailEnricher, Enrichment};
pub use extractor::{CardFields, FieldExtractor};
pub use models::{DescriptionPolicy, ProductRecord, ResultSet, RunReport, StopReason};
pub use selectors::SelectorSet;
