//! Data models for scraped products and run results.

use serde::{Deserialize, Serialize};

/// One product as written to the output file.
///
/// Absent fields never serialize as `null`: text fields default to `""`,
/// counts to `0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Trimmed product title
    pub title: String,
    /// `$1,234.56` when the raw price parsed, the raw text otherwise
    pub price: String,
    /// Star rating as encoded by the site (not range-checked)
    pub rating: i64,
    /// Number of reviews
    pub reviews_count: i64,
    /// Absolute product link
    pub product_url: String,
    /// Trimmed description
    pub description: String,
}

/// Ordered, append-only collection of records for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    records: Vec<ProductRecord>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record at the end.
    pub fn push(&mut self, record: ProductRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProductRecord> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[ProductRecord] {
        &self.records
    }
}

impl From<Vec<ProductRecord>> for ResultSet {
    fn from(records: Vec<ProductRecord>) -> Self {
        Self { records }
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ProductRecord;
    type IntoIter = std::slice::Iter<'a, ProductRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// How the detail-page description combines with the card's own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionPolicy {
    /// Once a detail page is attempted its result is final, even when empty.
    #[default]
    Detail,
    /// The detail description wins only when non-empty.
    Fallback,
}

impl std::str::FromStr for DescriptionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "detail" => Ok(DescriptionPolicy::Detail),
            "fallback" => Ok(DescriptionPolicy::Fallback),
            _ => Err(format!("Unknown description policy: {}. Use: detail, fallback", s)),
        }
    }
}

impl std::fmt::Display for DescriptionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DescriptionPolicy::Detail => write!(f, "detail"),
            DescriptionPolicy::Fallback => write!(f, "fallback"),
        }
    }
}

/// Why traversal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The page had no "next" control.
    NoNextControl,
    /// The "next" control was disabled.
    NextDisabled,
    /// The configured page cap was reached.
    PageCap,
    /// The run was cancelled.
    Cancelled,
    /// A traversal fault ended the run early.
    Fault,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::NoNextControl => write!(f, "no next control"),
            StopReason::NextDisabled => write!(f, "next control disabled"),
            StopReason::PageCap => write!(f, "page cap reached"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::Fault => write!(f, "traversal fault"),
        }
    }
}

/// Outcome of one traversal.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Records collected, in page then card order
    pub records: ResultSet,
    /// Listing pages scraped
    pub pages_visited: u32,
    /// Cards enumerated across all pages
    pub cards_seen: usize,
    /// Cards skipped because extraction faulted
    pub card_faults: usize,
    /// Records whose detail page could not be read
    pub enrichment_faults: usize,
    pub stop_reason: StopReason,
    /// Message of the traversal fault, if one ended the run
    pub fault: Option<String>,
}

impl RunReport {
    /// Report for a run that failed before any page was loaded.
    pub fn aborted(fault: impl Into<String>) -> Self {
        Self {
            records: ResultSet::new(),
            pages_visited: 0,
            cards_seen: 0,
            card_faults: 0,
            enrichment_faults: 0,
            stop_reason: StopReason::Fault,
            fault: Some(fault.into()),
        }
    }

    /// A traversal fault that left nothing to show for the run.
    pub fn is_fatal(&self) -> bool {
        self.fault.is_some() && self.records.is_empty()
    }
}
