//! Stdout rendering of scraped records (table, JSON, markdown, CSV).

use crate::config::OutputFormat;
use crate::scrape::models::ProductRecord;

/// Formats records for the terminal.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a whole run.
    pub fn format_records(&self, records: &[ProductRecord]) -> String {
        if records.is_empty() {
            return match self.format {
                OutputFormat::Json => "[]".to_string(),
                OutputFormat::Csv => self.csv_header(),
                _ => "No products found.".to_string(),
            };
        }

        match self.format {
            OutputFormat::Json => self.json_records(records),
            OutputFormat::Table => self.table_records(records),
            OutputFormat::Markdown => self.markdown_records(records),
            OutputFormat::Csv => self.csv_records(records),
        }
    }

    // JSON formatting

    fn json_records(&self, records: &[ProductRecord]) -> String {
        serde_json::to_string_pretty(records).unwrap_or_else(|_| "[]".to_string())
    }

    // Table formatting

    fn table_records(&self, records: &[ProductRecord]) -> String {
        let price_width = 12;
        let rating_width = 6;
        let reviews_width = 7;
        let title_width = 50;

        let mut lines = Vec::new();

        lines.push(format!(
            "{:<price_width$}  {:<rating_width$}  {:<reviews_width$}  {}",
            "Price", "Rating", "Reviews", "Title"
        ));
        lines.push(format!(
            "{:-<price_width$}  {:-<rating_width$}  {:-<reviews_width$}  {:-<title_width$}",
            "", "", "", ""
        ));

        for record in records {
            lines.push(format!(
                "{:>price_width$}  {:>rating_width$}  {:>reviews_width$}  {}",
                or_na(&record.price),
                record.rating,
                record.reviews_count,
                truncate(&record.title, title_width)
            ));
        }

        lines.push(String::new());
        lines.push(format!("Total: {} products", records.len()));

        lines.join("\n")
    }

    // Markdown formatting

    fn markdown_records(&self, records: &[ProductRecord]) -> String {
        let mut lines = Vec::new();

        lines.push("| Price | Rating | Reviews | Title |".to_string());
        lines.push("|-------|--------|---------|-------|".to_string());

        for record in records {
            let title = truncate(&record.title, 40).replace('|', "\\|");
            let title = if record.product_url.is_empty() {
                title
            } else {
                format!("[{}]({})", title, record.product_url)
            };

            lines.push(format!(
                "| {} | {} | {} | {} |",
                or_na(&record.price),
                record.rating,
                record.reviews_count,
                title
            ));
        }

        lines.push(String::new());
        lines.push(format!("*{} products found*", records.len()));

        lines.join("\n")
    }

    // CSV formatting

    fn csv_header(&self) -> String {
        "title,price,rating,reviews_count,product_url,description".to_string()
    }

    fn csv_records(&self, records: &[ProductRecord]) -> String {
        let mut lines = Vec::new();
        lines.push(self.csv_header());

        for record in records {
            lines.push(format!(
                "{},{},{},{},{},{}",
                Self::csv_escape(&record.title),
                Self::csv_escape(&record.price),
                record.rating,
                record.reviews_count,
                Self::csv_escape(&record.product_url),
                Self::csv_escape(&record.description)
            ));
        }

        lines.join("\n")
    }

    fn csv_escape(s: &str) -> String {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    }
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

/// Shortens `text` to at most `max` characters, marking the cut with `...`.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let kept: String = text.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}
