//! Field extraction from a single listing card.

use crate::browser::{BrowserResult, ElementHandle};
use crate::scrape::models::ProductRecord;
use crate::scrape::normalize;
use crate::scrape::selectors::SelectorSet;
use tracing::{debug, trace};

/// Fields read from one card, before detail-page enrichment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFields {
    pub title: String,
    pub price: String,
    pub rating: i64,
    pub reviews_count: i64,
    pub product_url: String,
    /// Description found on the card itself, if any
    pub card_description: String,
}

impl CardFields {
    /// Builds the final record with the chosen description.
    pub fn into_record(self, description: String) -> ProductRecord {
        ProductRecord {
            title: self.title,
            price: self.price,
            rating: self.rating,
            reviews_count: self.reviews_count,
            product_url: self.product_url,
            description,
        }
    }
}

/// Reads a [`CardFields`] out of a card handle.
pub struct FieldExtractor {
    selectors: SelectorSet,
    origin: String,
}

impl FieldExtractor {
    /// Creates an extractor resolving relative links against `origin`.
    pub fn new(selectors: SelectorSet, origin: impl Into<String>) -> Self {
        Self { selectors, origin: origin.into() }
    }

    /// Extracts every field of `card`.
    ///
    /// Missing elements resolve to the field default. An `Err` means the
    /// engine itself failed on this card and the card should be skipped.
    pub async fn extract<E: ElementHandle>(&self, card: &E) -> BrowserResult<CardFields> {
        let title_el = card.query_one(&self.selectors.title).await?;

        let title = match &title_el {
            Some(el) => match el.attribute(&self.selectors.title_attr).await? {
                Some(title) => normalize::clean_text(&title),
                None => normalize::clean_text(&el.text().await?.unwrap_or_default()),
            },
            None => String::new(),
        };
        debug!("title: {}", title);

        let price = match card.query_one(&self.selectors.price).await? {
            Some(el) => normalize::format_price(&el.text().await?.unwrap_or_default()),
            None => String::new(),
        };
        debug!("price: {}", price);

        let card_description = self.card_description(card).await?;
        debug!("description: {}", card_description);

        let reviews_count = match card.query_one(&self.selectors.reviews).await? {
            Some(el) => normalize::parse_count("reviews_count", &el.text().await?.unwrap_or_default()),
            None => 0,
        };
        debug!("reviews_count: {}", reviews_count);

        let rating = match card.query_one(&self.selectors.rating).await? {
            Some(el) => match el.attribute(&self.selectors.rating_attr).await? {
                Some(value) => normalize::parse_count("rating", &value),
                None => 0,
            },
            None => 0,
        };
        debug!("rating: {}", rating);

        let product_url = match &title_el {
            Some(el) => el
                .attribute(&self.selectors.link_attr)
                .await?
                .map(|href| normalize::resolve_url(&self.origin, &href))
                .unwrap_or_default(),
            None => String::new(),
        };
        debug!("product_url: {}", product_url);

        Ok(CardFields { title, price, rating, reviews_count, product_url, card_description })
    }

    /// Text of the first description candidate present on the card.
    async fn card_description<E: ElementHandle>(&self, card: &E) -> BrowserResult<String> {
        for selector in &self.selectors.description {
            if let Some(el) = card.query_one(selector).await? {
                trace!("Card description matched '{}'", selector);
                return Ok(normalize::clean_text(&el.text().await?.unwrap_or_default()));
            }
        }
        Ok(String::new())
    }
}
