//! CSS selectors for the listing and detail pages.
//!
//! Defaults match the webscraper.io e-commerce test site. Every entry can be
//! overridden from the `[selectors]` table of the config file when a site
//! changes its markup.

use serde::{Deserialize, Serialize};

/// Selectors used by extraction, enrichment and pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSet {
    /// Product card container on the listing page.
    pub card: String,

    /// Title anchor inside a card. Carries `title_attr` and the product link.
    pub title: String,

    /// Attribute holding the full product title.
    pub title_attr: String,

    /// Attribute holding the product link.
    pub link_attr: String,

    /// Price element inside a card.
    pub price: String,

    /// Card-level description candidates, most specific first.
    pub description: Vec<String>,

    /// Review count element inside a card.
    pub reviews: String,

    /// Element carrying the rating attribute.
    pub rating: String,

    /// Attribute holding the star rating.
    pub rating_attr: String,

    /// "Next page" control on the listing page.
    pub next: String,

    /// Description candidates on the detail page, most specific first.
    pub detail_description: Vec<String>,
}

impl Default for SelectorSet {
    fn default() -> Self {
        Self {
            card: "div.card.thumbnail".to_string(),
            title: "a.title".to_string(),
            title_attr: "title".to_string(),
            link_attr: "href".to_string(),
            price: r#"h4.price span[itemprop="price"]"#.to_string(),
            description: vec![
                "p.description".to_string(),
                "div.description".to_string(),
                "div.tab-content".to_string(),
                "div.card-block".to_string(),
            ],
            reviews: r#"div.ratings p.review-count span[itemprop="reviewCount"]"#.to_string(),
            rating: "div.ratings p[data-rating]".to_string(),
            rating_attr: "data-rating".to_string(),
            next: "ul.pagination li.next a".to_string(),
            detail_description: vec![
                r#"p.description.card-text[itemprop="description"]"#.to_string(),
                "p.description".to_string(),
            ],
        }
    }
}

impl SelectorSet {
    /// Every selector string, for validation.
    pub fn all(&self) -> Vec<&str> {
        let mut all = vec![
            self.card.as_str(),
            self.title.as_str(),
            self.price.as_str(),
            self.reviews.as_str(),
            self.rating.as_str(),
            self.next.as_str(),
        ];
        all.extend(self.description.iter().map(String::as_str));
        all.extend(self.detail_description.iter().map(String::as_str));
        all
    }

    /// Returns the selectors that fail to parse.
    pub fn invalid(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .filter(|s| scraper::Selector::parse(s).is_err())
            .map(String::from)
            .collect()
    }
}
