//! End-to-end runs of the scrape command against fixture pages.

use listing_scraper::browser::{EngineKind, MemorySite, StaticEngine};
use listing_scraper::commands::ScrapeCommand;
use listing_scraper::config::{Config, DEFAULT_LISTING_URL};
use listing_scraper::scrape::{DescriptionPolicy, ProductRecord, StopReason};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const PAGE_1: &str = include_str!("fixtures/laptops_page1.html");
const PAGE_2: &str = include_str!("fixtures/laptops_page2.html");
const DETAIL: &str = include_str!("fixtures/product_detail.html");
const DETAIL_PLAIN: &str = include_str!("fixtures/product_detail_plain.html");

const PRODUCT_BASE: &str = "https://webscraper.io/test-sites/e-commerce/allinone/product";

fn product(id: u32) -> String {
    format!("{}/{}", PRODUCT_BASE, id)
}

fn laptops_site() -> MemorySite {
    MemorySite::new()
        .with_page(DEFAULT_LISTING_URL, PAGE_1)
        .with_page(format!("{}?page=2", DEFAULT_LISTING_URL), PAGE_2)
        .with_page(product(31), DETAIL)
        .with_page(product(32), DETAIL)
        .with_page(product(33), DETAIL)
        .with_page(product(34), DETAIL_PLAIN)
}

fn make_config(dir: &TempDir) -> Config {
    Config {
        output: dir.path().join("output.json"),
        engine: EngineKind::Static,
        settle_delay_ms: 0,
        navigation_timeout_secs: 5,
        navigation_retries: 0,
        ..Config::new()
    }
}

fn read_output(dir: &TempDir) -> (String, Vec<ProductRecord>) {
    let raw = std::fs::read_to_string(dir.path().join("output.json")).unwrap();
    let records = serde_json::from_str(&raw).unwrap();
    (raw, records)
}

#[tokio::test]
async fn test_full_run_over_two_pages() {
    let dir = TempDir::new().unwrap();
    let site = Arc::new(laptops_site());
    let engine = StaticEngine::new(site.clone());

    let summary = ScrapeCommand::new(make_config(&dir))
        .execute_with_engine(&engine, CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.exit_success());
    assert_eq!(summary.report.pages_visited, 2);
    assert_eq!(summary.report.cards_seen, 5);
    assert_eq!(summary.report.card_faults, 0);
    assert_eq!(summary.report.enrichment_faults, 1);
    assert_eq!(summary.report.stop_reason, StopReason::NextDisabled);
    assert_eq!(engine.open_pages(), 0);

    let (_, records) = read_output(&dir);
    let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Asus VivoBook X441NA-GA190",
            "Dell XPS 13",
            "Lenovo ThinkPad X1 Carbon",
            "Apple MacBook Air 13\"",
            "Acer Nitro 5 Portátil",
        ]
    );

    let dell = &records[1];
    assert_eq!(dell.price, "$1,178.99");
    assert_eq!(dell.rating, 5);
    assert_eq!(dell.reviews_count, 10);
    assert_eq!(dell.product_url, product(32));
    assert_eq!(
        dell.description,
        "Dell XPS 13 9370, 13.3\" FHD, Core i7-8550U, 16GB, 512GB SSD, Windows 10 Home"
    );

    let lenovo = &records[2];
    assert_eq!(lenovo.price, "$1,399.00");
    assert_eq!(lenovo.reviews_count, 0);
    assert_eq!(lenovo.product_url, product(33));

    let macbook = &records[3];
    assert_eq!(macbook.description, "Thin and light, ñ and é survive untouched");

    let acer = &records[4];
    assert_eq!(acer.price, "");
    assert_eq!(acer.rating, 0);
    assert_eq!(acer.description, "");

    // page 2's disabled control points at ?page=3, which must never be requested
    assert!(!site.fetched().iter().any(|u| u.ends_with("?page=3")));
}

#[tokio::test]
async fn test_fallback_policy_keeps_card_description() {
    let dir = TempDir::new().unwrap();
    let engine = StaticEngine::new(Arc::new(laptops_site()));
    let config = Config { description: DescriptionPolicy::Fallback, ..make_config(&dir) };

    ScrapeCommand::new(config)
        .execute_with_engine(&engine, CancellationToken::new())
        .await
        .unwrap();

    let (_, records) = read_output(&dir);
    assert_eq!(records[4].description, "Gaming, GTX 1650, 8GB");
    assert_eq!(records[3].description, "Thin and light, ñ and é survive untouched");
}

#[tokio::test]
async fn test_output_is_pretty_and_literal() {
    let dir = TempDir::new().unwrap();
    let engine = StaticEngine::new(Arc::new(laptops_site()));

    ScrapeCommand::new(make_config(&dir))
        .execute_with_engine(&engine, CancellationToken::new())
        .await
        .unwrap();

    let (raw, _) = read_output(&dir);
    assert!(raw.starts_with("[\n  {\n"));
    assert!(raw.contains("Portátil"));

    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    for object in value.as_array().unwrap() {
        assert_eq!(object.as_object().unwrap().len(), 6);
    }
}

#[tokio::test]
async fn test_rerun_replaces_output() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("output.json"), "[{\"stale\": true}]").unwrap();

    for _ in 0..2 {
        let engine = StaticEngine::new(Arc::new(laptops_site()));
        ScrapeCommand::new(make_config(&dir))
            .execute_with_engine(&engine, CancellationToken::new())
            .await
            .unwrap();
    }

    let (raw, records) = read_output(&dir);
    assert_eq!(records.len(), 5);
    assert!(!raw.contains("stale"));
}

#[tokio::test]
async fn test_page_cap_from_config() {
    let dir = TempDir::new().unwrap();
    let engine = StaticEngine::new(Arc::new(laptops_site()));
    let config = Config { max_pages: 1, ..make_config(&dir) };

    let summary = ScrapeCommand::new(config)
        .execute_with_engine(&engine, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.report.stop_reason, StopReason::PageCap);
    assert_eq!(summary.report.records.len(), 3);
    assert!(summary.exit_success());
}

#[tokio::test]
async fn test_detail_failure_is_isolated() {
    let dir = TempDir::new().unwrap();
    let site = laptops_site().with_failure(product(32));
    let engine = StaticEngine::new(Arc::new(site));

    let summary = ScrapeCommand::new(make_config(&dir))
        .execute_with_engine(&engine, CancellationToken::new())
        .await
        .unwrap();

    assert!(summary.exit_success());
    let (_, records) = read_output(&dir);
    assert_eq!(records.len(), 5);
    assert_eq!(records[1].title, "Dell XPS 13");
    assert_eq!(records[1].price, "$1,178.99");
    assert_eq!(records[1].description, "");
    assert_eq!(engine.open_pages(), 0);
}

#[tokio::test]
async fn test_cancelled_run_still_writes_output() {
    let dir = TempDir::new().unwrap();
    let engine = StaticEngine::new(Arc::new(laptops_site()));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = ScrapeCommand::new(make_config(&dir))
        .execute_with_engine(&engine, cancel)
        .await
        .unwrap();

    assert_eq!(summary.report.stop_reason, StopReason::Cancelled);
    assert!(summary.persisted);
    let (raw, _) = read_output(&dir);
    assert_eq!(raw, "[]");
}
