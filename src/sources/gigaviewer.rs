//! Shared plumbing for the two episode-document publishers (ComicDays and
//! Ourfeel). Both embed the page list as JSON in the `data-value` attribute
//! of the `#episode-json` element; the html5ever parser entity-decodes the
//! attribute before we see it.

use crate::cookies::Cookie;
use crate::error::{DownloadError, Result};
use crate::http_client::{html_headers, Fetcher, MANIFEST_TIMEOUT};
use crate::models::{ComicManifest, PageRef, Source};
use scraper::{Html, Selector};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpisodeJson {
    readable_product: ReadableProduct,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadableProduct {
    page_structure: PageStructure,
}

#[derive(Debug, Deserialize)]
struct PageStructure {
    // Records are kept loose here; each one is vetted field by field so a
    // single malformed record never fails the whole array.
    pages: Vec<serde_json::Value>,
}

/// Fetch an episode URL and turn its embedded page records into a manifest.
/// Pages are ordered lexicographically by `src`; records without a usable
/// src/width/height triple are dropped silently.
pub async fn fetch_manifest<F: Fetcher>(
    fetcher: &F,
    source: Source,
    url: &str,
    cookies: Vec<Cookie>,
) -> Result<ComicManifest> {
    let body = fetcher
        .fetch(url, html_headers(), &cookies, Some(MANIFEST_TIMEOUT))
        .await?;
    let html = String::from_utf8_lossy(&body);
    let (title, pages) = parse_episode_document(&html)?;

    Ok(ComicManifest {
        title,
        source,
        pages,
        scramble_seed: None,
        cookies,
    })
}

fn parse_episode_document(html: &str) -> Result<(String, Vec<PageRef>)> {
    let document = Html::parse_document(html);

    let title_selector = Selector::parse("title").unwrap();
    let title = document
        .select(&title_selector)
        .next()
        .map(|t| t.text().collect::<String>())
        .ok_or_else(|| DownloadError::Parse("episode page has no title".into()))?;

    let episode_selector = Selector::parse("#episode-json").unwrap();
    let raw = document
        .select(&episode_selector)
        .next()
        .and_then(|el| el.attr("data-value"))
        .ok_or_else(|| DownloadError::Parse("could not find episode data on the page".into()))?;
    if raw.is_empty() {
        return Err(DownloadError::Parse("episode data is empty".into()));
    }

    let episode: EpisodeJson = serde_json::from_str(raw)?;
    let mut pages: Vec<PageRef> = episode
        .readable_product
        .page_structure
        .pages
        .iter()
        .filter_map(page_ref_from_record)
        .collect();

    if pages.is_empty() {
        return Err(DownloadError::Parse("episode has no readable pages".into()));
    }
    pages.sort_by(|a, b| a.src().cmp(b.src()));

    Ok((title, pages))
}

/// A usable page record has a non-empty string `src` and numeric
/// `width`/`height`. Anything else (missing or mistyped fields included) is
/// dropped silently.
fn page_ref_from_record(record: &serde_json::Value) -> Option<PageRef> {
    let src = record.get("src")?.as_str()?;
    let width = record.get("width")?.as_f64()?;
    let height = record.get("height")?.as_f64()?;
    if src.is_empty() {
        return None;
    }
    Some(PageRef::Manifest {
        src: src.to_string(),
        width: width as u32,
        height: height as u32,
    })
}

/// Per-page descramble seed, derived from the page URL: the wrapping sum of
/// its UTF-8 bytes.
pub fn page_seed(src: &str) -> u32 {
    src.bytes().fold(0u32, |acc, b| acc.wrapping_add(u32::from(b)))
}
