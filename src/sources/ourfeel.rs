//! Ourfeel serves the same episode-document shape as ComicDays but allows
//! anonymous access, so no cookies are sent.

use crate::error::Result;
use crate::http_client::Fetcher;
use crate::models::{ComicManifest, Source};
use crate::sources::gigaviewer;

pub async fn fetch_manifest<F: Fetcher>(fetcher: &F, url: &str) -> Result<ComicManifest> {
    gigaviewer::fetch_manifest(fetcher, Source::Ourfeel, url, Vec::new()).await
}
