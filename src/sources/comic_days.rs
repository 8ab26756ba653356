//! ComicDays episodes are the usual episode-document shape, but the page
//! images sit behind a login wall: a cookie export must be present and is
//! injected into every request.

use crate::cookies;
use crate::error::Result;
use crate::http_client::Fetcher;
use crate::models::{ComicManifest, Source};
use crate::sources::gigaviewer;
use std::path::Path;

pub async fn fetch_manifest<F: Fetcher>(
    fetcher: &F,
    url: &str,
    cookie_file: &Path,
) -> Result<ComicManifest> {
    let cookies = cookies::load_cookies(cookie_file)?;
    gigaviewer::fetch_manifest(fetcher, Source::ComicDays, url, cookies).await
}
