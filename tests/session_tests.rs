use manga_downloader::config::Config;
use manga_downloader::cookies::Cookie;
use manga_downloader::error::{DownloadError, Result};
use manga_downloader::http_client::Fetcher;
use manga_downloader::models::{
    ComicInfo, ComicManifest, DownloadProgress, PageFormat, PageRef, ProgressStatus, Source,
};
use manga_downloader::page;
use manga_downloader::session::DownloadManager;
use manga_downloader::shell::Shell;
use reqwest::header::HeaderMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Serves canned bodies by URL; unknown URLs fail like a dead network.
struct MapFetcher {
    responses: HashMap<String, Vec<u8>>,
}

impl Fetcher for MapFetcher {
    async fn fetch(
        &self,
        url: &str,
        _headers: HeaderMap,
        _cookies: &[Cookie],
        _timeout: Option<Duration>,
    ) -> Result<Vec<u8>> {
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| DownloadError::Network(format!("no stub response for {url}")))
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.page_delay_ms = 0;
    config.search_settle_ms = 0;
    config
}

fn tiny_jpeg() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(16, 16, image::Rgba([120, 60, 30, 255]));
    page::encode(img, PageFormat::Jpeg, 95).unwrap()
}

fn listed_manifest(title: &str, page_count: usize) -> (ComicManifest, Vec<String>) {
    let urls: Vec<String> = (0..page_count)
        .map(|i| format!("https://cdn.example/listed/{i}.jpg"))
        .collect();
    let manifest = ComicManifest {
        title: title.to_string(),
        source: Source::PocketMagazine,
        pages: urls
            .iter()
            .map(|src| PageRef::Listed { src: src.clone() })
            .collect(),
        scramble_seed: None,
        cookies: Vec::new(),
    };
    (manifest, urls)
}

fn comic_info(source: Source, title: &str) -> ComicInfo {
    ComicInfo {
        mode: source,
        title: title.to_string(),
        thumbnail: String::new(),
        page_url: "https://example.com/episode/1".to_string(),
    }
}

/// Records every event; optionally cancels the download the moment a given
/// page's `downloading` event is seen.
struct SpyShell<'a> {
    out_dir: PathBuf,
    events: Mutex<Vec<DownloadProgress>>,
    cancel_on: Option<(usize, &'a DownloadManager<MapFetcher>)>,
}

impl Shell for SpyShell<'_> {
    fn pick_output_dir(&self) -> Option<PathBuf> {
        Some(self.out_dir.clone())
    }

    fn emit_progress(&self, progress: &DownloadProgress) {
        self.events.lock().unwrap().push(progress.clone());
        if let Some((page, manager)) = self.cancel_on {
            if progress.status == ProgressStatus::Downloading && progress.current == page {
                manager.cancel();
            }
        }
    }
}

#[tokio::test]
async fn download_completes_and_writes_every_page() {
    let (manifest, urls) = listed_manifest("Three Pages", 3);
    let body = tiny_jpeg();
    let responses = urls.iter().map(|u| (u.clone(), body.clone())).collect();

    let manager = DownloadManager::new(MapFetcher { responses }, test_config());
    manager.store_manifest(manifest);

    let dir = tempfile::tempdir().unwrap();
    let shell = SpyShell {
        out_dir: dir.path().to_path_buf(),
        events: Mutex::new(Vec::new()),
        cancel_on: None,
    };

    let comic = comic_info(Source::PocketMagazine, "Three Pages");
    manager.start_download(&comic, &shell).await.unwrap();

    for name in ["001.jpg", "002.jpg", "003.jpg"] {
        assert!(dir.path().join(name).is_file(), "missing {name}");
    }

    let events = shell.events.into_inner().unwrap();
    assert_eq!(events.first().map(|e| e.status), Some(ProgressStatus::Started));
    assert_eq!(events.last().map(|e| e.status), Some(ProgressStatus::Completed));
    assert_eq!(events.last().map(|e| e.current), Some(3));

    // `current` never decreases.
    let currents: Vec<usize> = events.iter().map(|e| e.current).collect();
    assert!(currents.windows(2).all(|w| w[0] <= w[1]));
    assert!(!manager.is_downloading());
}

#[tokio::test]
async fn cancel_mid_download_suppresses_completion() {
    let (manifest, urls) = listed_manifest("Ten Pages", 10);
    let body = tiny_jpeg();
    let responses = urls.iter().map(|u| (u.clone(), body.clone())).collect();

    let manager = DownloadManager::new(MapFetcher { responses }, test_config());
    manager.store_manifest(manifest);

    let dir = tempfile::tempdir().unwrap();
    let shell = SpyShell {
        out_dir: dir.path().to_path_buf(),
        events: Mutex::new(Vec::new()),
        cancel_on: Some((3, &manager)),
    };

    let comic = comic_info(Source::PocketMagazine, "Ten Pages");
    // Cancellation is not an error from the caller's point of view.
    manager.start_download(&comic, &shell).await.unwrap();

    let events = shell.events.lock().unwrap();
    assert!(
        events.iter().all(|e| e.status != ProgressStatus::Completed),
        "completed must never be emitted after a cancel"
    );
    assert!(
        events
            .iter()
            .filter(|e| e.status == ProgressStatus::Downloading)
            .all(|e| e.current <= 4),
        "no downloading events past the cancel boundary"
    );
    drop(events);
    assert!(!manager.is_downloading());
}

#[tokio::test]
async fn download_without_a_manifest_is_not_ready() {
    let manager = DownloadManager::new(
        MapFetcher {
            responses: HashMap::new(),
        },
        test_config(),
    );
    let dir = tempfile::tempdir().unwrap();
    let shell = SpyShell {
        out_dir: dir.path().to_path_buf(),
        events: Mutex::new(Vec::new()),
        cancel_on: None,
    };

    let comic = comic_info(Source::Ourfeel, "Nothing");
    let err = manager.start_download(&comic, &shell).await.unwrap_err();
    assert!(matches!(err, DownloadError::NotReady(_)));
    assert!(shell.events.into_inner().unwrap().is_empty());
    assert!(!manager.is_downloading());
}

#[tokio::test]
async fn cancel_with_no_active_download_is_a_no_op() {
    let manager = DownloadManager::new(
        MapFetcher {
            responses: HashMap::new(),
        },
        test_config(),
    );
    manager.cancel();
    manager.cancel();
    assert!(!manager.is_downloading());
}

const EPISODE_URL: &str = "https://ourfeel.example/episode/42";

fn episode_html() -> Vec<u8> {
    // Page records are deliberately out of order; the adapter must sort by
    // src before the manifest is stored.
    let html = r#"<html><head><title>Search Flow</title></head><body>
<script id="episode-json" data-value="{&quot;readableProduct&quot;:{&quot;pageStructure&quot;:{&quot;pages&quot;:[
{&quot;src&quot;:&quot;https://cdn.example/gv/b.jpg&quot;,&quot;width&quot;:64,&quot;height&quot;:64},
{&quot;src&quot;:&quot;https://cdn.example/gv/a.jpg&quot;,&quot;width&quot;:64,&quot;height&quot;:64}
]}}}"></script></body></html>"#;
    html.as_bytes().to_vec()
}

#[tokio::test]
async fn search_builds_manifest_and_downloads_in_src_order() {
    let page_jpeg = {
        let img = image::RgbaImage::from_pixel(64, 64, image::Rgba([10, 200, 90, 255]));
        page::encode(img, PageFormat::Jpeg, 95).unwrap()
    };
    let mut responses = HashMap::new();
    responses.insert(EPISODE_URL.to_string(), episode_html());
    responses.insert("https://cdn.example/gv/a.jpg".to_string(), page_jpeg.clone());
    responses.insert("https://cdn.example/gv/b.jpg".to_string(), page_jpeg);

    let manager = DownloadManager::new(MapFetcher { responses }, test_config());
    let info = manager.search(Source::Ourfeel, EPISODE_URL).await.unwrap();

    assert_eq!(info.title, "Search Flow");
    assert!(info.thumbnail.starts_with("data:image/png;base64,"));

    let dir = tempfile::tempdir().unwrap();
    let shell = SpyShell {
        out_dir: dir.path().to_path_buf(),
        events: Mutex::new(Vec::new()),
        cancel_on: None,
    };
    manager.start_download(&info, &shell).await.unwrap();

    assert!(dir.path().join("001.png").is_file());
    assert!(dir.path().join("002.png").is_file());
    assert_eq!(
        shell.events.into_inner().unwrap().last().map(|e| e.total),
        Some(2)
    );
}
