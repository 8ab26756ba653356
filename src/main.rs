use log::{error, info};
use manga_downloader::config::Config;
use manga_downloader::error::Result;
use manga_downloader::http_client::{FetchConfig, HttpFetcher, PAGE_TIMEOUT};
use manga_downloader::models::Source;
use manga_downloader::session::DownloadManager;
use manga_downloader::shell::ConsoleShell;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

fn usage() -> ! {
    eprintln!("usage: manga-downloader <comicDays|ourfeel|PocketShonenmagazine> <episode-url> [out-dir]");
    process::exit(2);
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (mode, url) = match (args.first(), args.get(1)) {
        (Some(mode), Some(url)) => (mode.as_str(), url.as_str()),
        _ => usage(),
    };
    let source: Source = mode.parse()?;

    let config = Config::load(Path::new("./config.json"));
    let fetcher = HttpFetcher::with_config(FetchConfig {
        timeout: PAGE_TIMEOUT,
        max_attempts: config.retry_attempts,
        retry_delay: Duration::from_secs(config.retry_delay_secs),
    })?;
    let manager = DownloadManager::new(fetcher, config);

    let info = manager.search(source, url).await?;
    info!("found: {}", info.title);
    println!("{}", info.title);

    if let Some(out_dir) = args.get(2) {
        let shell = ConsoleShell::new(PathBuf::from(out_dir));
        if let Err(e) = manager.start_download(&info, &shell).await {
            error!("download failed: {e}");
            return Err(e);
        }
        info!("done");
    }

    Ok(())
}
