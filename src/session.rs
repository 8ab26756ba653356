use crate::config::Config;
use crate::error::{DownloadError, Result};
use crate::http_client::Fetcher;
use crate::models::{ComicInfo, ComicManifest, DownloadProgress, ProgressStatus, Source};
use crate::page::{self, PageContext};
use crate::shell::Shell;
use crate::sources::{comic_days, ourfeel, pocket_magazine};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// A search arriving this soon after a cancel pauses briefly so the
/// cancelled loop can wind down.
const CANCEL_QUIET_WINDOW: Duration = Duration::from_secs(2);
const CANCEL_QUIET_PAUSE: Duration = Duration::from_millis(200);

/// Stop signals are pushed repeatedly; the mailboxes hold one slot, so
/// surplus pushes are dropped.
const STOP_SIGNAL_BURST: usize = 3;

#[derive(Default)]
struct SessionState {
    active: bool,
    session_id: u64,
    mode: Option<Source>,
    force_stop: bool,
    last_cancel: Option<Instant>,
}

/// Single-slot signal mailbox used to wake the page loop.
struct StopMailbox {
    tx: mpsc::Sender<()>,
    rx: Mutex<mpsc::Receiver<()>>,
}

impl StopMailbox {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    fn signal(&self) {
        let _ = self.tx.try_send(());
    }

    fn poll(&self) -> bool {
        self.rx.lock().unwrap().try_recv().is_ok()
    }

    fn drain(&self) {
        let mut rx = self.rx.lock().unwrap();
        while rx.try_recv().is_ok() {}
    }
}

/// Owns the per-source manifests and the single active download.
///
/// Cancellation is cooperative: the page loop checks a sticky `force_stop`
/// flag and its captured session id at every page boundary. A loop whose id
/// no longer matches the current one exits without emitting, so a ghost loop
/// from a cancelled session can never leak events into a new download.
pub struct DownloadManager<F: Fetcher> {
    fetcher: F,
    config: Config,
    state: RwLock<SessionState>,
    manifests: RwLock<HashMap<Source, ComicManifest>>,
    cancel_mailbox: StopMailbox,
    progress_stop_mailbox: StopMailbox,
}

impl<F: Fetcher> DownloadManager<F> {
    pub fn new(fetcher: F, config: Config) -> Self {
        Self {
            fetcher,
            config,
            state: RwLock::new(SessionState::default()),
            manifests: RwLock::new(HashMap::new()),
            cancel_mailbox: StopMailbox::new(),
            progress_stop_mailbox: StopMailbox::new(),
        }
    }

    /// Build the manifest for an episode URL, keep it in the per-source
    /// slot, and return title plus thumbnail preview.
    pub async fn search(&self, source: Source, url: &str) -> Result<ComicInfo> {
        let recently_cancelled = {
            let state = self.state.read().unwrap();
            state
                .last_cancel
                .is_some_and(|t| t.elapsed() < CANCEL_QUIET_WINDOW)
        };
        if recently_cancelled {
            log::warn!("search arrived inside the cancel quiet window, pausing");
            tokio::time::sleep(CANCEL_QUIET_PAUSE).await;
        }
        if self.config.search_settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.search_settle_ms)).await;
        }

        log::info!("search: {} {}", source.as_str(), url);
        let manifest = match source {
            Source::ComicDays => {
                comic_days::fetch_manifest(
                    &self.fetcher,
                    url,
                    Path::new(&self.config.comic_days_cookie_file),
                )
                .await?
            }
            Source::Ourfeel => ourfeel::fetch_manifest(&self.fetcher, url).await?,
            Source::PocketMagazine => {
                pocket_magazine::fetch_manifest(
                    &self.fetcher,
                    url,
                    Path::new(&self.config.pocket_cookie_file),
                )
                .await?
            }
        };

        let thumbnail =
            page::render_thumbnail(&self.fetcher, &manifest, self.config.jpeg_quality).await?;
        let info = ComicInfo {
            mode: source,
            title: manifest.title.clone(),
            thumbnail,
            page_url: url.to_string(),
        };
        self.store_manifest(manifest);
        Ok(info)
    }

    /// Replace the manifest slot for the manifest's source.
    pub fn store_manifest(&self, manifest: ComicManifest) {
        self.manifests
            .write()
            .unwrap()
            .insert(manifest.source, manifest);
    }

    /// Run the page loop for a previously searched comic. Returns `Ok(())`
    /// after a cancel (with no `completed` event emitted); the shell infers
    /// cancellation from the missing completion.
    pub async fn start_download<S: Shell>(&self, comic: &ComicInfo, shell: &S) -> Result<()> {
        if self.is_force_stopped() {
            log::warn!("refusing new download while a forced stop is in progress");
            return Err(DownloadError::Cancelled);
        }

        let session_id = {
            let mut state = self.state.write().unwrap();
            state.session_id += 1;
            state.active = true;
            state.force_stop = false;
            state.mode = Some(comic.mode);
            state.session_id
        };
        log::info!("download session {session_id}: {}", comic.title);

        self.cancel_mailbox.drain();
        self.progress_stop_mailbox.drain();

        let result = self.run_download(comic, shell, session_id).await;
        self.cleanup();
        result
    }

    async fn run_download<S: Shell>(
        &self,
        comic: &ComicInfo,
        shell: &S,
        session_id: u64,
    ) -> Result<()> {
        let Some(out_dir) = shell.pick_output_dir() else {
            log::warn!("no output directory chosen");
            return Err(DownloadError::Cancelled);
        };

        let manifest = self
            .manifests
            .read()
            .unwrap()
            .get(&comic.mode)
            .cloned()
            .ok_or_else(|| DownloadError::NotReady(comic.mode.as_str().to_string()))?;
        let total = manifest.pages.len();

        // Directory trouble is a session-level failure; a bad page later is
        // not.
        page::ensure_output_dir(&out_dir)?;

        self.send_progress(
            shell,
            DownloadProgress {
                current: 0,
                total,
                title: manifest.title.clone(),
                status: ProgressStatus::Started,
            },
            session_id,
        );

        let ctx = PageContext::from_manifest(&manifest, self.config.jpeg_quality);
        let mut failed = 0usize;

        for (i, page_ref) in manifest.pages.iter().enumerate() {
            if self.observe_stop(session_id) {
                return Ok(());
            }

            let page_num = i + 1;
            self.send_progress(
                shell,
                DownloadProgress {
                    current: page_num,
                    total,
                    title: manifest.title.clone(),
                    status: ProgressStatus::Downloading,
                },
                session_id,
            );

            match page::process_page(&self.fetcher, page_ref, &ctx, &out_dir, page_num).await {
                Ok(path) => log::debug!("page {page_num}/{total} -> {}", path.display()),
                Err(e) => {
                    // One bad page must not cost the rest of the episode.
                    failed += 1;
                    log::error!("page {page_num}/{total} failed: {e}");
                }
            }

            if page_num < total && self.config.page_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.page_delay_ms)).await;
            }

            if self.observe_stop(session_id) {
                return Ok(());
            }
        }

        if failed > 0 {
            log::warn!("{failed} of {total} pages failed");
        }
        if !self.is_force_stopped() {
            self.send_progress(
                shell,
                DownloadProgress {
                    current: total,
                    total,
                    title: manifest.title,
                    status: ProgressStatus::Completed,
                },
                session_id,
            );
        }
        Ok(())
    }

    /// Request cancellation of the active download. Idempotent; safe to call
    /// with no download running.
    pub fn cancel(&self) {
        log::info!("cancel requested");
        {
            let mut state = self.state.write().unwrap();
            state.last_cancel = Some(Instant::now());
            if !state.active {
                log::info!("no active download");
                return;
            }
            state.force_stop = true;
        }

        self.cancel_mailbox.drain();
        self.progress_stop_mailbox.drain();
        for _ in 0..STOP_SIGNAL_BURST {
            self.cancel_mailbox.signal();
            self.progress_stop_mailbox.signal();
        }

        let mut state = self.state.write().unwrap();
        state.active = false;
        state.force_stop = true;
    }

    pub fn is_downloading(&self) -> bool {
        self.state.read().unwrap().active
    }

    /// The current download mode, while one is active.
    pub fn active_mode(&self) -> Option<Source> {
        let state = self.state.read().unwrap();
        state.active.then_some(state.mode).flatten()
    }

    fn is_force_stopped(&self) -> bool {
        self.state.read().unwrap().force_stop
    }

    fn set_force_stop(&self) {
        self.state.write().unwrap().force_stop = true;
    }

    /// The page-boundary stop check: sticky flag and session id first, then
    /// a non-blocking poll of each mailbox. A signalled mailbox makes the
    /// stop sticky before the loop exits.
    fn observe_stop(&self, session_id: u64) -> bool {
        if self.should_stop(session_id) {
            log::info!("session {session_id} observed stop, exiting");
            return true;
        }
        if self.cancel_mailbox.poll() {
            log::info!("session {session_id} received cancel signal");
            self.set_force_stop();
            return true;
        }
        if self.progress_stop_mailbox.poll() {
            log::info!("session {session_id} received progress stop signal");
            self.set_force_stop();
            return true;
        }
        false
    }

    fn should_stop(&self, session_id: u64) -> bool {
        let state = self.state.read().unwrap();
        if state.force_stop {
            return true;
        }
        if state.session_id != session_id {
            log::warn!(
                "session {session_id} is stale (current {})",
                state.session_id
            );
            return true;
        }
        false
    }

    /// Emission is fenced: a stopped or stale session never reaches the
    /// shell.
    fn send_progress<S: Shell>(&self, shell: &S, progress: DownloadProgress, session_id: u64) {
        if self.should_stop(session_id) {
            return;
        }
        shell.emit_progress(&progress);
    }

    fn cleanup(&self) {
        let mut state = self.state.write().unwrap();
        state.active = false;
        state.force_stop = false;
    }
}
