use crate::models::DownloadProgress;
use std::path::PathBuf;

/// The desktop shell's side of the contract: it picks where downloads land
/// and receives `download-progress` events.
pub trait Shell: Sync {
    fn pick_output_dir(&self) -> Option<PathBuf>;
    fn emit_progress(&self, progress: &DownloadProgress);
}

/// Console stand-in for the desktop shell: the output directory comes from
/// the command line and progress goes to the log.
pub struct ConsoleShell {
    out_dir: PathBuf,
}

impl ConsoleShell {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }
}

impl Shell for ConsoleShell {
    fn pick_output_dir(&self) -> Option<PathBuf> {
        Some(self.out_dir.clone())
    }

    fn emit_progress(&self, progress: &DownloadProgress) {
        log::info!(
            "[{:?}] {} {}/{}",
            progress.status,
            progress.title,
            progress.current,
            progress.total
        );
    }
}
