//! Runs one blocking unit of work per input file, reporting progress over a
//! channel and stopping between files once cancelled.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::stopwatch::Stopwatch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Started { index: usize, total: usize, name: String },
    Done { index: usize, total: usize, name: String, elapsed: String, remaining: String },
    Failed { index: usize, total: usize, name: String, error: String },
    Cancelled { completed: usize, total: usize },
    Finished { total: usize, elapsed: String },
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Apply `work` to every file in order on the blocking pool.
///
/// A failing file is logged and reported, the rest still run. Results come
/// back in input order for the files that succeeded.
pub async fn run_batch<T, F>(
    files: Vec<PathBuf>,
    cancel: Arc<AtomicBool>,
    progress: mpsc::Sender<Progress>,
    work: F,
) -> Vec<(PathBuf, T)>
where
    T: Send + 'static,
    F: Fn(&Path) -> Result<T> + Send + Sync + 'static,
{
    let total = files.len();
    let work = Arc::new(work);
    let watch = Stopwatch::start();
    let mut out = Vec::with_capacity(total);

    for (index, path) in files.into_iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            info!("batch cancelled after {}/{} files", index, total);
            let _ = progress.send(Progress::Cancelled { completed: index, total }).await;
            return out;
        }
        let name = file_name(&path);
        let _ = progress.send(Progress::Started { index, total, name: name.clone() }).await;

        let w = work.clone();
        let p = path.clone();
        let res = match tokio::task::spawn_blocking(move || w(&p)).await {
            Ok(r) => r,
            Err(e) => Err(anyhow::anyhow!("worker panicked: {}", e)),
        };

        match res {
            Ok(v) => {
                out.push((path, v));
                let _ = progress
                    .send(Progress::Done {
                        index,
                        total,
                        name,
                        elapsed: watch.elapsed_hms(),
                        remaining: watch.remaining_hms(index + 1, total),
                    })
                    .await;
            }
            Err(e) => {
                warn!("{}: {:#}", name, e);
                let _ = progress.send(Progress::Failed { index, total, name, error: format!("{:#}", e) }).await;
            }
        }
    }

    let _ = progress.send(Progress::Finished { total, elapsed: watch.elapsed_hms() }).await;
    out
}

/// Log progress messages until the sender side closes.
pub async fn log_progress(mut rx: mpsc::Receiver<Progress>) {
    while let Some(p) = rx.recv().await {
        match p {
            Progress::Started { index, total, name } => info!("[{}/{}] {}", index + 1, total, name),
            Progress::Done { index, total, name, elapsed, remaining } => {
                info!("[{}/{}] {} done, elapsed {} remaining {}", index + 1, total, name, elapsed, remaining)
            }
            Progress::Failed { index, total, name, error } => {
                warn!("[{}/{}] {} failed: {}", index + 1, total, name, error)
            }
            Progress::Cancelled { completed, total } => warn!("cancelled, {}/{} files completed", completed, total),
            Progress::Finished { total, elapsed } => info!("{} files in {}", total, elapsed),
        }
    }
}
