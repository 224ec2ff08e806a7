//! Watch coordinator: debounce filesystem events and coalesce render passes
//!
//! Change events from `notify` are funneled into a channel; each accepted
//! event re-arms a debounce deadline, and when the deadline elapses a render
//! pass is triggered. A single-flight guard plus a pending-rerun flag
//! guarantee at most one pass runs at a time, with at most one re-run queued
//! behind it.

use crate::Result;
use log::{error, info, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::{self, JoinError, JoinHandle};
use tokio::time::{sleep_until, Instant};

/// Quiet period after the last qualifying change before a render triggers
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(250);

/// Extensions that qualify as page content; anything else is ignored
const WATCHED_EXTENSIONS: &[&str] = &["html", "css", "js", "png", "jpg", "jpeg", "svg"];

/// Render pass invoked by the coordinator (runs on a blocking task)
pub type RenderFn = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// Start a recursive filesystem watcher and bridge its events into a tokio
/// channel. The returned watcher must stay alive for the session's lifetime.
pub fn spawn_fs_watcher(root: &Path) -> Result<(RecommendedWatcher, UnboundedReceiver<PathBuf>)> {
    let (tx, rx) = mpsc::unbounded_channel();

    let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
        match result {
            Ok(event) => {
                for path in event.paths {
                    // Receiver gone means the session ended; nothing to do
                    let _ = tx.send(path);
                }
            }
            Err(err) => warn!("watch event error: {}", err),
        }
    })
    .map_err(|e| crate::Error::WatchError(format!("Failed to create watcher: {}", e)))?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|e| crate::Error::WatchError(format!("Failed to watch {}: {}", root.display(), e)))?;

    Ok((watcher, rx))
}

/// One watch-mode session: owns the debounce deadline, the single-flight
/// handle, and the pending-rerun flag.
pub struct WatchSession {
    events: UnboundedReceiver<PathBuf>,
    render: RenderFn,
    /// Paths under this directory never trigger (the pass's own PNG writes)
    skip_dir: Option<PathBuf>,
    debounce: Duration,
    deadline: Option<Instant>,
    pending: bool,
    active: Option<JoinHandle<Result<()>>>,
}

impl WatchSession {
    pub fn new(events: UnboundedReceiver<PathBuf>, render: RenderFn, skip_dir: Option<PathBuf>) -> Self {
        Self {
            events,
            render,
            skip_dir,
            debounce: DEBOUNCE_WINDOW,
            deadline: None,
            pending: false,
            active: None,
        }
    }

    #[cfg(test)]
    fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Run the session until the event channel closes.
    ///
    /// Starts with one immediate render pass, then loops over change events,
    /// debounce expiry, and pass completion. Render failures are logged and
    /// never end the session.
    pub async fn run(mut self) {
        self.trigger();

        loop {
            let deadline = self.deadline;
            let events = &mut self.events;
            let active = &mut self.active;
            let has_active = active.is_some();

            tokio::select! {
                maybe_path = events.recv() => {
                    match maybe_path {
                        Some(path) => {
                            if self.accepts(&path) {
                                self.deadline = Some(Instant::now() + self.debounce);
                            }
                        }
                        None => break,
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.deadline = None;
                    self.trigger();
                }
                outcome = async {
                    match active.as_mut() {
                        Some(handle) => handle.await,
                        None => std::future::pending().await,
                    }
                }, if has_active => {
                    self.active = None;
                    log_outcome(outcome);
                    if self.pending {
                        self.pending = false;
                        self.trigger();
                    }
                }
            }
        }

        // Channel closed: let in-flight work finish before returning
        if let Some(handle) = self.active.take() {
            log_outcome(handle.await);
            if self.pending {
                self.pending = false;
                let render = Arc::clone(&self.render);
                log_outcome(task::spawn_blocking(move || render()).await);
            }
        }
    }

    /// Trigger semantics: remember at most one re-run while a pass is
    /// active, otherwise start a pass on a blocking task.
    fn trigger(&mut self) {
        if self.active.is_some() {
            self.pending = true;
            return;
        }
        info!("starting render pass");
        let render = Arc::clone(&self.render);
        self.active = Some(task::spawn_blocking(move || render()));
    }

    fn accepts(&self, path: &Path) -> bool {
        if let Some(skip) = &self.skip_dir {
            if path.starts_with(skip) {
                return false;
            }
        }
        is_watched_path(path)
    }
}

fn is_watched_path(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| WATCHED_EXTENSIONS.iter().any(|w| ext.eq_ignore_ascii_case(w)))
        .unwrap_or(false)
}

fn log_outcome(outcome: std::result::Result<Result<()>, JoinError>) {
    match outcome {
        Ok(Ok(())) => info!("render pass finished"),
        Ok(Err(err)) => error!("render pass failed: {}", err),
        Err(err) => error!("render task panicked: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::UnboundedSender;
    use tokio::time::timeout;

    fn counting_render(count: Arc<AtomicUsize>, delay: Duration, fail: bool) -> RenderFn {
        Arc::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(delay);
            if fail {
                Err(crate::Error::Other("boom".into()))
            } else {
                Ok(())
            }
        })
    }

    fn session(
        render: RenderFn,
        debounce: Duration,
    ) -> (UnboundedSender<PathBuf>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = WatchSession::new(rx, render, None).with_debounce(debounce);
        (tx, tokio::spawn(session.run()))
    }

    async fn finish(tx: UnboundedSender<PathBuf>, task: JoinHandle<()>) {
        drop(tx);
        timeout(Duration::from_secs(5), task)
            .await
            .expect("session did not shut down")
            .expect("session panicked");
    }

    #[test]
    fn test_extension_filter() {
        assert!(is_watched_path(Path::new("site/index.html")));
        assert!(is_watched_path(Path::new("style.CSS")));
        assert!(is_watched_path(Path::new("logo.jpeg")));
        assert!(!is_watched_path(Path::new("notes.md")));
        assert!(!is_watched_path(Path::new("Makefile")));
    }

    #[test]
    fn test_output_dir_events_skipped() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let render = counting_render(Arc::new(AtomicUsize::new(0)), Duration::ZERO, false);
        let session = WatchSession::new(rx, render, Some(PathBuf::from("/site/renders/page")));
        assert!(!session.accepts(Path::new("/site/renders/page/page-320.png")));
        assert!(session.accepts(Path::new("/site/hero.png")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_startup_pass_runs_without_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let render = counting_render(Arc::clone(&count), Duration::ZERO, false);
        let (tx, task) = session(render, Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        finish(tx, task).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_burst_coalesces_into_one_pass() {
        let count = Arc::new(AtomicUsize::new(0));
        let render = counting_render(Arc::clone(&count), Duration::ZERO, false);
        let (tx, task) = session(render, Duration::from_millis(40));

        // Let the startup pass finish first
        tokio::time::sleep(Duration::from_millis(100)).await;

        for name in ["a.html", "b.css", "c.js", "d.svg", "e.html"] {
            tx.send(PathBuf::from(name)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Startup pass plus exactly one for the whole burst
        assert_eq!(count.load(Ordering::SeqCst), 2);

        finish(tx, task).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unwatched_extension_never_triggers() {
        let count = Arc::new(AtomicUsize::new(0));
        let render = counting_render(Arc::clone(&count), Duration::ZERO, false);
        let (tx, task) = session(render, Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(80)).await;
        tx.send(PathBuf::from("readme.md")).unwrap();
        tx.send(PathBuf::from("notes.txt")).unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);

        finish(tx, task).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_events_during_pass_queue_one_rerun() {
        let count = Arc::new(AtomicUsize::new(0));
        // Slow pass so the triggers below land while it is running
        let render = counting_render(Arc::clone(&count), Duration::from_millis(250), false);
        let (tx, task) = session(render, Duration::from_millis(10));

        // Two separate qualifying bursts while the startup pass is active
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(PathBuf::from("a.html")).unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        tx.send(PathBuf::from("b.css")).unwrap();

        tokio::time::sleep(Duration::from_millis(700)).await;

        // Startup pass plus exactly one coalesced re-run
        assert_eq!(count.load(Ordering::SeqCst), 2);

        finish(tx, task).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_pass_keeps_session_alive() {
        let count = Arc::new(AtomicUsize::new(0));
        let render = counting_render(Arc::clone(&count), Duration::ZERO, true);
        let (tx, task) = session(render, Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // A later change still triggers even though every pass fails
        tx.send(PathBuf::from("index.html")).unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        finish(tx, task).await;
    }
}
