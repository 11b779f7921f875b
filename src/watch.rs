//! File system watcher for incremental rebuilds.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                        Event Loop                             │
//! │                                                               │
//! │  ┌──────────┐   ┌─────────────┐   ┌───────────────────────┐   │
//! │  │ notify   │──▶│ on_event()  │──▶│ RebuildController     │   │
//! │  │ events   │   │ split/filter│   │ (debounce window)     │   │
//! │  └──────────┘   └──────┬──────┘   └──────────┬────────────┘   │
//! │                        │ images              │ tick()         │
//! │                        ▼                     ▼                │
//! │                  copy to output     apply_events + build()    │
//! │                        │                     │                │
//! │                        └──────► notifier ◄───┘                │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! The debounce state machine lives in [`crate::compiler::watch`]; this
//! module turns raw notify events into queued file events and drives it.

use crate::{
    build::BuildSession,
    compiler::watch::{Clock, FileEvent, QueuedEvent, RebuildController, RebuildState, SystemClock},
    error::BuildError,
    log,
    logger::WatchStatus,
    utils::category::{FileCategory, categorize_path, is_temp_file, normalize_path},
};
use anyhow::{Context, Result};
use notify::{
    Event, EventKind, RecursiveMode, Watcher,
    event::{ModifyKind, RenameMode},
};
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError},
    },
    time::Duration,
};

/// Upper bound on a blocking wait, so Ctrl+C is noticed promptly.
const STOP_POLL: Duration = Duration::from_millis(250);

/// Told when the browser should reload.
pub trait ReloadNotifier {
    fn notify(&self, changed: &[PathBuf]);
}

/// Logs a reload line; there is no dev server to push to.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl ReloadNotifier for LogNotifier {
    fn notify(&self, changed: &[PathBuf]) {
        match changed {
            [single] => log!("reload"; "{}", single.display()),
            _ => log!("reload"; "{} files changed", changed.len()),
        }
    }
}

/// Split a notify event into add/change/unlink events.
///
/// Renames become an unlink of the old path and an add of the new one.
/// Access and metadata-free events yield nothing.
pub fn translate_event(event: &Event) -> Vec<(FileEvent, PathBuf)> {
    let each = |kind: FileEvent| -> Vec<(FileEvent, PathBuf)> {
        event.paths.iter().map(|p| (kind, p.clone())).collect()
    };

    match &event.kind {
        EventKind::Create(_) => each(FileEvent::Add),
        EventKind::Remove(_) => each(FileEvent::Unlink),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => each(FileEvent::Unlink),
            RenameMode::To => each(FileEvent::Add),
            RenameMode::Both => {
                let mut out = Vec::with_capacity(2);
                if let [from, to, ..] = event.paths.as_slice() {
                    out.push((FileEvent::Unlink, from.clone()));
                    out.push((FileEvent::Add, to.clone()));
                }
                out
            }
            // Backends that cannot tell the two sides apart
            RenameMode::Any | RenameMode::Other => event
                .paths
                .iter()
                .map(|p| {
                    let kind = if p.exists() { FileEvent::Add } else { FileEvent::Unlink };
                    (kind, p.clone())
                })
                .collect(),
        },
        EventKind::Modify(_) => each(FileEvent::Change),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Watch-mode driver around a build session.
pub struct WatchLoop<N: ReloadNotifier, C: Clock = SystemClock> {
    session: BuildSession,
    controller: RebuildController<C>,
    notifier: N,
    status: WatchStatus,
    rebuilds: usize,
}

impl<N: ReloadNotifier> WatchLoop<N, SystemClock> {
    pub fn new(session: BuildSession, notifier: N) -> Self {
        let window = session.config().watch.debounce();
        Self::with_controller(session, RebuildController::new(window), notifier)
    }
}

impl<N: ReloadNotifier, C: Clock> WatchLoop<N, C> {
    pub fn with_controller(
        session: BuildSession,
        controller: RebuildController<C>,
        notifier: N,
    ) -> Self {
        Self {
            session,
            controller,
            notifier,
            status: WatchStatus::new(),
            rebuilds: 0,
        }
    }

    pub const fn session(&self) -> &BuildSession {
        &self.session
    }

    /// Completed rebuild attempts, successful or not.
    pub const fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    pub fn wait_time(&self) -> Duration {
        self.controller.wait_time()
    }

    /// Queue the relevant parts of a notify event.
    pub fn on_event(&mut self, event: &Event) {
        for (kind, path) in translate_event(event) {
            self.on_file_event(kind, path);
        }
    }

    pub fn on_file_event(&mut self, kind: FileEvent, path: PathBuf) {
        if is_temp_file(&path) {
            return;
        }
        let path = normalize_path(&path);

        match categorize_path(&path, self.session.config()) {
            FileCategory::Unknown => {}
            FileCategory::Image => self.copy_image(kind, path),
            category => {
                log!("watch"; "{} {} ({})", kind.name(), self.rel(&path), category.name());
                self.controller.record(kind, path);
            }
        }
    }

    fn copy_image(&mut self, kind: FileEvent, path: PathBuf) {
        let event = QueuedEvent { kind, path };
        match self.session.apply_events(std::slice::from_ref(&event)) {
            Ok(outcome) if outcome.copied > 0 => {
                log!("watch"; "copied {}", self.rel(&event.path));
                self.notifier.notify(&[event.path]);
            }
            Ok(_) => {}
            Err(e) => log!("error"; "{e:#}"),
        }
    }

    /// Run a rebuild if the debounce window has passed.
    ///
    /// Returns whether a rebuild was attempted.
    pub fn tick(&mut self) -> bool {
        let Some(batch) = self.controller.poll() else {
            return false;
        };

        let result = self.rebuild(&batch);
        self.controller.finish();
        self.rebuilds += 1;
        if matches!(self.controller.state(), RebuildState::Collecting { .. }) {
            log!("watch"; "{} changes queued during rebuild", self.controller.pending());
        }

        match result {
            Ok(pages) => {
                self.status.success(&format!("rebuilt {pages} pages"));
                let changed: Vec<PathBuf> = batch.into_iter().map(|e| e.path).collect();
                self.notifier.notify(&changed);
            }
            Err(e) => self.status.error(failure_summary(&e), &format!("{e:#}")),
        }
        true
    }

    fn rebuild(&mut self, batch: &[QueuedEvent]) -> Result<usize> {
        let outcome = self.session.apply_events(batch)?;
        if !outcome.rebuild {
            return Ok(0);
        }
        let manifest = self.session.build()?;
        Ok(manifest.pages.len())
    }

    fn rel(&self, path: &Path) -> String {
        let root = self.session.config().get_root();
        path.strip_prefix(root).unwrap_or(path).display().to_string()
    }
}

/// Status line for a failed rebuild.
fn failure_summary(error: &anyhow::Error) -> &'static str {
    let configuration = error
        .chain()
        .filter_map(|e| e.downcast_ref::<BuildError>())
        .any(BuildError::is_configuration);
    if configuration { "configuration error" } else { "rebuild failed" }
}

/// Directories whose changes feed the controller.
fn watched_paths(session: &BuildSession) -> Vec<PathBuf> {
    let build = &session.config().build;
    let entry_dir = build.bundle.entry.parent().map(Path::to_path_buf);

    [
        Some(build.content.clone()),
        Some(build.templates.clone()),
        Some(build.assets.clone()),
        entry_dir,
    ]
    .into_iter()
    .flatten()
    .filter(|p| p.is_dir())
    .fold(Vec::new(), |mut acc, p| {
        // Nested watches would report every event twice
        if !acc.iter().any(|w: &PathBuf| p.starts_with(w)) {
            acc.push(p);
        }
        acc
    })
}

/// Watch until Ctrl+C, rebuilding after each quiet window.
pub fn watch_for_changes_blocking(session: BuildSession) -> Result<()> {
    if !session.config().watch.enable {
        log!("watch"; "disabled by [watch.enable]");
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("Failed to install Ctrl+C handler")?;

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    for path in watched_paths(&session) {
        watcher
            .watch(&path, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch {}", path.display()))?;
        log!("watch"; "{}", path.display());
    }

    let mut watch = WatchLoop::new(session, LogNotifier);
    while !stop.load(Ordering::SeqCst) {
        match rx.recv_timeout(watch.wait_time().min(STOP_POLL)) {
            Ok(Ok(event)) => watch.on_event(&event),
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        watch.tick();
    }

    log!("watch"; "stopped after {} rebuilds, {} pages",
        watch.rebuilds(), watch.session().store().len());
    Ok(())
}
