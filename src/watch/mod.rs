//! Continuous rebuilds.
//!
//! A watch session owns its [`Compiler`] on a background task and runs at
//! most one build cycle at a time:
//!
//! ```text
//!            invalidate()                       cycle finished
//!   idle ─────────────────► running ─────────────────────────────► idle
//!                            │  ▲                                  (report, subscribe watcher)
//!            invalidate()    │  │ invalid: rerun once, no report
//!            sets invalid ───┘  │
//!                               └──────────────
//! ```
//!
//! Any number of invalidations arriving during a cycle collapse into exactly
//! one follow-up cycle. A cycle that observes `invalid` between phases skips
//! its remaining phases silently.

mod notify;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

pub use self::notify::NotifyWatchFileSystem;

use crate::compiler::Compiler;
use crate::error::{BuildError, Result};
use crate::fs::{Timestamps, now_millis};
use crate::hooks::SyncHook;
use crate::stats::Stats;

/// Receives fresh timestamps once the aggregation delay has passed.
pub type ChangeCallback = Box<dyn FnOnce(Result<Timestamps>) + Send>;

/// Fired on the first relevant event, before aggregation.
pub type InvalidCallback = Box<dyn FnOnce() + Send>;

/// An active subscription. Closing must not block on callbacks in flight.
pub trait Watcher: Send {
    fn close(&mut self);
}

/// Source of file change notifications.
pub trait WatchFileSystem: Send + Sync {
    /// Watch `files` and `dirs` for changes after `start_time` (milliseconds
    /// since the epoch). Each callback fires at most once.
    fn watch(
        &self,
        files: Vec<PathBuf>,
        dirs: Vec<PathBuf>,
        start_time: u64,
        delay: Duration,
        on_change: ChangeCallback,
        on_invalid: InvalidCallback,
    ) -> Result<Box<dyn Watcher>>;
}

/// Outcome of [`WatchingHandle::invalidate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidation {
    /// A cycle was running; one follow-up cycle is queued.
    Deferred,
    /// The session was idle; a cycle was started.
    Started,
    /// The session is closed.
    Closed,
}

#[derive(Default)]
struct State {
    running: bool,
    invalid: bool,
    closed: bool,
    start_time: u64,
    watcher: Option<Box<dyn Watcher>>,
    /// Timestamps delivered by the watcher, applied at the next cycle start.
    pending: Option<Timestamps>,
    /// Watcher failures waiting to be reported.
    errors: Vec<BuildError>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    wake: Notify,
}

impl Shared {
    fn invalidate(&self) -> Invalidation {
        let (outcome, watcher) = {
            let mut state = self.state.lock();
            let watcher = state.watcher.take();
            let outcome = if state.closed {
                Invalidation::Closed
            } else if state.running {
                state.invalid = true;
                Invalidation::Deferred
            } else {
                state.running = true;
                Invalidation::Started
            };
            (outcome, watcher)
        };

        if let Some(mut watcher) = watcher {
            watcher.close();
        }
        if outcome == Invalidation::Started {
            self.wake.notify_one();
        }
        outcome
    }
}

/// Paths a cycle depended on.
#[derive(Debug, Clone, Default)]
struct Dependencies {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
}

/// The session as seen by `watch-run` handlers.
pub struct Watching {
    compiler: Compiler,
    delay: Duration,
    shared: Arc<Shared>,
    /// From the last successful cycle; watched again after a failure.
    dependencies: Mutex<Dependencies>,
}

impl Watching {
    /// Start a session; the first cycle begins right away.
    pub(crate) fn spawn<H>(compiler: Compiler, delay: Duration, handler: H) -> WatchingHandle
    where
        H: FnMut(Result<Stats>) + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        shared.state.lock().running = true;

        let watching = Self {
            compiler,
            delay,
            shared: Arc::clone(&shared),
            dependencies: Mutex::default(),
        };
        let task = tokio::spawn(watching.session(handler));
        WatchingHandle { shared, task }
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Start time of the current cycle, in milliseconds since the epoch.
    pub fn start_time(&self) -> u64 {
        self.shared.state.lock().start_time
    }

    pub fn is_invalid(&self) -> bool {
        self.shared.state.lock().invalid
    }

    async fn session<H>(self, mut handler: H) -> Compiler
    where
        H: FnMut(Result<Stats>) + Send + 'static,
    {
        let mut startup = self.compiler.read_records().await.err();

        while self.wait_for_cycle(&mut handler).await {
            if let Some(err) = startup.take() {
                self.report(Err(err), &mut handler);
                self.release();
                continue;
            }

            loop {
                let outcome = self.go().await;
                if self.take_invalid() {
                    crate::debug!("watch"; "invalidated during cycle, rebuilding");
                    continue;
                }
                if let Some(result) = outcome {
                    self.report(result, &mut handler);
                }
                if self.release() {
                    break;
                }
            }
        }

        crate::debug!("watch"; "session closed");
        self.compiler
    }

    /// Park until a cycle is claimed. Returns `false` once closed.
    async fn wait_for_cycle<H>(&self, handler: &mut H) -> bool
    where
        H: FnMut(Result<Stats>),
    {
        loop {
            let (closed, claimed, errors) = {
                let mut state = self.shared.state.lock();
                (state.closed, state.running, std::mem::take(&mut state.errors))
            };
            for err in errors {
                handler(Err(err));
            }
            if closed {
                return false;
            }
            if claimed {
                return true;
            }
            self.shared.wake.notified().await;
        }
    }

    /// One build cycle. `None` if an invalidation cut it short.
    async fn go(&self) -> Option<Result<Stats>> {
        let (start_time, pending) = {
            let mut state = self.shared.state.lock();
            state.start_time = now_millis();
            state.invalid = false;
            (state.start_time, state.pending.take())
        };
        if let Some(timestamps) = pending {
            self.compiler.set_timestamps(timestamps);
        }

        let result: Result<Option<Stats>> = async {
            self.compiler.hooks.watch_run.call(self).await?;
            if self.is_invalid() {
                return Ok(None);
            }

            let compilation = self.compiler.compile().await?;
            if self.is_invalid() {
                return Ok(None);
            }

            self.compiler.emit_assets(&compilation).await?;
            if self.is_invalid() {
                return Ok(None);
            }

            self.compiler.emit_records().await?;
            if self.is_invalid() {
                return Ok(None);
            }

            Ok(Some(Stats::new(compilation, start_time, now_millis())))
        }
        .await;

        result.transpose()
    }

    fn take_invalid(&self) -> bool {
        let mut state = self.shared.state.lock();
        std::mem::take(&mut state.invalid)
    }

    /// Finish the claimed cycle. Returns `false` when an invalidation arrived
    /// while reporting, in which case the cycle stays claimed for a rerun.
    fn release(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.invalid && !state.closed {
            state.invalid = false;
            return false;
        }
        state.running = false;
        true
    }

    fn report<H>(&self, result: Result<Stats>, handler: &mut H)
    where
        H: FnMut(Result<Stats>),
    {
        match result {
            Ok(mut stats) => {
                self.compiler.hooks.done.call(&mut stats);
                let dependencies = Dependencies {
                    files: stats.compilation.file_dependencies(),
                    dirs: stats.compilation.context_dependencies(),
                };
                *self.dependencies.lock() = dependencies.clone();
                handler(Ok(stats));
                self.subscribe(dependencies);
            }
            Err(mut err) => {
                self.compiler.hooks.failed.call(&mut err);
                handler(Err(err));
                // The session survives; a fix on disk starts the next cycle.
                self.subscribe(self.last_dependencies());
            }
        }
    }

    /// Last known dependencies, or the whole context before any success.
    fn last_dependencies(&self) -> Dependencies {
        let dependencies = self.dependencies.lock().clone();
        if dependencies.files.is_empty() && dependencies.dirs.is_empty() {
            return Dependencies {
                files: Vec::new(),
                dirs: vec![self.compiler.options().context.clone()],
            };
        }
        dependencies
    }

    fn subscribe(&self, dependencies: Dependencies) {
        let Dependencies { files, dirs } = dependencies;
        let Some(fs) = self.compiler.watch_file_system() else {
            return;
        };
        let start_time = {
            let state = self.shared.state.lock();
            // A rerun is queued; it subscribes when it reports.
            if state.invalid || state.closed {
                return;
            }
            state.start_time
        };

        let shared = Arc::clone(&self.shared);
        let on_change: ChangeCallback = Box::new(move |result| match result {
            Ok(timestamps) => {
                shared.state.lock().pending = Some(timestamps);
                shared.invalidate();
            }
            Err(err) => {
                shared.state.lock().errors.push(err);
                shared.wake.notify_one();
            }
        });

        let invalid: SyncHook<()> = self.compiler.hooks.invalid.clone();
        let on_invalid: InvalidCallback = Box::new(move || invalid.call(&mut ()));

        match fs.watch(files, dirs, start_time, self.delay, on_change, on_invalid) {
            Ok(watcher) => {
                let stale = {
                    let mut state = self.shared.state.lock();
                    if state.closed || state.invalid {
                        Some(watcher)
                    } else {
                        state.watcher.replace(watcher)
                    }
                };
                if let Some(mut stale) = stale {
                    stale.close();
                }
            }
            Err(err) => {
                self.shared.state.lock().errors.push(err);
                self.shared.wake.notify_one();
            }
        }
    }
}

/// Control handle of a running watch session.
pub struct WatchingHandle {
    shared: Arc<Shared>,
    task: JoinHandle<Compiler>,
}

impl WatchingHandle {
    /// Request a rebuild. Never starts a second concurrent cycle.
    pub fn invalidate(&self) -> Invalidation {
        self.shared.invalidate()
    }

    /// Whether a cycle is currently claimed.
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Stop watching. A cycle in flight finishes first; its result is still
    /// delivered to the handler.
    pub async fn close(self) -> Result<Compiler> {
        let watcher = {
            let mut state = self.shared.state.lock();
            state.closed = true;
            state.watcher.take()
        };
        if let Some(mut watcher) = watcher {
            watcher.close();
        }
        self.shared.wake.notify_one();

        self.task
            .await
            .map_err(|e| BuildError::Task(e.to_string()))
    }
}

impl std::fmt::Debug for Watching {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watching")
            .field("delay", &self.delay)
            .field("compiler", &self.compiler)
            .finish_non_exhaustive()
    }
}
