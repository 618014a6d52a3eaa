//! Cancellation window.
//!
//! After resources exist and before the orchestration engine runs, the
//! operator gets a short interval to abort. The window is a small state
//! machine: `Armed` moves to `Committed` when the delay elapses or to
//! `RolledBack` on interrupt. Both are terminal.

use crate::config::WindowConfig;
use crate::error::StackError;
use crate::provider::CloudProvider;
use crate::provision::{RollbackReport, UndoLog};
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Armed,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowInput {
    Elapsed,
    Interrupt,
}

impl WindowState {
    pub fn next(self, input: WindowInput) -> WindowState {
        match (self, input) {
            (WindowState::Armed, WindowInput::Elapsed) => WindowState::Committed,
            (WindowState::Armed, WindowInput::Interrupt) => WindowState::RolledBack,
            (terminal, _) => terminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WindowState::Armed)
    }
}

type InterruptSource = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Resolves on Ctrl-C. If the handler cannot be installed the window can only
/// elapse.
fn ctrl_c() -> BoxFuture<'static, ()> {
    Box::pin(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Unable to listen for Ctrl-C; window cannot be interrupted");
            futures::future::pending::<()>().await;
        }
    })
}

/// Exit status of a process terminated by SIGINT.
const INTERRUPTED_EXIT: i32 = 130;

static TERMINATE_ON_INTERRUPT: Once = Once::new();

/// Once the process-wide Ctrl-C handler has been installed, SIGINT no longer
/// terminates the process. Restore that for the remainder of the run.
fn terminate_on_interrupt() {
    TERMINATE_ON_INTERRUPT.call_once(|| {
        let spawned = std::thread::Builder::new()
            .name("sigint".to_string())
            .spawn(|| {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        warn!(error = %e, "Unable to watch for Ctrl-C after the window");
                        return;
                    }
                };
                if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                    warn!("Interrupted after the cancellation window closed");
                    std::process::exit(INTERRUPTED_EXIT);
                }
            });
        if let Err(e) = spawned {
            warn!(error = %e, "Unable to watch for Ctrl-C after the window");
        }
    });
}

#[derive(Clone)]
pub struct CancellationWindow {
    delay: Duration,
    line_length: usize,
    interrupt: InterruptSource,
    process_signal: bool,
}

impl fmt::Debug for CancellationWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationWindow")
            .field("delay", &self.delay)
            .field("line_length", &self.line_length)
            .finish_non_exhaustive()
    }
}

impl CancellationWindow {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            line_length: 80,
            interrupt: Arc::new(ctrl_c),
            process_signal: true,
        }
    }

    /// Verbose runs get the longer delay so the output can be read.
    pub fn from_config(config: &WindowConfig, verbose: bool) -> Self {
        let secs = if verbose {
            config.verbose_delay_secs
        } else {
            config.delay_secs
        };
        Self {
            line_length: config.line_length,
            ..Self::new(Duration::from_secs(secs))
        }
    }

    /// Replace the interrupt source (Ctrl-C by default).
    pub fn with_interrupt<F, Fut>(mut self, source: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.interrupt = Arc::new(move || Box::pin(source()));
        self.process_signal = false;
        self
    }

    /// True when the window listens for the real Ctrl-C signal.
    pub fn uses_process_signal(&self) -> bool {
        self.process_signal
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Three lines: a rule, the centred prompt, a rule.
    pub fn banner(&self) -> String {
        let prompt = format!(
            "   Please type CTRL-C within {} seconds to abort   ",
            self.delay.as_secs()
        );
        let width = self.line_length.max(prompt.len());
        let rule = "#".repeat(width);
        format!("{}\n{:#^width$}\n{}", rule, prompt, rule, width = width)
    }

    /// Block until the delay elapses or the interrupt fires.
    pub fn hold(&self) -> Result<WindowState, StackError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let interrupt = (self.interrupt)();
        let delay = self.delay;

        eprintln!("{}", self.banner());
        let input = runtime.block_on(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => WindowInput::Elapsed,
                _ = interrupt => WindowInput::Interrupt,
            }
        });

        drop(runtime);

        let state = WindowState::Armed.next(input);
        if state == WindowState::Committed && self.process_signal {
            terminate_on_interrupt();
        }
        info!(state = ?state, "Cancellation window closed");
        Ok(state)
    }
}

/// Undo one build: remove `files`, then unwind `undo` newest first.
pub fn rollback(files: &[PathBuf], undo: UndoLog, provider: &dyn CloudProvider) -> RollbackReport {
    warn!(files = files.len(), resources = undo.len(), "Rolling back");
    let mut report = RollbackReport::default();
    report.remove_files(files);
    report.merge(undo.unwind(provider));
    report
}
