//! Ctrl+C handling.
//!
//! A single `AtomicBool` is shared by the walker, every hashing stage and
//! the relocator. Setting it makes them stop at the next file boundary:
//! stages return [`StageError::Interrupted`](crate::duplicates::StageError)
//! after keeping the digests already computed, and relocation reports the
//! moves done so far.
//!
//! ```rust,no_run
//! use dupfind::duplicates::StageConfig;
//! use dupfind::signal::install_handler;
//!
//! let handler = install_handler().expect("signal handler");
//! let config = StageConfig::default().with_shutdown_flag(handler.get_flag());
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Exit code for SIGINT (128 + 2).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared shutdown flag.
#[derive(Debug, Clone)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `true` once Ctrl+C was pressed or [`request_shutdown`](Self::request_shutdown) was called.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Set the flag by hand.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// The flag to hand to `WalkerConfig`, `StageConfig` and `RelocateConfig`.
    #[must_use]
    pub fn get_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.flag)
    }

    /// Clear the flag.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler.
///
/// Repeated calls return the already installed handler with its flag
/// cleared, so tests can drive the application several times per process.
/// If another component registered a handler first, an unhooked handler is
/// returned that only reacts to [`ShutdownHandler::request_shutdown`].
///
/// # Errors
///
/// Returns [`SignalError::InstallFailed`] if the OS refuses the handler.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let flag = handler.get_flag();

    let installed = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Finishing current file...");
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
    });

    match installed {
        Ok(()) => {
            let global = GLOBAL_HANDLER.get_or_init(|| handler.clone());
            Ok(global.clone())
        }
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C handler already registered, using unhooked handler");
            let global = GLOBAL_HANDLER.get_or_init(ShutdownHandler::new);
            global.reset();
            Ok(global.clone())
        }
        Err(e) => Err(SignalError::InstallFailed(e)),
    }
}
