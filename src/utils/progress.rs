//! Progress rendering for batch installations.
//!
//! Each worker gets its own [`RenderSlot`], a line in an indicatif
//! `MultiProgress` display, handed out before the worker starts, so
//! concurrent in-place updates never collide. When progress is disabled
//! (quiet mode, `--no-progress`, or a non-TTY), slots are simply not
//! created and the installer writes nothing.
//!
//! indicatif draws on stderr, which keeps stdout clean for the shell
//! integration's `eval` consumption.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pantry_cli::utils::progress::InstallProgress;
//!
//! let progress = InstallProgress::new(true);
//! if let Some(slot) = progress.slot("node@22.1.0") {
//!     slot.update("node@22.1.0 fetching…");
//!     // ... do work ...
//!     slot.finish("✓ node@22.1.0 (fetched)");
//! }
//! progress.clear();
//! ```

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress display for one installation batch.
#[derive(Clone)]
pub struct InstallProgress {
    multi: MultiProgress,
    enabled: bool,
}

impl InstallProgress {
    /// Create a progress display; when `enabled` is false no bars are
    /// ever rendered.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self { multi: MultiProgress::new(), enabled }
    }

    /// Whether rendering is active.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Allocate a rendering slot for one package.
    ///
    /// Returns `None` when rendering is disabled; callers thread the
    /// `Option` through so a disabled display costs nothing per update.
    /// The slot's screen line is fixed at allocation time, which is what
    /// lets workers render concurrently without colliding.
    #[must_use]
    pub fn slot(&self, label: &str) -> Option<RenderSlot> {
        if !self.enabled {
            return None;
        }
        let bar = self.multi.add(ProgressBar::new_spinner());
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner} {msg}")
            .unwrap();
        bar.set_style(style);
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Some(RenderSlot { bar })
    }

    /// Tear down all bars, leaving the terminal clean.
    pub fn clear(&self) {
        self.multi.clear().ok();
    }
}

/// One worker's in-place status line.
///
/// Opaque to the installer beyond `update`/`finish`; cloning shares the
/// underlying bar.
#[derive(Clone)]
pub struct RenderSlot {
    bar: ProgressBar,
}

impl RenderSlot {
    /// Replace the slot's status text.
    pub fn update(&self, message: impl Into<String>) {
        self.bar.set_message(message.into());
    }

    /// Finish the slot, leaving a final static line.
    pub fn finish(&self, message: impl Into<String>) {
        self.bar.disable_steady_tick();
        self.bar.finish_with_message(message.into());
    }
}
