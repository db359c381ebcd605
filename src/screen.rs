//! Capability of a screen that may display sensitive content.
//!
//! A screen only knows how to show and hide an overlay, how to navigate back
//! to its root and how to tell the user it is locked. Everything else lives
//! in [`BlurGuard`](crate::guard::BlurGuard), which owns the screen.

use std::time::Instant;

use crate::blur::{BlurFilter, BlurParams};
use crate::capture::{ScreenCapture, Snapshot};
use crate::error::{GuardError, Result};

/// Blurred snapshot currently covering a screen.
#[derive(Debug, Clone)]
pub struct BlurOverlay {
    image: Snapshot,
    installed_at: Instant,
}

impl BlurOverlay {
    pub fn new(image: Snapshot) -> Self {
        Self {
            image,
            installed_at: Instant::now(),
        }
    }

    pub fn image(&self) -> &Snapshot {
        &self.image
    }

    pub fn installed_at(&self) -> Instant {
        self.installed_at
    }
}

pub trait GuardedScreen {
    /// Stable name used in prompts and logs.
    fn name(&self) -> &str;

    /// Draw `image` over the whole screen, above any content.
    fn install_overlay(&mut self, image: &Snapshot);

    /// Remove the overlay installed last.
    fn remove_overlay(&mut self);

    /// Leave the sensitive screen (navigation stack back to its root).
    fn pop_to_root(&mut self);

    /// Every authentication method fell back; the screen stays covered.
    fn show_locked_out(&mut self) {}

    /// Capture the screen, blur the capture and install it as overlay.
    fn add_blurred_content(
        &mut self,
        capture: &dyn ScreenCapture<Self>,
        filter: &dyn BlurFilter,
        params: &BlurParams,
    ) -> Result<BlurOverlay>
    where
        Self: Sized,
    {
        let snapshot = capture
            .capture(self)
            .filter(|snapshot| !snapshot.is_empty())
            .ok_or_else(|| GuardError::CaptureFailed(format!("{} has no visible frame", self.name())))?;

        let blurred = filter.apply(&snapshot, params);
        self.install_overlay(&blurred);
        Ok(BlurOverlay::new(blurred))
    }
}
