//! The desktop oracle: a single operation answering "is this window
//! currently on the active virtual desktop?". The core never interprets
//! the native handle it is given; it only ever passes through whatever a
//! peasant reported at activation time.
//!
//! On Windows this would be backed by
//! `IVirtualDesktopManager::IsWindowOnCurrentVirtualDesktop`; this crate
//! treats it as wholly opaque, the same way `mux::pane::Pane` is a trait
//! object the mux core never downcasts.

use crate::args::NativeHandle;

pub trait DesktopOracle: Send + Sync {
    /// Must be callable from the leader's thread without blocking on the
    /// UI of any peasant. Implementations that cannot determine the
    /// answer (stale handle, OS call errored) must return `false` rather
    /// than propagating an error — spec.md §4.2 specifies failure as
    /// `false`, not an error outcome.
    fn is_window_on_current_desktop(&self, hwnd: NativeHandle) -> bool;
}

/// An oracle for hosts that never enable desktop partitioning: every
/// window is reported as being on the current desktop, so MRU selection
/// degrades to plain recency with no desktop filtering.
pub struct NullDesktopOracle;

impl DesktopOracle for NullDesktopOracle {
    fn is_window_on_current_desktop(&self, _hwnd: NativeHandle) -> bool {
        true
    }
}

/// A test double with an explicit allow-set, grounded on the
/// `FakePane`/`FakeDomain` trait-object stand-ins the teacher's test
/// modules build.
#[cfg(any(test, feature = "test-support"))]
pub struct StubDesktopOracle {
    on_current: std::collections::HashSet<u64>,
}

#[cfg(any(test, feature = "test-support"))]
impl StubDesktopOracle {
    pub fn new() -> Self {
        Self {
            on_current: std::collections::HashSet::new(),
        }
    }

    pub fn mark_current(&mut self, hwnd: NativeHandle) {
        self.on_current.insert(hwnd.0);
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for StubDesktopOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl DesktopOracle for StubDesktopOracle {
    fn is_window_on_current_desktop(&self, hwnd: NativeHandle) -> bool {
        self.on_current.contains(&hwnd.0)
    }
}
