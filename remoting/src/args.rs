//! Value records that cross the `ILeader`/`IFollower` boundary.
//!
//! These mirror `CommandlineArgs`, `WindowActivatedArgs`, `RenameRequestArgs`,
//! `FindTargetWindowArgs`, `SummonWindowSelectionArgs` and
//! `ProposeCommandlineResult` from the Remoting sources this crate is
//! built from; see `DESIGN.md` for the mapping.

use crate::peasant::PeasantId;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::time::Instant;

lazy_static! {
    /// Reference point for `ActivationTimestamp`. `Instant` itself cannot be
    /// serialized (it is not comparable across processes), so activation
    /// times are carried over the wire as nanoseconds since this
    /// process-local epoch; only relative ordering within a single `Monarch`
    /// ever matters.
    static ref EPOCH: Instant = Instant::now();
}

/// An opaque, monotonically ordered activation time.
///
/// Two activations with an equal timestamp are expected to be broken by
/// peasant id ascending wherever ordering matters (see
/// [`WindowActivatedArgs`]'s `Ord` impl).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActivationTimestamp(u64);

impl ActivationTimestamp {
    /// Capture "now" relative to the process-local epoch.
    pub fn now() -> Self {
        Self(EPOCH.elapsed().as_nanos() as u64)
    }
}

/// An opaque virtual-desktop identifier, as reported by the peasant at
/// activation time and later handed back to the [`crate::desktop::DesktopOracle`]
/// unexamined. The original source models this as a GUID; `u128` preserves
/// the same "128-bit opaque value" shape without pulling in a GUID type.
/// The all-zero value is a legitimate "no desktop support" sentinel: every
/// activation that never learns a real desktop id lands in the same MRU
/// bucket instead of being rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct DesktopId(pub u128);

/// An opaque native window handle, passed to the [`crate::desktop::DesktopOracle`]
/// and otherwise never interpreted by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct NativeHandle(pub u64);

/// The command line a new invocation was launched with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandlineArgs {
    pub args: Vec<String>,
    pub current_directory: String,
    pub std_input: Option<String>,
}

impl CommandlineArgs {
    pub fn new<I, S>(args: I, current_directory: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            current_directory: current_directory.into(),
            std_input: None,
        }
    }

    pub fn with_std_input(mut self, input: impl Into<String>) -> Self {
        self.std_input = Some(input.into());
        self
    }
}

/// A peasant reporting that its window was just activated (brought to the
/// foreground) by the user.
///
/// Ordered by `activated_time` descending for heap use (see
/// [`crate::mru`]); ties are broken by peasant id ascending so that
/// ordering is deterministic even when two activations land on the same
/// timestamp tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowActivatedArgs {
    pub peasant_id: PeasantId,
    pub hwnd: NativeHandle,
    pub desktop_id: DesktopId,
    pub activated_time: ActivationTimestamp,
}

impl WindowActivatedArgs {
    pub fn new(peasant_id: PeasantId, hwnd: NativeHandle, desktop_id: DesktopId) -> Self {
        Self {
            peasant_id,
            hwnd,
            desktop_id,
            activated_time: ActivationTimestamp::now(),
        }
    }
}

impl PartialOrd for WindowActivatedArgs {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WindowActivatedArgs {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.activated_time
            .cmp(&other.activated_time)
            .then_with(|| self.peasant_id.cmp(&other.peasant_id))
    }
}

/// Request to rename the sending peasant's window. `succeeded` is filled in
/// by the leader's rename handler before the record is handed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameRequestArgs {
    pub new_name: String,
    pub succeeded: bool,
}

impl RenameRequestArgs {
    pub fn new(new_name: impl Into<String>) -> Self {
        Self {
            new_name: new_name.into(),
            succeeded: false,
        }
    }
}

/// How a monitor should be chosen when summoning a window across monitors.
/// Carried over from the original `MonitorBehavior` enum; this crate does
/// not interpret it, it is opaque payload for the host's summon handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MonitorBehavior {
    #[default]
    ToCurrent,
    ToMouse,
    ToLastUsed,
}

/// Encapsulates how a summon should be carried out: which desktop/monitor
/// to move to, whether to animate a quake-style dropdown, and whether a
/// window that is already foreground should instead be hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummonWindowBehavior {
    pub move_to_current_desktop: bool,
    pub to_monitor: MonitorBehavior,
    pub dropdown_duration_ms: u32,
    pub toggle_visibility: bool,
}

impl Default for SummonWindowBehavior {
    fn default() -> Self {
        Self {
            move_to_current_desktop: true,
            to_monitor: MonitorBehavior::ToCurrent,
            dropdown_duration_ms: 0,
            toggle_visibility: true,
        }
    }
}

/// Arguments for `Monarch::summon_window`: either a named target, or "the
/// most recent window", optionally restricted to the current desktop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummonWindowSelectionArgs {
    pub window_name: Option<String>,
    pub on_current_desktop: bool,
    pub behavior: SummonWindowBehavior,
}

impl SummonWindowSelectionArgs {
    pub fn most_recent(on_current_desktop: bool) -> Self {
        Self {
            window_name: None,
            on_current_desktop,
            behavior: SummonWindowBehavior::default(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            window_name: Some(name.into()),
            on_current_desktop: false,
            behavior: SummonWindowBehavior::default(),
        }
    }
}

/// A tagged version of the sentinel integer `FindTargetWindowArgs::ResultTargetWindow`
/// encodes in the original source. `spec.md` §9 recommends exactly this
/// shape; the signed-integer encoding is kept only as a documented mapping
/// (see the `From`/`TryFrom` impls below) since this workspace has no
/// non-Rust resolver to support.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetWindow {
    /// An explicit peasant id the caller wants to target.
    Id(PeasantId),
    /// Force a new window regardless of existing ones.
    New,
    /// The most recent window on any desktop.
    Existing,
    /// The most recent window on the current desktop.
    CurrentDesktop,
    /// Select by name.
    Name(String),
    /// This invocation should produce no window at all.
    None,
}

/// Sentinel integers mirroring the original `ResultTargetWindow` encoding,
/// documented here rather than used on the wire: `>= 0` is an explicit id,
/// and the reserved negative values below stand in for the tagged variants
/// above.
pub mod sentinel {
    pub const USE_NEW: i64 = -1;
    pub const USE_EXISTING: i64 = -2;
    pub const USE_EXISTING_SAME_DESKTOP: i64 = -3;
    pub const USE_CURRENT: i64 = -3; // alias of USE_EXISTING_SAME_DESKTOP
    pub const USE_NAME: i64 = -4;
    pub const USE_NONE: i64 = -5;
}

/// Two-phase record: the monarch fills `commandline` and raises
/// `findTargetWindowRequested`; the single subscriber fills in `target`.
#[derive(Debug, Clone)]
pub struct FindTargetWindowArgs {
    pub commandline: CommandlineArgs,
    pub target: TargetWindow,
}

impl FindTargetWindowArgs {
    pub fn new(commandline: CommandlineArgs) -> Self {
        Self {
            commandline,
            // Absence of a subscriber is specified to behave like an
            // implicit `UseNew` response (spec.md §7, "Resolver-absent").
            target: TargetWindow::New,
        }
    }
}

/// The result of `Monarch::propose_commandline`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposeCommandlineResult {
    pub should_create_new_window: bool,
    pub requested_id: Option<PeasantId>,
    pub requested_name: String,
}

impl ProposeCommandlineResult {
    pub fn dispatched(name: String) -> Self {
        Self {
            should_create_new_window: false,
            requested_id: None,
            requested_name: name,
        }
    }

    pub fn create_new(id: Option<PeasantId>, name: String) -> Self {
        Self {
            should_create_new_window: true,
            requested_id: id,
            requested_name: name,
        }
    }

    pub fn none() -> Self {
        Self {
            should_create_new_window: false,
            requested_id: None,
            requested_name: String::new(),
        }
    }
}

/// Read-only snapshot of a registered peasant, used by "list all windows"
/// style host UI (identify-all confirmation, quake-window existence check).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeasantInfo {
    pub id: PeasantId,
    pub name: String,
    pub is_this_process: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn activation_ordering_ties_on_peasant_id() {
        let t = ActivationTimestamp::now();
        let a = WindowActivatedArgs {
            peasant_id: PeasantId::new(1),
            hwnd: NativeHandle(0),
            desktop_id: DesktopId::default(),
            activated_time: t,
        };
        let b = WindowActivatedArgs {
            peasant_id: PeasantId::new(2),
            hwnd: NativeHandle(0),
            desktop_id: DesktopId::default(),
            activated_time: t,
        };
        assert!(b > a);
    }

    #[test]
    fn propose_result_constructors() {
        let dispatched = ProposeCommandlineResult::dispatched("two".into());
        assert!(!dispatched.should_create_new_window);
        assert_eq!(dispatched.requested_id, None);

        let created = ProposeCommandlineResult::create_new(Some(PeasantId::new(17)), "".into());
        assert!(created.should_create_new_window);
        assert_eq!(created.requested_id, Some(PeasantId::new(17)));
    }
}
