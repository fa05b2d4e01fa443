//! The per-invocation local object. A `Peasant` exists in every process,
//! including the leader's own process; policy lives in [`crate::monarch`],
//! the peasant is a dumb carrier of local state plus locally-raised
//! notifications, the way `original_source/.../Peasant.cpp` describes it.

use crate::args::{CommandlineArgs, RenameRequestArgs, SummonWindowBehavior, WindowActivatedArgs};
use crate::error::Result;
use crate::rpc::IFollower;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Positive integer identity assigned by the current leader on
/// registration. Zero is the reserved "unassigned / not found" sentinel;
/// see [`PeasantId::NONE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeasantId(u64);

impl PeasantId {
    pub const NONE: PeasantId = PeasantId(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for PeasantId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events a peasant raises locally for its hosting window to observe.
/// Stands in for the WinRT events `executeCommandlineRequested`,
/// `summonRequested`, `displayWindowIdRequested` and
/// `identifyWindowsRequested` name individually in the original source:
/// Rust has no WinRT event type to borrow, so these are delivered through
/// the same subscribe/notify pattern `mux::Mux` uses for `MuxNotification`.
#[derive(Debug, Clone)]
pub enum PeasantNotification {
    ExecuteCommandlineRequested(CommandlineArgs),
    SummonRequested(SummonWindowBehavior),
    DisplayWindowIdRequested,
    RenameRequested(RenameRequestArgs),
    Quit,
}

static SUB_ID: AtomicUsize = AtomicUsize::new(0);

type Subscriber = Box<dyn Fn(PeasantNotification) -> bool + Send + Sync>;

/// The local, per-process carrier of a window's identity and initial
/// command line. Every operation a leader can invoke on a remote peasant is
/// a plain method here; the cross-process plumbing lives in
/// [`crate::transport`] and is invisible to this type.
pub struct Peasant {
    id: RwLock<PeasantId>,
    pid: u32,
    name: RwLock<String>,
    initial_args: Mutex<Option<CommandlineArgs>>,
    last_activated: Mutex<Option<WindowActivatedArgs>>,
    subscribers: RwLock<std::collections::HashMap<usize, Subscriber>>,
}

impl Peasant {
    /// Construct a not-yet-registered peasant for this process. `name` may
    /// be empty ("anonymous").
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: RwLock::new(PeasantId::NONE),
            pid: std::process::id(),
            name: RwLock::new(name.into()),
            initial_args: Mutex::new(None),
            last_activated: Mutex::new(None),
            subscribers: RwLock::new(std::collections::HashMap::new()),
        })
    }

    /// Stores the id; called at most once per peasant, by whichever
    /// `Monarch` first registers it.
    pub fn assign_id(&self, id: PeasantId) {
        *self.id.write() = id;
    }

    pub fn get_id(&self) -> PeasantId {
        *self.id.read()
    }

    pub fn get_pid(&self) -> u32 {
        self.pid
    }

    pub fn get_window_name(&self) -> String {
        self.name.read().clone()
    }

    /// Stores the first-seen args as "initial" if not yet set, and raises
    /// `ExecuteCommandlineRequested` so the hosting window can act on it.
    /// Returns `true` unconditionally (the original records no failure
    /// path here; the boolean return exists purely so adoption-of-args
    /// ordering can be asserted in tests).
    pub fn execute_commandline(&self, args: CommandlineArgs) -> bool {
        let mut initial = self.initial_args.lock();
        if initial.is_none() {
            *initial = Some(args.clone());
        }
        drop(initial);
        self.notify(PeasantNotification::ExecuteCommandlineRequested(args));
        true
    }

    pub fn initial_args(&self) -> Option<CommandlineArgs> {
        self.initial_args.lock().clone()
    }

    /// Stores as `last_activated`, then invokes `report_to_leader` so the
    /// caller (the owning `WindowManager`, which is the thing that knows
    /// which process is currently leader) can forward the activation to
    /// the current leader. The leader may be unreachable if it just died;
    /// that failure is the caller's to swallow, not this type's — a dumb
    /// carrier has no policy about which errors are benign.
    pub fn activate_window(&self, args: WindowActivatedArgs, report_to_leader: impl FnOnce(WindowActivatedArgs)) {
        *self.last_activated.lock() = Some(args);
        report_to_leader(args);
    }

    pub fn get_last_activated_args(&self) -> Option<WindowActivatedArgs> {
        *self.last_activated.lock()
    }

    pub fn summon(&self, behavior: SummonWindowBehavior) {
        self.notify(PeasantNotification::SummonRequested(behavior));
    }

    /// Forwards an "identify all windows" request to the current leader;
    /// carries no local effect of its own (the requesting window is
    /// identified in turn, like every other peasant, when the leader's
    /// identify-all handler calls `display_window_id` back on it).
    pub fn request_identify_windows(&self, ask_leader: impl FnOnce()) {
        ask_leader();
    }

    pub fn display_window_id(&self) {
        self.notify(PeasantNotification::DisplayWindowIdRequested);
    }

    /// Asks the current leader whether `args.new_name` may be taken (via
    /// `ask_leader`, which fills in `succeeded`); on success the peasant
    /// adopts the new name locally and the host is notified either way.
    pub fn request_rename(&self, mut args: RenameRequestArgs, ask_leader: impl FnOnce(&mut RenameRequestArgs)) {
        ask_leader(&mut args);
        if args.succeeded {
            *self.name.write() = args.new_name.clone();
        }
        self.notify(PeasantNotification::RenameRequested(args));
    }

    pub fn quit(&self) {
        self.notify(PeasantNotification::Quit);
    }

    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(PeasantNotification) -> bool + Send + Sync + 'static,
    {
        let id = SUB_ID.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().insert(id, Box::new(subscriber));
    }

    fn notify(&self, notification: PeasantNotification) {
        let mut subs = self.subscribers.write();
        subs.retain(|_, f| f(notification.clone()));
    }
}

/// A local `Peasant` is always a valid `IFollower`: every method is
/// infallible locally, so this impl exists mainly so that `Monarch` can
/// hold `Arc<dyn IFollower>` uniformly regardless of whether the peasant
/// behind it is local or (via `crate::transport::RemoteFollower`) remote.
impl IFollower for Peasant {
    fn assign_id(&self, id: PeasantId) -> Result<()> {
        self.assign_id(id);
        Ok(())
    }

    fn get_id(&self) -> Result<PeasantId> {
        Ok(self.get_id())
    }

    fn get_pid(&self) -> Result<u32> {
        Ok(self.get_pid())
    }

    fn get_window_name(&self) -> Result<String> {
        Ok(self.get_window_name())
    }

    fn execute_commandline(&self, args: CommandlineArgs) -> Result<bool> {
        Ok(self.execute_commandline(args))
    }

    fn summon(&self, behavior: SummonWindowBehavior) -> Result<()> {
        self.summon(behavior);
        Ok(())
    }

    fn display_window_id(&self) -> Result<()> {
        self.display_window_id();
        Ok(())
    }

    fn quit(&self) -> Result<()> {
        self.quit();
        Ok(())
    }

    fn get_last_activated_args(&self) -> Result<Option<WindowActivatedArgs>> {
        Ok(self.get_last_activated_args())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::args::NativeHandle;

    #[test]
    fn first_executed_commandline_is_sticky_initial() {
        let p = Peasant::new("");
        p.execute_commandline(CommandlineArgs::new(["a"], "/tmp"));
        p.execute_commandline(CommandlineArgs::new(["b"], "/tmp"));
        assert_eq!(p.initial_args().unwrap().args, vec!["a".to_string()]);
    }

    #[test]
    fn rename_failure_leaves_previous_name() {
        let p = Peasant::new("original");
        p.request_rename(RenameRequestArgs::new("new"), |args| args.succeeded = false);
        assert_eq!(p.get_window_name(), "original");
    }

    #[test]
    fn rename_success_updates_name() {
        let p = Peasant::new("original");
        p.request_rename(RenameRequestArgs::new("new"), |args| args.succeeded = true);
        assert_eq!(p.get_window_name(), "new");
    }

    #[test]
    fn activation_is_observable_via_last_activated() {
        let p = Peasant::new("");
        p.assign_id(PeasantId::new(1));
        let args = WindowActivatedArgs::new(p.get_id(), NativeHandle(42), Default::default());
        p.activate_window(args, |_| {});
        assert_eq!(p.get_last_activated_args(), Some(args));
    }
}
