//! `ILeader` and `IFollower`: the two interfaces that must be callable
//! across a process boundary (spec.md §6, "External interfaces").
//!
//! [`Monarch`](crate::monarch::Monarch) implements `ILeader` directly;
//! [`Peasant`](crate::peasant::Peasant) implements `IFollower` directly.
//! [`crate::transport`] provides `RemoteLeader`/`RemoteFollower`
//! implementations of the same traits that forward every call across a
//! `wezterm-uds` connection, so that `Monarch`/`WindowManager` code never
//! needs to know whether the peer it is talking to is local or remote —
//! exactly the shape `mux::domain::Domain` gives local/ssh/tmux domains in
//! the teacher crate.

use crate::args::{
    CommandlineArgs, PeasantInfo, ProposeCommandlineResult, RenameRequestArgs,
    SummonWindowBehavior, SummonWindowSelectionArgs, WindowActivatedArgs,
};
use crate::error::Result;
use crate::peasant::PeasantId;

/// Methods the current leader invokes on a registered peasant.
pub trait IFollower: Send + Sync {
    fn assign_id(&self, id: PeasantId) -> Result<()>;
    fn get_id(&self) -> Result<PeasantId>;
    fn get_pid(&self) -> Result<u32>;
    fn get_window_name(&self) -> Result<String>;
    fn execute_commandline(&self, args: CommandlineArgs) -> Result<bool>;
    fn summon(&self, behavior: SummonWindowBehavior) -> Result<()>;
    fn display_window_id(&self) -> Result<()>;
    fn quit(&self) -> Result<()>;
    fn get_last_activated_args(&self) -> Result<Option<WindowActivatedArgs>>;
}

/// Methods any peasant (including the leader's own local one) invokes on
/// whichever process currently holds the leader role.
pub trait ILeader: Send + Sync {
    fn get_number_of_peasants(&self) -> Result<u64>;
    fn propose_commandline(&self, args: CommandlineArgs) -> Result<ProposeCommandlineResult>;
    fn handle_activate_peasant(&self, args: WindowActivatedArgs) -> Result<()>;
    fn summon_window(&self, args: SummonWindowSelectionArgs) -> Result<bool>;
    fn request_identify_windows(&self) -> Result<()>;
    fn rename_request(&self, sender_id: PeasantId, args: RenameRequestArgs) -> Result<RenameRequestArgs>;
    fn does_quake_window_exist(&self) -> Result<bool>;
    fn quit_all(&self) -> Result<()>;
    fn peasant_infos(&self, requesting_pid: u32) -> Result<Vec<PeasantInfo>>;
    fn summon_all_windows(&self, behavior: SummonWindowBehavior) -> Result<()>;
}
