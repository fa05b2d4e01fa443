//! Single-instance window coordination: leader election among mutually
//! unaware processes, a shared registry of per-process "peasant" state that
//! survives leader death, most-recently-used window ordering partitioned by
//! virtual desktop, name uniqueness across the federation, and dispatch of
//! command lines to a caller-supplied target resolver.
//!
//! A process constructs exactly one [`window_manager::WindowManager`]. That
//! type performs election, owns the local [`peasant::Peasant`], and exposes
//! [`window_manager::WindowManager::propose_commandline`] as the entry point
//! a host calls once per invocation. Everything else in this crate —
//! [`monarch::Monarch`], the [`mru`] structure, the [`transport`]/[`wire`]
//! plumbing, [`class_registry`] — exists to make that one call correct
//! across process crashes.

pub mod args;
pub mod class_registry;
pub mod desktop;
pub mod error;
pub mod monarch;
pub mod mru;
pub mod peasant;
pub mod rpc;
pub mod transport;
pub mod wire;
pub mod window_manager;

pub use args::{
    CommandlineArgs, FindTargetWindowArgs, ProposeCommandlineResult, RenameRequestArgs,
    SummonWindowBehavior, SummonWindowSelectionArgs, TargetWindow, WindowActivatedArgs,
};
pub use desktop::DesktopOracle;
pub use error::{RemotingError, Result};
pub use monarch::Monarch;
pub use peasant::{Peasant, PeasantId};
pub use window_manager::WindowManager;
