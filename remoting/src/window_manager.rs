//! Per-process façade: performs leader election, owns the local peasant,
//! proposes command lines, and runs the succession watcher. This is the
//! one type a host application actually constructs; everything else in
//! this crate is plumbing `WindowManager` wires together.

use crate::args::{CommandlineArgs, ProposeCommandlineResult, SummonWindowBehavior, WindowActivatedArgs};
use crate::class_registry::{self, BuildKind};
use crate::desktop::DesktopOracle;
use crate::error::RemotingError;
use crate::monarch::Monarch;
use crate::peasant::{Peasant, PeasantId};
use crate::rpc::{IFollower, ILeader};
use crate::transport::{self, RemoteLeader};
use parking_lot::{Condvar, Mutex, RwLock};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wezterm_uds::UnixListener;

/// Consecutive failed attempts to reach a leader before giving up and
/// running isolated for this process.
const MAX_LEADER_ATTEMPTS: u32 = 10;

/// How often the succession watcher polls the current leader's liveness.
/// There is no OS-level "process exit handle" available through a plain
/// Unix domain socket, so liveness is probed the same way `get_peasant`
/// probes a follower: a cheap round-trip call that fails the moment the
/// peer's process is gone.
const WATCH_POLL_INTERVAL: Duration = Duration::from_millis(500);

fn leader_socket_path(class_id: uuid::Uuid) -> PathBuf {
    class_registry::runtime_dir().join(format!("remoting-leader-{class_id}.sock"))
}

fn follower_socket_path(pid: u32) -> PathBuf {
    class_registry::runtime_dir().join(format!("remoting-peasant-{pid}.sock"))
}

/// Attempt to attach to the current leader; failing that, attempt to
/// become the leader (retrying once); failing that, fall back to isolated
/// mode. Mirrors `WindowManager`'s construction steps 2-3.
fn elect_or_attach(class_id: uuid::Uuid, desktop_oracle: Arc<dyn DesktopOracle>) -> Role {
    for _ in 0..2 {
        if let Some(remote) = try_attach(class_id) {
            return Role::Follower { leader: Arc::new(remote) };
        }
        if let Some(role) = try_become_leader(class_id, Arc::clone(&desktop_oracle)) {
            return role;
        }
    }
    log::warn!("exhausted leader election attempts for class {class_id}; running isolated");
    Role::Isolated { monarch: Monarch::new(desktop_oracle) }
}

fn try_attach(class_id: uuid::Uuid) -> Option<Arc<RemoteLeader>> {
    let path = class_registry::resolve_leader_path(class_id).ok()?;
    RemoteLeader::connect(&path.to_string_lossy()).ok().map(Arc::new)
}

fn try_become_leader(class_id: uuid::Uuid, desktop_oracle: Arc<dyn DesktopOracle>) -> Option<Role> {
    let path = leader_socket_path(class_id);
    // A listener left behind by a leader that crashed without revoking its
    // registration would otherwise make every subsequent bind fail; remove
    // it before contesting the path. A live leader's bind still wins any
    // genuine race because the loser's own bind attempt fails against a
    // freshly-created socket file.
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path).ok()?;
    if class_registry::publish_leader_path(&path, class_id).is_err() {
        return None;
    }
    let monarch = Monarch::new(desktop_oracle);
    std::thread::spawn({
        let monarch = Arc::clone(&monarch);
        move || transport::serve_leader(listener, monarch)
    });
    Some(Role::Leader { monarch })
}

enum Role {
    Leader { monarch: Arc<Monarch> },
    Follower { leader: Arc<RemoteLeader> },
    Isolated { monarch: Arc<Monarch> },
}

impl Role {
    fn as_ileader(&self) -> Arc<dyn ILeader> {
        match self {
            Role::Leader { monarch } | Role::Isolated { monarch } => Arc::clone(monarch) as Arc<dyn ILeader>,
            Role::Follower { leader } => Arc::clone(leader) as Arc<dyn ILeader>,
        }
    }

    fn local_monarch(&self) -> Option<Arc<Monarch>> {
        match self {
            Role::Leader { monarch } | Role::Isolated { monarch } => Some(Arc::clone(monarch)),
            Role::Follower { .. } => None,
        }
    }

    fn remote_leader(&self) -> Option<Arc<RemoteLeader>> {
        match self {
            Role::Follower { leader } => Some(Arc::clone(leader)),
            _ => None,
        }
    }

    fn is_leader(&self) -> bool {
        !matches!(self, Role::Follower { .. })
    }
}

pub struct WindowManager {
    class_id: uuid::Uuid,
    desktop_oracle: Arc<dyn DesktopOracle>,
    peasant: Arc<Peasant>,
    follower_endpoint: String,
    leader: RwLock<Arc<dyn ILeader>>,
    local_monarch: RwLock<Option<Arc<Monarch>>>,
    remote_leader: RwLock<Option<Arc<RemoteLeader>>>,
    is_leader: AtomicBool,
    cancel: Arc<(Mutex<bool>, Condvar)>,
}

impl WindowManager {
    pub fn new(name: impl Into<String>, desktop_oracle: Arc<dyn DesktopOracle>) -> Arc<Self> {
        let class_id = BuildKind::current().class_id();
        let peasant = Peasant::new(name);

        let follower_path = follower_socket_path(peasant.get_pid());
        let _ = std::fs::remove_file(&follower_path);
        let follower_endpoint = match UnixListener::bind(&follower_path) {
            Ok(listener) => {
                std::thread::spawn({
                    let peasant = Arc::clone(&peasant);
                    move || transport::serve_follower(listener, peasant)
                });
                follower_path.to_string_lossy().into_owned()
            }
            Err(e) => {
                log::warn!("could not bind local peasant listener, running without remote reachability: {e}");
                String::new()
            }
        };

        let role = elect_or_attach(class_id, Arc::clone(&desktop_oracle));
        let is_leader = role.is_leader();
        let wm = Arc::new(Self {
            class_id,
            desktop_oracle,
            peasant,
            follower_endpoint,
            leader: RwLock::new(role.as_ileader()),
            local_monarch: RwLock::new(role.local_monarch()),
            remote_leader: RwLock::new(role.remote_leader()),
            is_leader: AtomicBool::new(is_leader),
            cancel: Arc::new((Mutex::new(false), Condvar::new())),
        });

        wm.register_at_construction();
        wm.spawn_succession_watcher();
        wm
    }

    pub fn peasant(&self) -> &Arc<Peasant> {
        &self.peasant
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }

    /// Registers a `findTargetWindowRequested` handler on the local leader
    /// instance. Only meaningful for a process that holds (or ends up
    /// holding, via succession) the leader role; a follower process has no
    /// handler to set, since resolution always happens on whichever
    /// process is currently leader.
    pub fn set_find_target_window_handler<F>(&self, handler: F)
    where
        F: Fn(&mut crate::args::FindTargetWindowArgs) + Send + Sync + 'static,
    {
        if let Some(monarch) = self.local_monarch.read().as_ref() {
            monarch.set_find_target_window_handler(handler);
        }
    }

    /// Propose this process's command line. `create_window` is invoked
    /// exactly when the result says a new window should be created; it is
    /// the host's hook for actually building one before this invocation's
    /// args get delivered to it via `executeCommandline`.
    pub fn propose_commandline(
        &self,
        args: CommandlineArgs,
        mut create_window: impl FnMut(Option<PeasantId>, &str),
    ) -> ProposeCommandlineResult {
        let mut attempts = 0;
        loop {
            let leader = Arc::clone(&*self.leader.read());
            match leader.propose_commandline(args.clone()) {
                Ok(result) => {
                    self.apply_propose_result(&result, args, &mut create_window);
                    return result;
                }
                Err(_) => {
                    attempts += 1;
                    if attempts >= MAX_LEADER_ATTEMPTS {
                        log::warn!("exhausted {MAX_LEADER_ATTEMPTS} attempts contacting a leader; falling back to isolated mode");
                        self.fall_back_to_isolated();
                        let result = ProposeCommandlineResult::create_new(None, String::new());
                        self.apply_propose_result(&result, args, &mut create_window);
                        return result;
                    }
                    self.rediscover_leader();
                }
            }
        }
    }

    /// The second half of `propose_commandline`: build the window if
    /// asked, then register (or re-register, with whatever id the leader
    /// hinted at) and deliver this invocation's own args locally, the way
    /// §4.5's "apply the result" step describes.
    fn apply_propose_result(
        &self,
        result: &ProposeCommandlineResult,
        args: CommandlineArgs,
        create_window: &mut impl FnMut(Option<PeasantId>, &str),
    ) {
        if !result.should_create_new_window {
            return;
        }
        create_window(result.requested_id, &result.requested_name);
        if let Some(id) = result.requested_id {
            self.peasant.assign_id(id);
        }
        let _ = self.register_with_current_leader();
        self.peasant.execute_commandline(args);
    }

    /// Register the local peasant with whichever process currently holds
    /// the leader role, whether that is this process (in-process call) or
    /// remote (over `follower_endpoint`). A peasant that already carries
    /// an id (re-registering after succession, or because a prior
    /// `propose_commandline` handed it a reserved id) keeps it; see
    /// `Monarch::add_peasant`. Fails with `PeerUnavailable` if the current
    /// leader (local or remote) would not accept the registration.
    fn register_with_current_leader(&self) -> crate::error::Result<()> {
        if self.is_leader.load(Ordering::SeqCst) {
            if let Some(monarch) = self.local_monarch.read().as_ref() {
                let id = monarch.add_peasant(Arc::clone(&self.peasant) as Arc<dyn IFollower>, self.peasant.get_pid());
                if id.is_none() {
                    return Err(RemotingError::PeerUnavailable);
                }
            }
            return Ok(());
        }
        if let Some(remote) = self.remote_leader.read().as_ref() {
            let name = self.peasant.get_window_name();
            remote.add_peasant(&self.follower_endpoint, &name, self.peasant.get_pid())?;
        }
        Ok(())
    }

    /// Construction step 4 (spec.md §4.5): register the freshly built local
    /// peasant with whichever leader `elect_or_attach` found, looping back
    /// to re-election if that leader turns out to be unreachable, the same
    /// retry discipline `propose_commandline` uses. Without this, a window
    /// is invisible to `UseExisting`/`UseName`/summon resolution against it
    /// until its host happens to call `propose_commandline` itself.
    fn register_at_construction(&self) {
        let mut attempts = 0;
        loop {
            if self.register_with_current_leader().is_ok() {
                return;
            }
            attempts += 1;
            if attempts >= MAX_LEADER_ATTEMPTS {
                log::warn!("exhausted {MAX_LEADER_ATTEMPTS} attempts registering with a leader at construction; falling back to isolated mode");
                self.fall_back_to_isolated();
                let _ = self.register_with_current_leader();
                return;
            }
            self.rediscover_leader();
        }
    }

    /// Report this process's last-known activation to the current leader,
    /// swallowing a dead leader silently; the watcher will notice and
    /// re-elect.
    pub fn report_activation(&self, args: WindowActivatedArgs) {
        let leader = Arc::clone(&*self.leader.read());
        let _ = leader.handle_activate_peasant(args);
    }

    fn rediscover_leader(&self) {
        let role = elect_or_attach(self.class_id, Arc::clone(&self.desktop_oracle));
        self.apply_role(role);
    }

    fn fall_back_to_isolated(&self) {
        self.apply_role(Role::Isolated { monarch: Monarch::new(Arc::clone(&self.desktop_oracle)) });
    }

    fn apply_role(&self, role: Role) {
        let is_leader = role.is_leader();
        *self.leader.write() = role.as_ileader();
        *self.local_monarch.write() = role.local_monarch();
        *self.remote_leader.write() = role.remote_leader();
        self.is_leader.store(is_leader, Ordering::SeqCst);
    }

    fn spawn_succession_watcher(self: &Arc<Self>) {
        let wm = Arc::clone(self);
        std::thread::spawn(move || wm.run_succession_watcher());
    }

    /// Waits on either the cancellation condvar or the poll interval,
    /// probing the current leader's liveness each time it wakes from a
    /// timeout. On a dead leader it re-elects and, if a new window manager
    /// ends up the new leader's peer, reports this process's last
    /// activation so the new leader's MRU picks it back up; if this
    /// process itself becomes the new leader, nothing further is required
    /// here; other surviving peasants' own watchers will re-register with
    /// it as they notice the same death.
    fn run_succession_watcher(self: Arc<Self>) {
        let (lock, cvar) = &*self.cancel;
        loop {
            let mut cancelled = lock.lock();
            let timed_out = cvar.wait_for(&mut cancelled, WATCH_POLL_INTERVAL).timed_out();
            if *cancelled {
                return;
            }
            drop(cancelled);
            if !timed_out {
                continue;
            }

            if self.is_leader.load(Ordering::SeqCst) {
                continue;
            }

            let leader = Arc::clone(&*self.leader.read());
            if leader.get_number_of_peasants().is_ok() {
                continue;
            }

            log::info!("current leader is unreachable; re-electing");
            self.rediscover_leader();
            // Whether this process became the new leader or attached to one
            // elsewhere, the new leader's registry starts out without this
            // peasant in it: re-register first...
            let _ = self.register_with_current_leader();
            // ...then report whatever activation we last saw locally, so the
            // new leader's MRU recovers this peasant's most-recent entry
            // (spec.md §9: "peasants re-report their last activation during
            // adoption").
            if let Some(last) = self.peasant.get_last_activated_args() {
                self.report_activation(last);
            }
        }
    }

    pub fn shutdown(&self) {
        {
            let (lock, cvar) = &*self.cancel;
            *lock.lock() = true;
            cvar.notify_all();
        }
        if self.is_leader.load(Ordering::SeqCst) {
            class_registry::revoke_leader_path(self.class_id);
        }
    }
}

impl Drop for WindowManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A `RemotingError::RegistrationFailed` is only ever surfaced if both the
/// leader-socket bind and the local peasant-socket bind fail on the very
/// first construction attempt; downstream code treats an isolated
/// `WindowManager` identically to a networked one, so this type exists
/// only to give `try_become_leader`'s io::Error a typed home if a future
/// caller wants to inspect why election failed.
#[allow(dead_code)]
fn registration_error(e: std::io::Error) -> RemotingError {
    RemotingError::RegistrationFailed(e)
}
