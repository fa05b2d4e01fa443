//! Cross-process `ILeader`/`IFollower` over `wezterm-uds`: a blocking,
//! synchronous request/response transport, grounded on how
//! `wezterm-mux-server-impl::sessionhandler` serves one client connection
//! per accepted stream and how `wezterm-client` dials out to it, with the
//! async executor dropped since every call here is a short, bounded
//! round-trip rather than a long-lived streaming session.

use crate::args::{
    CommandlineArgs, PeasantInfo, ProposeCommandlineResult, RenameRequestArgs, SummonWindowBehavior,
    SummonWindowSelectionArgs, WindowActivatedArgs,
};
use crate::error::{RemotingError, Result};
use crate::monarch::Monarch;
use crate::peasant::{Peasant, PeasantId};
use crate::rpc::{IFollower, ILeader};
use crate::wire::{recv_request, recv_response, send_request, send_response, Request, Response};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use wezterm_uds::{UnixListener, UnixStream};

/// A connected, serialized request/response channel to one remote peer.
/// Every public call here takes `&self` and blocks for the duration of one
/// round trip; concurrent callers queue on `stream`'s lock rather than
/// interleaving frames on the wire.
struct Channel {
    stream: Mutex<UnixStream>,
    next_serial: AtomicU64,
}

impl Channel {
    fn connect(path: &str) -> Result<Self> {
        let stream = UnixStream::connect(path).map_err(|_| RemotingError::PeerUnavailable)?;
        Ok(Self {
            stream: Mutex::new(stream),
            next_serial: AtomicU64::new(1),
        })
    }

    fn call(&self, req: Request) -> Result<Response> {
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let mut stream = self.stream.lock();
        send_request(&mut *stream, serial, &req)?;
        recv_response(&mut *stream, serial)
    }
}

/// An `IFollower` reached by dialing a peasant's own listening socket.
/// [`Monarch`] stores one of these per remote registrant so that the rest
/// of the leader's code never has to know a given peasant isn't local.
pub struct RemoteFollower {
    channel: Channel,
}

impl RemoteFollower {
    pub fn connect(endpoint: &str) -> Result<Self> {
        Ok(Self {
            channel: Channel::connect(endpoint)?,
        })
    }
}

fn unwrap_response<T>(resp: Response, extract: impl FnOnce(Response) -> Option<T>) -> Result<T> {
    if let Response::Err(msg) = resp {
        return Err(match msg.as_str() {
            "name_collision" => RemotingError::NameCollision { name: String::new() },
            "resolver_absent" => RemotingError::ResolverAbsent,
            _ => RemotingError::PeerUnavailable,
        });
    }
    extract(resp).ok_or(RemotingError::PeerUnavailable)
}

impl IFollower for RemoteFollower {
    fn assign_id(&self, id: PeasantId) -> Result<()> {
        let resp = self.channel.call(Request::AssignId(id))?;
        unwrap_response(resp, |r| matches!(r, Response::Unit).then_some(()))
    }

    fn get_id(&self) -> Result<PeasantId> {
        let resp = self.channel.call(Request::GetId)?;
        unwrap_response(resp, |r| match r {
            Response::PeasantId(id) => Some(id),
            _ => None,
        })
    }

    fn get_pid(&self) -> Result<u32> {
        let resp = self.channel.call(Request::GetPid)?;
        unwrap_response(resp, |r| match r {
            Response::U32(pid) => Some(pid),
            _ => None,
        })
    }

    fn get_window_name(&self) -> Result<String> {
        let resp = self.channel.call(Request::GetWindowName)?;
        unwrap_response(resp, |r| match r {
            Response::String(s) => Some(s),
            _ => None,
        })
    }

    fn execute_commandline(&self, args: CommandlineArgs) -> Result<bool> {
        let resp = self.channel.call(Request::ExecuteCommandline(args))?;
        unwrap_response(resp, |r| match r {
            Response::Bool(b) => Some(b),
            _ => None,
        })
    }

    fn summon(&self, behavior: SummonWindowBehavior) -> Result<()> {
        let resp = self.channel.call(Request::Summon(behavior))?;
        unwrap_response(resp, |r| matches!(r, Response::Unit).then_some(()))
    }

    fn display_window_id(&self) -> Result<()> {
        let resp = self.channel.call(Request::DisplayWindowId)?;
        unwrap_response(resp, |r| matches!(r, Response::Unit).then_some(()))
    }

    fn quit(&self) -> Result<()> {
        let resp = self.channel.call(Request::Quit)?;
        unwrap_response(resp, |r| matches!(r, Response::Unit).then_some(()))
    }

    fn get_last_activated_args(&self) -> Result<Option<WindowActivatedArgs>> {
        let resp = self.channel.call(Request::GetLastActivatedArgs)?;
        unwrap_response(resp, |r| match r {
            Response::OptWindowActivatedArgs(a) => Some(a),
            _ => None,
        })
    }
}

/// An `ILeader` reached by dialing the current leader's published socket.
pub struct RemoteLeader {
    channel: Channel,
}

impl RemoteLeader {
    pub fn connect(endpoint: &str) -> Result<Self> {
        Ok(Self {
            channel: Channel::connect(endpoint)?,
        })
    }

    /// Register a local peasant with the remote leader. `listen_endpoint`
    /// is where this process's own [`serve_follower`] is accepting
    /// connections, so that the leader can call back into it as an
    /// `IFollower`.
    pub fn add_peasant(&self, listen_endpoint: &str, initial_name: &str, pid: u32) -> Result<PeasantId> {
        let resp = self.channel.call(Request::AddPeasant {
            endpoint: listen_endpoint.to_string(),
            initial_name: initial_name.to_string(),
            pid,
        })?;
        unwrap_response(resp, |r| match r {
            Response::PeasantId(id) => Some(id),
            _ => None,
        })
    }
}

impl ILeader for RemoteLeader {
    fn get_number_of_peasants(&self) -> Result<u64> {
        let resp = self.channel.call(Request::GetNumberOfPeasants)?;
        unwrap_response(resp, |r| match r {
            Response::U64(n) => Some(n),
            _ => None,
        })
    }

    fn propose_commandline(&self, args: CommandlineArgs) -> Result<ProposeCommandlineResult> {
        let resp = self.channel.call(Request::ProposeCommandline(args))?;
        unwrap_response(resp, |r| match r {
            Response::ProposeCommandlineResult(r) => Some(r),
            _ => None,
        })
    }

    fn handle_activate_peasant(&self, args: WindowActivatedArgs) -> Result<()> {
        let resp = self.channel.call(Request::HandleActivatePeasant(args))?;
        unwrap_response(resp, |r| matches!(r, Response::Unit).then_some(()))
    }

    fn summon_window(&self, args: SummonWindowSelectionArgs) -> Result<bool> {
        let resp = self.channel.call(Request::SummonWindow(args))?;
        unwrap_response(resp, |r| match r {
            Response::Bool(b) => Some(b),
            _ => None,
        })
    }

    fn request_identify_windows(&self) -> Result<()> {
        let resp = self.channel.call(Request::RequestIdentifyWindows)?;
        unwrap_response(resp, |r| matches!(r, Response::Unit).then_some(()))
    }

    fn rename_request(&self, sender_id: PeasantId, args: RenameRequestArgs) -> Result<RenameRequestArgs> {
        let resp = self.channel.call(Request::RenameRequest(sender_id, args))?;
        unwrap_response(resp, |r| match r {
            Response::RenameRequestArgs(a) => Some(a),
            _ => None,
        })
    }

    fn does_quake_window_exist(&self) -> Result<bool> {
        let resp = self.channel.call(Request::DoesQuakeWindowExist)?;
        unwrap_response(resp, |r| match r {
            Response::Bool(b) => Some(b),
            _ => None,
        })
    }

    fn quit_all(&self) -> Result<()> {
        let resp = self.channel.call(Request::QuitAll)?;
        unwrap_response(resp, |r| matches!(r, Response::Unit).then_some(()))
    }

    fn peasant_infos(&self, requesting_pid: u32) -> Result<Vec<PeasantInfo>> {
        let resp = self.channel.call(Request::PeasantInfos { requesting_pid })?;
        unwrap_response(resp, |r| match r {
            Response::PeasantInfos(infos) => Some(infos),
            _ => None,
        })
    }

    fn summon_all_windows(&self, behavior: SummonWindowBehavior) -> Result<()> {
        let resp = self.channel.call(Request::SummonAllWindows(behavior))?;
        unwrap_response(resp, |r| matches!(r, Response::Unit).then_some(()))
    }
}

/// Serve a single peasant's [`IFollower`] on `listener`, one connection at
/// a time per accepted stream, for as long as the process lives. Intended
/// to run on its own dedicated thread, the way
/// `wezterm-mux-server-impl::sessionhandler` dedicates a thread per
/// accepted client.
pub fn serve_follower(listener: UnixListener, peasant: Arc<Peasant>) {
    for stream in listener.incoming() {
        let Ok(stream) = stream else { continue };
        let peasant = Arc::clone(&peasant);
        std::thread::spawn(move || {
            let _ = handle_follower_connection(stream, &*peasant);
        });
    }
}

fn handle_follower_connection(mut stream: UnixStream, peasant: &dyn IFollower) -> Result<()> {
    loop {
        let (serial, req) = match recv_request(&mut stream) {
            Ok(pair) => pair,
            Err(_) => return Ok(()),
        };
        let resp = dispatch_follower_request(peasant, req);
        send_response(&mut stream, serial, &resp)?;
    }
}

fn dispatch_follower_request(peasant: &dyn IFollower, req: Request) -> Response {
    let result = match req {
        Request::AssignId(id) => peasant.assign_id(id).map(|_| Response::Unit),
        Request::GetId => peasant.get_id().map(Response::PeasantId),
        Request::GetPid => peasant.get_pid().map(Response::U32),
        Request::GetWindowName => peasant.get_window_name().map(Response::String),
        Request::ExecuteCommandline(args) => peasant.execute_commandline(args).map(Response::Bool),
        Request::Summon(behavior) => peasant.summon(behavior).map(|_| Response::Unit),
        Request::DisplayWindowId => peasant.display_window_id().map(|_| Response::Unit),
        Request::Quit => peasant.quit().map(|_| Response::Unit),
        Request::GetLastActivatedArgs => peasant
            .get_last_activated_args()
            .map(Response::OptWindowActivatedArgs),
        other => {
            log::warn!("peasant endpoint received a leader-only request: {other:?}");
            Err(RemotingError::PeerUnavailable)
        }
    };
    result.unwrap_or_else(|e| Response::Err(e.to_string()))
}

/// Serve [`ILeader`] on `listener` for as long as this process remains the
/// leader. `Monarch::add_peasant` is called directly (not through
/// `ILeader`, which has no method for it) once a `RemoteFollower` has been
/// dialed back for the registrant.
pub fn serve_leader(listener: UnixListener, monarch: Arc<Monarch>) {
    for stream in listener.incoming() {
        let Ok(stream) = stream else { continue };
        let monarch = Arc::clone(&monarch);
        std::thread::spawn(move || {
            let _ = handle_leader_connection(stream, &monarch);
        });
    }
}

fn handle_leader_connection(mut stream: UnixStream, monarch: &Monarch) -> Result<()> {
    loop {
        let (serial, req) = match recv_request(&mut stream) {
            Ok(pair) => pair,
            Err(_) => return Ok(()),
        };
        let resp = dispatch_leader_request(monarch, req);
        send_response(&mut stream, serial, &resp)?;
    }
}

fn dispatch_leader_request(monarch: &Monarch, req: Request) -> Response {
    let result: Result<Response> = match req {
        Request::GetNumberOfPeasants => monarch.get_number_of_peasants().map(Response::U64),
        Request::ProposeCommandline(args) => monarch
            .propose_commandline(args)
            .map(Response::ProposeCommandlineResult),
        Request::HandleActivatePeasant(args) => {
            monarch.handle_activate_peasant(args).map(|_| Response::Unit)
        }
        Request::SummonWindow(args) => monarch.summon_window(args).map(Response::Bool),
        Request::RequestIdentifyWindows => monarch.request_identify_windows().map(|_| Response::Unit),
        Request::RenameRequest(sender, args) => monarch
            .rename_request(sender, args)
            .map(Response::RenameRequestArgs),
        Request::DoesQuakeWindowExist => monarch.does_quake_window_exist().map(Response::Bool),
        Request::QuitAll => monarch.quit_all().map(|_| Response::Unit),
        Request::PeasantInfos { requesting_pid } => {
            monarch.peasant_infos(requesting_pid).map(Response::PeasantInfos)
        }
        Request::SummonAllWindows(behavior) => monarch.summon_all_windows(behavior).map(|_| Response::Unit),
        Request::AddPeasant { endpoint, initial_name: _, pid } => {
            RemoteFollower::connect(&endpoint).map(|remote| {
                let id = monarch.add_peasant(Arc::new(remote), pid);
                Response::PeasantId(id)
            })
        }
        other => {
            log::warn!("leader endpoint received a peasant-only request: {other:?}");
            Err(RemotingError::PeerUnavailable)
        }
    };
    result.unwrap_or_else(|e| Response::Err(e.to_string()))
}
