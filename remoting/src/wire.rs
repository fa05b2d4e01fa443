//! Request/response framing for the `ILeader`/`IFollower` wire transport.
//!
//! Frame shape, grounded on `codec::encode_raw`/`codec::decode_raw`:
//!
//! ```text
//! len:    leb128 (byte length of the varbincode-encoded body)
//! serial: leb128 (caller-assigned, echoed back on the matching response)
//! body:   len bytes of varbincode
//! ```
//!
//! There is exactly one request enum and one response enum here, so unlike
//! `codec`'s PDU registry this framing carries no `ident` field to
//! dispatch on, and (since every body this crate ever sends is a few dozen
//! bytes of struct fields, never a terminal-sized blob) no compression bit
//! either.

use crate::args::{
    CommandlineArgs, PeasantInfo, ProposeCommandlineResult, RenameRequestArgs,
    SummonWindowSelectionArgs, WindowActivatedArgs,
};
use crate::error::{RemotingError, Result};
use crate::peasant::PeasantId;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Every call `IFollower`/`ILeader` exposes, flattened into one wire enum.
/// The dispatcher on the receiving end matches on this and calls through to
/// the local `Monarch`/`Peasant` it is fronting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    // IFollower
    AssignId(PeasantId),
    GetId,
    GetPid,
    GetWindowName,
    ExecuteCommandline(CommandlineArgs),
    Summon(crate::args::SummonWindowBehavior),
    DisplayWindowId,
    Quit,
    GetLastActivatedArgs,

    // ILeader
    GetNumberOfPeasants,
    ProposeCommandline(CommandlineArgs),
    HandleActivatePeasant(WindowActivatedArgs),
    SummonWindow(SummonWindowSelectionArgs),
    RequestIdentifyWindows,
    RenameRequest(PeasantId, RenameRequestArgs),
    DoesQuakeWindowExist,
    QuitAll,
    PeasantInfos { requesting_pid: u32 },
    SummonAllWindows(crate::args::SummonWindowBehavior),

    /// Register a new peasant with the leader. The peasant's own process
    /// listens at `endpoint` for the leader to call back into; unlike
    /// every other request, the receiving `Monarch` constructs a
    /// [`crate::transport::RemoteFollower`] from this and retains it,
    /// rather than returning a result derived purely from `args`. This is
    /// the one call an in-process `Arc<dyn IFollower>` cannot stand in for
    /// on the wire: a trait object has no address a remote peer could
    /// dial, so the endpoint it listens on is sent instead.
    AddPeasant { endpoint: String, initial_name: String, pid: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Unit,
    Bool(bool),
    U32(u32),
    U64(u64),
    String(String),
    PeasantId(PeasantId),
    OptWindowActivatedArgs(Option<WindowActivatedArgs>),
    ProposeCommandlineResult(ProposeCommandlineResult),
    RenameRequestArgs(RenameRequestArgs),
    PeasantInfos(Vec<PeasantInfo>),
    /// The callee raised a [`RemotingError`]; carried back as a string
    /// since `RemotingError` itself does not round-trip its `#[source]`
    /// io::Error through serde.
    Err(String),
}

fn write_frame<W: Write>(mut w: W, serial: u64, body: &[u8]) -> Result<()> {
    let mut header = Vec::new();
    leb128::write::unsigned(&mut header, body.len() as u64)
        .map_err(|e| RemotingError::RegistrationFailed(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    leb128::write::unsigned(&mut header, serial)
        .map_err(|e| RemotingError::RegistrationFailed(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    w.write_all(&header).map_err(|_| RemotingError::PeerUnavailable)?;
    w.write_all(body).map_err(|_| RemotingError::PeerUnavailable)?;
    w.flush().map_err(|_| RemotingError::PeerUnavailable)?;
    Ok(())
}

fn read_u64<R: Read>(mut r: R) -> Result<u64> {
    leb128::read::unsigned(&mut r).map_err(|_| RemotingError::PeerUnavailable)
}

fn read_frame<R: Read>(mut r: R) -> Result<(u64, Vec<u8>)> {
    let len = read_u64(&mut r)?;
    let serial = read_u64(&mut r)?;
    let mut body = vec![0u8; len as usize];
    r.read_exact(&mut body).map_err(|_| RemotingError::PeerUnavailable)?;
    Ok((serial, body))
}

pub fn send_request<W: Write>(w: W, serial: u64, req: &Request) -> Result<()> {
    let body = varbincode::serialize(req).map_err(|_| RemotingError::PeerUnavailable)?;
    write_frame(w, serial, &body)
}

pub fn recv_request<R: Read>(r: R) -> Result<(u64, Request)> {
    let (serial, body) = read_frame(r)?;
    let req = varbincode::deserialize(body.as_slice()).map_err(|_| RemotingError::PeerUnavailable)?;
    Ok((serial, req))
}

pub fn send_response<W: Write>(w: W, serial: u64, resp: &Response) -> Result<()> {
    let body = varbincode::serialize(resp).map_err(|_| RemotingError::PeerUnavailable)?;
    write_frame(w, serial, &body)
}

pub fn recv_response<R: Read>(r: R, expected_serial: u64) -> Result<Response> {
    let (serial, body) = read_frame(r)?;
    if serial != expected_serial {
        return Err(RemotingError::PeerUnavailable);
    }
    varbincode::deserialize(body.as_slice()).map_err(|_| RemotingError::PeerUnavailable)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request_round_trips_through_a_buffer() {
        let mut buf = Vec::new();
        let req = Request::ExecuteCommandline(CommandlineArgs::new(["a", "b"], "/tmp"));
        send_request(&mut buf, 7, &req).unwrap();
        let (serial, decoded) = recv_request(buf.as_slice()).unwrap();
        assert_eq!(serial, 7);
        match decoded {
            Request::ExecuteCommandline(args) => assert_eq!(args.args, vec!["a", "b"]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn response_round_trips_and_rejects_serial_mismatch() {
        let mut buf = Vec::new();
        send_response(&mut buf, 3, &Response::Bool(true)).unwrap();
        assert!(recv_response(buf.as_slice(), 99).is_err());
        assert!(matches!(recv_response(buf.as_slice(), 3), Ok(Response::Bool(true))));
    }
}
