//! Exercises the real cross-process shape of `ILeader`/`IFollower`: a
//! `Monarch` served over a Unix domain socket, and a remote peasant dialed
//! back from it, both reached only through `remoting::transport`. Unlike the
//! unit tests colocated in each module (which call straight into in-process
//! `Arc<dyn ILeader>`/`Arc<dyn IFollower>` objects), this drives the actual
//! wire encoding and socket plumbing two real processes would use.

use remoting::args::{CommandlineArgs, TargetWindow};
use remoting::desktop::NullDesktopOracle;
use remoting::monarch::Monarch;
use remoting::peasant::{Peasant, PeasantId};
use remoting::rpc::{IFollower, ILeader};
use remoting::transport::{serve_follower, serve_leader, RemoteFollower, RemoteLeader};
use remoting::wire::{recv_request, send_response, Request, Response};
use std::sync::Arc;
use std::time::Duration;
use wezterm_uds::UnixListener;

fn socket_path(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
    dir.path().join(name)
}

/// Stand up a real `Monarch` behind a listening socket and return a
/// `RemoteLeader` connected to it.
fn spawn_leader(dir: &tempfile::TempDir, name: &str) -> (Arc<Monarch>, RemoteLeader) {
    let path = socket_path(dir, name);
    let listener = UnixListener::bind(&path).unwrap();
    let monarch = Monarch::new(Arc::new(NullDesktopOracle));
    std::thread::spawn({
        let monarch = Arc::clone(&monarch);
        move || serve_leader(listener, monarch)
    });
    // give the acceptor thread a moment to start listening.
    std::thread::sleep(Duration::from_millis(20));
    let remote = RemoteLeader::connect(&path.to_string_lossy()).unwrap();
    (monarch, remote)
}

/// Stand up a real `Peasant` behind a listening socket and return its
/// endpoint path for `RemoteLeader::add_peasant`.
fn spawn_follower(dir: &tempfile::TempDir, name: &str, peasant_name: &str) -> (Arc<Peasant>, String) {
    let path = socket_path(dir, name);
    let listener = UnixListener::bind(&path).unwrap();
    let peasant = Peasant::new(peasant_name);
    std::thread::spawn({
        let peasant = Arc::clone(&peasant);
        move || serve_follower(listener, peasant)
    });
    std::thread::sleep(Duration::from_millis(20));
    (peasant, path.to_string_lossy().into_owned())
}

/// A follower endpoint that answers exactly `max_requests` requests on its
/// one accepted connection, then drops the stream — standing in for a
/// peasant whose process dies right after registering with the leader.
fn spawn_dying_follower(dir: &tempfile::TempDir, name: &str, peasant_name: &str, max_requests: usize) -> String {
    let path = socket_path(dir, name);
    let listener = UnixListener::bind(&path).unwrap();
    let endpoint = path.to_string_lossy().into_owned();
    let peasant_name = peasant_name.to_string();
    std::thread::spawn(move || {
        let (mut stream, _) = match listener.accept() {
            Ok(pair) => pair,
            Err(_) => return,
        };
        let mut id = PeasantId::NONE;
        for _ in 0..max_requests {
            let (serial, req) = match recv_request(&mut stream) {
                Ok(pair) => pair,
                Err(_) => return,
            };
            let resp = match req {
                Request::GetId => Response::PeasantId(id),
                Request::AssignId(new_id) => {
                    id = new_id;
                    Response::Unit
                }
                Request::GetWindowName => Response::String(peasant_name.clone()),
                _ => Response::Unit,
            };
            if send_response(&mut stream, serial, &resp).is_err() {
                return;
            }
        }
        // `stream` (and the accepted connection) drops here: any further
        // request the leader sends on this channel will fail to read a
        // response, the same as a peasant process that has just exited.
    });
    std::thread::sleep(Duration::from_millis(20));
    endpoint
}

#[test]
fn remote_peasant_round_trips_execute_commandline() {
    let dir = tempfile::tempdir().unwrap();
    let (monarch, leader) = spawn_leader(&dir, "leader.sock");
    let (peasant, follower_endpoint) = spawn_follower(&dir, "follower.sock", "two");

    let id = leader.add_peasant(&follower_endpoint, "two", 4242).unwrap();
    assert_ne!(id, PeasantId::NONE);
    assert_eq!(monarch.get_number_of_peasants().unwrap(), 1);

    monarch.set_find_target_window_handler(|args| {
        args.target = TargetWindow::Name("two".to_string());
    });

    let result = leader
        .propose_commandline(CommandlineArgs::new(["wt", "-w", "two"], "/tmp"))
        .unwrap();
    assert!(!result.should_create_new_window);

    // The remote peasant process should have observed the commandline as if
    // it had been delivered locally.
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(
        peasant.initial_args().unwrap().args,
        vec!["wt".to_string(), "-w".to_string(), "two".to_string()]
    );
}

#[test]
fn dead_follower_is_pruned_and_propose_falls_back_to_new_window() {
    let dir = tempfile::tempdir().unwrap();
    let (monarch, leader) = spawn_leader(&dir, "leader.sock");

    // Registration costs exactly two requests (GetId, then AssignId since
    // the peasant carries no id yet); answer those two and then go silent.
    let follower_endpoint = spawn_dying_follower(&dir, "follower.sock", "two", 2);
    let id = leader.add_peasant(&follower_endpoint, "two", 4243).unwrap();
    assert_ne!(id, PeasantId::NONE);
    assert_eq!(monarch.get_number_of_peasants().unwrap(), 1);

    monarch.set_find_target_window_handler(|args| {
        args.target = TargetWindow::Name("two".to_string());
    });

    let result = leader
        .propose_commandline(CommandlineArgs::new(["wt"], "/tmp"))
        .unwrap();
    assert!(result.should_create_new_window, "a dead peasant must not receive the commandline");
    assert_eq!(monarch.get_number_of_peasants().unwrap(), 0, "the dead peasant should have been pruned");
}

#[test]
fn remote_follower_connect_fails_once_its_socket_is_gone() {
    let dir = tempfile::tempdir().unwrap();
    let (peasant, follower_endpoint) = spawn_follower(&dir, "solo-follower.sock", "solo");

    let remote = RemoteFollower::connect(&follower_endpoint).unwrap();
    assert_eq!(remote.get_window_name().unwrap(), "solo");
    drop(peasant);

    std::fs::remove_file(&follower_endpoint).unwrap();
    assert!(RemoteFollower::connect(&follower_endpoint).is_err());
}
