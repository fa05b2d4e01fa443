//! Publishes and resolves the current leader's transport endpoint under a
//! build-specific class id, so that unrelated federations (a Release build
//! and a Dev build running side by side) never attach to each other's
//! leader.
//!
//! Grounded on `wezterm-client::discovery`'s `NameHolder`/`discover_gui_socks`:
//! same symlink-publish-and-connect-to-check-liveness approach, retargeted
//! from "gui socket path" to "leader socket path".

use std::path::{Path, PathBuf};

/// Three fixed 128-bit class ids, selected at build time, so that
/// Release/Preview/Dev builds never intermix (spec.md §6, "Class identity").
/// These are arbitrary fixed UUIDs, analogous to the `Monarch_clsid` GUIDs
/// the original source hard-codes per branding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildKind {
    Release,
    Preview,
    Dev,
}

impl BuildKind {
    /// Resolve the build kind for this process. Real builds would gate this
    /// on a compile-time feature flag per distribution channel; lacking an
    /// installer concept here, an environment variable stands in for it,
    /// defaulting to `Dev` so that ad-hoc runs never collide with an
    /// installed Release build's federation.
    pub fn current() -> Self {
        match std::env::var("REMOTING_BUILD_KIND").as_deref() {
            Ok("release") => BuildKind::Release,
            Ok("preview") => BuildKind::Preview,
            _ => BuildKind::Dev,
        }
    }

    pub fn class_id(self) -> uuid::Uuid {
        match self {
            BuildKind::Release => uuid::uuid!("06171993-7eb1-4f3e-85f5-8bdd7386cce3"),
            BuildKind::Preview => uuid::uuid!("04221993-7eb1-4f3e-85f5-8bdd7386cce3"),
            BuildKind::Dev => uuid::uuid!("08302020-7eb1-4f3e-85f5-8bdd7386cce3"),
        }
    }
}

pub(crate) fn runtime_dir() -> PathBuf {
    std::env::var_os("REMOTING_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

fn symlink_path(class_id: uuid::Uuid) -> PathBuf {
    runtime_dir().join(format!("remoting-leader-{class_id}"))
}

/// Publishes `socket_path` as the leader endpoint for `class_id`. Dropping
/// the returned handle does not retract the publication — a leader is
/// expected to stay published until its process exits and the symlink is
/// pruned lazily by the next discoverer, the same tradeoff
/// `discover_gui_socks` makes.
pub fn publish_leader_path(socket_path: &Path, class_id: uuid::Uuid) -> std::io::Result<()> {
    let link = symlink_path(class_id);
    let _ = std::fs::remove_file(&link);
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(socket_path, &link)
    }
    #[cfg(windows)]
    {
        // Windows has no unprivileged symlink equivalent guaranteed
        // available, so fall back to writing the path into a plain file;
        // same semantics, looked up the same way.
        std::fs::write(&link, socket_path.to_string_lossy().as_bytes())
    }
}

/// Resolve the last published leader path for `class_id`. There is no
/// guarantee the returned path still has a live listener on the other end;
/// callers must attempt a connection and treat failure as "no leader".
pub fn resolve_leader_path(class_id: uuid::Uuid) -> std::io::Result<PathBuf> {
    let link = symlink_path(class_id);
    #[cfg(unix)]
    {
        std::fs::read_link(&link)
    }
    #[cfg(windows)]
    {
        let s = std::fs::read_to_string(&link)?;
        Ok(PathBuf::from(s))
    }
}

/// Remove the published path for `class_id`, e.g. on clean leader shutdown,
/// so that a follower constructing immediately afterwards does not attach
/// to a dying leader (spec.md §5, "On teardown, the leader revokes its
/// class registration immediately").
pub fn revoke_leader_path(class_id: uuid::Uuid) {
    let _ = std::fs::remove_file(symlink_path(class_id));
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn publish_then_resolve_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("REMOTING_RUNTIME_DIR", dir.path());
        let class_id = BuildKind::Dev.class_id();
        let sock = dir.path().join("some.sock");
        publish_leader_path(&sock, class_id).unwrap();
        assert_eq!(resolve_leader_path(class_id).unwrap(), sock);
        revoke_leader_path(class_id);
        assert!(resolve_leader_path(class_id).is_err());
    }
}
