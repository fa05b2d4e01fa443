use thiserror::Error;

/// Errors surfaced by the coordination core to its callers.
///
/// `PeerUnavailable` is the one variant that every cross-process operation
/// can produce; it is always recoverable (prune the dead peasant, or
/// re-elect if the dead peer was the leader) and is never allowed to
/// propagate past the boundary of a single `Monarch`/`Peasant` method.
#[derive(Debug, Error)]
pub enum RemotingError {
    #[error("peer is no longer reachable")]
    PeerUnavailable,

    #[error("name {name:?} is already in use by another window")]
    NameCollision { name: String },

    #[error("no findTargetWindowRequested subscriber is registered")]
    ResolverAbsent,

    #[error("failed to register as a leader candidate")]
    RegistrationFailed(#[source] std::io::Error),

    #[error("exhausted all attempts to contact a leader")]
    LeaderDiscoveryExhausted,
}

pub type Result<T> = std::result::Result<T, RemotingError>;
