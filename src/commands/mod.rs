//! Service surface called by the outer HTTP/IPC layer. Every command takes
//! the shared [`AppState`](crate::state::AppState) and returns view models.

pub mod dashboard;
pub mod kubeconfig;
pub mod kubectl;
pub mod namespaces;
pub mod nodes;
pub mod pods;

/// Newest events returned by the per-object event commands.
pub const OBJECT_EVENT_LIMIT: usize = 50;

/// Namespace name clients send to mean "every namespace".
pub const ALL_NAMESPACES: &str = "all";

/// Maps a client namespace argument onto a listing scope: `None` for all
/// namespaces when it is absent, empty or [`ALL_NAMESPACES`].
pub fn namespace_scope(namespace: Option<&str>) -> Option<&str> {
    namespace.filter(|ns| !ns.is_empty() && *ns != ALL_NAMESPACES)
}
