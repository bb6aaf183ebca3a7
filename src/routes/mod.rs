/// Router Module Index
///
/// The gate's own endpoints. Everything else falls through to the upstream proxy
/// (see `upstream::forward`) after the session gate middleware has run.

/// Routes answered for anyone: liveness and logout.
pub mod public;

/// Session introspection for the admin UI.
pub mod session;
