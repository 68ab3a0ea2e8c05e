//! Camera and session registry
//!
//! The in-memory state the coordinator keeps in sync with server push
//! messages: known camera identities and active session records. Single
//! writer (the coordinator); everyone else reads snapshots.

pub mod camera;
pub mod session;
pub mod store;

pub use camera::CameraIdentity;
pub use session::{Session, SessionState};
pub use store::SessionRegistry;
