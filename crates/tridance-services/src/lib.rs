//! tridance-services — session table, broadcast hub, and signaling.

pub mod hub;
pub mod liveness;
pub mod session;
pub mod signaling;

pub use hub::{BroadcastHub, HubStatus, SharedHub, ViewerFeed};
pub use session::{CloseReason, PeerSession, SessionPhase};
pub use signaling::{HandshakeError, Signaling};
