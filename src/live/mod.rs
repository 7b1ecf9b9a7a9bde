//! Live interactive research sessions.
//!
//! A live session is an ordered, replayable conversation between one client
//! and the research executor, independent of the job state machine. The
//! [`session::LiveSessionManager`] owns session state and the append-only
//! message log; the [`gateway`] relays WebSocket frames in and out.

pub mod gateway;
pub mod session;

pub use session::LiveSessionManager;
