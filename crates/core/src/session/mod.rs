//! Room sessions: state machine, events and the manager that commits them

mod events;
mod machine;
mod manager;

pub use events::{EventSink, NoopSink, RoomEvent};
pub use machine::{ConfirmOutcome, MemberStatus, RoomStatus};
pub use manager::{SessionManager, MAX_CAS_ATTEMPTS};
