//! Pipeline orchestration: dispatch, ack routing, cleanup and the meeting
//! lifecycle, wired together through injected ledger, bus and storage
//! handles.

pub mod ack_router;
pub mod cleanup;
pub mod consumer;
pub mod dispatcher;
pub mod lifecycle;

pub use ack_router::{AckDisposition, AckRouter, CascadeOutcome};
pub use cleanup::{CleanupCoordinator, CleanupReport};
pub use consumer::AckConsumer;
pub use dispatcher::TaskDispatcher;
pub use lifecycle::{MeetingLifecycle, MeetingSnapshot};
