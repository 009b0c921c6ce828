//! API route modules.

pub mod acks;
pub mod meetings;

use std::sync::Arc;

use crate::bus::AckSender;
use crate::orchestrator::MeetingLifecycle;

/// Shared state for every route.
#[derive(Clone)]
pub struct ApiState {
    pub lifecycle: Arc<MeetingLifecycle>,
    pub acks: AckSender,
}
