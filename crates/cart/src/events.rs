//! Cart change notifications.
//!
//! The engine broadcasts an event after every state change so the UI layer
//! can refresh badges and raise toasts without polling. Emission never
//! blocks; having no subscribers is fine.

use tokio::sync::broadcast;

/// Buffered events per subscriber before lagging.
const EVENT_BUFFER: usize = 16;

/// Notifications emitted by the cart engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartEvent {
    /// The active cart changed; re-read lines and totals.
    Updated,
    /// A line was removed at the user's request.
    ItemRemoved,
    /// A remote removal failed; cart state is unchanged.
    RemoveFailed,
    /// Merge-on-login finished and the local cart was cleared.
    MergeCompleted,
    /// Merge-on-login aborted; the local cart is intact.
    MergeFailed,
}

pub(crate) fn channel() -> broadcast::Sender<CartEvent> {
    broadcast::channel(EVENT_BUFFER).0
}
