//! Focus manager port.

use std::sync::Arc;

use crate::domain::FocusState;

/// Receives focus changes for a channel an activity asked for.
pub trait ChannelObserver: Send + Sync {
    /// Called by the focus manager whenever this observer's focus changes.
    ///
    /// The focus manager waits for this call to return before granting the
    /// channel to anyone else.
    fn on_focus_changed(&self, new_focus: FocusState);
}

/// Arbitrates exclusive audio channels between activities.
pub trait FocusManager: Send + Sync {
    /// Ask for `channel` on behalf of `observer`.
    ///
    /// Returns `false` if the request was rejected outright. Acceptance only
    /// means the request is pending; the grant arrives via
    /// [`ChannelObserver::on_focus_changed`], possibly before this returns.
    fn acquire_channel(
        &self,
        channel: &str,
        observer: Arc<dyn ChannelObserver>,
        activity_id: &str,
    ) -> bool;

    /// Give up `channel` if `observer` holds it. Returns `false` if it did not.
    fn release_channel(&self, channel: &str, observer: &Arc<dyn ChannelObserver>) -> bool;
}
