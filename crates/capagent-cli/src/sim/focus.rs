//! Single-holder focus arbiter.
//!
//! Whoever acquires last holds foreground focus and the previous holder is
//! told it lost focus. Notifications are delivered in order from one task,
//! on blocking threads, since `on_focus_changed` blocks its caller.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use capagent_core::{ChannelObserver, FocusManager, FocusState};

type Notification = (Arc<dyn ChannelObserver>, FocusState);

struct Holder {
    channel: String,
    activity_id: String,
    observer: Arc<dyn ChannelObserver>,
}

pub struct SimulatedFocusManager {
    holder: Mutex<Option<Holder>>,
    notifications: mpsc::UnboundedSender<Notification>,
}

impl SimulatedFocusManager {
    pub fn new(runtime: &Handle) -> Self {
        let (notifications, mut rx) = mpsc::unbounded_channel::<Notification>();
        runtime.spawn(async move {
            while let Some((observer, focus)) = rx.recv().await {
                let delivered =
                    tokio::task::spawn_blocking(move || observer.on_focus_changed(focus)).await;
                if let Err(e) = delivered {
                    tracing::error!(error = %e, "Focus observer panicked");
                }
            }
        });
        Self {
            holder: Mutex::new(None),
            notifications,
        }
    }

    fn send(&self, observer: Arc<dyn ChannelObserver>, focus: FocusState) {
        if self.notifications.send((observer, focus)).is_err() {
            tracing::warn!(%focus, "Focus notifier is gone");
        }
    }

    /// A higher-priority activity takes the device: the holder loses focus.
    pub fn interrupt(&self) -> bool {
        let holder = self
            .holder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(holder) = holder else {
            return false;
        };
        tracing::info!(
            channel = %holder.channel,
            activity = %holder.activity_id,
            "Focus interrupted"
        );
        self.send(holder.observer, FocusState::None);
        true
    }
}

impl FocusManager for SimulatedFocusManager {
    fn acquire_channel(
        &self,
        channel: &str,
        observer: Arc<dyn ChannelObserver>,
        activity_id: &str,
    ) -> bool {
        let previous = self
            .holder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Holder {
                channel: channel.to_owned(),
                activity_id: activity_id.to_owned(),
                observer: Arc::clone(&observer),
            });
        if let Some(previous) = previous {
            if !Arc::ptr_eq(&previous.observer, &observer) {
                self.send(previous.observer, FocusState::None);
            }
        }
        tracing::debug!(%channel, %activity_id, "Focus granted");
        self.send(observer, FocusState::Foreground);
        true
    }

    fn release_channel(&self, channel: &str, observer: &Arc<dyn ChannelObserver>) -> bool {
        let mut holder = self.holder.lock().unwrap_or_else(PoisonError::into_inner);
        let held = holder
            .as_ref()
            .is_some_and(|h| h.channel == channel && Arc::ptr_eq(&h.observer, observer));
        if !held {
            return false;
        }
        *holder = None;
        drop(holder);

        tracing::debug!(%channel, "Focus released");
        self.send(Arc::clone(observer), FocusState::None);
        true
    }
}
