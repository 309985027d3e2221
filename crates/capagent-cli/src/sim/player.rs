//! Timer-driven media player.
//!
//! Audio is never decoded: each byte of a source stands for one millisecond
//! of speech. A source that starts with [`CORRUPT_MARKER`] fails halfway
//! through. Callbacks fire from tasks on the tokio runtime, so they arrive
//! on runtime threads exactly like a real engine's would.

use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Instant;

use capagent_core::{
    AttachmentReader, MediaErrorKind, MediaPlayer, MediaPlayerError, MediaPlayerObserver,
    PlaybackId,
};

/// Prefix that makes a simulated source fail during playback.
pub const CORRUPT_MARKER: &[u8] = b"CORRUPT";

/// Delay between `play` and the started callback.
const START_LATENCY: Duration = Duration::from_millis(5);

struct Source {
    duration: Duration,
    corrupt: bool,
    started_at: Option<Instant>,
    stop: Arc<Notify>,
}

type Observers = Arc<Mutex<Vec<Arc<dyn MediaPlayerObserver>>>>;

pub struct SimulatedPlayer {
    runtime: Handle,
    next_id: AtomicU64,
    sources: Arc<Mutex<HashMap<PlaybackId, Source>>>,
    observers: Observers,
}

impl SimulatedPlayer {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(1),
            sources: Arc::new(Mutex::new(HashMap::new())),
            observers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn notify(observers: &Observers, f: impl Fn(&dyn MediaPlayerObserver)) {
        let snapshot = observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in snapshot {
            f(observer.as_ref());
        }
    }
}

impl MediaPlayer for SimulatedPlayer {
    fn set_source(
        &self,
        mut reader: Box<dyn AttachmentReader>,
    ) -> Result<PlaybackId, MediaPlayerError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| MediaPlayerError::InvalidSource(e.to_string()))?;
        if bytes.is_empty() {
            return Err(MediaPlayerError::InvalidSource("empty audio".into()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let source = Source {
            duration: Duration::from_millis(u64::try_from(bytes.len()).unwrap_or(u64::MAX)),
            corrupt: bytes.starts_with(CORRUPT_MARKER),
            started_at: None,
            stop: Arc::new(Notify::new()),
        };
        tracing::debug!(
            playback = id,
            duration_ms = bytes.len(),
            corrupt = source.corrupt,
            "Source loaded"
        );
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, source);
        Ok(id)
    }

    fn play(&self, id: PlaybackId) -> Result<(), MediaPlayerError> {
        let (duration, corrupt, stop) = {
            let sources = self.sources.lock().unwrap_or_else(PoisonError::into_inner);
            let source = sources.get(&id).ok_or(MediaPlayerError::UnknownPlayback(id))?;
            (source.duration, source.corrupt, Arc::clone(&source.stop))
        };

        let sources = Arc::clone(&self.sources);
        let observers = Arc::clone(&self.observers);
        self.runtime.spawn(async move {
            tokio::time::sleep(START_LATENCY).await;
            mark_started(&sources, id);
            Self::notify(&observers, |o| o.on_playback_started(id));

            let playing = if corrupt { duration / 2 } else { duration };
            let stopped = tokio::select! {
                () = tokio::time::sleep(playing) => false,
                () = stop.notified() => true,
            };
            remove_source(&sources, id);

            if stopped {
                Self::notify(&observers, |o| o.on_playback_stopped(id));
            } else if corrupt {
                Self::notify(&observers, |o| {
                    let kind = MediaErrorKind::InternalDeviceError;
                    o.on_playback_error(id, kind, "corrupt audio frame");
                });
            } else {
                Self::notify(&observers, |o| o.on_playback_finished(id));
            }
        });
        Ok(())
    }

    fn stop(&self, id: PlaybackId) -> Result<(), MediaPlayerError> {
        let sources = self.sources.lock().unwrap_or_else(PoisonError::into_inner);
        let source = sources.get(&id).ok_or(MediaPlayerError::UnknownPlayback(id))?;
        // Stores a permit if the playback task is not waiting yet.
        source.stop.notify_one();
        Ok(())
    }

    fn offset(&self, id: PlaybackId) -> Duration {
        self.sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .and_then(|s| s.started_at.map(|t| t.elapsed().min(s.duration)))
            .unwrap_or_default()
    }

    fn add_observer(&self, observer: Arc<dyn MediaPlayerObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    fn remove_observer(&self, observer: &Arc<dyn MediaPlayerObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|o| !Arc::ptr_eq(o, observer));
    }
}

fn mark_started(sources: &Mutex<HashMap<PlaybackId, Source>>, id: PlaybackId) {
    let mut sources = sources.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(source) = sources.get_mut(&id) {
        source.started_at = Some(Instant::now());
    }
}

fn remove_source(sources: &Mutex<HashMap<PlaybackId, Source>>, id: PlaybackId) {
    sources
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&id);
}
