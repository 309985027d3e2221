use crate::domain::SpeechSynthesizerState;

/// Observes speech synthesizer state transitions.
///
/// Calls arrive in transition order and never overlap.
pub trait SpeechSynthesizerObserver: Send + Sync {
    fn on_state_changed(&self, state: SpeechSynthesizerState);
}
