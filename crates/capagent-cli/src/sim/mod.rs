//! Simulated device collaborators for running an agent without hardware.

mod focus;
mod player;
mod sinks;

pub use focus::SimulatedFocusManager;
pub use player::{CORRUPT_MARKER, SimulatedPlayer};
pub use sinks::{ChannelResult, ConsoleSink, InMemoryAttachments, InMemoryContext, Outcome};
