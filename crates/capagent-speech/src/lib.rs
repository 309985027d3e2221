#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

// Dev-dependencies used only by the integration suites.
#[cfg(test)]
use mockall as _;

pub mod agent;
pub mod config;
pub mod controller;
pub mod error;
pub mod executor;
pub mod focus;
pub mod queue;
pub mod registry;
pub mod reporter;
pub mod request;

pub use agent::{SpeechSynthesizer, SpeechSynthesizerPorts};
pub use config::{ErrorPolicy, SpeechSynthesizerConfig};
pub use error::SpeechError;
