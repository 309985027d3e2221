//! Command-line definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use capagent_speech::ErrorPolicy;

/// Drive capability agents against simulated devices.
#[derive(Debug, Parser)]
#[command(name = "capagent")]
#[command(about = "Run the SpeechSynthesizer agent against a simulated speaker and focus arbiter")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Agent configuration file (JSON)
    #[arg(long, global = true, env = "CAPAGENT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Speak a batch of synthetic directives and report how each ended
    Speak(SpeakArgs),

    /// Print the effective configuration as JSON
    Config {
        /// Override the error policy
        #[arg(long, value_enum)]
        error_policy: Option<PolicyArg>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct SpeakArgs {
    /// Number of Speak directives to send
    #[arg(short = 'n', long, default_value_t = 3)]
    pub count: usize,

    /// Length of each utterance in milliseconds
    #[arg(long, default_value_t = 300)]
    pub duration_ms: u64,

    /// Indexes (0-based) whose audio fails mid-playback
    #[arg(long, value_delimiter = ',')]
    pub fail: Vec<usize>,

    /// Indexes (0-based) cancelled right after they are handled
    #[arg(long, value_delimiter = ',')]
    pub cancel: Vec<usize>,

    /// Revoke focus this many milliseconds after the first directive
    #[arg(long)]
    pub barge_in_ms: Option<u64>,

    /// Send directives through handle_directive_immediately (no result callbacks)
    #[arg(long)]
    pub immediate: bool,

    /// Override the error policy
    #[arg(long, value_enum)]
    pub error_policy: Option<PolicyArg>,
}

/// `--error-policy` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Release focus after an error and start a new session
    Abort,
    /// Keep focus and go on with the next directive
    Continue,
}

impl From<PolicyArg> for ErrorPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Abort => Self::AbortFocusSession,
            PolicyArg::Continue => Self::ContinueWithNext,
        }
    }
}
