//! The `speak` scenario: wire the agent to simulated devices, feed it
//! synthetic Speak directives and collect how each one ended.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::Instant;

use capagent_core::domain::{SPEAK, SPEECH_STATE, SPEECH_SYNTHESIZER_NAMESPACE};
use capagent_core::ports::attachment_id;
use capagent_core::{
    Directive, DirectiveHandler, DirectiveInfo, RequiresShutdown, SpeechSynthesizerObserver,
    SpeechSynthesizerState,
};
use capagent_speech::{SpeechSynthesizer, SpeechSynthesizerConfig, SpeechSynthesizerPorts};

use crate::parser::{PolicyArg, SpeakArgs};
use crate::sim::{
    CORRUPT_MARKER, ChannelResult, ConsoleSink, InMemoryAttachments, InMemoryContext, Outcome,
    SimulatedFocusManager, SimulatedPlayer,
};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Slack on top of the total speech time before the run is declared stuck.
const GRACE: Duration = Duration::from_secs(2);

/// Load the config file if given, then apply command-line overrides.
pub fn load_config(
    path: Option<&Path>,
    error_policy: Option<PolicyArg>,
) -> anyhow::Result<SpeechSynthesizerConfig> {
    let mut config = match path {
        Some(path) => SpeechSynthesizerConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => SpeechSynthesizerConfig::default(),
    };
    if let Some(policy) = error_policy {
        config = config.with_error_policy(policy.into());
    }
    Ok(config)
}

/// How the directives of a run ended.
#[derive(Debug, Default)]
pub struct Summary {
    pub handled: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub cancelled: Vec<String>,
    /// Last `SpeechState` pushed to the context store.
    pub final_state: Option<String>,
}

impl Summary {
    pub fn print(&self) {
        println!(
            "handled: {}, failed: {}, cancelled: {}",
            self.handled.len(),
            self.failed.len(),
            self.cancelled.len()
        );
        for (message_id, description) in &self.failed {
            println!("  {message_id} failed: {description}");
        }
    }
}

struct LogObserver;

impl SpeechSynthesizerObserver for LogObserver {
    fn on_state_changed(&self, state: SpeechSynthesizerState) {
        tracing::info!(%state, "SpeechSynthesizer state");
    }
}

fn synthetic_audio(duration_ms: u64, corrupt: bool) -> Vec<u8> {
    let len = usize::try_from(duration_ms)
        .unwrap_or(usize::MAX)
        .max(CORRUPT_MARKER.len() + 1);
    let mut audio = vec![0u8; len];
    if corrupt {
        audio[..CORRUPT_MARKER.len()].copy_from_slice(CORRUPT_MARKER);
    }
    audio
}

/// Run `args` against a fresh agent. Must be called inside a tokio runtime.
pub async fn run_speak(
    config: SpeechSynthesizerConfig,
    args: &SpeakArgs,
) -> anyhow::Result<Summary> {
    let runtime = Handle::current();
    let context = Arc::new(InMemoryContext::default());
    let attachments = Arc::new(InMemoryAttachments::default());
    let focus = Arc::new(SimulatedFocusManager::new(&runtime));
    let sink = Arc::new(ConsoleSink);

    let agent = SpeechSynthesizer::create(
        config,
        SpeechSynthesizerPorts {
            player: Arc::new(SimulatedPlayer::new(runtime)),
            focus_manager: focus.clone(),
            context: context.clone(),
            messages: sink.clone(),
            exceptions: sink,
            attachments: attachments.clone(),
        },
    )
    .context("Failed to create SpeechSynthesizer")?;
    agent.add_observer(Arc::new(LogObserver));

    let (outcomes_tx, mut outcomes) = mpsc::unbounded_channel();
    let mut summary = Summary::default();

    for i in 0..args.count {
        let message_id = format!("speak-{i}");
        let content_id = format!("audio-{i}");
        attachments.insert(
            attachment_id(&message_id, &content_id),
            synthetic_audio(args.duration_ms, args.fail.contains(&i)),
        );
        let payload = serde_json::json!({
            "token": format!("token-{i}"),
            "format": "AUDIO_MPEG",
            "url": format!("cid:{content_id}"),
        });
        let directive = Directive::new(
            SPEECH_SYNTHESIZER_NAMESPACE,
            SPEAK.name,
            message_id.as_str(),
            payload.to_string(),
        );

        if args.immediate {
            agent.handle_directive_immediately(Arc::new(directive))?;
        } else {
            let result = ChannelResult::new(message_id.as_str(), outcomes_tx.clone());
            agent.pre_handle_directive(DirectiveInfo::new(directive, Some(Arc::new(result))))?;
            agent.handle_directive(&message_id)?;
        }
        tracing::info!(%message_id, "Speak directive sent");

        if args.cancel.contains(&i) {
            agent.cancel_directive(&message_id);
            summary.cancelled.push(message_id);
        }
    }
    drop(outcomes_tx);

    if let Some(ms) = args.barge_in_ms {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        if focus.interrupt() {
            context.refresh(1);
        }
    }

    let count = u32::try_from(args.count).unwrap_or(u32::MAX);
    let budget = Duration::from_millis(args.duration_ms).saturating_mul(count) + GRACE;
    wait_until_drained(&agent, budget).await?;

    while let Ok(outcome) = outcomes.try_recv() {
        match outcome {
            Outcome::Handled(message_id) => summary.handled.push(message_id),
            Outcome::Failed {
                message_id,
                description,
            } => summary.failed.push((message_id, description)),
        }
    }
    summary.final_state = context.state(&SPEECH_STATE);

    tokio::task::spawn_blocking(move || agent.shutdown())
        .await
        .context("Shutdown task failed")?;
    Ok(summary)
}

/// Poll until nothing is queued and the agent is idle.
async fn wait_until_drained(
    agent: &Arc<SpeechSynthesizer>,
    budget: Duration,
) -> anyhow::Result<()> {
    let started = Instant::now();
    loop {
        let probe = Arc::clone(agent);
        let (queued, state) =
            tokio::task::spawn_blocking(move || (probe.queued(), probe.state())).await?;
        if queued.is_empty() && state == SpeechSynthesizerState::Idle {
            return Ok(());
        }
        if started.elapsed() > budget {
            bail!("Speech did not drain within {budget:?}; still queued: {queued:?}");
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
