use anyhow::Result;
use clap::Parser;
use reflection_session::{
    BreathingState, Clock, Config, HandoffDispatcher, JsonlJournal, LogAnalysis, ManualClock,
    SessionController, SessionEvent, StepKind, WavFileCapture,
};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Run a guided reflection session on autopilot
///
/// Every configured prompt is played through against a file-backed capture
/// device and a local JSON Lines journal, on a simulated clock.
#[derive(Debug, Parser)]
#[command(name = "reflect", version)]
struct Args {
    /// Config file path (without extension)
    #[arg(short, long, default_value = "config/reflection")]
    config: String,

    /// Value committed at sleep check-in steps
    #[arg(long, default_value_t = 7.5)]
    sleep_hours: f64,

    /// Step kind to skip (recording, affirmation, breathing); repeatable
    #[arg(long = "skip", value_name = "KIND")]
    skip: Vec<String>,

    /// Stop each take after this many seconds instead of letting the budget run out
    #[arg(long)]
    record_secs: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("Reflection session v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded {} prompts from {}", cfg.prompts.len(), args.config);
    info!("Takes will be written to {}", cfg.capture_config().output_dir.display());
    info!("Journal: {}", cfg.journal_path().display());

    let clock = ManualClock::new();
    let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());

    let capture = WavFileCapture::new(cfg.capture_config(), Arc::clone(&shared_clock));
    let journal = Arc::new(JsonlJournal::new(cfg.journal_path()));
    let (dispatcher, monitor) =
        HandoffDispatcher::new(journal, Arc::new(LogAnalysis), cfg.handoff.clone());
    let logger = monitor.spawn_logger();

    let mut session = SessionController::new(
        cfg.prompts.clone(),
        cfg.session.clone(),
        Box::new(capture),
        dispatcher,
        shared_clock,
    )?;
    log_events(session.poll().await);

    while let Some(index) = session.current_index() {
        let kind = session.steps()[index].kind().clone();

        if kind.is_skippable() && args.skip.iter().any(|s| s == kind.tag()) {
            session.skip(index).await?;
            log_events(session.poll().await);
            continue;
        }

        match kind {
            StepKind::Recording { .. } | StepKind::Affirmation { .. } => {
                info!("Prompt: {}", kind.prompt().unwrap_or_default());
                session.begin_recording().await?;
                let budget = session.recording().budget_secs;

                match args.record_secs {
                    Some(secs) if secs < budget => {
                        clock.advance(secs as u64);
                        log_events(session.poll().await);
                        session.stop_recording().await?;
                    }
                    _ => {
                        clock.advance(budget as u64);
                        log_events(session.poll().await);
                    }
                }

                session.complete_and_save().await?;
            }
            StepKind::Breathing => {
                session.start_breathing()?;
                while session.breathing().state() == BreathingState::Running {
                    clock.advance(1);
                    log_events(session.poll().await);
                }
                session.complete_current_step().await?;
            }
            StepKind::SleepCheckIn { .. } => {
                session.commit_sleep_hours(args.sleep_hours).await?;
            }
        }

        log_events(session.poll().await);
    }

    let snapshot = session.snapshot();
    drop(session);

    let tally = logger.await?;
    info!(
        "Handoffs finished: {} succeeded, {} failed",
        tally.succeeded, tally.failed
    );

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn log_events(events: Vec<SessionEvent>) {
    for event in events {
        match event {
            SessionEvent::Recording { .. } | SessionEvent::Breathing { .. } => {
                debug!("{:?}", event)
            }
            _ => info!("{:?}", event),
        }
    }
}
