use super::session::{SessionController, SessionEvent};
use super::stats::SessionSnapshot;
use crate::error::SessionError;
use crate::recording::SaveOutcome;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// A user action forwarded to the session task
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    BeginRecording,
    StopRecording,
    RetryRecording,
    CompleteAndSave,
    StartBreathing,
    StopBreathing,
    CompleteStep,
    CommitSleepHours(f64),
    Advance,
    Skip(usize),
    Rewind(usize),
    Restart,
    Dismiss,
}

/// What a command produced
#[derive(Debug, Clone, PartialEq)]
pub enum CommandReply {
    Done,
    /// For stop/retry/stop-breathing: whether the command had any effect
    Applied(bool),
    Saved(SaveOutcome),
}

type Envelope = (
    SessionCommand,
    oneshot::Sender<Result<CommandReply, SessionError>>,
);

/// Cloneable handle for sending commands to a running session
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Envelope>,
    snapshots: mpsc::Sender<oneshot::Sender<SessionSnapshot>>,
}

impl SessionHandle {
    /// Send a command and wait for the session to apply it
    pub async fn send(&self, command: SessionCommand) -> Result<CommandReply, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.commands.send((command, reply_tx)).await.is_err() {
            return Err(SessionError::invalid("send command", "session task has ended"));
        }
        reply_rx
            .await
            .unwrap_or_else(|_| {
                Err(SessionError::invalid(
                    "send command",
                    "session task has ended",
                ))
            })
    }

    /// Current snapshot, or `None` once the session task has ended
    pub async fn snapshot(&self) -> Option<SessionSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.snapshots.send(tx).await.ok()?;
        rx.await.ok()
    }
}

/// Poll period for `SessionRunner::spawn`
///
/// Timers fire on exact one-second boundaries; a period well under a second
/// keeps the lag between a budget running out and the session noticing it
/// below a quarter second.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(250);

/// Hosts a `SessionController` on its own task
///
/// The task is the controller's only owner: commands and clock ticks are
/// handled one at a time, so a tick never interleaves with a command.
/// `tick_period` bounds how late an auto-stop or phase change is observed;
/// use [`DEFAULT_TICK_PERIOD`] unless there is a reason not to.
pub struct SessionRunner;

impl SessionRunner {
    pub fn spawn(
        controller: SessionController,
        tick_period: Duration,
    ) -> (
        SessionHandle,
        mpsc::UnboundedReceiver<SessionEvent>,
        JoinHandle<SessionSnapshot>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (snapshot_tx, snapshot_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(run(
            controller,
            tick_period,
            command_rx,
            snapshot_rx,
            event_tx,
        ));

        let handle = SessionHandle {
            commands: command_tx,
            snapshots: snapshot_tx,
        };
        (handle, event_rx, task)
    }
}

async fn run(
    mut controller: SessionController,
    tick_period: Duration,
    mut commands: mpsc::Receiver<Envelope>,
    mut snapshots: mpsc::Receiver<oneshot::Sender<SessionSnapshot>>,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> SessionSnapshot {
    info!("Session task started: {}", controller.session_id());

    let mut ticker = tokio::time::interval(tick_period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    forward(&events, controller.poll().await);

    while !controller.is_finished() {
        tokio::select! {
            command = commands.recv() => {
                let Some((command, reply)) = command else {
                    warn!("All session handles dropped; dismissing session");
                    controller.dismiss().await;
                    break;
                };
                debug!("Applying command {:?}", command);
                let result = apply(&mut controller, command).await;
                let _ = reply.send(result);
            }
            Some(reply) = snapshots.recv() => {
                let _ = reply.send(controller.snapshot());
            }
            _ = ticker.tick() => {}
        }

        forward(&events, controller.poll().await);
    }

    forward(&events, controller.poll().await);
    info!("Session task finished: {}", controller.session_id());
    controller.snapshot()
}

async fn apply(
    controller: &mut SessionController,
    command: SessionCommand,
) -> Result<CommandReply, SessionError> {
    match command {
        SessionCommand::BeginRecording => controller
            .begin_recording()
            .await
            .map(|_| CommandReply::Done),
        SessionCommand::StopRecording => controller
            .stop_recording()
            .await
            .map(CommandReply::Applied),
        SessionCommand::RetryRecording => controller
            .retry_recording()
            .await
            .map(CommandReply::Applied),
        SessionCommand::CompleteAndSave => controller
            .complete_and_save()
            .await
            .map(CommandReply::Saved),
        SessionCommand::StartBreathing => controller.start_breathing().map(|_| CommandReply::Done),
        SessionCommand::StopBreathing => controller.stop_breathing().map(CommandReply::Applied),
        SessionCommand::CompleteStep => controller
            .complete_current_step()
            .await
            .map(|_| CommandReply::Done),
        SessionCommand::CommitSleepHours(hours) => controller
            .commit_sleep_hours(hours)
            .await
            .map(|_| CommandReply::Done),
        SessionCommand::Advance => controller.advance().await.map(|_| CommandReply::Done),
        SessionCommand::Skip(index) => controller.skip(index).await.map(|_| CommandReply::Done),
        SessionCommand::Rewind(index) => controller.rewind(index).await.map(|_| CommandReply::Done),
        SessionCommand::Restart => {
            controller.restart().await;
            Ok(CommandReply::Done)
        }
        SessionCommand::Dismiss => {
            controller.dismiss().await;
            Ok(CommandReply::Done)
        }
    }
}

fn forward(events: &mpsc::UnboundedSender<SessionEvent>, batch: Vec<SessionEvent>) {
    for event in batch {
        // The UI may have stopped listening; the session carries on regardless
        let _ = events.send(event);
    }
}
