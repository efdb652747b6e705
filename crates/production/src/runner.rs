//! Production runner implementation.

use crate::timers::ResumptionTimer;
use quorumsim_bft::{ConfigError, PbftConfig, PbftSnapshot, PbftState, PbftStatus};
use quorumsim_core::{Action, Event, StateMachine};
use quorumsim_types::{Block, Value};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{instrument, span, Level};

/// Default capacity of the command channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Errors from the production runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Command channel closed")]
    ChannelClosed,
    #[error("Request dropped")]
    RequestDropped,
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Notifications published by the runner for external observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A block was appended to the decision log.
    BlockCommitted(Block),
    /// An attempt ended without quorum.
    QuorumFailed { view: u64, failure_count: u32 },
    /// The view advanced.
    ViewChanged { view: u64 },
}

/// Requests from a [`PbftHandle`] to the event loop.
enum Command {
    Handle {
        event: Event,
        reply: oneshot::Sender<Arc<PbftStatus>>,
    },
    Configure {
        config: PbftConfig,
        reply: oneshot::Sender<Result<Arc<PbftStatus>, ConfigError>>,
    },
    Snapshot {
        reply: oneshot::Sender<PbftSnapshot>,
    },
}

/// Handle for shutting down a running ProductionRunner.
///
/// When dropped, signals the runner to exit gracefully.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl ShutdownHandle {
    /// Trigger shutdown (consumes the handle).
    pub fn shutdown(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ShutdownHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Cloneable handle for driving a running [`ProductionRunner`].
///
/// Every call completes after the event loop has applied the transition and
/// returns the status published right after it.
#[derive(Clone)]
pub struct PbftHandle {
    command_tx: mpsc::Sender<Command>,
    status_rx: watch::Receiver<Arc<PbftStatus>>,
}

impl PbftHandle {
    /// Begin a round.
    pub async fn start_round(&self) -> Result<Arc<PbftStatus>, RunnerError> {
        self.send_event(Event::StartRound).await
    }

    /// Submit the client value.
    pub async fn submit_value(
        &self,
        value: impl Into<Value>,
    ) -> Result<Arc<PbftStatus>, RunnerError> {
        self.send_event(Event::SubmitValue {
            value: value.into(),
        })
        .await
    }

    /// Run the next phase in step mode.
    pub async fn advance(&self) -> Result<Arc<PbftStatus>, RunnerError> {
        self.send_event(Event::Advance).await
    }

    /// Replace the coordinator configuration, aborting any round in flight.
    pub async fn configure(&self, config: PbftConfig) -> Result<Arc<PbftStatus>, RunnerError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Configure { config, reply })
            .await
            .map_err(|_| RunnerError::ChannelClosed)?;
        Ok(rx.await.map_err(|_| RunnerError::RequestDropped)??)
    }

    /// The most recently published status.
    pub fn status(&self) -> Arc<PbftStatus> {
        self.status_rx.borrow().clone()
    }

    /// Copy of the full state, both logs included, taken between transitions.
    pub async fn snapshot(&self) -> Result<PbftSnapshot, RunnerError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| RunnerError::ChannelClosed)?;
        rx.await.map_err(|_| RunnerError::RequestDropped)
    }

    /// Wait until a published status satisfies `predicate`.
    ///
    /// Used to observe transitions the loop makes on its own, such as the
    /// view-change resumption.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&PbftStatus) -> bool,
    ) -> Result<Arc<PbftStatus>, RunnerError> {
        let mut rx = self.status_rx.clone();
        let status = rx
            .wait_for(|status| predicate(status))
            .await
            .map_err(|_| RunnerError::ChannelClosed)?;
        Ok(Arc::clone(&status))
    }

    async fn send_event(&self, event: Event) -> Result<Arc<PbftStatus>, RunnerError> {
        let (reply, rx) = oneshot::channel();
        self.command_tx
            .send(Command::Handle { event, reply })
            .await
            .map_err(|_| RunnerError::ChannelClosed)?;
        rx.await.map_err(|_| RunnerError::RequestDropped)
    }
}

/// Builder for constructing a [`ProductionRunner`].
///
/// Optional fields:
/// - `config` - Coordinator configuration (defaults to [`PbftConfig::default`])
/// - `channel_capacity` - Command channel capacity (defaults to 64)
/// - `notifications` - Sender for [`Notification`]s
///
/// # Example
///
/// ```no_run
/// use quorumsim_bft::PbftConfig;
/// use quorumsim_production::ProductionRunner;
///
/// # async fn example() -> Result<(), quorumsim_production::RunnerError> {
/// let (runner, handle) = ProductionRunner::builder()
///     .config(PbftConfig::new(4, 0.0, true))
///     .build()?;
/// tokio::spawn(runner.run());
///
/// handle.start_round().await?;
/// let status = handle.submit_value("A").await?;
/// assert_eq!(status.decision_count, 1);
/// # Ok(())
/// # }
/// ```
pub struct ProductionRunnerBuilder {
    config: PbftConfig,
    channel_capacity: usize,
    notifications: Option<mpsc::UnboundedSender<Notification>>,
}

impl Default for ProductionRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductionRunnerBuilder {
    pub fn new() -> Self {
        Self {
            config: PbftConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            notifications: None,
        }
    }

    /// Set the coordinator configuration.
    pub fn config(mut self, config: PbftConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the command channel capacity.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Publish notifications to `tx`.
    pub fn notifications(mut self, tx: mpsc::UnboundedSender<Notification>) -> Self {
        self.notifications = Some(tx);
        self
    }

    /// Build the runner and a handle to drive it.
    pub fn build(self) -> Result<(ProductionRunner, PbftHandle), RunnerError> {
        let state = PbftState::new(self.config)?;

        // Timers get their own small channel so commands never delay them.
        let (timer_tx, timer_rx) = mpsc::channel(16);
        let (command_tx, command_rx) = mpsc::channel(self.channel_capacity);
        let (status_tx, status_rx) = watch::channel(Arc::new(state.status()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let runner = ProductionRunner {
            state,
            resumption: ResumptionTimer::new(timer_tx),
            timer_rx,
            command_rx,
            status_tx,
            notifications: self.notifications,
            start_time: Instant::now(),
            shutdown_rx,
            shutdown_tx: Some(shutdown_tx),
        };
        let handle = PbftHandle {
            command_tx,
            status_rx,
        };
        Ok((runner, handle))
    }
}

/// Production runner with async I/O.
///
/// A single task owns the coordinator and receives commands and timer events
/// via mpsc channels, so no lock guards the state.
pub struct ProductionRunner {
    state: PbftState,
    resumption: ResumptionTimer,
    /// Timer fires. Checked before commands.
    timer_rx: mpsc::Receiver<Event>,
    command_rx: mpsc::Receiver<Command>,
    status_tx: watch::Sender<Arc<PbftStatus>>,
    notifications: Option<mpsc::UnboundedSender<Notification>>,
    start_time: Instant,
    /// Shutdown signal receiver.
    shutdown_rx: oneshot::Receiver<()>,
    /// Shutdown handle sender (stored to return to caller).
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ProductionRunner {
    /// Create a new builder for constructing a production runner.
    pub fn builder() -> ProductionRunnerBuilder {
        ProductionRunnerBuilder::new()
    }

    /// Take the shutdown handle. Returns `None` after the first call.
    pub fn shutdown_handle(&mut self) -> Option<ShutdownHandle> {
        self.shutdown_tx
            .take()
            .map(|tx| ShutdownHandle { tx: Some(tx) })
    }

    /// Run the main event loop.
    ///
    /// This should be spawned as a task. It runs until shutdown is signalled
    /// or every [`PbftHandle`] has been dropped.
    ///
    /// # Priority Handling
    ///
    /// Uses a `biased` select: shutdown first, then timers, then commands.
    pub async fn run(mut self) -> Result<(), RunnerError> {
        tracing::info!(
            nodes = self.state.replicas().len(),
            byzantine = self.state.byzantine_count(),
            "Starting production runner"
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut self.shutdown_rx => {
                    tracing::info!("Shutdown signal received");
                    break;
                }

                Some(event) = self.timer_rx.recv() => {
                    let event_type = event.type_name();
                    let event_span = span!(
                        Level::DEBUG,
                        "handle_timer",
                        event.type = %event_type,
                    );
                    let _event_guard = event_span.enter();

                    self.dispatch_event(event);
                    self.publish();
                }

                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        tracing::info!("All handles dropped");
                        break;
                    };
                    self.handle_command(command);
                }
            }
        }

        self.resumption.disarm();
        tracing::info!(
            decisions = self.state.decisions().len(),
            view = self.state.view(),
            "Production runner stopped"
        );
        Ok(())
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Handle { event, reply } => {
                let event_type = event.type_name();
                let event_span = span!(
                    Level::DEBUG,
                    "handle_event",
                    event.type = %event_type,
                );
                let _event_guard = event_span.enter();

                self.dispatch_event(event);
                let status = self.publish();
                // The caller may have given up waiting.
                let _ = reply.send(status);
            }
            Command::Configure { config, reply } => {
                let result = match self.state.configure(config) {
                    Ok(actions) => {
                        for action in actions {
                            self.process_action(action);
                        }
                        Ok(self.publish())
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Rejected configuration");
                        Err(e)
                    }
                };
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
        }
    }

    fn dispatch_event(&mut self, event: Event) {
        self.state.set_time(self.start_time.elapsed());
        let actions = self.state.handle(event);
        for action in actions {
            self.process_action(action);
        }
    }

    #[instrument(level = "debug", skip(self), fields(action.type = %action.type_name()))]
    fn process_action(&mut self, action: Action) {
        match action {
            Action::SetTimer { id, duration } => self.resumption.arm(id, duration),
            Action::CancelTimer { id } => {
                if !self.resumption.cancel(id) {
                    tracing::debug!(?id, "Cancelled resumption had already fired");
                }
            }
            Action::EmitCommittedBlock { block } => {
                tracing::info!(number = block.number, value = %block.value, "Block committed");
                self.notify(Notification::BlockCommitted(block));
            }
            Action::EmitQuorumFailure {
                view,
                failure_count,
            } => self.notify(Notification::QuorumFailed {
                view,
                failure_count,
            }),
            Action::EmitViewChange { view, .. } => {
                self.notify(Notification::ViewChanged { view });
            }
        }
    }

    fn notify(&mut self, notification: Notification) {
        if let Some(tx) = &self.notifications {
            if tx.send(notification).is_err() {
                tracing::debug!("Notification receiver dropped");
                self.notifications = None;
            }
        }
    }

    /// Publish the bounded status. The logs stay with the loop until a
    /// handle asks for a snapshot.
    fn publish(&self) -> Arc<PbftStatus> {
        let status = Arc::new(self.state.status());
        self.status_tx.send_replace(Arc::clone(&status));
        status
    }
}
