//! Supervised miner instance
//!
//! A `MiningInstance` owns one backend variant and runs its miner under
//! supervision. Two cancellation sources exist: the token handed to `run` by
//! the caller, and the instance's own internal token. A watcher task bridges
//! the first into the second, so the read loop and process teardown only
//! ever watch the internal token.

use crate::backend::{Invocation, MinerBackend};
use crate::process::ProcessLineReader;
use crate::sink::{LogSink, TracingSink};
use crate::{Error, HardwareUnit, MinerDescriptor, PoolEndpoint, Result, RewardTarget};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument, Span};
use uuid::Uuid;

/// How often the watcher checks the external token by default
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(1);

const MIN_WATCH_INTERVAL: Duration = Duration::from_millis(1);

/// Lifecycle of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// Constructed, `run` not called yet
    Created,
    /// Miner process supervised
    Running,
    /// Supervision ended
    Finished,
}

/// One supervised miner
pub struct MiningInstance {
    id: Uuid,
    descriptor: Arc<MinerDescriptor>,
    backend: Arc<dyn MinerBackend>,
    hardware: Vec<HardwareUnit>,
    algorithm: String,
    reward: RewardTarget,
    endpoint: PoolEndpoint,
    sink: Arc<dyn LogSink>,
    watch_interval: Duration,
    cancel: CancellationToken,
    state: Arc<Mutex<InstanceState>>,
}

/// Reject blank values and values that would not survive as one argument
fn required(value: &str, what: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::invalid_argument(format!("{} is required", what)));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(Error::invalid_argument(format!(
            "{} must not contain whitespace: {:?}",
            what, value
        )));
    }
    if value.contains(['\'', '"', '\\']) {
        return Err(Error::invalid_argument(format!(
            "{} must not contain quotes or backslashes: {:?}",
            what, value
        )));
    }
    Ok(value.to_string())
}

impl MiningInstance {
    /// Validate the inputs and create an instance in the `Created` state
    ///
    /// Fails with `InvalidArgument` when a required input is blank and with
    /// `UnsupportedAlgorithm` when the miner does not declare `algorithm`.
    pub fn new(
        backend: Arc<dyn MinerBackend>,
        descriptor: Arc<MinerDescriptor>,
        hardware: Vec<HardwareUnit>,
        algorithm: &str,
        reward_coin: &str,
        reward_address: &str,
        endpoint: PoolEndpoint,
    ) -> Result<Self> {
        if descriptor.executable.as_os_str().is_empty() {
            return Err(Error::invalid_argument(format!(
                "Miner {} has no executable path",
                descriptor.name
            )));
        }
        let algorithm = required(algorithm, "Algorithm")?;
        let coin = required(reward_coin, "Reward coin")?;
        let address = required(reward_address, "Reward address")?;
        let host = required(&endpoint.host, "Pool host")?;

        if !descriptor.supports(&algorithm) {
            return Err(Error::unsupported_algorithm(&descriptor.name, algorithm));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            descriptor,
            backend,
            hardware,
            algorithm,
            reward: RewardTarget::new(coin, address),
            endpoint: PoolEndpoint::new(host, endpoint.port),
            sink: Arc::new(TracingSink),
            watch_interval: DEFAULT_WATCH_INTERVAL,
            cancel: CancellationToken::new(),
            state: Arc::new(Mutex::new(InstanceState::Created)),
        })
    }

    /// Send forwarded lines to `sink` instead of `tracing`
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Change how often the watcher polls the external token
    pub fn with_watch_interval(mut self, watch_interval: Duration) -> Self {
        self.watch_interval = watch_interval.max(MIN_WATCH_INTERVAL);
        self
    }

    /// Unique id of this instance, as recorded in its tracing span
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Descriptor of the supervised miner
    pub fn descriptor(&self) -> &Arc<MinerDescriptor> {
        &self.descriptor
    }

    /// Algorithm the miner runs
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Hardware selection, in construction order
    pub fn hardware(&self) -> &[HardwareUnit] {
        &self.hardware
    }

    /// Reward coin and address
    pub fn reward(&self) -> &RewardTarget {
        &self.reward
    }

    /// Pool endpoint
    pub fn endpoint(&self) -> &PoolEndpoint {
        &self.endpoint
    }

    /// Current lifecycle state
    pub fn state(&self) -> InstanceState {
        *self.state.lock()
    }

    /// Whether the internal token has fired
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Argument string the miner is started with
    pub fn invocation(&self) -> String {
        self.backend.build_invocation(&Invocation {
            hardware: &self.hardware,
            algorithm: &self.algorithm,
            reward: &self.reward,
            endpoint: &self.endpoint,
        })
    }

    /// Start supervising the miner
    ///
    /// Spawns the supervision task on the current tokio runtime and returns
    /// immediately. `external` is only observed through the watcher. Fails
    /// with `InvalidState` if the instance was already started.
    pub fn run(&self, external: CancellationToken) -> Result<MiningTask> {
        {
            let mut state = self.state.lock();
            if *state != InstanceState::Created {
                return Err(Error::invalid_state(format!(
                    "Instance {} was already started",
                    self.id
                )));
            }
            *state = InstanceState::Running;
        }

        let supervisor = Supervisor {
            miner: self.descriptor.name.clone(),
            executable: self.descriptor.executable.clone(),
            backend: Arc::clone(&self.backend),
            command: self.invocation(),
            sink: Arc::clone(&self.sink),
            watch_interval: self.watch_interval,
            cancel: self.cancel.clone(),
            state: Arc::clone(&self.state),
        };

        let span = mining_span(&self.descriptor.name, &self.algorithm, self.id);
        let handle = tokio::spawn(supervisor.run(external).instrument(span));

        Ok(MiningTask {
            instance_id: self.id,
            handle,
        })
    }

    /// Trigger the internal token; repeated calls are no-ops
    pub fn request_cancel(&self) {
        if !self.cancel.is_cancelled() {
            debug!(instance_id = %self.id, "Cancellation requested");
        }
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for MiningInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiningInstance")
            .field("id", &self.id)
            .field("miner", &self.descriptor.name)
            .field("algorithm", &self.algorithm)
            .field("hardware", &self.hardware)
            .field("reward", &self.reward)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

/// Map the outcome of one supervision run to what the task reports
///
/// Cancellation only counts as a clean stop when it was requested.
fn settle(miner: &str, result: Result<()>, requested: bool) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_cancellation() && requested => {
            info!("{} stopped on cancellation request", miner);
            Ok(())
        }
        Err(e) if e.is_cancellation() => Err(Error::unexpected_interruption(format!(
            "{} was interrupted without a cancellation request: {}",
            miner, e
        ))),
        Err(e) => {
            warn!("Supervision of {} failed: {}", miner, e);
            Err(e)
        }
    }
}

/// Everything the background task needs, detached from the instance
struct Supervisor {
    miner: String,
    executable: std::path::PathBuf,
    backend: Arc<dyn MinerBackend>,
    command: String,
    sink: Arc<dyn LogSink>,
    watch_interval: Duration,
    cancel: CancellationToken,
    state: Arc<Mutex<InstanceState>>,
}

impl Supervisor {
    async fn run(self, external: CancellationToken) -> Result<()> {
        let watcher = tokio::spawn(
            bridge_cancellation(self.cancel.clone(), external, self.watch_interval)
                .in_current_span(),
        );

        let result = self.execute().await;
        let requested = self.cancel.is_cancelled();

        // Ends the watcher when the miner exited on its own
        self.cancel.cancel();
        if let Err(e) = watcher.await {
            warn!("Cancellation watcher failed: {}", e);
        }
        *self.state.lock() = InstanceState::Finished;

        settle(&self.miner, result, requested)
    }

    async fn execute(&self) -> Result<()> {
        self.sink.invocation(&self.miner, &self.command);

        let mut reader =
            ProcessLineReader::spawn(&self.executable, &self.command, self.cancel.clone())?;
        info!("Started {} (pid {:?})", self.miner, reader.id());

        while let Some(raw) = reader.next_line().await? {
            let line = self.backend.classify_line(&raw);
            self.sink.line(&self.miner, &line);
        }

        match reader.exit_status() {
            Some(status) if !status.success() => warn!("{} exited with {}", self.miner, status),
            _ => info!("{} exited", self.miner),
        }
        Ok(())
    }
}

/// Cancel `internal` once `external` fires
///
/// Polls every `tick`, waking early when either token fires. Returns as soon
/// as `internal` is cancelled, whoever cancelled it.
pub async fn bridge_cancellation(
    internal: CancellationToken,
    external: CancellationToken,
    tick: Duration,
) {
    let mut ticker = interval(tick.max(MIN_WATCH_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while !internal.is_cancelled() {
        if external.is_cancelled() {
            debug!("External cancellation observed");
            internal.cancel();
            break;
        }

        tokio::select! {
            _ = internal.cancelled() => break,
            _ = external.cancelled() => {}
            _ = ticker.tick() => {}
        }
    }
}

/// Handle to a running supervision
///
/// Resolves once supervision ends. A cancellation-driven stop resolves to
/// `Ok(())`; anything else that stopped the miner resolves to the error.
#[derive(Debug)]
pub struct MiningTask {
    instance_id: Uuid,
    handle: JoinHandle<Result<()>>,
}

impl MiningTask {
    /// Id of the instance this task supervises
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Whether supervision has ended
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for MiningTask {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let instance_id = self.instance_id;
        Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(Error::unexpected_interruption(format!(
                "Supervision task of {} panicked",
                instance_id
            ))),
            Err(_) => Err(Error::unexpected_interruption(format!(
                "Supervision task of {} was aborted",
                instance_id
            ))),
        })
    }
}

/// Create a tracing span for a supervised miner
pub fn mining_span(miner: &str, algorithm: &str, instance_id: Uuid) -> Span {
    tracing::info_span!(
        "mining",
        miner = miner,
        algorithm = algorithm,
        instance_id = %instance_id,
    )
}
