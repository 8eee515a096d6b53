use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::message_db::{
    consumer::{Handler, HandlerRegistry, PositionStore, PositionTracker, Scheduler, StorePositions},
    error::{Error, Result},
    store::MessageStore,
    types::Message,
};

/// Configuration for a consumer
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Label used in errors, log lines and the position stream name
    pub name: String,

    /// Stream or category to consume
    pub stream_name: String,

    /// Persist a checkpoint after this many dispatched messages
    pub position_update_interval: usize,

    /// Stop fetching once this many messages are queued
    pub high_water_mark: usize,

    /// Resume fetching once the queue drains below this many messages
    pub low_water_mark: usize,

    /// Wait time when the stream has no new messages (milliseconds)
    pub polling_interval_ms: u64,

    /// Fail on messages whose type has no registered handler
    pub strict: bool,

    /// Global position of the first fetch
    pub start_position: i64,

    /// Start after the last persisted checkpoint instead of `start_position`
    pub resume_from_checkpoint: bool,
}

impl ConsumerConfig {
    /// Create a configuration with the default tuning
    ///
    /// # Example
    ///
    /// ```
    /// use message_consumer::message_db::consumer::ConsumerConfig;
    ///
    /// let config = ConsumerConfig::new("billing", "account")
    ///     .with_water_marks(200, 20)
    ///     .with_polling_interval_ms(250)
    ///     .with_strict(true);
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn new(name: impl Into<String>, stream_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stream_name: stream_name.into(),
            position_update_interval: 100,
            high_water_mark: 500,
            low_water_mark: 50,
            polling_interval_ms: 100,
            strict: false,
            start_position: 0,
            resume_from_checkpoint: false,
        }
    }

    /// Set the checkpoint coalescing factor (builder pattern)
    pub fn with_position_update_interval(mut self, interval: usize) -> Self {
        self.position_update_interval = interval;
        self
    }

    /// Set the backpressure thresholds (builder pattern)
    pub fn with_water_marks(mut self, high: usize, low: usize) -> Self {
        self.high_water_mark = high;
        self.low_water_mark = low;
        self
    }

    /// Set the polling interval in milliseconds (builder pattern)
    pub fn with_polling_interval_ms(mut self, interval_ms: u64) -> Self {
        self.polling_interval_ms = interval_ms;
        self
    }

    /// Set strict handler enforcement (builder pattern)
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the first global position to fetch (builder pattern)
    pub fn with_start_position(mut self, position: i64) -> Self {
        self.start_position = position;
        self
    }

    /// Start after the last checkpoint when one exists (builder pattern)
    pub fn with_resume_from_checkpoint(mut self, resume: bool) -> Self {
        self.resume_from_checkpoint = resume;
        self
    }

    /// Reject settings the consumer cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("consumer name required".to_string()));
        }
        if self.stream_name.trim().is_empty() {
            return Err(Error::Validation(format!(
                "{} consumer: stream name required",
                self.name
            )));
        }
        if self.position_update_interval == 0 {
            return Err(Error::Validation(format!(
                "{} consumer: position update interval must be at least 1",
                self.name
            )));
        }
        // A zero low water mark would never restart fetching after draining
        if self.low_water_mark == 0 || self.low_water_mark > self.high_water_mark {
            return Err(Error::Validation(format!(
                "{} consumer: water marks must satisfy 1 <= low ({}) <= high ({})",
                self.name, self.low_water_mark, self.high_water_mark
            )));
        }
        if self.start_position < 0 {
            return Err(Error::Validation(format!(
                "{} consumer: start position must not be negative",
                self.name
            )));
        }
        Ok(())
    }
}

/// Flow-control state of a running consumer
///
/// `WaitForMessages` means no message is queued for processing and the next
/// arriving batch has to restart the dispatch loop. It does not mean that no
/// fetch is in flight: the first fetch issued by `start` and every refill
/// issued while the queue drains run while the consumer reports
/// `WaitForMessages`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Filling,
    Draining,
    WaitForMessages,
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumerState::Filling => write!(f, "filling"),
            ConsumerState::Draining => write!(f, "draining"),
            ConsumerState::WaitForMessages => write!(f, "waitForMessages"),
        }
    }
}

/// Snapshot published after every task the consumer runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerStatus {
    pub state: ConsumerState,
    pub queue_len: usize,
    pub next_version: i64,
    /// Messages successfully dispatched since start
    pub dispatched: u64,
}

/// Units of work run by the consumer's scheduler
#[derive(Debug)]
enum Task {
    GetBatch(i64),
    WaitToGetBatch(i64),
    Batch(Vec<Message>),
    ProcessMessage,
}

impl Task {
    fn name(&self) -> &'static str {
        match self {
            Task::GetBatch(_) => "getBatch",
            Task::WaitToGetBatch(_) => "waitToGetBatch",
            Task::Batch(_) => "batch",
            Task::ProcessMessage => "processMessage",
        }
    }
}

/// Stream consumer with batching, backpressure and coalesced checkpoints
///
/// Messages are fetched in batches into an in-memory queue and dispatched one
/// at a time, strictly in global position order. Fetching stops once the
/// queue reaches the high water mark and restarts when it drains below the
/// low water mark. A failed dispatch pauses the consumer with the failed
/// message kept at the head of the queue; [`ConsumerHandle::resume`] retries
/// it before anything else.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use message_consumer::message_db::consumer::{Consumer, ConsumerConfig};
/// use message_consumer::message_db::store::{MemoryStore, MessageStore};
/// use message_consumer::message_db::types::{Message, WriteMessage};
///
/// # tokio_test::block_on(async {
/// let store = Arc::new(MemoryStore::new());
/// store.write(vec![WriteMessage::new("Withdrawn")], "account-1", None).await.unwrap();
///
/// let mut consumer = Consumer::new(store, ConsumerConfig::new("billing", "account")).unwrap();
/// consumer.on("Withdrawn", |msg: Message| async move {
///     println!("withdrawal at {}", msg.global_position);
///     Ok(())
/// });
///
/// let handle = consumer.start().await.unwrap();
/// handle.stop();
/// handle.join().await.unwrap();
/// # });
/// ```
pub struct Consumer {
    config: ConsumerConfig,
    store: Arc<dyn MessageStore>,
    registry: HandlerRegistry,
    tracker: PositionTracker,
}

impl Consumer {
    /// Create a consumer that checkpoints into the same message store
    pub fn new(store: Arc<dyn MessageStore>, config: ConsumerConfig) -> Result<Self> {
        config.validate()?;

        let positions: Arc<dyn PositionStore> =
            Arc::new(StorePositions::new(Arc::clone(&store), config.name.clone()));

        Ok(Self {
            registry: HandlerRegistry::new(config.name.clone(), config.strict),
            tracker: Self::tracker(positions, &config),
            store,
            config,
        })
    }

    fn tracker(positions: Arc<dyn PositionStore>, config: &ConsumerConfig) -> PositionTracker {
        PositionTracker::new(
            positions,
            config.stream_name.clone(),
            config.name.clone(),
            config.position_update_interval,
        )
    }

    /// Keep checkpoints in a different position store (builder pattern)
    pub fn with_position_store(mut self, positions: Arc<dyn PositionStore>) -> Self {
        self.tracker = Self::tracker(positions, &self.config);
        self
    }

    /// Append a handler for `message_type`
    pub fn register<H>(&mut self, message_type: impl Into<String>, handler: H)
    where
        H: Handler + 'static,
    {
        self.registry.register(message_type, handler);
    }

    /// Append a closure handler for `message_type`
    pub fn on<F, Fut>(&mut self, message_type: impl Into<String>, handler: F)
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.registry.on(message_type, handler);
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Run the handlers for one message, then advance the checkpoint.
    ///
    /// The checkpoint is only touched after every handler succeeded. Failures
    /// are logged with the message coordinates and returned unchanged.
    pub async fn dispatch(&mut self, message: &Message) -> Result<()> {
        let outcome = match self.registry.handle(message).await {
            Ok(()) => self.tracker.put(message.global_position).await,
            Err(err) => Err(err),
        };

        if let Err(err) = outcome {
            error!(
                stream_name = %self.config.stream_name,
                position = message.position,
                global_position = message.global_position,
                message_type = %message.message_type,
                error = %err,
                "{}",
                err
            );
            return Err(err);
        }

        debug!(
            stream_name = %self.config.stream_name,
            position = message.position,
            global_position = message.global_position,
            message_type = %message.message_type,
            "{} consumer: {} message dispatched to handlers",
            self.config.name,
            message.message_type
        );
        Ok(())
    }

    /// Start consuming on a background task
    pub async fn start(self) -> Result<ConsumerHandle> {
        let next_version = if self.config.resume_from_checkpoint {
            match self.tracker.read().await? {
                Some(checkpoint) => checkpoint + 1,
                None => self.config.start_position,
            }
        } else {
            self.config.start_position
        };

        let name = self.config.name.clone();
        let scheduler = Scheduler::new();
        let (status_tx, status_rx) = watch::channel(ConsumerStatus {
            state: ConsumerState::Filling,
            queue_len: 0,
            next_version,
            dispatched: 0,
        });

        let mut worker = Worker {
            consumer: self,
            scheduler: scheduler.clone(),
            queue: VecDeque::new(),
            next_version,
            state: ConsumerState::Filling,
            dispatched: 0,
            status: status_tx,
        };

        // The consumer counts as idle until the first batch lands; that
        // batch is what schedules the first processMessage.
        worker.fill();
        worker.state = ConsumerState::WaitForMessages;
        worker.publish();

        info!(
            stream_name = %worker.consumer.config.stream_name,
            next_version,
            strict = worker.consumer.registry.is_strict(),
            "{} consumer: started",
            name
        );

        Ok(ConsumerHandle {
            name,
            scheduler,
            status: status_rx,
            task: tokio::spawn(worker.run()),
        })
    }
}

/// Control surface of a started consumer
pub struct ConsumerHandle {
    name: String,
    scheduler: Scheduler<Task>,
    status: watch::Receiver<ConsumerStatus>,
    task: JoinHandle<Result<()>>,
}

impl ConsumerHandle {
    /// Stop running tasks after the current one completes
    pub fn pause(&self) {
        info!("{} consumer: paused", self.name);
        self.scheduler.pause();
    }

    /// Continue with the queued tasks; a message that failed is retried first
    pub fn resume(&self) {
        info!("{} consumer: resumed", self.name);
        self.scheduler.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.scheduler.is_paused()
    }

    /// Ask the consumer to finish; [`join`](Self::join) waits for it
    pub fn stop(&self) {
        self.scheduler.stop();
    }

    /// Latest published status
    pub fn status(&self) -> ConsumerStatus {
        self.status.borrow().clone()
    }

    /// A receiver that observes every status change
    pub fn subscribe(&self) -> watch::Receiver<ConsumerStatus> {
        self.status.clone()
    }

    /// Wait for the background task to end.
    ///
    /// Returns the error that terminated it, if any. Fetch errors are not
    /// retried by the consumer and end up here.
    pub async fn join(self) -> Result<()> {
        match self.task.await {
            Ok(result) => result,
            Err(join_error) => Err(Error::operation(
                format!("{} consumer", self.name),
                "consumer task failed",
                join_error,
            )),
        }
    }
}

/// Owned state of a running consumer, mutated only by its scheduled tasks
struct Worker {
    consumer: Consumer,
    scheduler: Scheduler<Task>,
    queue: VecDeque<Message>,
    next_version: i64,
    state: ConsumerState,
    dispatched: u64,
    status: watch::Sender<ConsumerStatus>,
}

impl Worker {
    async fn run(mut self) -> Result<()> {
        while let Some(task) = self.scheduler.next().await {
            let name = task.name();
            let outcome = self.run_task(task).await;
            self.publish();

            if let Err(err) = outcome {
                error!(
                    stream_name = %self.consumer.config.stream_name,
                    task = name,
                    error = %err,
                    "{} consumer: task failed, consumer stopped",
                    self.consumer.config.name
                );
                return Err(err);
            }
        }

        self.consumer.tracker.flush().await?;
        info!(
            stream_name = %self.consumer.config.stream_name,
            "{} consumer: stopped",
            self.consumer.config.name
        );
        Ok(())
    }

    async fn run_task(&mut self, task: Task) -> Result<()> {
        match task {
            Task::GetBatch(version) => self.get_batch(version).await?,
            Task::WaitToGetBatch(version) => self.wait_to_get_batch(version),
            Task::Batch(batch) => self.batch(batch),
            Task::ProcessMessage => self.process_message().await,
        }
        Ok(())
    }

    fn publish(&self) {
        self.status.send_replace(ConsumerStatus {
            state: self.state,
            queue_len: self.queue.len(),
            next_version: self.next_version,
            dispatched: self.dispatched,
        });
    }

    fn fill(&mut self) {
        self.state = ConsumerState::Filling;
        self.scheduler.trigger(Task::GetBatch(self.next_version));
    }

    async fn get_batch(&mut self, version: i64) -> Result<()> {
        let batch = self
            .consumer
            .store
            .get(&self.consumer.config.stream_name, version)
            .await?;

        if batch.is_empty() {
            self.scheduler.trigger(Task::WaitToGetBatch(version));
        } else {
            self.scheduler.trigger(Task::Batch(batch));
        }
        Ok(())
    }

    /// Re-issue the fetch after the polling interval.
    ///
    /// The delay runs off the scheduler so queued messages keep draining
    /// while the stream is tailed. The timer is not tracked; one that fires
    /// after `stop` only queues a task nobody will run.
    fn wait_to_get_batch(&mut self, version: i64) {
        let scheduler = self.scheduler.clone();
        let delay = Duration::from_millis(self.consumer.config.polling_interval_ms);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.trigger(Task::GetBatch(version));
        });
    }

    fn batch(&mut self, batch: Vec<Message>) {
        let Some(last) = batch.last() else {
            return;
        };
        self.next_version = last.global_position + 1;
        self.queue.extend(batch);

        let waiting = self.state == ConsumerState::WaitForMessages;

        if self.queue.len() < self.consumer.config.high_water_mark {
            self.fill();
        } else {
            self.state = ConsumerState::Draining;
            debug!(
                stream_name = %self.consumer.config.stream_name,
                queue_len = self.queue.len(),
                "{} consumer: high water mark reached, fetching suspended",
                self.consumer.config.name
            );
        }

        if waiting {
            self.scheduler.trigger(Task::ProcessMessage);
        }
    }

    async fn process_message(&mut self) {
        let Some(message) = self.queue.pop_front() else {
            self.state = ConsumerState::WaitForMessages;
            return;
        };

        match self.consumer.dispatch(&message).await {
            Ok(()) => self.dispatched += 1,
            Err(_) => {
                warn!(
                    stream_name = %self.consumer.config.stream_name,
                    position = message.position,
                    global_position = message.global_position,
                    message_type = %message.message_type,
                    "{} consumer: processing paused due to error (errorStrategy = \"pause\")",
                    self.consumer.config.name
                );
                self.scheduler.pause();
                self.queue.push_front(message);
            }
        }

        if self.state == ConsumerState::Draining
            && self.queue.len() < self.consumer.config.low_water_mark
        {
            self.fill();
        }

        if self.queue.is_empty() {
            self.state = ConsumerState::WaitForMessages;
        } else {
            self.scheduler.trigger(Task::ProcessMessage);
        }
    }
}
