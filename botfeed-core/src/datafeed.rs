//! Datafeed polling loop.
//!
//! [`DatafeedLoop`] owns the feed id and ack id for one running episode and
//! drives a strictly sequential read → dispatch → commit cycle in a single
//! background task.
//!
//! # Architecture
//!
//! ```text
//!   start() ──► FeedLifecycle::ensure_feed ──► spawn worker
//!                                                 │
//!            ┌────────────────────────────────────┘
//!            ▼
//!   ┌─────────────────┐   Ok(events, ack)   ┌──────────────────┐
//!   │ read_feed(ack)  │ ──────────────────► │ EventDispatcher  │──► listeners
//!   └─────────────────┘                     └──────────────────┘    (snapshot)
//!        │      │                                   │
//!        │      │ StaleFeed                         ▼
//!        │      └──► recover_from_stale,        ack ← new ack
//!        │           ack ← ""                   stop requested? ──► Stopped
//!        │ other error
//!        └──► backoff, retry with same feed and ack
//! ```
//!
//! Stop is cooperative: [`DatafeedLoop::stop`] (or a [`StopHandle`] held by a
//! listener) only marks the loop as stopping. An in-flight read or dispatch
//! always completes; the flag is consulted before the next read and while
//! sleeping between retries.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::auth::AuthSession;
use crate::config::DatafeedConfig;
use crate::dispatch::EventDispatcher;
use crate::error::{Result, TransportError};
use crate::lifecycle::FeedLifecycle;
use crate::registry::{ListenerRef, ListenerRegistry};
use crate::retry::Backoff;
use crate::transport::{AckId, DatafeedTransport, Feed, ReadResult};

/// Lifecycle state of a [`DatafeedLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    /// Never started.
    Idle,
    /// Setting up or polling.
    Running,
    /// Stop requested; the current read or batch is finishing.
    Stopping,
    /// The worker has exited.
    Stopped,
}

/// Feed id and last committed ack id of a running (or finished) episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPosition {
    pub feed_id: String,
    pub ack_id: AckId,
}

struct Control {
    status: LoopStatus,
    cancel: CancellationToken,
    position: Option<FeedPosition>,
}

/// State shared between the loop, its worker and stop handles.
struct LoopControl {
    inner: Mutex<Control>,
    /// Woken each time an episode reaches `Stopped`.
    stopped: Notify,
}

impl LoopControl {
    fn new() -> Self {
        Self {
            inner: Mutex::new(Control {
                status: LoopStatus::Idle,
                cancel: CancellationToken::new(),
                position: None,
            }),
            stopped: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Control> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn request_stop(&self) {
        let mut control = self.lock();
        if control.status == LoopStatus::Running {
            control.status = LoopStatus::Stopping;
            control.cancel.cancel();
            info!("Datafeed loop stop requested");
        } else {
            trace!(status = ?control.status, "Stop ignored");
        }
    }

    fn status(&self) -> LoopStatus {
        self.lock().status
    }

    fn record(&self, position: FeedPosition) {
        self.lock().position = Some(position);
    }

    fn finish(&self) {
        self.lock().status = LoopStatus::Stopped;
        self.stopped.notify_waiters();
    }
}

/// Cloneable handle that requests the loop to stop.
///
/// Safe to use from inside a listener handler: the current batch finishes
/// dispatching and no further read is issued.
#[derive(Clone)]
pub struct StopHandle {
    control: Arc<LoopControl>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.control.request_stop();
    }

    pub fn status(&self) -> LoopStatus {
        self.control.status()
    }
}

impl std::fmt::Debug for StopHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopHandle")
            .field("status", &self.status())
            .finish()
    }
}

/// Polls one datafeed and fans events out to subscribed listeners.
pub struct DatafeedLoop {
    transport: Arc<dyn DatafeedTransport>,
    auth: Arc<dyn AuthSession>,
    config: DatafeedConfig,
    registry: Arc<ListenerRegistry>,
    control: Arc<LoopControl>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DatafeedLoop {
    pub fn new(
        transport: Arc<dyn DatafeedTransport>,
        auth: Arc<dyn AuthSession>,
        config: DatafeedConfig,
    ) -> Self {
        Self {
            transport,
            auth,
            config,
            registry: Arc::new(ListenerRegistry::new()),
            control: Arc::new(LoopControl::new()),
            task: Mutex::new(None),
        }
    }

    /// Add a listener. Takes effect from the next batch.
    pub fn subscribe(&self, listener: ListenerRef) -> bool {
        self.registry.subscribe(listener)
    }

    /// Remove a listener. Takes effect from the next batch.
    pub fn unsubscribe(&self, listener: &ListenerRef) -> bool {
        self.registry.unsubscribe(listener)
    }

    /// Obtain a feed and start polling in a background task.
    ///
    /// Returns once a feed id is available; polling continues until
    /// [`stop`](Self::stop). Fails if no feed id could be obtained within
    /// `setup_attempts`.
    ///
    /// Calling `start` while the loop is running does nothing. While a
    /// previous episode is still stopping, `start` first waits for it to
    /// reach [`LoopStatus::Stopped`] and then begins a fresh episode with
    /// a new feed discovery, so `stop(); start().await?` always restarts.
    pub async fn start(&self) -> Result<()> {
        let cancel = loop {
            let stopped = self.control.stopped.notified();
            {
                let mut control = self.control.lock();
                match control.status {
                    LoopStatus::Running => {
                        debug!("Datafeed loop already running, ignoring start");
                        return Ok(());
                    }
                    LoopStatus::Stopping => {
                        debug!("Waiting for previous datafeed episode to stop");
                    }
                    LoopStatus::Idle | LoopStatus::Stopped => {
                        control.status = LoopStatus::Running;
                        control.position = None;
                        control.cancel = CancellationToken::new();
                        break control.cancel.clone();
                    }
                }
            }
            stopped.await;
        };

        info!("Starting datafeed loop");
        let lifecycle = FeedLifecycle::new(Arc::clone(&self.transport), Arc::clone(&self.auth));
        let mut backoff = Backoff::new(&self.config.retry);

        let setup = AssertUnwindSafe(self.setup(&lifecycle, &mut backoff, &cancel))
            .catch_unwind()
            .await;
        let setup = match setup {
            Ok(setup) => setup,
            Err(panic) => {
                self.control.finish();
                std::panic::resume_unwind(panic);
            }
        };

        let feed = match setup {
            Ok(Some(feed)) => feed,
            Ok(None) => {
                self.control.finish();
                info!("Datafeed loop stopped during setup");
                return Ok(());
            }
            Err(e) => {
                self.control.finish();
                error!(error = %e, "Failed to obtain a datafeed");
                return Err(e);
            }
        };
        backoff.reset();
        self.control.record(FeedPosition {
            feed_id: feed.id.clone(),
            ack_id: AckId::default(),
        });

        let worker = Worker {
            transport: Arc::clone(&self.transport),
            auth: Arc::clone(&self.auth),
            lifecycle,
            registry: Arc::clone(&self.registry),
            dispatcher: EventDispatcher::new(self.config.bot_username.clone()),
            backoff,
            control: Arc::clone(&self.control),
            cancel,
            feed_id: feed.id,
            ack_id: AckId::default(),
            stale_streak: 0,
            refreshed: false,
        };

        let handle = tokio::spawn(worker.run());
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Request termination without waiting for it.
    pub fn stop(&self) {
        self.control.request_stop();
    }

    /// Handle for stopping the loop from listener code.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            control: Arc::clone(&self.control),
        }
    }

    /// Wait for the background task of the current episode to exit.
    pub async fn join(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            error!(error = %e, "Datafeed task panicked");
            self.control.finish();
        }
    }

    /// Start and poll until stopped.
    pub async fn run(&self) -> Result<()> {
        self.start().await?;
        self.join().await;
        Ok(())
    }

    pub fn status(&self) -> LoopStatus {
        self.control.status()
    }

    /// Position of the current episode, or of the last one once stopped.
    pub fn position(&self) -> Option<FeedPosition> {
        self.control.lock().position.clone()
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &DatafeedConfig {
        &self.config
    }

    async fn setup(
        &self,
        lifecycle: &FeedLifecycle,
        backoff: &mut Backoff,
        cancel: &CancellationToken,
    ) -> Result<Option<Feed>> {
        let attempts = self.config.setup_attempts.max(1);
        loop {
            match lifecycle.ensure_feed().await {
                Ok(feed) => return Ok((!cancel.is_cancelled()).then_some(feed)),
                Err(e) if backoff.attempts() + 1 >= attempts => return Err(e),
                Err(e) => {
                    warn!(
                        attempt = backoff.attempts() + 1,
                        error = %e,
                        "Failed to obtain datafeed, retrying"
                    );
                    if !sleep_or_cancel(backoff.next_delay(), cancel).await {
                        return Ok(None);
                    }
                }
            }
        }
    }
}

impl Drop for DatafeedLoop {
    fn drop(&mut self) {
        self.control.request_stop();
    }
}

impl std::fmt::Debug for DatafeedLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatafeedLoop")
            .field("status", &self.status())
            .field("position", &self.position())
            .field("listeners", &self.registry.len())
            .finish_non_exhaustive()
    }
}

/// Background task state for one running episode.
struct Worker {
    transport: Arc<dyn DatafeedTransport>,
    auth: Arc<dyn AuthSession>,
    lifecycle: FeedLifecycle,
    registry: Arc<ListenerRegistry>,
    dispatcher: EventDispatcher,
    backoff: Backoff,
    control: Arc<LoopControl>,
    cancel: CancellationToken,
    feed_id: String,
    ack_id: AckId,
    /// Consecutive stale-feed recoveries without a successful read.
    stale_streak: u32,
    /// Whether the session was refreshed since the last successful read.
    refreshed: bool,
}

impl Worker {
    async fn run(mut self) {
        info!(feed_id = %self.feed_id, "Datafeed loop started");

        if AssertUnwindSafe(self.poll()).catch_unwind().await.is_err() {
            error!(feed_id = %self.feed_id, ack_id = %self.ack_id, "Datafeed worker panicked");
        }

        self.control.finish();
        info!(feed_id = %self.feed_id, ack_id = %self.ack_id, "Datafeed loop stopped");
    }

    async fn poll(&mut self) {
        while !self.cancel.is_cancelled() {
            if !self.cycle().await {
                break;
            }
        }
    }

    /// One read and its follow-up. Returns `false` if a stop request
    /// interrupted a backoff sleep.
    async fn cycle(&mut self) -> bool {
        let tokens = match self.auth.tokens().await {
            Ok(tokens) => tokens,
            Err(e) => {
                error!(error = %e, "Failed to obtain auth tokens");
                return self.pause().await;
            }
        };

        match self
            .transport
            .read_feed(&tokens, &self.feed_id, &self.ack_id)
            .await
        {
            Ok(result) => {
                self.backoff.reset();
                self.stale_streak = 0;
                self.refreshed = false;
                self.handle_batch(result).await;
                true
            }
            Err(e) if e.is_stale() => self.recover(e).await,
            Err(e) if e.is_unauthorized() => self.refresh_session().await,
            Err(e) => {
                error!(feed_id = %self.feed_id, error = %e, "Datafeed read failed");
                self.pause().await
            }
        }
    }

    async fn handle_batch(&mut self, result: ReadResult) {
        let ReadResult { events, ack_id } = result;

        if events.is_empty() {
            trace!(feed_id = %self.feed_id, "Empty batch");
        } else {
            debug!(feed_id = %self.feed_id, count = events.len(), "Dispatching batch");
            let listeners = self.registry.snapshot();
            let outcome = self.dispatcher.dispatch_all(&events, &listeners).await;
            if outcome.failed > 0 {
                warn!(
                    feed_id = %self.feed_id,
                    failed = outcome.failed,
                    "Listener handlers failed during batch"
                );
            }
        }

        self.ack_id = ack_id;
        self.publish_position();
    }

    /// Replace a stale feed, retrying until it succeeds or a stop arrives.
    async fn recover(&mut self, cause: TransportError) -> bool {
        warn!(feed_id = %self.feed_id, error = %cause, "Datafeed is stale, recreating");

        if self.stale_streak > 0 && !self.pause().await {
            return false;
        }
        self.stale_streak = self.stale_streak.saturating_add(1);

        loop {
            match self.lifecycle.recover_from_stale(&self.feed_id).await {
                Ok(feed) => {
                    self.feed_id = feed.id;
                    self.ack_id = AckId::default();
                    self.publish_position();
                    return true;
                }
                Err(e) => {
                    error!(feed_id = %self.feed_id, error = %e, "Failed to recreate datafeed");
                    if !self.pause().await {
                        return false;
                    }
                }
            }
        }
    }

    async fn refresh_session(&mut self) -> bool {
        // A second rejection right after a refresh gets spaced out like any
        // other repeated failure.
        if self.refreshed && !self.pause().await {
            return false;
        }

        warn!(feed_id = %self.feed_id, "Agent rejected session, refreshing");
        match self.auth.refresh().await {
            Ok(()) => {
                self.refreshed = true;
                true
            }
            Err(e) => {
                error!(error = %e, "Session refresh failed");
                self.pause().await
            }
        }
    }

    async fn pause(&mut self) -> bool {
        sleep_or_cancel(self.backoff.next_delay(), &self.cancel).await
    }

    fn publish_position(&self) {
        self.control.record(FeedPosition {
            feed_id: self.feed_id.clone(),
            ack_id: self.ack_id.clone(),
        });
    }
}

/// Sleep for `delay`; returns `false` if cancelled first.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    debug!(delay_ms = delay.as_millis() as u64, "Backing off before retry");
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
