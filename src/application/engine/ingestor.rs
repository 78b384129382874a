//! Market Data Ingestor (§4.1): maintains durable subscriptions across
//! the primary, supporting and HTF timeframes for one instrument,
//! normalizes and windows candles, and raises `primary-closed` on each
//! finalized primary-timeframe candle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::domain::engine::candle::Candle;
use crate::domain::engine::errors::IngestorError;
use crate::domain::engine::ports::MarketDataTransport;
use crate::domain::engine::timeframe::Timeframe;
use crate::domain::engine::window::TimeframeWindow;

/// Retention bounds per §2 ("≥50, ≤100 per timeframe") and §4.1 backfill
/// ("N ≥ 100 for HTFs, 50-100 for intraday").
fn retention_for(timeframe: Timeframe) -> usize {
    if timeframe.is_htf() {
        100
    } else {
        75
    }
}

fn backfill_limit_for(timeframe: Timeframe) -> usize {
    retention_for(timeframe)
}

/// Emitted once a primary-timeframe candle finalizes.
#[derive(Debug, Clone)]
pub struct PrimaryClosed {
    pub instrument: String,
    pub timeframe: Timeframe,
}

/// Shared, reader-accessible windows for one instrument across all of
/// its subscribed timeframes. Writes happen only on the ingestor task;
/// reads take a cheap snapshot via `RwLock::read`.
pub struct WindowStore {
    windows: RwLock<HashMap<Timeframe, TimeframeWindow>>,
}

impl WindowStore {
    fn new(timeframes: &[Timeframe]) -> Self {
        let mut map = HashMap::new();
        for &tf in timeframes {
            map.insert(tf, TimeframeWindow::new(retention_for(tf)));
        }
        Self { windows: RwLock::new(map) }
    }

    pub async fn snapshot(&self, timeframe: Timeframe) -> Vec<Candle> {
        let guard = self.windows.read().await;
        guard.get(&timeframe).map(|w| w.to_vec()).unwrap_or_default()
    }

    pub async fn len(&self, timeframe: Timeframe) -> usize {
        let guard = self.windows.read().await;
        guard.get(&timeframe).map(|w| w.len()).unwrap_or(0)
    }

    async fn push(&self, timeframe: Timeframe, candle: Candle) -> bool {
        let mut guard = self.windows.write().await;
        guard
            .entry(timeframe)
            .or_insert_with(|| TimeframeWindow::new(retention_for(timeframe)))
            .push(candle)
    }

    async fn reconcile(&self, timeframe: Timeframe, candles: Vec<Candle>) {
        let mut guard = self.windows.write().await;
        guard
            .entry(timeframe)
            .or_insert_with(|| TimeframeWindow::new(retention_for(timeframe)))
            .reconcile(candles);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Running,
    Suspended,
}

/// Maintains the candle windows for one instrument and raises
/// `primary-closed` via `events`. `start()`/`stop()` are idempotent;
/// `stop()` drains cleanly and can be called from any task.
pub struct MarketDataIngestor {
    instrument: String,
    primary: Timeframe,
    supporting: Vec<Timeframe>,
    htf: Vec<Timeframe>,
    transport: Arc<dyn MarketDataTransport>,
    windows: Arc<WindowStore>,
    events_tx: mpsc::Sender<PrimaryClosed>,
    state: Arc<RwLock<ConnectionState>>,
    cancel: Arc<tokio::sync::Notify>,
}

pub struct IngestorHandle {
    pub windows: Arc<WindowStore>,
    pub events: mpsc::Receiver<PrimaryClosed>,
}

impl MarketDataIngestor {
    pub fn new(
        instrument: impl Into<String>,
        primary: Timeframe,
        supporting: Vec<Timeframe>,
        htf: Vec<Timeframe>,
        transport: Arc<dyn MarketDataTransport>,
    ) -> (Self, IngestorHandle) {
        let all: Vec<Timeframe> = std::iter::once(primary)
            .chain(supporting.iter().copied())
            .chain(htf.iter().copied())
            .collect();
        let windows = Arc::new(WindowStore::new(&all));
        let (events_tx, events_rx) = mpsc::channel(32);

        let ingestor = Self {
            instrument: instrument.into(),
            primary,
            supporting,
            htf,
            transport,
            windows: windows.clone(),
            events_tx,
            state: Arc::new(RwLock::new(ConnectionState::Suspended)),
            cancel: Arc::new(tokio::sync::Notify::new()),
        };
        (ingestor, IngestorHandle { windows, events: events_rx })
    }

    fn all_timeframes(&self) -> Vec<Timeframe> {
        std::iter::once(self.primary)
            .chain(self.supporting.iter().copied())
            .chain(self.htf.iter().copied())
            .collect()
    }

    /// Subscribes to the candle stream and begins emitting `primary-closed`.
    /// Idempotent: calling while already running is a no-op.
    pub async fn start(&self) -> Result<(), IngestorError> {
        {
            let state = self.state.read().await;
            if *state == ConnectionState::Running {
                return Ok(());
            }
        }

        self.backfill_all().await;

        let timeframes = self.all_timeframes();
        let mut rx = self
            .transport
            .subscribe(&self.instrument, &timeframes)
            .await
            .map_err(|e| IngestorError::SubscriptionFailed { reason: e.to_string() })?;

        *self.state.write().await = ConnectionState::Running;
        info!("Ingestor [{}]: subscribed to {:?}", self.instrument, timeframes);

        let windows = self.windows.clone();
        let events_tx = self.events_tx.clone();
        let state = self.state.clone();
        let primary = self.primary;
        let instrument = self.instrument.clone();
        let cancel = self.cancel.clone();
        let transport = self.transport.clone();
        let htf = self.htf.clone();
        let supporting = self.supporting.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.notified() => {
                        info!("Ingestor [{}]: stop requested", instrument);
                        break;
                    }
                    maybe_event = rx.recv() => {
                        match maybe_event {
                            Some(event) => {
                                let suspended = {
                                    let guard = state.read().await;
                                    *guard == ConnectionState::Suspended
                                };
                                if suspended {
                                    debug!("Ingestor [{}]: suspended, dropping event", instrument);
                                    continue;
                                }
                                if !event.is_final {
                                    continue;
                                }
                                let tf = event.timeframe;
                                let candle: Candle = event.into();
                                let extended = windows.push(tf, candle).await;
                                if extended && tf == primary {
                                    if events_tx.try_send(PrimaryClosed { instrument: instrument.clone(), timeframe: tf }).is_err() {
                                        warn!("Ingestor [{}]: primary-closed event dropped (at most one pending)", instrument);
                                    }
                                }
                            }
                            None => {
                                warn!("Ingestor [{}]: transport stream closed, suspending", instrument);
                                *state.write().await = ConnectionState::Suspended;
                                // Reconnection is the transport's responsibility; once it
                                // resubscribes upstream we rely on a fresh `start()` call
                                // (or, for a production transport, an internal reconnect
                                // loop that reopens `rx` transparently).
                                Self::reconcile_after_reconnect(&instrument, &transport, &windows, &htf, &supporting, primary).await;
                                *state.write().await = ConnectionState::Running;
                            }
                        }
                    }
                }
            }
        });

        Ok(())
    }

    /// Idempotent stop: notifies the running task to exit. Safe to call
    /// multiple times or before `start()`.
    pub async fn stop(&self) {
        self.cancel.notify_waiters();
        *self.state.write().await = ConnectionState::Suspended;
    }

    async fn backfill_all(&self) {
        for tf in self.all_timeframes() {
            match self.transport.backfill(&self.instrument, tf, backfill_limit_for(tf)).await {
                Ok(events) => {
                    let candles: Vec<Candle> = events.into_iter().map(Candle::from).collect();
                    info!("Ingestor [{}]: backfilled {} {} candles", self.instrument, candles.len(), tf);
                    self.windows.reconcile(tf, candles).await;
                }
                Err(e) => {
                    if tf.is_htf() {
                        warn!(
                            "Ingestor [{}]: HTF backfill failed for {} (non-fatal, HTF context degrades): {}",
                            self.instrument, tf, e
                        );
                    } else {
                        error!("Ingestor [{}]: backfill failed for {}: {}", self.instrument, tf, e);
                    }
                }
            }
        }
    }

    async fn reconcile_after_reconnect(
        instrument: &str,
        transport: &Arc<dyn MarketDataTransport>,
        windows: &Arc<WindowStore>,
        htf: &[Timeframe],
        supporting: &[Timeframe],
        primary: Timeframe,
    ) {
        let all: Vec<Timeframe> = std::iter::once(primary)
            .chain(supporting.iter().copied())
            .chain(htf.iter().copied())
            .collect();
        for tf in all {
            match transport.backfill(instrument, tf, backfill_limit_for(tf)).await {
                Ok(events) => {
                    let candles: Vec<Candle> = events.into_iter().map(Candle::from).collect();
                    windows.reconcile(tf, candles).await;
                }
                Err(e) => warn!("Ingestor [{}]: reconnect backfill failed for {}: {}", instrument, tf, e),
            }
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
