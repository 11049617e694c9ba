//! Drives re-evaluation from the poll timer and controller notifications,
//! and serializes the resulting verdicts through the debouncer.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::controller::ClientSource;
use crate::debounce::Debouncer;
use crate::messages::{ConnectionChange, Trigger};
use crate::occupancy::{Evaluator, OccupancyVerdict};
use crate::sensor::{OccupancySink, SensorState};

pub struct Scheduler {
    source: Arc<dyn ClientSource>,
    evaluator: Arc<Evaluator>,
    sink: Arc<dyn OccupancySink>,
    state: Arc<SensorState>,
    debouncer: Debouncer,
    interval: Duration,
}

impl Scheduler {
    pub fn new(
        source: Arc<dyn ClientSource>,
        evaluator: Evaluator,
        sink: Arc<dyn OccupancySink>,
        state: Arc<SensorState>,
        interval: Duration,
        debounce: Duration,
    ) -> Self {
        Scheduler {
            source,
            evaluator: Arc::new(evaluator),
            sink,
            state,
            debouncer: Debouncer::new(debounce),
            interval,
        }
    }

    /// Run until a `Trigger::Shutdown` arrives or every trigger sender is gone.
    ///
    /// The first evaluation starts immediately. Evaluations are never
    /// coalesced; each completed one feeds its verdict back here, and this
    /// loop is the only writer of the published state. Sink publishes run on
    /// a separate task in publish order, so a stalled sink never holds up
    /// triggers or verdicts.
    pub async fn run(mut self, mut triggers: mpsc::Receiver<Trigger>) {
        let (results_tx, mut results_rx) = mpsc::unbounded_channel();
        let (publish_tx, publish_rx) = mpsc::unbounded_channel();
        tokio::spawn(forward_to_sink(Arc::clone(&self.sink), publish_rx));
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Checking occupancy every {:?} in mode {}",
            self.interval,
            self.evaluator.mode()
        );

        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                _ = ticker.tick() => self.spawn_evaluation("interval", &results_tx),
                trigger = triggers.recv() => match trigger {
                    Some(Trigger::Controller(event)) => {
                        let reason = match event.change {
                            ConnectionChange::Connected => "client connected",
                            ConnectionChange::Disconnected => "client disconnected",
                        };
                        debug!(
                            "Controller event for {}: {}",
                            event.device.as_deref().unwrap_or("unknown device"),
                            event.message
                        );
                        self.spawn_evaluation(reason, &results_tx);
                    }
                    Some(Trigger::Refresh) => self.spawn_evaluation("refresh request", &results_tx),
                    Some(Trigger::Shutdown) | None => {
                        info!("Stopping occupancy checks");
                        break;
                    }
                },
                Some(verdict) = results_rx.recv() => {
                    match self.debouncer.offer(verdict, Instant::now()) {
                        Some(verdict) => self.publish(verdict, &publish_tx),
                        None if self.debouncer.deadline().is_none() => {
                            debug!("Verdict unchanged: {:?}", self.debouncer.last_published());
                        }
                        None => debug!("Holding {} until it settles", verdict),
                    }
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(verdict) = self.debouncer.poll(Instant::now()) {
                        self.publish(verdict, &publish_tx);
                    }
                }
            }
        }
    }

    fn spawn_evaluation(
        &self,
        reason: &'static str,
        results: &mpsc::UnboundedSender<OccupancyVerdict>,
    ) {
        debug!("Checking occupancy ({reason})");
        let source = Arc::clone(&self.source);
        let evaluator = Arc::clone(&self.evaluator);
        let results = results.clone();
        tokio::spawn(async move {
            match source.clients().await {
                Ok(snapshot) => {
                    let verdict = evaluator.evaluate(&snapshot);
                    if results.send(verdict).is_err() {
                        debug!("Discarding verdict from {reason}: scheduler stopped");
                    }
                }
                Err(err) => error!("Unable to fetch clients ({reason}): {err}"),
            }
        });
    }

    fn publish(&self, verdict: OccupancyVerdict, sink: &mpsc::UnboundedSender<OccupancyVerdict>) {
        if self.state.set(verdict) {
            debug!("Sensor state changed (version {})", self.state.version());
        }
        info!("Publishing {verdict}");
        if sink.send(verdict).is_err() {
            warn!("Sink task stopped, {verdict} not forwarded");
        }
    }
}

async fn forward_to_sink(
    sink: Arc<dyn OccupancySink>,
    mut verdicts: mpsc::UnboundedReceiver<OccupancyVerdict>,
) {
    while let Some(verdict) = verdicts.recv().await {
        if let Err(err) = sink.publish(verdict).await {
            warn!("Unable to publish {verdict}: {err}");
        }
    }
}
