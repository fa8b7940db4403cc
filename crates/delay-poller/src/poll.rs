//! Polling loop
//!
//! Fetches on a fixed interval and hands every outcome to the sink. Fetch
//! failures never end the loop; the next tick is the retry. The loop ends
//! when the stop signal fires (checked before each tick and raced against
//! both the fetch and the wait) or when the sink reports a fatal error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use delay_sink::{FetchResult, Sink, SinkError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cycle::{CycleEvent, CycleState, handle_event};
use crate::fetcher::PollingFetcher;

/// Spawn the polling loop as a background task.
///
/// Set the `stop` channel to `true` (or drop its sender) to end the loop.
/// Returns a `JoinHandle` resolving to the loop's exit reason.
pub fn spawn_poll_task(
    fetcher: Arc<PollingFetcher>,
    interval: Duration,
    sink: Arc<dyn Sink>,
    stop: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<Result<(), SinkError>> {
    tokio::spawn(async move { run(&fetcher, interval, sink.as_ref(), stop).await })
}

/// Run the polling loop until stopped.
///
/// The first fetch starts immediately. An in-flight fetch is abandoned when
/// the stop signal fires; no new request is issued after that.
pub async fn run(
    fetcher: &PollingFetcher,
    interval: Duration,
    sink: &dyn Sink,
    mut stop: watch::Receiver<bool>,
) -> Result<(), SinkError> {
    info!(
        interval_secs = interval.as_secs(),
        sink = sink.id(),
        "polling loop started"
    );
    let mut cycle: u64 = 0;

    loop {
        if *stop.borrow_and_update() {
            info!(cycles = cycle, "stop requested, polling loop halted");
            return Ok(());
        }
        cycle += 1;
        let started = Instant::now();

        let (state, result) = tokio::select! {
            biased;
            _ = stop_requested(&mut stop) => {
                info!(cycle, "stop requested mid-cycle, abandoning fetch");
                return Ok(());
            }
            outcome = fetcher.fetch_cycle() => outcome,
        };

        record_outcome(cycle, state, &result, started.elapsed());

        if let Err(e) = sink.render(result) {
            warn!(cycle, sink = sink.id(), error = %e, "sink failed, polling loop stopping");
            return Err(e);
        }
        let state = handle_event(state, CycleEvent::Delivered);
        debug!(cycle, state = state.label(), "waiting for next tick");

        tokio::select! {
            biased;
            _ = stop_requested(&mut stop) => {
                info!(cycles = cycle, "stop requested, polling loop halted");
                return Ok(());
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Resolve once a stop is requested. A dropped sender counts as a stop.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

fn record_outcome(cycle: u64, state: CycleState, result: &FetchResult, elapsed: Duration) {
    metrics::histogram!("poller_fetch_duration_seconds").record(elapsed.as_secs_f64());
    match result {
        Ok(records) => {
            metrics::counter!("poller_cycles_total", "outcome" => "success").increment(1);
            metrics::gauge!("poller_records_last").set(records.len() as f64);
            info!(
                cycle,
                state = state.label(),
                records = records.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "delay feed fetched"
            );
        }
        Err(e) => {
            metrics::counter!("poller_cycles_total", "outcome" => e.kind()).increment(1);
            warn!(
                cycle,
                state = state.label(),
                kind = e.kind(),
                error = %e,
                "polling cycle failed, will retry next tick"
            );
        }
    }
}
