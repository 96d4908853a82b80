use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time;

use super::event_types::should_flush_immediately;
use super::BusEvent;

const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_MAX_BATCH: usize = 50;

pub struct EventBatcher;

impl EventBatcher {
    /// Spawn a background task that batches bus events into `sink`.
    ///
    /// - Immediate events (see `should_flush_immediately`) are delivered at
    ///   once, after flushing anything already buffered.
    /// - Everything else is buffered and flushed every 100ms or when the
    ///   buffer reaches 50 events.
    ///
    /// The task ends when the bus closes or the sink is dropped.
    pub fn start(
        mut rx: broadcast::Receiver<BusEvent>,
        sink: mpsc::UnboundedSender<Vec<BusEvent>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut buffer: Vec<BusEvent> = Vec::with_capacity(DEFAULT_MAX_BATCH);
            let mut interval = time::interval_at(
                time::Instant::now() + DEFAULT_FLUSH_INTERVAL,
                DEFAULT_FLUSH_INTERVAL,
            );

            loop {
                tokio::select! {
                    result = rx.recv() => {
                        match result {
                            Ok(event) => {
                                if should_flush_immediately(&event) {
                                    // Flush buffer first so ordering is preserved
                                    if !flush(&sink, &mut buffer) {
                                        break;
                                    }
                                    if sink.send(vec![event]).is_err() {
                                        break;
                                    }
                                } else {
                                    buffer.push(event);
                                    if buffer.len() >= DEFAULT_MAX_BATCH && !flush(&sink, &mut buffer) {
                                        break;
                                    }
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                tracing::warn!("event batcher lagged, dropped {n} events");
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                flush(&sink, &mut buffer);
                                break;
                            }
                        }
                    }
                    _ = interval.tick() => {
                        if !flush(&sink, &mut buffer) {
                            break;
                        }
                    }
                }
            }
        })
    }
}

/// Send the buffered events, if any. Returns false once the sink is gone.
fn flush(sink: &mpsc::UnboundedSender<Vec<BusEvent>>, buffer: &mut Vec<BusEvent>) -> bool {
    if buffer.is_empty() {
        return !sink.is_closed();
    }
    let batch = std::mem::take(buffer);
    sink.send(batch).is_ok()
}
