//! Monitor (C8): appends request/response records to the store off the hot
//! path via an mpsc channel (teacher's `observability::RequestLogger`
//! pattern, stripped of cost accounting — not part of this gateway), plus an
//! in-memory atomic-counter summary and a bounded recent-log ring for the
//! operator API.

use futures::FutureExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use crate::store::{NewRequestLog, Store};

const CHANNEL_BUFFER: usize = 10_000;
const RECENT_LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone)]
pub struct RequestEvent {
    pub timestamp: i64,
    pub method: String,
    pub url: String,
    pub status: i64,
    pub duration_ms: i64,
    pub provider: String,
    pub model: String,
    pub mapped_model: Option<String>,
    pub account_email: Option<String>,
    pub error: Option<String>,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

#[derive(Debug, Default)]
struct Stats {
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    total_input_tokens: AtomicU64,
    total_output_tokens: AtomicU64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub total_errors: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
}

#[derive(Clone)]
pub struct Monitor {
    tx: mpsc::Sender<RequestEvent>,
    stats: Arc<Stats>,
    recent: Arc<Mutex<VecDeque<RequestEvent>>>,
}

impl Monitor {
    pub fn new(store: Arc<Store>) -> Self {
        let (tx, mut rx) = mpsc::channel::<RequestEvent>(CHANNEL_BUFFER);
        let stats = Arc::new(Stats::default());
        let recent = Arc::new(Mutex::new(VecDeque::with_capacity(RECENT_LOG_CAPACITY)));

        let stats_writer = stats.clone();
        let recent_writer = recent.clone();
        tokio::spawn(async move {
            let result = std::panic::AssertUnwindSafe(async {
                while let Some(event) = rx.recv().await {
                    stats_writer.total_requests.fetch_add(1, Ordering::Relaxed);
                    if event.status >= 400 || event.error.is_some() {
                        stats_writer.total_errors.fetch_add(1, Ordering::Relaxed);
                    }
                    stats_writer.total_input_tokens.fetch_add(event.input_tokens.max(0) as u64, Ordering::Relaxed);
                    stats_writer.total_output_tokens.fetch_add(event.output_tokens.max(0) as u64, Ordering::Relaxed);

                    {
                        let mut ring = recent_writer.lock().await;
                        if ring.len() == RECENT_LOG_CAPACITY {
                            ring.pop_front();
                        }
                        ring.push_back(event.clone());
                    }

                    if let Err(e) = store.insert_request_log(to_new_log(&event)).await {
                        tracing::error!(error = %e, "failed to persist request log");
                    }
                }
            })
            .catch_unwind()
            .await;
            if let Err(e) = result {
                tracing::error!(panic = ?e, "monitor background writer panicked");
            }
        });

        Self { tx, stats, recent }
    }

    /// Non-blocking: sends the event to the background writer.
    pub async fn record(&self, event: RequestEvent) {
        if let Err(e) = self.tx.send(event).await {
            tracing::error!(error = %e, "failed to enqueue request event");
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_requests: self.stats.total_requests.load(Ordering::Relaxed),
            total_errors: self.stats.total_errors.load(Ordering::Relaxed),
            total_input_tokens: self.stats.total_input_tokens.load(Ordering::Relaxed),
            total_output_tokens: self.stats.total_output_tokens.load(Ordering::Relaxed),
        }
    }

    pub async fn recent_in_memory(&self, limit: usize) -> Vec<RequestEvent> {
        let ring = self.recent.lock().await;
        ring.iter().rev().take(limit).cloned().collect()
    }
}

fn to_new_log(event: &RequestEvent) -> NewRequestLog {
    NewRequestLog {
        timestamp: event.timestamp,
        method: event.method.clone(),
        url: event.url.clone(),
        status: event.status,
        duration: event.duration_ms,
        provider: event.provider.clone(),
        model: event.model.clone(),
        mapped_model: event.mapped_model.clone(),
        account_email: event.account_email.clone(),
        error: event.error.clone(),
        request_body: event.request_body.clone(),
        response_body: event.response_body.clone(),
        input_tokens: event.input_tokens,
        output_tokens: event.output_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(status: i64) -> RequestEvent {
        RequestEvent {
            timestamp: 0,
            method: "POST".to_string(),
            url: "/v1/chat/completions".to_string(),
            status,
            duration_ms: 10,
            provider: "google".to_string(),
            model: "gemini-3-flash".to_string(),
            mapped_model: None,
            account_email: None,
            error: None,
            request_body: None,
            response_body: None,
            input_tokens: 5,
            output_tokens: 7,
        }
    }

    #[tokio::test]
    async fn recorded_events_update_stats_and_ring() {
        let store = Arc::new(Store::in_memory().await.unwrap());
        let monitor = Monitor::new(store);
        monitor.record(sample_event(200)).await;
        monitor.record(sample_event(500)).await;

        // background writer is async; give it a tick to drain the channel
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert_eq!(snapshot.total_errors, 1);
        assert_eq!(snapshot.total_input_tokens, 10);

        let recent = monitor.recent_in_memory(10).await;
        assert_eq!(recent.len(), 2);
    }
}
