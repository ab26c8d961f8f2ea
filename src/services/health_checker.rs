//! Periodic backend liveness probing.
//!
//! Probes `GET /health` on a fixed interval, backing off exponentially
//! while the backend is down, and publishes a metrics event after every
//! check. The connection badge subscribes to the receiver.

use anyhow::Result;
use async_channel::{Receiver, Sender, unbounded};
use async_lock::RwLock;
use smol::Timer;
use std::sync::Arc;
use std::time::Duration;

use crate::services::api::BackendApi;

#[derive(Debug, Clone)]
pub struct HealthMetrics {
    pub is_healthy: bool,
    pub response_time_ms: u128,
    pub error_message: Option<String>,
    pub consecutive_failures: u32,
    pub last_success: Option<std::time::SystemTime>,
    pub last_failure: Option<std::time::SystemTime>,
    pub total_checks: u64,
}

impl Default for HealthMetrics {
    fn default() -> Self {
        Self {
            is_healthy: false,
            response_time_ms: 0,
            error_message: None,
            consecutive_failures: 0,
            last_success: None,
            last_failure: None,
            total_checks: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthCheckEvent {
    pub metrics: HealthMetrics,
    pub timestamp: std::time::SystemTime,
}

pub struct HealthChecker<A> {
    api: Arc<A>,
    health_sender: Sender<HealthCheckEvent>,
    health_receiver: Receiver<HealthCheckEvent>,
    is_running: Arc<RwLock<bool>>,
    current_metrics: Arc<RwLock<HealthMetrics>>,

    base_interval: Duration,
    max_interval: Duration,
    backoff_multiplier: f64,
    timeout: Duration,
}

impl<A: BackendApi> HealthChecker<A> {
    pub fn new(api: Arc<A>) -> Self {
        let (health_sender, health_receiver) = unbounded();
        Self {
            api,
            health_sender,
            health_receiver,
            is_running: Arc::new(RwLock::new(false)),
            current_metrics: Arc::new(RwLock::new(HealthMetrics::default())),
            base_interval: Duration::from_secs(30),
            max_interval: Duration::from_secs(300),
            backoff_multiplier: 1.5,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_intervals(mut self, base: Duration, max: Duration) -> Self {
        self.base_interval = base;
        self.max_interval = max;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn health_receiver(&self) -> Receiver<HealthCheckEvent> {
        self.health_receiver.clone()
    }

    pub async fn current_metrics(&self) -> HealthMetrics {
        self.current_metrics.read().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn start(&self) -> Result<()> {
        {
            let mut is_running = self.is_running.write().await;
            if *is_running {
                return Ok(());
            }
            *is_running = true;
        }

        let api = self.api.clone();
        let health_sender = self.health_sender.clone();
        let is_running = self.is_running.clone();
        let current_metrics = self.current_metrics.clone();
        let base_interval = self.base_interval;
        let max_interval = self.max_interval;
        let backoff_multiplier = self.backoff_multiplier;
        let timeout = self.timeout;

        smol::spawn(async move {
            let mut current_interval = base_interval;

            while *is_running.read().await {
                let (is_healthy, response_time, error_message) =
                    probe(api.as_ref(), timeout).await;
                let now = std::time::SystemTime::now();

                let mut metrics = current_metrics.write().await;
                metrics.total_checks += 1;
                metrics.response_time_ms = response_time;
                metrics.is_healthy = is_healthy;
                metrics.error_message = error_message;
                if is_healthy {
                    metrics.consecutive_failures = 0;
                    metrics.last_success = Some(now);
                    current_interval = base_interval;
                } else {
                    metrics.consecutive_failures += 1;
                    metrics.last_failure = Some(now);
                }

                let event = HealthCheckEvent {
                    metrics: metrics.clone(),
                    timestamp: now,
                };
                drop(metrics);

                let _ = health_sender.send(event).await;

                if !is_healthy {
                    tracing::warn!(
                        interval_ms = current_interval.as_millis(),
                        "backend health check failed"
                    );
                    current_interval = Duration::from_millis(
                        (current_interval.as_millis() as f64 * backoff_multiplier) as u64,
                    )
                    .min(max_interval);
                }

                Timer::after(current_interval).await;
            }
        })
        .detach();

        Ok(())
    }

    pub async fn stop(&self) {
        let mut is_running = self.is_running.write().await;
        *is_running = false;
    }

    /// One-off probe outside the periodic loop, used at startup.
    pub async fn check_once(&self) -> HealthCheckEvent {
        let now = std::time::SystemTime::now();
        let (is_healthy, response_time, error_message) =
            probe(self.api.as_ref(), self.timeout).await;

        let metrics = HealthMetrics {
            is_healthy,
            response_time_ms: response_time,
            error_message,
            consecutive_failures: if is_healthy { 0 } else { 1 },
            last_success: is_healthy.then_some(now),
            last_failure: (!is_healthy).then_some(now),
            total_checks: 1,
        };

        HealthCheckEvent {
            metrics,
            timestamp: now,
        }
    }
}

async fn probe<A: BackendApi>(api: &A, timeout: Duration) -> (bool, u128, Option<String>) {
    let start = std::time::Instant::now();
    let outcome = smol::future::or(async { Some(api.health().await) }, async {
        Timer::after(timeout).await;
        None
    })
    .await;
    let response_time = start.elapsed().as_millis();

    match outcome {
        Some(Ok(true)) => (true, response_time, None),
        Some(Ok(false)) => (
            false,
            response_time,
            Some("Backend reported unhealthy".to_string()),
        ),
        Some(Err(e)) => (false, response_time, Some(e.to_string())),
        None => (
            false,
            response_time,
            Some("Health check timed out".to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::api::{ConnectRequest, QueryData, SchemaResponse};
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    struct ProbeMock {
        healthy: AtomicBool,
    }

    impl BackendApi for ProbeMock {
        async fn connect(&self, _req: &ConnectRequest) -> Result<()> {
            Err(anyhow!("not used"))
        }
        async fn query(&self, _id: Uuid, _sql: &str) -> Result<QueryData> {
            Err(anyhow!("not used"))
        }
        async fn schema(&self, _id: Uuid) -> Result<SchemaResponse> {
            Err(anyhow!("not used"))
        }
        async fn health(&self) -> Result<bool> {
            Ok(self.healthy.load(Ordering::SeqCst))
        }
    }

    #[test]
    fn healthy_probe_publishes_healthy_event() {
        smol::block_on(async {
            let api = Arc::new(ProbeMock {
                healthy: AtomicBool::new(true),
            });
            let checker = HealthChecker::new(api)
                .with_intervals(Duration::from_millis(20), Duration::from_millis(100))
                .with_timeout(Duration::from_millis(500));

            checker.start().await.unwrap();
            assert!(checker.is_running().await);

            let event = checker.health_receiver().recv().await.unwrap();
            assert!(event.metrics.is_healthy);
            assert!(event.metrics.error_message.is_none());

            checker.stop().await;
            Timer::after(Duration::from_millis(60)).await;
            assert!(!checker.is_running().await);
        });
    }

    #[test]
    fn failures_accumulate_and_clear_on_recovery() {
        smol::block_on(async {
            let api = Arc::new(ProbeMock {
                healthy: AtomicBool::new(false),
            });
            let checker = HealthChecker::new(api.clone())
                .with_intervals(Duration::from_millis(10), Duration::from_millis(40));

            checker.start().await.unwrap();
            let receiver = checker.health_receiver();

            let first = receiver.recv().await.unwrap();
            assert!(!first.metrics.is_healthy);
            assert_eq!(first.metrics.consecutive_failures, 1);

            let second = receiver.recv().await.unwrap();
            assert_eq!(second.metrics.consecutive_failures, 2);

            api.healthy.store(true, Ordering::SeqCst);
            let recovered = loop {
                let event = receiver.recv().await.unwrap();
                if event.metrics.is_healthy {
                    break event;
                }
            };
            assert_eq!(recovered.metrics.consecutive_failures, 0);

            checker.stop().await;
        });
    }

    #[test]
    fn check_once_reports_timeout_as_unhealthy() {
        smol::block_on(async {
            struct Stuck;
            impl BackendApi for Stuck {
                async fn connect(&self, _req: &ConnectRequest) -> Result<()> {
                    Err(anyhow!("not used"))
                }
                async fn query(&self, _id: Uuid, _sql: &str) -> Result<QueryData> {
                    Err(anyhow!("not used"))
                }
                async fn schema(&self, _id: Uuid) -> Result<SchemaResponse> {
                    Err(anyhow!("not used"))
                }
                async fn health(&self) -> Result<bool> {
                    Timer::after(Duration::from_secs(60)).await;
                    Ok(true)
                }
            }

            let checker =
                HealthChecker::new(Arc::new(Stuck)).with_timeout(Duration::from_millis(20));
            let event = checker.check_once().await;
            assert!(!event.metrics.is_healthy);
            assert_eq!(
                event.metrics.error_message.as_deref(),
                Some("Health check timed out")
            );
        });
    }
}
