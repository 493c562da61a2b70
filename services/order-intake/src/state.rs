//! Shared application state and adapter wiring

use std::sync::Arc;
use std::time::Duration;

use intake_types::errors::{LedgerError, PublishError};
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;

use crate::config::{Backend, BuildInfo, Config, ConfigError};
use crate::idempotency::IdempotencyStore;
use crate::ledger::{InMemoryLedger, OrderLedger};
use crate::orchestrator::IntakeOrchestrator;
use crate::publisher::{InMemoryPublisher, OrderPublisher};
use crate::readiness::ReadinessAggregator;
use crate::validator::Validator;

#[cfg(feature = "postgres")]
use crate::ledger::PgLedger;
#[cfg(feature = "kafka")]
use crate::publisher::KafkaPublisher;

/// Startup failures; the process exits on any of these
#[derive(Debug, Error)]
pub enum InitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("ledger init failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("publisher init failed: {0}")]
    Publisher(#[from] PublishError),

    #[error("backend {0} requires the `{1}` feature")]
    FeatureDisabled(&'static str, &'static str),
}

/// External clients that need an orderly shutdown
#[derive(Default)]
struct Resources {
    #[cfg(feature = "postgres")]
    pg: Option<Arc<PgLedger>>,
    #[cfg(feature = "kafka")]
    kafka: Option<Arc<KafkaPublisher>>,
}

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<IntakeOrchestrator>,
    pub readiness: Arc<ReadinessAggregator>,
    pub metrics: PrometheusHandle,
    pub build: Arc<BuildInfo>,
    pub request_timeout: Duration,
    pub readiness_timeout: Duration,
    resources: Arc<Resources>,
}

impl AppState {
    /// Wire the adapters selected by `config.backend`
    pub async fn connect(config: &Config, metrics: PrometheusHandle) -> Result<Self, InitError> {
        match config.backend {
            Backend::Memory => {
                tracing::warn!("Using in-memory ledger and publisher; orders are not durable");
                let ledger = Arc::new(InMemoryLedger::new());
                let publisher = Arc::new(InMemoryPublisher::new(config.orders_topic.clone()));
                Ok(Self::from_parts(config, ledger, publisher, metrics))
            }
            Backend::External => Self::connect_external(config, metrics).await,
        }
    }

    #[cfg(all(feature = "postgres", feature = "kafka"))]
    async fn connect_external(config: &Config, metrics: PrometheusHandle) -> Result<Self, InitError> {
        let database_url = config
            .database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let brokers = config
            .kafka_brokers
            .as_deref()
            .ok_or(ConfigError::Missing("KAFKA_BROKERS"))?;

        let ledger = Arc::new(
            PgLedger::connect(database_url, config.db_max_connections, config.dependency_timeout).await?,
        );
        ledger.ensure_schema().await?;

        let publisher = Arc::new(
            KafkaPublisher::builder()
                .brokers(brokers)
                .topic(config.orders_topic.clone())
                .timeout(config.dependency_timeout)
                .build()?,
        );

        let mut state = Self::from_parts(config, ledger.clone(), publisher.clone(), metrics);
        state.resources = Arc::new(Resources {
            pg: Some(ledger),
            kafka: Some(publisher),
        });
        Ok(state)
    }

    #[cfg(not(all(feature = "postgres", feature = "kafka")))]
    async fn connect_external(_config: &Config, _metrics: PrometheusHandle) -> Result<Self, InitError> {
        if cfg!(not(feature = "postgres")) {
            return Err(InitError::FeatureDisabled("external", "postgres"));
        }
        Err(InitError::FeatureDisabled("external", "kafka"))
    }

    /// Assemble state around already-built adapters
    pub fn from_parts(
        config: &Config,
        ledger: Arc<dyn OrderLedger>,
        publisher: Arc<dyn OrderPublisher>,
        metrics: PrometheusHandle,
    ) -> Self {
        let validator = Validator::with_allowed_symbols(config.allowed_symbols.iter().cloned());
        let idempotency = Arc::new(IdempotencyStore::new(config.idempotency_ttl));
        let orchestrator = IntakeOrchestrator::new(validator, idempotency, ledger.clone(), publisher.clone());

        Self {
            orchestrator: Arc::new(orchestrator),
            readiness: Arc::new(ReadinessAggregator::new(ledger, publisher)),
            metrics,
            build: Arc::new(config.build.clone()),
            request_timeout: config.request_timeout,
            readiness_timeout: config.readiness_timeout,
            resources: Arc::new(Resources::default()),
        }
    }

    pub fn idempotency(&self) -> &Arc<IdempotencyStore> {
        self.orchestrator.idempotency()
    }

    /// Flush the producer and close the pool
    pub async fn shutdown(&self, flush_timeout: Duration) {
        #[cfg(feature = "kafka")]
        if let Some(kafka) = &self.resources.kafka {
            let kafka = kafka.clone();
            let flushed = tokio::task::spawn_blocking(move || kafka.flush(flush_timeout)).await;
            if let Err(e) = flushed {
                tracing::warn!(error = %e, "Producer flush task failed");
            }
        }
        #[cfg(feature = "postgres")]
        if let Some(pg) = &self.resources.pg {
            pg.close().await;
        }
        #[cfg(not(feature = "kafka"))]
        let _ = flush_timeout;
        tracing::info!("Adapters shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::detached_handle;

    #[tokio::test]
    async fn test_memory_backend_connects() {
        let config = Config {
            backend: Backend::Memory,
            ..Config::default()
        };
        let state = AppState::connect(&config, detached_handle()).await.unwrap();
        assert_eq!(state.request_timeout, config.request_timeout);
        assert!(state.readiness.check_ready(Duration::from_millis(50)).await.overall);
        assert!(state.idempotency().is_empty());
        state.shutdown(Duration::from_millis(10)).await;
    }
}
