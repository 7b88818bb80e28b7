//! Routes each chat request to the single active backend.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::{
    Backend, ChatRequest, OnDeviceBackend, RuleBasedResponder, RuleSetBuilder,
};
use crate::cancel::CancelToken;
use crate::config::{AgentConfig, BackendMode};
use crate::error::ErrorKind;
use crate::transport::{ConnectivityProbe, HttpTransport};

/// Holds the active backend and applies the connectivity check, deadline
/// and cancellation around every call. Never retries.
pub struct BackendDispatcher {
    backend: Option<Backend>,
    probe: Arc<dyn ConnectivityProbe>,
    timeout: Option<Duration>,
}

impl BackendDispatcher {
    pub fn new(
        backend: Option<Backend>,
        probe: Arc<dyn ConnectivityProbe>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            backend,
            probe,
            timeout,
        }
    }

    /// Build the backend selected by `config`.
    ///
    /// A remote mode without an API key stays unconfigured. An on-device
    /// engine that cannot be allocated or loaded degrades to rule-based.
    pub fn from_config(
        config: &AgentConfig,
        transport: Arc<dyn HttpTransport>,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> Self {
        let backend_config = config.backend_config();
        let timeout = backend_config.timeout;

        let backend = match config.mode {
            BackendMode::None => None,
            mode if mode.requires_network() => {
                if config.is_valid() {
                    Backend::remote(backend_config, transport)
                } else {
                    warn!("No API key for {} backend; chat is disabled", mode);
                    None
                }
            }
            BackendMode::OnDevice => Some(on_device_or_rules(config)),
            _ => Some(Backend::RuleBased(rule_responder(config))),
        };

        match &backend {
            Some(backend) => info!("Using {} backend", backend.mode()),
            None => info!("No chat backend configured"),
        }

        Self::new(backend, probe, timeout)
    }

    /// Mode of the active backend; `None` when unconfigured.
    pub fn mode(&self) -> BackendMode {
        self.backend
            .as_ref()
            .map_or(BackendMode::None, Backend::mode)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub async fn dispatch(&mut self, request: &ChatRequest<'_>) -> Result<String, ErrorKind> {
        self.dispatch_with_cancel(request, &CancelToken::new()).await
    }

    /// Dispatch `request`, giving up with [`ErrorKind::Cancelled`] as soon
    /// as `cancel` fires.
    pub async fn dispatch_with_cancel(
        &mut self,
        request: &ChatRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<String, ErrorKind> {
        let Some(backend) = self.backend.as_mut() else {
            return Err(ErrorKind::Unconfigured);
        };
        if cancel.is_cancelled() {
            return Err(ErrorKind::Cancelled);
        }

        let mode = backend.mode();
        if mode.requires_network() && !self.probe.is_online().await {
            debug!("{} backend skipped: offline", mode);
            return Err(ErrorKind::Connectivity);
        }

        let timeout = self.timeout;
        let bounded = async move {
            let send = backend.send(request, cancel);
            match timeout {
                Some(limit) => tokio::time::timeout(limit, send)
                    .await
                    .unwrap_or(Err(ErrorKind::Timeout)),
                None => send.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ErrorKind::Cancelled),
            result = bounded => result,
        }
    }
}

fn rule_responder(config: &AgentConfig) -> RuleBasedResponder {
    let builder = RuleSetBuilder::with_defaults();
    match config.seed {
        Some(seed) => builder.seed(seed).build(),
        None => builder.build(),
    }
}

fn on_device_or_rules(config: &AgentConfig) -> Backend {
    let Some(path) = config.model_path.as_deref() else {
        warn!("No model path for on-device backend; using rule-based replies");
        return Backend::RuleBased(rule_responder(config));
    };

    match OnDeviceBackend::load(config.engine_config(), path, config.on_device_max_tokens) {
        Ok(backend) => Backend::OnDevice(backend),
        Err(e) => {
            warn!(
                "On-device backend unavailable ({}); using rule-based replies",
                e
            );
            Backend::RuleBased(rule_responder(config))
        }
    }
}
