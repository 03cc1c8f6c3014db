//! Builder pattern for constructing a [`RealtimeClient`].

use std::sync::Arc;

use ec_deltas::DeltaDecoder;

use crate::baseline::{GraphqlSequenceSource, SequenceSource};
use crate::client::RealtimeClient;
use crate::config::{ConfigSeverity, RealtimeConfig};
use crate::registry::ListenerRegistry;
use crate::transport::Connector;
use crate::types::{RealtimeError, SessionCredentials};
use crate::ws::WsMqttConnector;

/// Fluent builder for [`RealtimeClient`].
///
/// # Example
///
/// ```rust,no_run
/// # use ec_realtime::{RealtimeClientBuilder, RealtimeConfig, SessionCredentials};
/// let client = RealtimeClientBuilder::new()
///     .credentials(
///         SessionCredentials::new("100012345", "c_user=100012345; xs=...")
///             .with_form_field("fb_dtsg", "..."),
///     )
///     .config(RealtimeConfig::default())
///     .build()
///     .unwrap();
/// ```
pub struct RealtimeClientBuilder {
    credentials: Option<SessionCredentials>,
    config: RealtimeConfig,
    connector: Option<Arc<dyn Connector>>,
    sequence_source: Option<Arc<dyn SequenceSource>>,
    listeners: Option<Arc<ListenerRegistry>>,
    decoder: DeltaDecoder,
}

impl RealtimeClientBuilder {
    pub fn new() -> Self {
        Self {
            credentials: None,
            config: RealtimeConfig::default(),
            connector: None,
            sequence_source: None,
            listeners: None,
            decoder: DeltaDecoder::new(),
        }
    }

    // ── Required ─────────────────────────────────────────────────────

    pub fn credentials(mut self, credentials: SessionCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    // ── Configuration ────────────────────────────────────────────────

    pub fn config(mut self, config: RealtimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn decoder(mut self, decoder: DeltaDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    // ── Collaborators ────────────────────────────────────────────────

    /// Replace the websocket connector (defaults to [`WsMqttConnector`]).
    pub fn connector<C: Connector>(mut self, connector: C) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    pub fn connector_boxed(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replace the baseline fetch (defaults to [`GraphqlSequenceSource`]).
    pub fn sequence_source<S: SequenceSource>(mut self, source: S) -> Self {
        self.sequence_source = Some(Arc::new(source));
        self
    }

    pub fn sequence_source_boxed(mut self, source: Arc<dyn SequenceSource>) -> Self {
        self.sequence_source = Some(source);
        self
    }

    /// Use a pre-populated registry (defaults to an empty one).
    pub fn listeners(mut self, listeners: Arc<ListenerRegistry>) -> Self {
        self.listeners = Some(listeners);
        self
    }

    /// Validate and build. Missing credentials and invalid configuration
    /// are reported as [`RealtimeError::Config`].
    pub fn build(self) -> Result<RealtimeClient, RealtimeError> {
        let credentials = self
            .credentials
            .ok_or_else(|| RealtimeError::Config("credentials are required".into()))?;
        if credentials.user_id.trim().is_empty() {
            return Err(RealtimeError::Config("user id must not be empty".into()));
        }
        if credentials.cookie.trim().is_empty() {
            return Err(RealtimeError::Config("cookie must not be empty".into()));
        }

        let issues = self.config.validate();
        for issue in &issues {
            if issue.severity == ConfigSeverity::Warning {
                tracing::warn!("{issue}");
            }
        }
        let errors: Vec<String> = issues
            .iter()
            .filter(|i| i.severity == ConfigSeverity::Error)
            .map(ToString::to_string)
            .collect();
        if !errors.is_empty() {
            return Err(RealtimeError::Config(errors.join("; ")));
        }

        let connector = match self.connector {
            Some(c) => c,
            None => Arc::new(WsMqttConnector::new(self.config.endpoint.clone())),
        };
        let sequence_source = match self.sequence_source {
            Some(s) => s,
            None => Arc::new(GraphqlSequenceSource::new(&self.config.baseline)?),
        };
        let listeners = self.listeners.unwrap_or_default();

        Ok(RealtimeClient::from_parts(
            self.config,
            credentials,
            connector,
            sequence_source,
            listeners,
            self.decoder,
        ))
    }
}

impl Default for RealtimeClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::FixedSequence;

    fn creds() -> SessionCredentials {
        SessionCredentials::new("100", "c_user=100")
    }

    #[test]
    fn credentials_required() {
        let err = RealtimeClientBuilder::new().build().err().unwrap();
        assert!(matches!(err, RealtimeError::Config(_)));
    }

    #[test]
    fn empty_user_or_cookie_rejected() {
        for c in [SessionCredentials::new("", "x"), SessionCredentials::new("1", " ")] {
            let err = RealtimeClientBuilder::new()
                .credentials(c)
                .sequence_source(FixedSequence(1))
                .build()
                .err()
                .unwrap();
            assert!(matches!(err, RealtimeError::Config(_)));
        }
    }

    #[test]
    fn invalid_config_rejected() {
        let mut config = RealtimeConfig::default();
        config.session.queue_capacity = 0;
        config.reconnect.retry_min_secs = 10;
        config.reconnect.retry_max_secs = 1;
        let err = RealtimeClientBuilder::new()
            .credentials(creds())
            .config(config)
            .build()
            .err()
            .unwrap();
        let msg = err.to_string();
        assert!(msg.contains("session.queue_capacity"));
        assert!(msg.contains("reconnect.retry_min_secs"));
    }

    #[tokio::test]
    async fn defaults_build() {
        let client = RealtimeClientBuilder::new()
            .credentials(creds())
            .build()
            .unwrap();
        assert_eq!(client.state(), crate::ConnectionState::Disconnected);
        assert_eq!(client.cursor(), crate::Cursor::default());
    }
}
