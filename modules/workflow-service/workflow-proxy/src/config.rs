use relaykit_bootstrap::AppConfig;
use relaykit_transport::OutboundConfig;
use workflow_service_sdk::SERVICE_NAME;

/// Resolved settings of one proxy instance. Nothing here reads the environment.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Process name, sent as the caller of forwarded calls.
    pub name: String,
    /// Address the HTTP inbound listens on.
    pub bind_address: String,
    /// `host:port` of the Cadence frontend.
    pub cadence_address: String,
    /// Destination service of forwarded calls.
    pub service: String,
    /// Add the timing unit to the outbound middleware.
    pub timing: bool,
    pub outbound: OutboundConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            name: "cadence-proxy".to_owned(),
            bind_address: "127.0.0.1:6666".to_owned(),
            cadence_address: "127.0.0.1:7933".to_owned(),
            service: SERVICE_NAME.to_owned(),
            timing: false,
            outbound: OutboundConfig::new(SERVICE_NAME),
        }
    }
}

impl ProxyConfig {
    #[must_use]
    pub fn with_bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    #[must_use]
    pub fn with_cadence_address(mut self, address: impl Into<String>) -> Self {
        self.cadence_address = address.into();
        self
    }

    #[must_use]
    pub fn with_timing(mut self, timing: bool) -> Self {
        self.timing = timing;
        self
    }

    #[must_use]
    pub fn with_outbound(mut self, outbound: OutboundConfig) -> Self {
        self.outbound = outbound;
        self
    }
}

impl From<&AppConfig> for ProxyConfig {
    fn from(app: &AppConfig) -> Self {
        let cadence = &app.cadence;
        Self {
            name: app.server.name.clone(),
            bind_address: app.server.bind_address.clone(),
            cadence_address: cadence.address.clone(),
            service: cadence.service.clone(),
            timing: app.middleware.timing,
            outbound: OutboundConfig::new(&cadence.service)
                .with_connect_timeout(cadence.connect_timeout())
                .with_call_timeout(cadence.call_timeout())
                .with_max_retries(cadence.max_retries)
                .with_backoff(cadence.base_backoff(), cadence.max_backoff()),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_match_application_defaults() {
        let from_app = ProxyConfig::from(&AppConfig::default());
        let default = ProxyConfig::default();

        assert_eq!(from_app.name, default.name);
        assert_eq!(from_app.bind_address, default.bind_address);
        assert_eq!(from_app.cadence_address, default.cadence_address);
        assert_eq!(from_app.service, default.service);
        assert_eq!(from_app.timing, default.timing);
        assert_eq!(from_app.outbound.call_timeout, default.outbound.call_timeout);
    }

    #[test]
    fn cadence_section_drives_the_outbound() {
        let mut app = AppConfig::default();
        app.cadence.address = "cadence.internal:7933".to_owned();
        app.cadence.call_timeout_ms = 1_500;
        app.cadence.max_retries = 0;
        app.middleware.timing = true;

        let config = ProxyConfig::from(&app);

        assert_eq!(config.cadence_address, "cadence.internal:7933");
        assert!(config.timing);
        assert_eq!(config.outbound.service_name, "cadence-frontend");
        assert_eq!(config.outbound.call_timeout, Duration::from_millis(1_500));
        assert_eq!(config.outbound.max_retries, 0);
    }
}
