use crate::commands::ActiveSessionsCommand;
use crate::configuration::config::Config;
use crate::error_handling::types::*;
use crate::sampling::{SampleCollector, SampleSet};
use crate::session_management::{SessionId, SessionRegistry, StaticMetadataResolver};
use crate::web_interface::WebServer;
use log::{debug, error, info, trace};
use serde_json::Value;
use std::sync::Arc;

/// Wires the registry to its collaborators and drives it.
///
/// The controller owns the session registry, the in-process sample collector
/// and the resolver built from the configured catalog. Commands from the
/// remote controller and samples from request handlers both enter through
/// it, and `run` keeps the periodic harvest going until Ctrl-C.
pub struct Controller {
    config: Config,
    registry: Arc<SessionRegistry>,
    collector: Arc<SampleCollector>,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing controller");
        let resolver = StaticMetadataResolver::new(config.sessions.clone())?;
        info!("Metadata catalog holds {} session(s)", resolver.len());

        let collector = Arc::new(SampleCollector::new());
        let registry = Arc::new(SessionRegistry::new(
            Arc::new(resolver),
            collector.clone(),
        ));

        Ok(Self {
            config,
            registry,
            collector,
        })
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn collector(&self) -> &Arc<SampleCollector> {
        &self.collector
    }

    /// Applies the authoritative list of active sessions.
    ///
    /// A failure is logged and returned; the next command retries whatever
    /// could not be activated.
    pub fn handle_active_xray_sessions(
        &self,
        command: &ActiveSessionsCommand,
    ) -> Result<(), ControllerError> {
        debug!(
            "Handling active x-ray sessions command with {} id(s)",
            command.xray_ids.len()
        );
        self.registry.reconcile(&command.xray_ids).map_err(|e| {
            error!("Failed to reconcile x-ray sessions, retrying on next command: {}", e);
            ControllerError::SessionError(e)
        })
    }

    /// Parses a raw active-sessions payload and applies it.
    pub fn handle_command_payload(&self, payload: Value) -> Result<(), ControllerError> {
        let command = ActiveSessionsCommand::from_value(payload)?;
        self.handle_active_xray_sessions(&command)
    }

    /// Offers a stack sample for a transaction.
    ///
    /// Returns the id of the session targeting the transaction and whether
    /// the sample was kept, or `None` when no active session targets it.
    pub fn record_sample(
        &self,
        transaction_name: &str,
        stack: Vec<String>,
    ) -> Option<(SessionId, bool)> {
        let session_id = self.registry.session_id_for_target(transaction_name)?;
        let recorded = self.collector.record(transaction_name, stack);
        trace!("[{}] Sample for '{}' kept: {}", session_id, transaction_name, recorded);
        Some((session_id, recorded))
    }

    pub fn harvest(&self) -> Vec<SampleSet> {
        let sets = self.registry.harvest_all();
        let samples: usize = sets.iter().map(SampleSet::len).sum();
        info!("Harvested {} sample set(s) holding {} sample(s)", sets.len(), samples);
        sets
    }

    /// Runs the web interface and the periodic harvest until Ctrl-C.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("Starting controller");
        let controller = Arc::new(self);

        let web = if controller.config.web.enabled {
            let addr = controller.config.web_address()?;
            let listener = WebServer::bind(addr).await?;
            let server = WebServer::new(controller.clone());
            Some(tokio::spawn(async move { server.serve(listener).await }))
        } else {
            info!("Web interface disabled");
            None
        };

        let mut interval = tokio::time::interval(controller.config.harvest_interval());
        // The first tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let harvester = controller.clone();
                    if let Err(e) = tokio::task::spawn_blocking(move || harvester.harvest()).await {
                        error!("Harvest task failed: {}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        if let Some(handle) = web {
            handle.abort();
        }

        let stopping = controller.clone();
        tokio::task::spawn_blocking(move || stopping.shutdown())
            .await
            .map_err(|e| ControllerError::InitializationFailed(e.to_string()))?;
        Ok(())
    }

    /// Deactivates every session so the sampling subsystem is left with no subscriptions.
    pub fn shutdown(&self) {
        info!("Deactivating {} x-ray session(s)", self.registry.len());
        if let Err(e) = self.registry.reconcile(&[]) {
            error!("Failed to deactivate x-ray sessions: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Config;
    use crate::session_management::SessionStatus;

    fn test_config() -> Config {
        Config::from_toml(
            r#"
[[sessions]]
x_ray_id = 123
key_transaction_name = "Controller/blogs/index"
requested_trace_count = 5
sample_period = 0.000001
run_profiler = true

[[sessions]]
x_ray_id = 42
key_transaction_name = "Controller/blogs/show"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_duplicate_catalog() {
        let config = Config::from_toml("[[sessions]]\nx_ray_id = 1\n[[sessions]]\nx_ray_id = 1\n").unwrap();
        let result = Controller::new(config);
        assert!(matches!(
            result,
            Err(ControllerError::ConfigurationError(ConfigError::DuplicateSession(_)))
        ));
    }

    #[test]
    fn test_handle_command_activates_and_deactivates() {
        let controller = Controller::new(test_config()).unwrap();

        controller
            .handle_active_xray_sessions(&ActiveSessionsCommand::new(vec![SessionId(123), SessionId(42)]))
            .unwrap();
        assert_eq!(controller.registry().len(), 2);
        assert!(controller.collector().is_subscribed("Controller/blogs/index"));
        assert!(!controller.collector().is_subscribed("Controller/blogs/show"));

        let session = controller.registry().lookup(SessionId(123)).unwrap();
        controller
            .handle_active_xray_sessions(&ActiveSessionsCommand::new(vec![SessionId(42)]))
            .unwrap();
        assert_eq!(session.status(), SessionStatus::Inactive);
        assert_eq!(controller.collector().subscription_count(), 0);
    }

    #[test]
    fn test_unknown_session_is_reported() {
        let controller = Controller::new(test_config()).unwrap();
        let result = controller
            .handle_active_xray_sessions(&ActiveSessionsCommand::new(vec![SessionId(999)]));

        assert!(matches!(
            result,
            Err(ControllerError::SessionError(SessionError::Resolution(
                ResolveError::UnknownSession(SessionId(999))
            )))
        ));
        assert!(controller.registry().is_empty());
    }

    #[test]
    fn test_malformed_payload_is_command_error() {
        let controller = Controller::new(test_config()).unwrap();
        let result = controller.handle_command_payload(serde_json::json!({"xray_ids": "all"}));
        assert!(matches!(
            result,
            Err(ControllerError::CommandError(CommandError::Malformed(_)))
        ));

        controller
            .handle_command_payload(serde_json::json!({"xray_ids": ["123"]}))
            .unwrap();
        assert!(controller.registry().includes(SessionId(123)));
    }

    #[tokio::test]
    async fn test_run_reports_bind_failure() {
        let held = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = test_config();
        config.web.port = held.local_addr().unwrap().port();

        let result = Controller::new(config).unwrap().run().await;
        assert!(matches!(
            result,
            Err(ControllerError::WebError(WebError::BindFailed(_)))
        ));
    }

    #[test]
    fn test_samples_flow_into_harvest() {
        let controller = Controller::new(test_config()).unwrap();
        controller
            .handle_active_xray_sessions(&ActiveSessionsCommand::new(vec![SessionId(123)]))
            .unwrap();

        let outcome = controller.record_sample("Controller/blogs/index", vec!["index".into()]);
        assert_eq!(outcome, Some((SessionId(123), true)));
        assert_eq!(controller.record_sample("Controller/other", vec![]), None);

        let sets = controller.harvest();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].target, "Controller/blogs/index");
        assert_eq!(sets[0].len(), 1);
    }

    #[test]
    fn test_shared_target_keeps_sampling_after_partial_removal() {
        let config = Config::from_toml(
            r#"
[[sessions]]
x_ray_id = 1
key_transaction_name = "T"
sample_period = 0.000001
run_profiler = true

[[sessions]]
x_ray_id = 2
key_transaction_name = "T"
sample_period = 0.000001
run_profiler = true
"#,
        )
        .unwrap();
        let controller = Controller::new(config).unwrap();
        controller
            .handle_active_xray_sessions(&ActiveSessionsCommand::new(vec![SessionId(1), SessionId(2)]))
            .unwrap();
        controller
            .handle_active_xray_sessions(&ActiveSessionsCommand::new(vec![SessionId(2)]))
            .unwrap();

        assert!(controller.collector().is_subscribed("T"));
        assert_eq!(
            controller.record_sample("T", vec!["frame".into()]),
            Some((SessionId(2), true))
        );

        controller.shutdown();
        assert!(!controller.collector().is_subscribed("T"));
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let controller = Controller::new(test_config()).unwrap();
        controller
            .handle_active_xray_sessions(&ActiveSessionsCommand::new(vec![SessionId(123), SessionId(42)]))
            .unwrap();

        controller.shutdown();
        assert!(controller.registry().is_empty());
        assert_eq!(controller.collector().subscription_count(), 0);
    }
}
