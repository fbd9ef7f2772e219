use std::{sync::Arc, time::Duration};

use beacon_core::{
    config::{AppConfig, ConfigError, LoadOptions},
    SlackVerifier,
};
use beacon_modules::{
    projects::{ProjectFeed, ProjectFeedError},
    register_all,
    sheets::SheetsError,
    BeaconMessageHandler, CheckIn, HttpProjectFeed, HttpSheetsClient, ProjectCache,
    ProjectsModule, SheetsClient,
};
use beacon_queue::{
    consumer::WorkerStats, local_queue, QueueConsumer, QueueGateway, QueuePublisher, QueueWorker,
    RedeliveryPolicy,
};
use beacon_slack::{CommandRegistry, HttpSlackClient, SlackApi, SlackApiError};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub gateway: Arc<QueueGateway>,
    pub worker: JoinHandle<WorkerStats>,
}

impl Application {
    pub fn publisher(&self) -> Arc<dyn QueuePublisher> {
        Arc::clone(self.gateway.publisher())
    }
}

/// Outbound integrations the relay talks to.
pub struct Collaborators {
    pub slack: Arc<dyn SlackApi>,
    pub project_feed: Arc<dyn ProjectFeed>,
    pub sheets: Arc<dyn SheetsClient>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("slack.signing_secret is required to verify inbound requests")]
    MissingSigningSecret,
    #[error("slack client could not be built: {0}")]
    SlackClient(#[source] SlackApiError),
    #[error("project feed client could not be built: {0}")]
    ProjectFeed(#[source] ProjectFeedError),
    #[error("sheets client could not be built: {0}")]
    Sheets(#[source] SheetsError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    if !config.has_signing_secret() {
        return Err(BootstrapError::MissingSigningSecret);
    }

    let timeout = Duration::from_secs(config.server.request_timeout_secs);
    let slack = HttpSlackClient::with_api_base(
        config.slack.bot_token.clone(),
        config.slack.api_base_url.as_str(),
        timeout,
    )
    .map_err(BootstrapError::SlackClient)?;
    let project_feed = HttpProjectFeed::new(timeout).map_err(BootstrapError::ProjectFeed)?;
    let sheets = HttpSheetsClient::new(
        config.sheets.access_token.clone(),
        config.sheets.api_base_url.as_str(),
        timeout,
    )
    .map_err(BootstrapError::Sheets)?;

    Ok(assemble(
        config,
        Collaborators {
            slack: Arc::new(slack),
            project_feed: Arc::new(project_feed),
            sheets: Arc::new(sheets),
        },
    ))
}

/// Wires modules, registry, queue and gateway, and spawns the queue worker.
///
/// Must run inside a tokio runtime.
pub fn assemble(config: AppConfig, collaborators: Collaborators) -> Application {
    let Collaborators { slack, project_feed, sheets } = collaborators;

    let projects = ProjectsModule::new(
        Arc::new(ProjectCache::new(project_feed)),
        config.projects.data_url.as_str(),
        config.projects.website_url.as_str(),
    );
    let checkin = CheckIn::new(sheets, config.sheets.spreadsheet_id.clone());

    let mut registry = CommandRegistry::new();
    register_all(&mut registry, &projects, &checkin);
    info!(
        event_name = "system.bootstrap.registry_ready",
        correlation_id = "bootstrap",
        commands = registry.command_count(),
        block_actions = registry.block_action_count(),
        "registered slack handlers"
    );
    let registry = Arc::new(registry);

    let (publisher, receiver) = local_queue(config.queue.name.as_str(), config.queue.capacity);
    let handler = BeaconMessageHandler::new(Arc::clone(&registry), projects, slack);
    let worker = QueueWorker::new(QueueConsumer::new(Arc::new(handler)), RedeliveryPolicy::default());
    let worker = tokio::spawn(async move { worker.run(receiver).await });

    let gateway = Arc::new(QueueGateway::new(
        SlackVerifier::new(config.slack.signing_secret.clone()),
        registry,
        Arc::new(publisher),
    ));

    Application { config, gateway, worker }
}

#[cfg(test)]
mod tests {
    use beacon_core::config::{ConfigOverrides, LoadOptions};
    use beacon_queue::QueuePublisher;

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn options(signing_secret: Option<&str>) -> LoadOptions {
        LoadOptions {
            config_path: Some("does-not-exist/beacon.toml".into()),
            overrides: ConfigOverrides {
                slack_bot_token: Some("xoxb-test".to_string()),
                slack_signing_secret: signing_secret.map(str::to_string),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_a_signing_secret() {
        let result = bootstrap(options(Some("   "))).await;

        assert!(matches!(result, Err(BootstrapError::MissingSigningSecret)));
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_an_app_level_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                slack_bot_token: Some("xapp-1-test".to_string()),
                slack_signing_secret: Some("secret".to_string()),
                ..ConfigOverrides::default()
            },
            ..options(None)
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.bot_token"));
    }

    #[tokio::test]
    async fn bootstrap_wires_an_open_queue_lane() {
        let app = bootstrap(options(Some("8f742231b10e8888abcd99yyyzzz85a5")))
            .await
            .expect("bootstrap should succeed with valid overrides");

        assert!(app.publisher().is_open());
        assert_eq!(app.config.queue.name, "beacon-slack");

        drop(app.gateway);
        let stats = app.worker.await.expect("worker joins");
        assert_eq!(stats.handled, 0);
    }
}
