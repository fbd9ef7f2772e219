use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use beacon_slack::{
    blocks::{Block, MessageBuilder, MessageTemplate, SectionBuilder},
    client::ResponseMessage,
    events::{Command, MemberJoinedEvent},
    registry::{CommandConfig, CommandHandler, CommandRegistry, HandlerContext},
    HandlerError,
};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub const PROJECTS_COMMAND: &str = "projects";
pub const PROJECTS_ACK: &str = "Loading project list...";
pub const WELCOME_MESSAGE: &str = "Welcome to the Code for Boston Slack! Here's a list of our active projects to help you get started. If you find one that interests you, hop in the channel and introduce yourself!";
const WELCOME_INTRO: &str = "Here's a list of our active projects to help you get started. If you find one that interests you, hop in the channel and introduce yourself!";
pub const DETAILS_HINT: &str = "To see additional details about the projects, type `/projects`";

#[derive(Debug, Error)]
pub enum ProjectFeedError {
    #[error("project feed request failed: {0}")]
    Request(String),
    #[error("project feed responded with status {0}")]
    Status(u16),
    #[error("project feed is not valid yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl From<ProjectFeedError> for HandlerError {
    fn from(error: ProjectFeedError) -> Self {
        HandlerError::Upstream(error.to_string())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Partner {
    pub name: String,
    pub url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectInfo {
    pub name: String,
    pub repository: Option<String>,
    pub slack_channel: Option<String>,
    pub elevator_pitch: Option<String>,
    pub description: Option<String>,
    pub partner: Option<Vec<Partner>>,
    pub technologies: Option<String>,
    pub hangouts_slug: Option<String>,
}

pub fn parse_projects(yaml: &str) -> Result<Vec<ProjectInfo>, ProjectFeedError> {
    Ok(serde_yaml::from_str(yaml)?)
}

#[async_trait]
pub trait ProjectFeed: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<ProjectInfo>, ProjectFeedError>;
}

#[derive(Clone, Debug)]
pub struct HttpProjectFeed {
    client: Client,
}

impl HttpProjectFeed {
    pub fn new(timeout: Duration) -> Result<Self, ProjectFeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ProjectFeedError::Request(error.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ProjectFeed for HttpProjectFeed {
    async fn fetch(&self, url: &str) -> Result<Vec<ProjectInfo>, ProjectFeedError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| ProjectFeedError::Request(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProjectFeedError::Status(status.as_u16()));
        }

        let text =
            response.text().await.map_err(|error| ProjectFeedError::Request(error.to_string()))?;
        parse_projects(&text)
    }
}

type ProjectSlot = Arc<OnceCell<Arc<Vec<ProjectInfo>>>>;

/// Process-lifetime project cache keyed by feed URL.
///
/// Entries never expire. Concurrent callers for one URL share a single
/// in-flight fetch; a failed fetch leaves the slot empty so the next caller
/// retries.
pub struct ProjectCache {
    feed: Arc<dyn ProjectFeed>,
    slots: Mutex<HashMap<String, ProjectSlot>>,
}

impl ProjectCache {
    pub fn new(feed: Arc<dyn ProjectFeed>) -> Self {
        Self { feed, slots: Mutex::new(HashMap::new()) }
    }

    pub async fn get(&self, url: &str) -> Result<Arc<Vec<ProjectInfo>>, ProjectFeedError> {
        let slot = self.slot(url);
        let projects = slot
            .get_or_try_init(|| async {
                info!(event_name = "projects.feed.fetch", url, "fetching project feed");
                self.feed.fetch(url).await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(projects))
    }

    fn slot(&self, url: &str) -> ProjectSlot {
        // A poisoned map still holds valid slots.
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(slots.entry(url.to_owned()).or_default())
    }
}

fn partners_list(partners: &[Partner]) -> String {
    partners
        .iter()
        .map(|partner| match &partner.url {
            Some(url) => format!("<{url}|{}>", partner.name),
            None => partner.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.is_empty())
}

pub fn format_summary(project: &ProjectInfo) -> Block {
    let mut pieces = vec![format!("*{}*", project.name)];
    if let Some(channel) = present(&project.slack_channel) {
        pieces.push(format!("Channel: #{channel}"));
    }
    if let Some(repository) = present(&project.repository) {
        pieces.push(format!("Repo: <{repository}>"));
    }
    Block::mrkdwn_section(pieces.join(" • "))
}

pub fn format_detailed(project: &ProjectInfo) -> Block {
    let description = present(&project.elevator_pitch)
        .or_else(|| present(&project.description))
        .map(str::to_owned)
        .or_else(|| {
            project
                .partner
                .as_deref()
                .filter(|partners| !partners.is_empty())
                .map(|partners| format!("A project in partnership with {}", partners_list(partners)))
        });

    let mut section = SectionBuilder::default();
    match description {
        Some(description) => section.mrkdwn(format!("*{}*\n{description}", project.name)),
        None => section.mrkdwn(format!("*{}*", project.name)),
    };
    if let Some(technologies) = present(&project.technologies) {
        section.field("Tech Stack", technologies);
    }
    if let Some(channel) = present(&project.slack_channel) {
        section.field("Channel", format!("#{channel}"));
    }
    if let Some(repository) = present(&project.repository) {
        section.field("Repo", format!("<{repository}>"));
    }
    section.build()
}

/// Listing blocks: a divider before the first project, or before every
/// project in the detailed view.
pub fn project_blocks(projects: &[ProjectInfo], detailed: bool) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(projects.len() * 2);
    for (index, project) in projects.iter().enumerate() {
        if index == 0 || detailed {
            blocks.push(Block::Divider);
        }
        blocks.push(if detailed { format_detailed(project) } else { format_summary(project) });
    }
    blocks
}

/// Welcome for a new member, greeted by name when one is known.
pub fn welcome_message(
    website_url: &str,
    name: Option<&str>,
    projects: &[ProjectInfo],
) -> MessageTemplate {
    let (fallback, welcome) = match name {
        Some(name) => (
            format!("Hi, {name}! You can check <{website_url}|our website> for a list of active projects."),
            format!("Welcome to the Code for Boston Slack, {name}! {WELCOME_INTRO}"),
        ),
        None => (
            format!("Welcome to the Code for Boston Slack! You can check <{website_url}|our website> for a list of active projects."),
            WELCOME_MESSAGE.to_owned(),
        ),
    };

    MessageBuilder::new(fallback)
        .section(|section| {
            section.mrkdwn(welcome);
        })
        .blocks(project_blocks(projects, false))
        .divider()
        .context(|context| {
            context.mrkdwn(DETAILS_HINT);
        })
        .build()
}

/// The `/projects` command and the new-member welcome.
#[derive(Clone)]
pub struct ProjectsModule {
    cache: Arc<ProjectCache>,
    data_url: String,
    website_url: String,
}

impl ProjectsModule {
    pub fn new(
        cache: Arc<ProjectCache>,
        data_url: impl Into<String>,
        website_url: impl Into<String>,
    ) -> Self {
        Self { cache, data_url: data_url.into(), website_url: website_url.into() }
    }

    pub fn register(&self, registry: &mut CommandRegistry) {
        registry
            .register_command(PROJECTS_COMMAND, CommandConfig::new(self.clone()).ack_message(PROJECTS_ACK));
    }

    pub async fn welcome_member(
        &self,
        event: &MemberJoinedEvent,
        ctx: &HandlerContext,
    ) -> Result<(), HandlerError> {
        let projects = self.cache.get(&self.data_url).await?;
        let profile = match ctx.slack.user_profile(&event.user).await {
            Ok(profile) => Some(profile),
            Err(error) => {
                warn!(
                    event_name = "projects.welcome.profile_failed",
                    user = %event.user,
                    error = %error,
                    correlation_id = %ctx.correlation_id,
                    "could not load member profile, welcoming without a name"
                );
                None
            }
        };
        let name = profile.as_ref().and_then(|profile| profile.greeting_name());
        let message = welcome_message(&self.website_url, name, &projects);
        ctx.slack.post_ephemeral(&event.channel, &event.user, &message).await?;
        info!(
            event_name = "projects.welcome.sent",
            user = %event.user,
            channel = %event.channel,
            projects = projects.len(),
            correlation_id = %ctx.correlation_id,
            "welcomed new channel member"
        );
        Ok(())
    }
}

#[async_trait]
impl CommandHandler for ProjectsModule {
    async fn handle(&self, command: &Command, ctx: &HandlerContext) -> Result<(), HandlerError> {
        let projects = self.cache.get(&self.data_url).await?;
        debug!(
            event_name = "projects.command.listing",
            projects = projects.len(),
            correlation_id = %ctx.correlation_id,
            "sending detailed project listing"
        );
        let response = ResponseMessage::replacing(project_blocks(&projects, true));
        ctx.slack.respond(&command.response_url, &response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use beacon_slack::{
        blocks::Block,
        client::{SlackUser, UserProfile},
        events::{Command, MemberJoinedEvent, SlackMessage},
        registry::{CommandRegistry, HandlerContext},
    };
    use serde_json::json;

    use super::{
        format_detailed, format_summary, parse_projects, project_blocks, Partner, ProjectCache,
        ProjectFeed, ProjectFeedError, ProjectInfo, ProjectsModule, PROJECTS_ACK,
    };
    use crate::testing::FakeSlack;

    const FEED: &str = r#"
- name: Beacon
  repository: https://github.com/codeforboston/beacon
  slackChannel: beacon
  elevatorPitch: A Slack bot for the brigade.
  technologies: Rust, Slack API
- name: Safe Water
  slackChannel: safe-water
  partner:
    - name: Tufts
      url: https://tufts.edu
    - name: City of Boston
"#;

    struct CountingFeed {
        fetches: AtomicUsize,
        failures_left: AtomicUsize,
    }

    impl CountingFeed {
        fn new(failures: usize) -> Self {
            Self { fetches: AtomicUsize::new(0), failures_left: AtomicUsize::new(failures) }
        }
    }

    #[async_trait]
    impl ProjectFeed for CountingFeed {
        async fn fetch(&self, _url: &str) -> Result<Vec<ProjectInfo>, ProjectFeedError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
            {
                return Err(ProjectFeedError::Status(502));
            }
            parse_projects(FEED)
        }
    }

    fn projects() -> Vec<ProjectInfo> {
        parse_projects(FEED).expect("feed parses")
    }

    #[test]
    fn feed_yaml_uses_camel_case_keys() {
        let projects = projects();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].slack_channel.as_deref(), Some("beacon"));
        assert_eq!(projects[1].partner.as_ref().map(Vec::len), Some(2));
        assert_eq!(projects[1].partner.as_ref().and_then(|p| p[1].url.clone()), None);
    }

    #[test]
    fn summary_lists_channel_and_repo() {
        let projects = projects();
        let value = serde_json::to_value(format_summary(&projects[0])).expect("serialize");
        assert_eq!(
            value["text"]["text"],
            "*Beacon* • Channel: #beacon • Repo: <https://github.com/codeforboston/beacon>"
        );
        let value = serde_json::to_value(format_summary(&projects[1])).expect("serialize");
        assert_eq!(value["text"]["text"], "*Safe Water* • Channel: #safe-water");
    }

    #[test]
    fn detailed_falls_back_to_partners() {
        let projects = projects();

        let beacon = serde_json::to_value(format_detailed(&projects[0])).expect("serialize");
        assert_eq!(beacon["text"]["text"], "*Beacon*\nA Slack bot for the brigade.");
        assert_eq!(
            beacon["fields"],
            json!([
                {"type": "mrkdwn", "text": "*Tech Stack*"},
                {"type": "mrkdwn", "text": "Rust, Slack API"},
                {"type": "mrkdwn", "text": "*Channel*"},
                {"type": "mrkdwn", "text": "#beacon"},
                {"type": "mrkdwn", "text": "*Repo*"},
                {"type": "mrkdwn", "text": "<https://github.com/codeforboston/beacon>"}
            ])
        );

        let water = serde_json::to_value(format_detailed(&projects[1])).expect("serialize");
        assert_eq!(
            water["text"]["text"],
            "*Safe Water*\nA project in partnership with <https://tufts.edu|Tufts>, City of Boston"
        );

        let bare = ProjectInfo {
            name: "Bare".to_owned(),
            partner: Some(Vec::<Partner>::new()),
            ..ProjectInfo::default()
        };
        let bare = serde_json::to_value(format_detailed(&bare)).expect("serialize");
        assert_eq!(bare, json!({"type": "section", "text": {"type": "mrkdwn", "text": "*Bare*"}}));
    }

    #[test]
    fn dividers_precede_first_or_every_project() {
        let projects = projects();
        let summary = project_blocks(&projects, false);
        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0], Block::Divider);
        assert_ne!(summary[2], Block::Divider);

        let detailed = project_blocks(&projects, true);
        assert_eq!(detailed.len(), 4);
        assert_eq!(detailed[2], Block::Divider);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let feed = Arc::new(CountingFeed::new(0));
        let cache = ProjectCache::new(feed.clone());

        let (first, second) = tokio::join!(cache.get("https://feed"), cache.get("https://feed"));
        let third = cache.get("https://feed").await.expect("cached");

        assert_eq!(first.expect("first").len(), 2);
        assert_eq!(second.expect("second").len(), 2);
        assert_eq!(third.len(), 2);
        assert_eq!(feed.fetches.load(Ordering::SeqCst), 1);

        cache.get("https://other-feed").await.expect("other url");
        assert_eq!(feed.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let feed = Arc::new(CountingFeed::new(1));
        let cache = ProjectCache::new(feed.clone());

        let error = cache.get("https://feed").await.expect_err("first fetch fails");
        assert!(matches!(error, ProjectFeedError::Status(502)));

        cache.get("https://feed").await.expect("second fetch succeeds");
        assert_eq!(feed.fetches.load(Ordering::SeqCst), 2);
    }

    fn module(feed: Arc<CountingFeed>) -> ProjectsModule {
        ProjectsModule::new(
            Arc::new(ProjectCache::new(feed)),
            "https://feed",
            "https://www.codeforboston.org/projects/",
        )
    }

    #[tokio::test]
    async fn projects_command_replaces_original_with_detailed_listing() {
        let slack = Arc::new(FakeSlack::default());
        let mut registry = CommandRegistry::new();
        module(Arc::new(CountingFeed::new(0))).register(&mut registry);

        let message = SlackMessage::Command(Command {
            command: "/projects".to_owned(),
            response_url: "https://hooks.slack.com/commands/1".to_owned(),
            ..Command::default()
        });
        assert_eq!(registry.ack_message(&message).as_deref(), Some(PROJECTS_ACK));

        let ctx = HandlerContext::new(slack.clone(), "c-1");
        registry.dispatch(&message, &ctx).await.expect("dispatch");

        let responses = slack.responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].0, "https://hooks.slack.com/commands/1");
        assert!(responses[0].1.replace_original);
        assert_eq!(responses[0].1.blocks.len(), 4);
    }

    #[tokio::test]
    async fn welcome_is_ephemeral_with_summary_and_hint() {
        let slack = Arc::new(FakeSlack::default());
        let ctx = HandlerContext::new(slack.clone(), "c-2");
        let event = MemberJoinedEvent {
            user: "U7".to_owned(),
            channel: "C1".to_owned(),
            ..MemberJoinedEvent::default()
        };

        module(Arc::new(CountingFeed::new(0))).welcome_member(&event, &ctx).await.expect("welcome");

        let ephemerals = slack.ephemerals();
        assert_eq!(ephemerals.len(), 1);
        let (channel, user, message) = &ephemerals[0];
        assert_eq!((channel.as_str(), user.as_str()), ("C1", "U7"));
        assert!(message.fallback_text.contains("<https://www.codeforboston.org/projects/|our website>"));
        // welcome, divider, two projects, divider, hint
        assert_eq!(message.blocks.len(), 6);
        let hint = serde_json::to_value(&message.blocks[5]).expect("serialize");
        assert_eq!(hint["elements"][0]["text"], "To see additional details about the projects, type `/projects`");
    }

    #[tokio::test]
    async fn welcome_greets_member_by_profile_display_name() {
        let slack = Arc::new(FakeSlack::default().with_user(SlackUser {
            id: "U8".to_owned(),
            profile: UserProfile {
                real_name: "Ada Lovelace".to_owned(),
                display_name: "ada".to_owned(),
                email: None,
            },
            ..SlackUser::default()
        }));
        let ctx = HandlerContext::new(slack.clone(), "c-4");
        let event = MemberJoinedEvent {
            user: "U8".to_owned(),
            channel: "C1".to_owned(),
            ..MemberJoinedEvent::default()
        };

        module(Arc::new(CountingFeed::new(0))).welcome_member(&event, &ctx).await.expect("welcome");

        let (_, _, message) = &slack.ephemerals()[0];
        assert!(message.fallback_text.starts_with("Hi, ada! You can check"));
        let welcome = serde_json::to_value(&message.blocks[0]).expect("serialize");
        assert!(welcome["text"]["text"]
            .as_str()
            .is_some_and(|text| text.starts_with("Welcome to the Code for Boston Slack, ada!")));
    }

    #[tokio::test]
    async fn feed_failure_surfaces_as_handler_error() {
        let slack = Arc::new(FakeSlack::default());
        let ctx = HandlerContext::new(slack.clone(), "c-3");
        let command = Command { command: "/projects".to_owned(), ..Command::default() };

        let error = beacon_slack::registry::CommandHandler::handle(
            &module(Arc::new(CountingFeed::new(1))),
            &command,
            &ctx,
        )
        .await
        .expect_err("feed fails");

        assert!(error.to_string().contains("502"));
        assert!(slack.responses().is_empty());
    }
}
