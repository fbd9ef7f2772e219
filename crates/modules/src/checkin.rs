//! In-person hack night check-in.
//!
//! Members sign up through `/checkin` or the "Add My Name" button that
//! [`send_reminder`] posts. Sign-ups land in a per-date tab of the
//! attendance spreadsheet.

use std::sync::Arc;

use async_trait::async_trait;
use beacon_slack::{
    blocks::{Block, ButtonElement, MessageBuilder, MessageTemplate},
    client::ResponseMessage,
    events::{BlockAction, BlockActionEvent, Command},
    registry::{
        BlockActionConfig, BlockActionHandler, CommandConfig, CommandHandler, CommandRegistry,
        HandlerContext,
    },
    HandlerError, SlackApi, SlackApiError,
};
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, Timelike, Weekday};
use tracing::{error, info, warn};

use crate::sheets::{add_name_to_sheet, Attendee, SheetsClient};

pub const CHECKIN_COMMAND: &str = "checkin";
pub const CHECKIN_ACK: &str = "Give me a second to add your name to the spreadsheet...";
pub const IN_PERSON_ACTION: &str = "in_person";
pub const HACK_NIGHT_WEEKDAY: Weekday = Weekday::Tue;
/// Local hour on the eve of hack night after which sign-ups close.
pub const CUTOFF_HOUR: u32 = 17;

const TOO_LATE: &str = "Sorry, it's a little too late to sign up for this week's Hack Night! You can still join virtually.";

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Today when it is hack night, otherwise the coming one.
pub fn next_hack_night(today: NaiveDate) -> NaiveDate {
    let days_ahead = (7 + HACK_NIGHT_WEEKDAY.num_days_from_sunday()
        - today.weekday().num_days_from_sunday())
        % 7;
    today + Duration::days(i64::from(days_ahead))
}

/// Sign-ups close on hack night itself and from 17:00 on the eve, so the
/// sheet is settled a day ahead.
pub fn is_too_late(now: NaiveDateTime, hack_night: NaiveDate) -> bool {
    match (hack_night - now.date()).num_days() {
        0 => true,
        1 => now.hour() >= CUTOFF_HOUR,
        _ => false,
    }
}

pub fn short_date(date: NaiveDate) -> String {
    format!("{}/{}", date.month(), date.day())
}

pub fn sheet_url(spreadsheet_id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{spreadsheet_id}")
}

fn sheet_link(spreadsheet_id: &str, text: &str) -> String {
    format!("<{}|{text}>", sheet_url(spreadsheet_id))
}

fn notice(text: impl Into<String>) -> ResponseMessage {
    ResponseMessage::ephemeral(vec![Block::mrkdwn_section(text)])
}

pub fn reminder_message(date: NaiveDate) -> MessageTemplate {
    let date = short_date(date);
    MessageBuilder::new(format!(
        "Please add your name to the spreadsheet if you plan to attend the {date} Hack Night *in person*."
    ))
    .section(|section| {
        section.mrkdwn(format!("Will you attend the next Hack Night ({date}) *in person*?"));
    })
    .divider()
    .actions(|actions| {
        actions.button(ButtonElement::new(IN_PERSON_ACTION, "Add My Name").value("yes"));
    })
    .build()
}

/// Posts the sign-up prompt for `date`, or for the next hack night.
pub async fn send_reminder(
    slack: &dyn SlackApi,
    channel: &str,
    date: Option<NaiveDate>,
) -> Result<NaiveDate, SlackApiError> {
    let date = date.unwrap_or_else(|| next_hack_night(Local::now().date_naive()));
    slack.post_message(channel, &reminder_message(date)).await?;
    info!(event_name = "checkin.reminder.sent", channel, date = %date, "posted in-person reminder");
    Ok(date)
}

#[derive(Clone)]
pub struct CheckIn {
    sheets: Arc<dyn SheetsClient>,
    spreadsheet_id: Option<String>,
    clock: Arc<dyn Clock>,
}

impl CheckIn {
    pub fn new(sheets: Arc<dyn SheetsClient>, spreadsheet_id: Option<String>) -> Self {
        Self::with_clock(sheets, spreadsheet_id, Arc::new(SystemClock))
    }

    pub fn with_clock(
        sheets: Arc<dyn SheetsClient>,
        spreadsheet_id: Option<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { sheets, spreadsheet_id, clock }
    }

    pub fn register(&self, registry: &mut CommandRegistry) {
        registry.register_command(
            CHECKIN_COMMAND,
            CommandConfig::new(self.clone()).ack_message(CHECKIN_ACK),
        );
        registry.register_block_action(IN_PERSON_ACTION, BlockActionConfig::new(self.clone()));
    }

    pub async fn check_in(
        &self,
        user_id: &str,
        response_url: &str,
        ctx: &HandlerContext,
    ) -> Result<(), HandlerError> {
        let now = self.clock.now();
        let hack_night = next_hack_night(now.date());

        if is_too_late(now, hack_night) {
            info!(
                event_name = "checkin.too_late",
                user = user_id,
                hack_night = %hack_night,
                "sign-up window has closed"
            );
            ctx.slack.respond(response_url, &notice(TOO_LATE)).await?;
            return Ok(());
        }

        let spreadsheet_id = self.spreadsheet_id.as_deref().ok_or_else(|| {
            HandlerError::Configuration("no attendance spreadsheet id configured".to_owned())
        })?;

        let user = ctx.slack.user_info(user_id).await?;
        let attendee = Attendee {
            name: user.display_real_name().to_owned(),
            email: user.profile.email.clone(),
            username: Some(user.name.clone()),
        };

        match add_name_to_sheet(self.sheets.as_ref(), spreadsheet_id, hack_night, &[attendee]).await
        {
            Ok(()) => {
                let confirmation = notice(format!(
                    "Great! Your name has been added to the {} for {}.",
                    sheet_link(spreadsheet_id, "spreadsheet"),
                    short_date(hack_night)
                ));
                if let Err(error) = ctx.slack.respond(response_url, &confirmation).await {
                    warn!(
                        event_name = "checkin.confirmation.failed",
                        user = user_id,
                        error = %error,
                        "could not deliver check-in confirmation"
                    );
                }
                info!(
                    event_name = "checkin.recorded",
                    user = user_id,
                    hack_night = %hack_night,
                    correlation_id = %ctx.correlation_id,
                    "checked member in"
                );
            }
            Err(sheets_error) => {
                error!(
                    event_name = "checkin.sheets.failed",
                    user = user_id,
                    error = %sheets_error,
                    "could not record check-in"
                );
                let fallback = notice(format!(
                    "I wasn't able to add your name to the spreadsheet, so please {}.",
                    sheet_link(spreadsheet_id, "add it yourself")
                ));
                ctx.slack.respond(response_url, &fallback).await?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl CommandHandler for CheckIn {
    async fn handle(&self, command: &Command, ctx: &HandlerContext) -> Result<(), HandlerError> {
        self.check_in(&command.user_id, &command.response_url, ctx).await
    }
}

#[async_trait]
impl BlockActionHandler for CheckIn {
    async fn handle(
        &self,
        event: &BlockActionEvent,
        action: &BlockAction,
        ctx: &HandlerContext,
    ) -> Result<(), HandlerError> {
        let accepted = action
            .value
            .as_deref()
            .is_some_and(|value| value.to_ascii_lowercase().contains("yes"));
        if !accepted {
            return Ok(());
        }
        self.check_in(&event.user.id, &event.response_url, ctx).await
    }
}
