use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use beacon_slack::{
    blocks::MessageTemplate,
    client::{ResponseMessage, SlackUser, UserProfile},
    SlackApi, SlackApiError,
};
use serde_json::Value;

use crate::sheets::{Sheet, SheetProperties, SheetsClient, SheetsError, Spreadsheet};

/// Records every outbound Slack call.
#[derive(Default)]
pub struct FakeSlack {
    pub users: HashMap<String, SlackUser>,
    pub fail_responses: bool,
    pub(crate) posts: Mutex<Vec<(String, MessageTemplate)>>,
    pub(crate) ephemerals: Mutex<Vec<(String, String, MessageTemplate)>>,
    pub(crate) responses: Mutex<Vec<(String, ResponseMessage)>>,
}

impl FakeSlack {
    pub fn with_user(mut self, user: SlackUser) -> Self {
        self.users.insert(user.id.clone(), user);
        self
    }

    pub fn posts(&self) -> Vec<(String, MessageTemplate)> {
        self.posts.lock().expect("slack lock").clone()
    }

    pub fn ephemerals(&self) -> Vec<(String, String, MessageTemplate)> {
        self.ephemerals.lock().expect("slack lock").clone()
    }

    pub fn responses(&self) -> Vec<(String, ResponseMessage)> {
        self.responses.lock().expect("slack lock").clone()
    }
}

#[async_trait]
impl SlackApi for FakeSlack {
    async fn post_message(
        &self,
        channel: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        self.posts.lock().expect("slack lock").push((channel.to_owned(), message.clone()));
        Ok(())
    }

    async fn post_ephemeral(
        &self,
        channel: &str,
        user: &str,
        message: &MessageTemplate,
    ) -> Result<(), SlackApiError> {
        self.ephemerals.lock().expect("slack lock").push((
            channel.to_owned(),
            user.to_owned(),
            message.clone(),
        ));
        Ok(())
    }

    async fn respond(
        &self,
        response_url: &str,
        message: &ResponseMessage,
    ) -> Result<(), SlackApiError> {
        self.responses.lock().expect("slack lock").push((response_url.to_owned(), message.clone()));
        if self.fail_responses {
            return Err(SlackApiError::Status { status: 404, body: "expired_url".to_owned() });
        }
        Ok(())
    }

    async fn user_info(&self, user_id: &str) -> Result<SlackUser, SlackApiError> {
        self.users
            .get(user_id)
            .cloned()
            .ok_or_else(|| SlackApiError::Api("user_not_found".to_owned()))
    }

    async fn user_profile(&self, user_id: &str) -> Result<UserProfile, SlackApiError> {
        self.user_info(user_id).await.map(|user| user.profile)
    }
}

/// Serves a fixed set of tabs and records batch updates.
#[derive(Default)]
pub struct FakeSheets {
    pub titles: Vec<(i64, String)>,
    pub fail: bool,
    pub(crate) updates: Mutex<Vec<(String, Vec<Value>)>>,
}

impl FakeSheets {
    pub fn updates(&self) -> Vec<(String, Vec<Value>)> {
        self.updates.lock().expect("sheets lock").clone()
    }
}

#[async_trait]
impl SheetsClient for FakeSheets {
    async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<Spreadsheet, SheetsError> {
        if self.fail {
            return Err(SheetsError::Status { status: 503, body: "unavailable".to_owned() });
        }
        Ok(Spreadsheet {
            spreadsheet_id: spreadsheet_id.to_owned(),
            sheets: self
                .titles
                .iter()
                .map(|(id, title)| Sheet {
                    properties: Some(SheetProperties {
                        sheet_id: Some(*id),
                        title: Some(title.clone()),
                        index: None,
                    }),
                })
                .collect(),
        })
    }

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: Vec<Value>,
    ) -> Result<(), SheetsError> {
        self.updates.lock().expect("sheets lock").push((spreadsheet_id.to_owned(), requests));
        Ok(())
    }
}
