//! Attendance sheets.
//!
//! Each hack night gets its own tab titled `MM-DD-YY`, created on first use
//! with a bold `Name | Email` header. Attendees are appended and duplicate
//! rows below the header are removed in the same batch update.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
const NAME_COLUMN_WIDTH: u32 = 150;
const EMAIL_COLUMN_WIDTH: u32 = 200;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("no sheets access token is configured")]
    MissingCredentials,
    #[error("sheets request failed: {0}")]
    Request(String),
    #[error("sheets responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("sheets response could not be decoded: {0}")]
    Response(String),
    #[error("invalid sheet title pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SheetProperties {
    pub sheet_id: Option<i64>,
    pub title: Option<String>,
    pub index: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Sheet {
    pub properties: Option<SheetProperties>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Spreadsheet {
    pub spreadsheet_id: String,
    pub sheets: Vec<Sheet>,
}

#[async_trait]
pub trait SheetsClient: Send + Sync {
    async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<Spreadsheet, SheetsError>;

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: Vec<Value>,
    ) -> Result<(), SheetsError>;
}

/// Sheets v4 REST client authenticated with a bearer access token.
#[derive(Clone)]
pub struct HttpSheetsClient {
    client: Client,
    access_token: Option<SecretString>,
    api_base: String,
}

impl std::fmt::Debug for HttpSheetsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSheetsClient")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl HttpSheetsClient {
    pub fn new(
        access_token: Option<SecretString>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SheetsError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| SheetsError::Request(error.to_string()))?;
        let api_base = api_base.into().trim_end_matches('/').to_owned();
        Ok(Self { client, access_token, api_base })
    }

    fn token(&self) -> Result<&str, SheetsError> {
        self.access_token
            .as_ref()
            .map(|token| token.expose_secret())
            .ok_or(SheetsError::MissingCredentials)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(SheetsError::Status { status: status.as_u16(), body })
    }
}

#[async_trait]
impl SheetsClient for HttpSheetsClient {
    async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<Spreadsheet, SheetsError> {
        let response = self
            .client
            .get(format!("{}/spreadsheets/{spreadsheet_id}", self.api_base))
            .bearer_auth(self.token()?)
            .query(&[("fields", "spreadsheetId,sheets.properties")])
            .send()
            .await
            .map_err(|error| SheetsError::Request(error.to_string()))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|error| SheetsError::Response(error.to_string()))
    }

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: Vec<Value>,
    ) -> Result<(), SheetsError> {
        let response = self
            .client
            .post(format!("{}/spreadsheets/{spreadsheet_id}:batchUpdate", self.api_base))
            .bearer_auth(self.token()?)
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .map_err(|error| SheetsError::Request(error.to_string()))?;

        Self::check(response).await.map(|_| ())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attendee {
    pub name: String,
    pub email: Option<String>,
    pub username: Option<String>,
}

/// Matches tab titles such as `10/20/26`, `10-20-2026` or `010-020-26`.
pub fn date_title_matcher(date: NaiveDate) -> Result<Regex, regex::Error> {
    let year = format!("{:04}", date.year());
    let (century, short_year) = year.split_at(year.len() - 2);
    let pattern = format!(
        r"\b0*{month}[-/]0*{day}[-/](?:{century})?{short_year}\b",
        month = date.month(),
        day = date.day(),
    );
    Regex::new(&pattern)
}

pub fn sheet_name_for_date(date: NaiveDate) -> String {
    date.format("%m-%d-%y").to_string()
}

pub fn sheet_id_for_date(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 10_000 + i64::from(date.month0()) * 100 + i64::from(date.day())
}

pub fn find_sheet_id(
    spreadsheet: &Spreadsheet,
    date: NaiveDate,
) -> Result<Option<i64>, regex::Error> {
    let matcher = date_title_matcher(date)?;
    Ok(spreadsheet
        .sheets
        .iter()
        .filter_map(|sheet| sheet.properties.as_ref())
        .find(|properties| properties.title.as_deref().is_some_and(|title| matcher.is_match(title)))
        .and_then(|properties| properties.sheet_id))
}

fn string_cell(text: &str) -> Value {
    json!({ "userEnteredValue": { "stringValue": text } })
}

fn bold_cell(text: &str) -> Value {
    json!({
        "userEnteredValue": { "stringValue": text },
        "textFormatRuns": [{ "startIndex": 0, "format": { "bold": true } }]
    })
}

fn column_width(sheet_id: i64, column: u32, pixels: u32) -> Value {
    json!({
        "updateDimensionProperties": {
            "range": {
                "sheetId": sheet_id,
                "dimension": "COLUMNS",
                "startIndex": column,
                "endIndex": column + 1
            },
            "properties": { "pixelSize": pixels },
            "fields": "pixelSize"
        }
    })
}

/// Batch-update requests that record `attendees` for `date`.
pub fn attendance_requests(
    existing_sheet_id: Option<i64>,
    date: NaiveDate,
    attendees: &[Attendee],
) -> Vec<Value> {
    let mut requests = Vec::new();
    let sheet_id = match existing_sheet_id {
        Some(sheet_id) => sheet_id,
        None => {
            let sheet_id = sheet_id_for_date(date);
            requests.push(json!({
                "addSheet": {
                    "properties": {
                        "title": sheet_name_for_date(date),
                        "index": 0,
                        "sheetId": sheet_id
                    }
                }
            }));
            requests.push(json!({
                "appendCells": {
                    "sheetId": sheet_id,
                    "fields": "*",
                    "rows": [{ "values": [bold_cell("Name"), bold_cell("Email")] }]
                }
            }));
            sheet_id
        }
    };

    requests.push(column_width(sheet_id, 0, NAME_COLUMN_WIDTH));
    requests.push(column_width(sheet_id, 1, EMAIL_COLUMN_WIDTH));

    let rows: Vec<Value> = attendees
        .iter()
        .map(|attendee| {
            json!({
                "values": [
                    string_cell(&attendee.name),
                    string_cell(attendee.email.as_deref().unwrap_or_default()),
                    string_cell(attendee.username.as_deref().unwrap_or_default())
                ]
            })
        })
        .collect();
    requests.push(json!({ "appendCells": { "sheetId": sheet_id, "fields": "*", "rows": rows } }));
    requests.push(json!({
        "deleteDuplicates": { "range": { "sheetId": sheet_id, "startRowIndex": 1 } }
    }));

    requests
}

pub async fn add_name_to_sheet(
    client: &dyn SheetsClient,
    spreadsheet_id: &str,
    date: NaiveDate,
    attendees: &[Attendee],
) -> Result<(), SheetsError> {
    let spreadsheet = client.get_spreadsheet(spreadsheet_id).await?;
    let existing = find_sheet_id(&spreadsheet, date)?;
    debug!(
        event_name = "sheets.attendance.lookup",
        date = %date,
        existing_sheet_id = ?existing,
        "resolved attendance tab"
    );

    client.batch_update(spreadsheet_id, attendance_requests(existing, date, attendees)).await?;
    info!(
        event_name = "sheets.attendance.recorded",
        date = %date,
        attendees = attendees.len(),
        "recorded attendance"
    );
    Ok(())
}
