use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use super::error::SheetError;
use super::SheetSource;
use crate::config::Config;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

enum Credentials {
    ApiKey(String),
    Bearer(String),
}

/// Read-only client for the Google Sheets v4 REST API.
pub struct GoogleSheets {
    http: reqwest::Client,
    spreadsheet_id: String,
    credentials: Credentials,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl GoogleSheets {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        let credentials = match (&config.google_access_token, &config.google_api_key) {
            (Some(token), _) => Credentials::Bearer(token.clone()),
            (None, Some(key)) => Credentials::ApiKey(key.clone()),
            (None, None) => Credentials::ApiKey(String::new()),
        };
        Self {
            http,
            spreadsheet_id: config.sheet_id.clone(),
            credentials,
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SheetError> {
        let mut url = Url::parse(SHEETS_API_BASE)
            .map_err(|e| SheetError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetError::InvalidUrl(SHEETS_API_BASE.to_string()))?
            .push(&self.spreadsheet_id)
            .extend(segments);
        Ok(url)
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T, SheetError> {
        let mut request = self.http.get(url).query(query);
        request = match &self.credentials {
            Credentials::ApiKey(key) => request.query(&[("key", key.as_str())]),
            Credentials::Bearer(token) => request.bearer_auth(token),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(SheetError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl SheetSource for GoogleSheets {
    fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    async fn worksheet_titles(&self) -> Result<Vec<String>, SheetError> {
        let url = self.url(&[])?;
        let meta: SpreadsheetMeta = self
            .get(url, &[("fields", "sheets.properties.title")])
            .await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    async fn values(&self, title: &str) -> Result<Vec<Vec<String>>, SheetError> {
        let range = a1_range(title);
        let url = self.url(&["values", &range])?;
        debug!("Fetching worksheet '{}' from spreadsheet {}", title, self.spreadsheet_id);
        let range: ValueRange = self
            .get(url, &[("majorDimension", "ROWS")])
            .await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}

/// A1 notation for a whole worksheet: the quoted title, with `'` doubled.
fn a1_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn cell_to_string(cell: serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
