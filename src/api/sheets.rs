use crate::store::{Result, StoreError};
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SERVICE: &str = "Google Sheets";

#[derive(Debug, Clone)]
pub struct SheetProperties {
    pub sheet_id: i64,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct SpreadsheetInfo {
    pub title: String,
    pub sheets: Vec<SheetProperties>,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct MetaRoot {
    #[serde(default)]
    properties: Option<MetaProps>,
    #[serde(default)]
    sheets: Vec<MetaSheet>,
}

#[derive(Debug, Deserialize)]
struct MetaProps {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct MetaSheet {
    properties: MetaSheetProps,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaSheetProps {
    sheet_id: i64,
    title: String,
}

/// Thin client over the Sheets v4 REST API, authorized with a bearer token.
#[derive(Clone)]
pub struct SheetsClient {
    http: Client,
    spreadsheet_id: String,
    access_token: String,
}

impl SheetsClient {
    pub fn new(http: Client, spreadsheet_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            http,
            spreadsheet_id: spreadsheet_id.into(),
            access_token: access_token.into(),
        }
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    fn url(&self, tail: &[&str]) -> Result<Url> {
        let mut url = Url::parse(SHEETS_BASE)
            .map_err(|e| StoreError::Other(format!("bad sheets url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Other("sheets url cannot be a base".to_string()))?
            .push(&self.spreadsheet_id)
            .extend(tail);
        Ok(url)
    }

    fn values_url(&self, range: &str, suffix: &str) -> Result<Url> {
        let mut url = self.url(&[])?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Other("sheets url cannot be a base".to_string()))?
            .push("values")
            .push(&format!("{}{}", range, suffix));
        Ok(url)
    }

    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(StoreError::Api {
            service: SERVICE,
            status: status.as_u16(),
            body: body.chars().take(400).collect(),
        })
    }

    pub async fn spreadsheet_info(&self) -> Result<SpreadsheetInfo> {
        let mut url = self.url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "properties.title,sheets.properties(sheetId,title)");
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        let root: MetaRoot = Self::check(resp).await?.json().await?;
        Ok(SpreadsheetInfo {
            title: root.properties.map(|p| p.title).unwrap_or_default(),
            sheets: root
                .sheets
                .into_iter()
                .map(|s| SheetProperties {
                    sheet_id: s.properties.sheet_id,
                    title: s.properties.title,
                })
                .collect(),
        })
    }

    pub async fn sheet_id(&self, title: &str) -> Result<Option<i64>> {
        let info = self.spreadsheet_info().await?;
        Ok(info
            .sheets
            .into_iter()
            .find(|s| s.title == title)
            .map(|s| s.sheet_id))
    }

    pub async fn get_values(&self, title: &str) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(&quote_sheet(title), "")?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        let range: ValueRange = Self::check(resp).await?.json().await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    pub async fn append_values(&self, title: &str, rows: &[Vec<String>]) -> Result<()> {
        let mut url = self.values_url(&quote_sheet(title), ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "majorDimension": "ROWS", "values": rows }))
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn update_values(&self, range: &str, rows: &[Vec<String>]) -> Result<()> {
        let mut url = self.values_url(range, "")?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let resp = self
            .http
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "range": range, "majorDimension": "ROWS", "values": rows }))
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn batch_update(&self, requests: Vec<Value>) -> Result<Value> {
        let mut url = self.url(&[])?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::Other("sheets url cannot be a base".to_string()))?;
            segments.pop();
            segments.push(&format!("{}:batchUpdate", self.spreadsheet_id));
        }
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "requests": requests }))
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn add_sheet(&self, title: &str, rows: usize, cols: usize) -> Result<()> {
        self.batch_update(vec![json!({
            "addSheet": {
                "properties": {
                    "title": title,
                    "gridProperties": { "rowCount": rows, "columnCount": cols }
                }
            }
        })])
        .await?;
        Ok(())
    }

    /// Deletes grid rows `[start, end)` (0-based, header is grid row 0).
    pub async fn delete_grid_rows(&self, sheet_id: i64, start: usize, end: usize) -> Result<()> {
        self.batch_update(vec![json!({
            "deleteDimension": {
                "range": {
                    "sheetId": sheet_id,
                    "dimension": "ROWS",
                    "startIndex": start,
                    "endIndex": end
                }
            }
        })])
        .await?;
        Ok(())
    }
}

/// Quotes a worksheet title for use in A1 notation.
pub fn quote_sheet(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Column letter for a 1-based column index (1 => A, 27 => AA).
pub fn column_letter(mut index: usize) -> String {
    let mut out = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        out.push(b'A' + rem as u8);
        index = (index - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
