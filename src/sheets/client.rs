// ABOUTME: HTTP client for the Google Sheets v4 values and batchUpdate APIs
// ABOUTME: Implements RemoteSheet; non-2xx responses become RemoteSink errors

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use url::Url;

use super::auth::{ServiceAccountAuth, ServiceAccountKey, TokenSource};
use super::models::{
    AppendValuesResponse, ApiErrorEnvelope, BatchUpdateRequest, DeleteDimensionRequest,
    DimensionRange, SheetRequest, Spreadsheet, ValueRange,
};
use super::{cell_text, plan_row_deletions, RemoteSheet, SheetId};
use crate::error::SyncError;
use crate::source::CellValue;
use crate::utils::column_letter;

/// Default Google Sheets API base URL
pub const DEFAULT_SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

/// Default number of rows sent per append request
pub const DEFAULT_APPEND_BATCH_SIZE: usize = 5_000;

/// Client bound to one sheet (tab) of one spreadsheet.
pub struct SheetsClient {
    http: Client,
    tokens: Arc<dyn TokenSource>,
    api_base: Url,
    spreadsheet_id: String,
    sheet_name: String,
    append_batch_size: usize,
    sheet_id: OnceCell<SheetId>,
}

impl SheetsClient {
    /// Create a client authenticating as a service account.
    pub fn new(
        spreadsheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
        key: ServiceAccountKey,
    ) -> Result<Self, SyncError> {
        let http = build_http_client()?;
        let auth = ServiceAccountAuth::new(http.clone(), key);
        Self::with_token_source(http, Arc::new(auth), spreadsheet_id, sheet_name)
    }

    /// Create a client with a caller-provided token source.
    pub fn with_token_source(
        http: Client,
        tokens: Arc<dyn TokenSource>,
        spreadsheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
    ) -> Result<Self, SyncError> {
        let api_base = Url::parse(DEFAULT_SHEETS_API_URL)
            .map_err(|e| SyncError::Config(format!("invalid Sheets API URL: {}", e)))?;

        Ok(Self {
            http,
            tokens,
            api_base,
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
            append_batch_size: DEFAULT_APPEND_BATCH_SIZE,
            sheet_id: OnceCell::new(),
        })
    }

    /// Point the client at a different API root (emulators, proxies).
    pub fn with_api_base(mut self, api_base: &str) -> Result<Self, SyncError> {
        let normalized = format!("{}/", api_base.trim_end_matches('/'));
        self.api_base = Url::parse(&normalized)
            .map_err(|e| SyncError::Config(format!("invalid Sheets API URL '{}': {}", api_base, e)))?;
        Ok(self)
    }

    pub fn with_append_batch_size(mut self, append_batch_size: usize) -> Self {
        self.append_batch_size = append_batch_size.max(1);
        self
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Sheet name quoted for A1 notation: `'Bookings 2024'`.
    fn quoted_sheet(&self) -> String {
        format!("'{}'", self.sheet_name.replace('\'', "''"))
    }

    /// A1 range on this sheet; an empty `cells` addresses the whole sheet.
    pub fn a1_range(&self, cells: &str) -> String {
        if cells.is_empty() {
            self.quoted_sheet()
        } else {
            format!("{}!{}", self.quoted_sheet(), cells)
        }
    }

    /// `{base}/{spreadsheet_id}{suffix}` with the id percent-encoded.
    fn spreadsheet_url(&self, suffix: &str) -> Result<Url, SyncError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Config("Sheets API URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push(&format!("{}{}", self.spreadsheet_id, suffix));
        Ok(url)
    }

    /// `{base}/{spreadsheet_id}/values/{range}{suffix}` with query parameters.
    pub fn values_url(&self, range: &str, suffix: &str, query: &[(&str, &str)]) -> Result<Url, SyncError> {
        let mut url = self.spreadsheet_url("")?;
        url.path_segments_mut()
            .map_err(|_| SyncError::Config("Sheets API URL cannot be a base".to_string()))?
            .push("values")
            .push(&format!("{}{}", range, suffix));
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Response, SyncError> {
        let token = self.tokens.access_token().await?;

        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SyncError::remote(operation, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or(body);

            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                return Err(SyncError::remote_status(
                    operation,
                    status.as_u16(),
                    format!(
                        "{}. Share the spreadsheet with the service account and check its credentials",
                        message
                    ),
                ));
            }

            return Err(SyncError::remote_status(operation, status.as_u16(), message));
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, SyncError> {
        self.send(operation, request)
            .await?
            .json::<T>()
            .await
            .map_err(|e| SyncError::remote(operation, format!("unexpected response body: {}", e)))
    }
}

fn build_http_client() -> Result<Client, SyncError> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| SyncError::Config(format!("Failed to create HTTP client: {}", e)))
}

#[async_trait]
impl RemoteSheet for SheetsClient {
    async fn read_header(&self) -> Result<Vec<String>, SyncError> {
        let url = self.values_url(&self.a1_range("1:1"), "", &[("majorDimension", "ROWS")])?;
        let range: ValueRange = self.send_json("read header", self.http.get(url)).await?;

        let mut header: Vec<String> = range
            .values
            .into_iter()
            .next()
            .unwrap_or_default()
            .iter()
            .map(cell_text)
            .collect();
        while header.last().is_some_and(|cell| cell.is_empty()) {
            header.pop();
        }
        Ok(header)
    }

    async fn write_header(&self, columns: &[String]) -> Result<(), SyncError> {
        let range = self.a1_range("A1");
        let url = self.values_url(&range, "", &[("valueInputOption", "RAW")])?;
        let body = ValueRange {
            range: Some(range),
            major_dimension: Some("ROWS".to_string()),
            values: vec![columns.iter().cloned().map(JsonValue::String).collect()],
        };

        self.send("write header", self.http.put(url).json(&body)).await?;
        tracing::debug!("Wrote {} header columns to {}", columns.len(), self.sheet_name);
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), SyncError> {
        let url = self.values_url(&self.a1_range(""), ":clear", &[])?;
        self.send("clear sheet", self.http.post(url).json(&serde_json::json!({})))
            .await?;
        Ok(())
    }

    async fn read_column(&self, index: usize) -> Result<Vec<(u32, String)>, SyncError> {
        let letter = column_letter(index);
        let url = self.values_url(
            &self.a1_range(&format!("{}2:{}", letter, letter)),
            "",
            &[
                ("majorDimension", "COLUMNS"),
                ("valueRenderOption", "UNFORMATTED_VALUE"),
            ],
        )?;
        let range: ValueRange = self.send_json("read key column", self.http.get(url)).await?;

        Ok(range
            .values
            .into_iter()
            .next()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(offset, cell)| (offset as u32 + 2, cell_text(cell)))
            .filter(|(_, text)| !text.is_empty())
            .collect())
    }

    async fn append_rows(&self, rows: &[Vec<CellValue>]) -> Result<usize, SyncError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let range = self.a1_range("A1");
        let mut appended = 0usize;

        for chunk in rows.chunks(self.append_batch_size) {
            let url = self.values_url(
                &range,
                ":append",
                &[
                    ("valueInputOption", "RAW"),
                    ("insertDataOption", "INSERT_ROWS"),
                ],
            )?;
            let body = ValueRange {
                range: Some(range.clone()),
                major_dimension: Some("ROWS".to_string()),
                values: chunk
                    .iter()
                    .map(|row| row.iter().map(CellValue::to_json).collect())
                    .collect(),
            };

            let response: AppendValuesResponse = self
                .send_json("append rows", self.http.post(url).json(&body))
                .await?;
            let written = response
                .updates
                .and_then(|u| u.updated_rows)
                .map(|n| n as usize)
                .unwrap_or(chunk.len());
            appended += written;
        }

        Ok(appended)
    }

    async fn delete_rows(&self, row_numbers: &[u32]) -> Result<usize, SyncError> {
        let spans = plan_row_deletions(row_numbers);
        if spans.is_empty() {
            return Ok(0);
        }

        let sheet_id = self.resolve_sheet_id().await?;
        let body = BatchUpdateRequest {
            requests: spans
                .iter()
                .map(|span| SheetRequest {
                    delete_dimension: DeleteDimensionRequest {
                        range: DimensionRange {
                            sheet_id,
                            dimension: "ROWS".to_string(),
                            start_index: span.start,
                            end_index: span.end,
                        },
                    },
                })
                .collect(),
        };

        let url = self.spreadsheet_url(":batchUpdate")?;
        self.send("delete rows", self.http.post(url).json(&body)).await?;

        Ok(spans.iter().map(|span| span.len() as usize).sum())
    }

    async fn resolve_sheet_id(&self) -> Result<SheetId, SyncError> {
        let id = self
            .sheet_id
            .get_or_try_init(|| async {
                let mut url = self.spreadsheet_url("")?;
                url.query_pairs_mut().append_pair("fields", "sheets.properties");
                let spreadsheet: Spreadsheet =
                    self.send_json("resolve sheet id", self.http.get(url)).await?;

                spreadsheet
                    .sheets
                    .into_iter()
                    .find(|sheet| sheet.properties.title == self.sheet_name)
                    .map(|sheet| sheet.properties.sheet_id)
                    .ok_or_else(|| {
                        SyncError::remote(
                            "resolve sheet id",
                            format!(
                                "sheet '{}' not found in spreadsheet {}",
                                self.sheet_name, self.spreadsheet_id
                            ),
                        )
                    })
            })
            .await?;
        Ok(*id)
    }
}
