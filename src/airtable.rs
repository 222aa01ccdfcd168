use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, warn};

use crate::error::StoreError;
use crate::model::{LeadRecord, Page, PageCursor, Sort};
use crate::settings::Settings;

/// Read/patch access to the leads table.
pub trait LeadStore {
    /// Fetch one page, starting after `cursor` when given.
    fn fetch_page(&self, sort: Option<&Sort>, cursor: Option<&PageCursor>)
        -> Result<Page, StoreError>;

    /// Merge `fields` into record `id`. Columns not named are left alone.
    fn update_record(&self, id: &str, fields: &Map<String, Value>) -> Result<(), StoreError>;
}

/// Airtable REST client for a single table.
pub struct AirtableClient {
    http: Client,
    table_url: String,
    token: String,
}

impl AirtableClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout())
            .build()
            .context("Failed to build Airtable HTTP client")?;
        Ok(AirtableClient {
            http,
            table_url: table_url(&settings.airtable_url, &settings.base_id, &settings.table_id),
            token: settings.access_token.clone(),
        })
    }
}

fn table_url(base_url: &str, base_id: &str, table_id: &str) -> String {
    format!("{}/v0/{}/{}", base_url.trim_end_matches('/'), base_id, table_id)
}

impl LeadStore for AirtableClient {
    fn fetch_page(
        &self,
        sort: Option<&Sort>,
        cursor: Option<&PageCursor>,
    ) -> Result<Page, StoreError> {
        let resp = self
            .http
            .get(&self.table_url)
            .bearer_auth(&self.token)
            .query(&list_query(sort, cursor))
            .send()?;
        let status = resp.status();
        let body = resp.text()?;
        page_from_response(status, &body)
    }

    fn update_record(&self, id: &str, fields: &Map<String, Value>) -> Result<(), StoreError> {
        let resp = self
            .http
            .patch(format!("{}/{}", self.table_url, id))
            .bearer_auth(&self.token)
            .json(&json!({ "fields": fields }))
            .send()?;
        let status = resp.status();
        let body = if status == StatusCode::OK {
            String::new()
        } else {
            resp.text().unwrap_or_default()
        };
        update_from_response(status, body)
    }
}

fn page_from_response(status: StatusCode, body: &str) -> Result<Page, StoreError> {
    if !status.is_success() {
        return Err(StoreError::Status {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }
    parse_page(body)
}

/// Airtable answers a merged PATCH with 200; anything else is a failure.
fn update_from_response(status: StatusCode, body: String) -> Result<(), StoreError> {
    if status != StatusCode::OK {
        return Err(StoreError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(())
}

/// Query parameters for a list request.
fn list_query(sort: Option<&Sort>, cursor: Option<&PageCursor>) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(cursor) = cursor {
        query.push(("offset", cursor.as_str().to_string()));
    }
    if let Some(sort) = sort {
        query.push(("sort[0][field]", sort.field.clone()));
        query.push(("sort[0][direction]", sort.direction.as_str().to_string()));
    }
    query
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<LeadRecord>,
    #[serde(default)]
    offset: Option<String>,
}

fn parse_page(body: &str) -> Result<Page, StoreError> {
    let list: ListResponse = serde_json::from_str(body)?;
    Ok(Page {
        records: list.records,
        next: list.offset.filter(|o| !o.is_empty()).map(PageCursor::new),
    })
}

/// Lazy walk over every page of the table. Each call to [`Pages::new`]
/// starts from the first page; iteration ends after the last page or after
/// the first error.
pub struct Pages<'a, S: LeadStore + ?Sized> {
    store: &'a S,
    sort: Option<&'a Sort>,
    cursor: Option<PageCursor>,
    done: bool,
}

impl<'a, S: LeadStore + ?Sized> Pages<'a, S> {
    pub fn new(store: &'a S, sort: Option<&'a Sort>) -> Self {
        Pages {
            store,
            sort,
            cursor: None,
            done: false,
        }
    }
}

impl<S: LeadStore + ?Sized> Iterator for Pages<'_, S> {
    type Item = Result<Vec<LeadRecord>, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.store.fetch_page(self.sort, self.cursor.as_ref()) {
            Ok(page) => {
                self.done = page.next.is_none();
                self.cursor = page.next;
                Some(Ok(page.records))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Every lead the table returned, in server order.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<LeadRecord>,
    pub pages: usize,
    /// A page after the first failed, so `records` is incomplete.
    pub truncated: bool,
}

/// Collect all pages. Failures are logged and end the walk; a failure after
/// at least one good page keeps what was fetched and sets `truncated`.
pub fn fetch_all_leads<S: LeadStore + ?Sized>(store: &S, sort: Option<&Sort>) -> FetchOutcome {
    let mut out = FetchOutcome::default();
    for page in Pages::new(store, sort) {
        match page {
            Ok(records) => {
                out.pages += 1;
                debug!("Page {}: {} records", out.pages, records.len());
                out.records.extend(records);
            }
            Err(e) => {
                error!("Failed to get records: {}", e);
                if out.pages > 0 {
                    out.truncated = true;
                    warn!(
                        "Pagination stopped after {} pages; continuing with {} leads",
                        out.pages,
                        out.records.len()
                    );
                }
                break;
            }
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    Failed,
}

/// Patch one record, logging the result. Failures are not retried.
pub fn update_record<S: LeadStore + ?Sized>(
    store: &S,
    id: &str,
    fields: &Map<String, Value>,
) -> UpdateOutcome {
    match store.update_record(id, fields) {
        Ok(()) => {
            debug!("Successfully updated {}", id);
            UpdateOutcome::Updated
        }
        Err(StoreError::Status { status, body }) => {
            error!(
                "Failed to update record {} (status={}, response={})",
                id, status, body
            );
            UpdateOutcome::Failed
        }
        Err(e) => {
            error!("Failed to update record {}: {}", id, e);
            UpdateOutcome::Failed
        }
    }
}
