use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::ScrapeError;
use crate::model::ProfileSnapshot;
use crate::settings::Settings;

/// Instagram's own web app id. Without it the endpoint answers with a login wall.
const IG_APP_ID: &str = "936619743392459";
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/62.0.3202.94 Safari/537.36";
const PROFILE_LINK_BASE: &str = "https://www.instagram.com";

/// Looks up public profile counters by handle.
pub trait ProfileSource {
    /// `Ok(None)` when the account does not exist (deleted, renamed or never created).
    fn scrape_profile(&self, handle: &str) -> Result<Option<ProfileSnapshot>, ScrapeError>;
}

/// Strip surrounding whitespace and one leading `@`.
pub fn normalize_handle(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed)
}

/// Public profile page for a normalized handle.
pub fn profile_link(handle: &str) -> String {
    format!("{}/{}", PROFILE_LINK_BASE, handle)
}

/// Blocking client that presents itself as a desktop browser. One instance
/// is reused for every lookup so connections stay warm.
pub struct InstagramClient {
    http: Client,
    profile_url: String,
}

impl InstagramClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        // Accept-Encoding (gzip, deflate, br) is added by reqwest's decompression features.
        let http = Client::builder()
            .default_headers(browser_headers())
            .timeout(settings.timeout())
            .build()
            .context("Failed to build Instagram HTTP client")?;
        Ok(InstagramClient {
            http,
            profile_url: format!(
                "{}/api/v1/users/web_profile_info/",
                settings.instagram_url.trim_end_matches('/')
            ),
        })
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("x-ig-app-id", HeaderValue::from_static(IG_APP_ID));
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9,ru;q=0.8"),
    );
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers
}

impl ProfileSource for InstagramClient {
    fn scrape_profile(&self, handle: &str) -> Result<Option<ProfileSnapshot>, ScrapeError> {
        let handle = normalize_handle(handle);
        let resp = self
            .http
            .get(&self.profile_url)
            .query(&[("username", handle)])
            .send()?;
        let status = resp.status();
        debug!("Profile lookup {} -> {}", handle, status);
        let body = if status == StatusCode::NOT_FOUND {
            String::new()
        } else {
            resp.text()?
        };
        profile_from_response(handle, status, &body)
    }
}

/// 404 means the account is gone; any other non-success status is an error.
fn profile_from_response(
    handle: &str,
    status: StatusCode,
    body: &str,
) -> Result<Option<ProfileSnapshot>, ScrapeError> {
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(ScrapeError::Status {
            handle: handle.to_string(),
            status: status.as_u16(),
            body: body.to_string(),
        });
    }
    parse_profile(handle, body).map(Some)
}

#[derive(Deserialize)]
struct WebProfileInfo {
    data: ProfileData,
}

#[derive(Deserialize)]
struct ProfileData {
    user: ProfileUser,
}

#[derive(Deserialize)]
struct ProfileUser {
    edge_followed_by: EdgeCount,
    edge_follow: EdgeCount,
}

#[derive(Deserialize)]
struct EdgeCount {
    count: u64,
}

fn parse_profile(handle: &str, body: &str) -> Result<ProfileSnapshot, ScrapeError> {
    let info: WebProfileInfo =
        serde_json::from_str(body).map_err(|source| ScrapeError::Payload {
            handle: handle.to_string(),
            source,
        })?;
    Ok(ProfileSnapshot {
        followers: info.data.user.edge_followed_by.count,
        following: info.data.user.edge_follow.count,
    })
}
