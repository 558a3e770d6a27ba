// src/passage/http.rs
// HTTP verse lookup backed by the ESV API and bible-api.com

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::VerseLookup;
use crate::error::FetchError;
use crate::reference::{Reference, Translation};

const DEFAULT_ESV_URL: &str = "https://api.esv.org/v3/passage/text/";
const DEFAULT_BIBLE_API_URL: &str = "https://bible-api.com";
const USER_AGENT: &str = concat!("versebot/", env!("CARGO_PKG_VERSION"));
/// How much of an error body ends up in the logs
const ERROR_SNIPPET_CHARS: usize = 200;

/// Base URLs of the lookup backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub esv_url: String,
    pub bible_api_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            esv_url: DEFAULT_ESV_URL.to_string(),
            bible_api_url: DEFAULT_BIBLE_API_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EsvResponse {
    #[serde(default)]
    passages: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BibleApiResponse {
    #[serde(default)]
    text: String,
}

/// Verse lookup over HTTP.
///
/// ESV needs an API key; KJV and WEB come from bible-api.com. Other
/// recognized translations have no backend and report `NotFound`.
pub struct HttpVerseLookup {
    client: Client,
    endpoints: Endpoints,
    esv_api_key: Option<String>,
}

impl HttpVerseLookup {
    pub fn new(endpoints: Endpoints, esv_api_key: Option<String>, request_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoints,
            esv_api_key: esv_api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    async fn fetch_esv(&self, passage: &str) -> Result<String, FetchError> {
        let api_key = self
            .esv_api_key
            .as_deref()
            .ok_or(FetchError::MissingApiKey(Translation::Esv))?;

        let request = self
            .client
            .get(&self.endpoints.esv_url)
            .header("Authorization", format!("Token {}", api_key))
            .header("Accept", "application/json")
            .query(&[
                ("q", passage),
                ("include-headings", "false"),
                ("include-footnotes", "false"),
                ("include-verse-numbers", "false"),
                ("include-short-copyright", "false"),
                ("include-passage-references", "false"),
            ]);

        let response: EsvResponse = send_json(request, passage).await?;
        response
            .passages
            .into_iter()
            .next()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| FetchError::not_found(format!("{passage} not found in ESV")))
    }

    async fn fetch_bible_api(&self, passage: &str, translation: Translation) -> Result<String, FetchError> {
        // Keep ':' readable in the path; everything else is percent-encoded
        let encoded = urlencoding::encode(passage).replace("%3A", ":");
        let url = format!(
            "{}/{}",
            self.endpoints.bible_api_url.trim_end_matches('/'),
            encoded
        );

        let request = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .query(&[("translation", translation.code())]);

        let response: BibleApiResponse = send_json(request, passage).await?;
        let text = response.text.trim();
        if text.is_empty() {
            return Err(FetchError::not_found(format!(
                "{passage} not found in {}",
                translation.marker()
            )));
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl VerseLookup for HttpVerseLookup {
    async fn lookup(&self, reference: &Reference, translation: Translation) -> Result<String, FetchError> {
        let passage = reference.to_string();
        debug!(passage = %passage, translation = %translation, "Looking up passage");

        match translation {
            Translation::Esv => self.fetch_esv(&passage).await,
            Translation::Kjv | Translation::Web => self.fetch_bible_api(&passage, translation).await,
            other => Err(FetchError::not_found(format!(
                "no backend serves the {} translation",
                other.marker()
            ))),
        }
    }
}

/// Send `request` and decode a JSON body, classifying failures.
async fn send_json<T: serde::de::DeserializeOwned>(request: RequestBuilder, passage: &str) -> Result<T, FetchError> {
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(ERROR_SNIPPET_CHARS).collect();
        warn!(passage = %passage, status = %status, body = %snippet, "Lookup request failed");
        return Err(classify_status(status, passage));
    }

    response.json::<T>().await.map_err(|e| {
        if e.is_decode() {
            warn!(passage = %passage, error = %e, "Invalid JSON from lookup backend");
            FetchError::not_found(format!("invalid response for {passage}"))
        } else {
            FetchError::transient(e.to_string())
        }
    })
}

/// 429 and 5xx are worth trying again later; any other failure status is terminal.
fn classify_status(status: StatusCode, passage: &str) -> FetchError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        FetchError::transient(format!("HTTP {status} for {passage}"))
    } else {
        FetchError::not_found(format!("HTTP {status} for {passage}"))
    }
}
