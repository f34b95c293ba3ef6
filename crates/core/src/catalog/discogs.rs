//! Discogs API client.
//!
//! Discogs requires:
//! - User-Agent header identifying the application
//! - A personal access token, sent as `Authorization: Discogs token=...`
//! - Rate limiting: 60 requests per minute for authenticated clients

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::types::{CandidateRelease, CatalogClient, CatalogError, FormatEntry};
use crate::query::SearchParams;

/// Discogs API client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscogsConfig {
    /// Personal access token.
    #[serde(default)]
    pub token: String,
    /// User-Agent string (required by Discogs).
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Requests per minute (default: 60, the authenticated limit).
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Base URL (default: https://api.discogs.com).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_user_agent() -> String {
    format!(
        "Cratedigger/{} ( https://github.com/lelloman/cratedigger )",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_requests_per_minute() -> u32 {
    60
}

impl Default for DiscogsConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            user_agent: default_user_agent(),
            requests_per_minute: default_requests_per_minute(),
            base_url: None,
        }
    }
}

/// Identity of the authenticated Discogs user.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscogsIdentity {
    pub id: u64,
    pub username: String,
}

/// Media/sleeve condition and notes attached to a collection instance.
#[derive(Debug, Clone, Default)]
pub struct CollectionEntry {
    pub condition: Option<String>,
    pub sleeve_condition: Option<String>,
    pub notes: Option<String>,
}

// Discogs collection notes field ids (fields 1-3 exist on every account).
const FIELD_CONDITION: u32 = 1;
const FIELD_SLEEVE_CONDITION: u32 = 2;
const FIELD_NOTES: u32 = 3;

const UNCATEGORIZED_FOLDER: u32 = 1;

/// Discogs API client.
pub struct DiscogsClient {
    client: Client,
    base_url: String,
    token: String,
    last_request: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

impl DiscogsClient {
    /// Create a new Discogs client.
    pub fn new(config: DiscogsConfig) -> Result<Self, CatalogError> {
        if config.token.is_empty() {
            return Err(CatalogError::NotConfigured(
                "Discogs token is required".to_string(),
            ));
        }
        if config.requests_per_minute == 0 {
            return Err(CatalogError::NotConfigured(
                "requests_per_minute must be greater than zero".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        let base_url = config
            .base_url
            .unwrap_or_else(|| "https://api.discogs.com".to_string());

        Ok(Self {
            client,
            base_url,
            token: config.token,
            last_request: Arc::new(Mutex::new(None)),
            min_interval: Duration::from_millis(60_000 / config.requests_per_minute as u64),
        })
    }

    fn auth_header(&self) -> String {
        format!("Discogs token={}", self.token)
    }

    /// Wait for rate limit if needed.
    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                debug!("Discogs rate limit: waiting {:?}", wait_time);
                sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }

    async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, CatalogError> {
        let status = response.status();
        if status == 429 {
            warn!("Discogs rate limit exceeded");
            return Err(CatalogError::RateLimitExceeded);
        }
        if status == 404 {
            let url = response.url().to_string();
            return Err(CatalogError::NotFound(url));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(response)
    }

    /// Identity of the token's owner.
    pub async fn identity(&self) -> Result<DiscogsIdentity, CatalogError> {
        self.wait_for_rate_limit().await;

        let url = format!("{}/oauth/identity", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let identity = response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(format!("Failed to parse identity: {}", e)))?;
        Ok(identity)
    }

    /// Add a release to the user's collection (uncategorized folder) and set
    /// its condition/sleeve/notes fields.
    ///
    /// If the release is already in the collection (422), the existing
    /// instance is reused. A failure to set the notes field is logged and
    /// ignored; condition failures propagate.
    pub async fn add_to_collection(
        &self,
        release_id: u64,
        entry: &CollectionEntry,
    ) -> Result<u64, CatalogError> {
        let identity = self.identity().await?;
        let username = &identity.username;

        self.wait_for_rate_limit().await;

        let url = format!(
            "{}/users/{}/collection/folders/{}/releases/{}",
            self.base_url, username, UNCATEGORIZED_FOLDER, release_id
        );

        debug!("Discogs add to collection: release_id={}", release_id);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        let status = response.status();
        let instance_id = if status == 422 {
            // Already in the collection, look up the existing instance.
            debug!("Release {} already in collection", release_id);
            self.find_instance(username, release_id).await?
        } else {
            let response = Self::check_status(response).await?;
            let added: AddedInstance = response.json().await.map_err(|e| {
                CatalogError::Parse(format!("Failed to parse collection response: {}", e))
            })?;
            added.instance_id
        };

        if let Some(condition) = &entry.condition {
            self.set_instance_field(username, release_id, instance_id, FIELD_CONDITION, condition)
                .await?;
        }
        if let Some(sleeve) = &entry.sleeve_condition {
            self.set_instance_field(
                username,
                release_id,
                instance_id,
                FIELD_SLEEVE_CONDITION,
                sleeve,
            )
            .await?;
        }
        if let Some(notes) = &entry.notes {
            if let Err(e) = self
                .set_instance_field(username, release_id, instance_id, FIELD_NOTES, notes)
                .await
            {
                warn!("Failed to set notes on instance {}: {}", instance_id, e);
            }
        }

        Ok(instance_id)
    }

    async fn find_instance(&self, username: &str, release_id: u64) -> Result<u64, CatalogError> {
        self.wait_for_rate_limit().await;

        let url = format!(
            "{}/users/{}/collection/releases/{}",
            self.base_url, username, release_id
        );
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let instances: CollectionInstances = response.json().await.map_err(|e| {
            CatalogError::Parse(format!("Failed to parse collection instances: {}", e))
        })?;

        instances
            .releases
            .first()
            .map(|r| r.instance_id)
            .ok_or_else(|| {
                CatalogError::Parse(format!("No collection instance for release {}", release_id))
            })
    }

    async fn set_instance_field(
        &self,
        username: &str,
        release_id: u64,
        instance_id: u64,
        field_id: u32,
        value: &str,
    ) -> Result<(), CatalogError> {
        self.wait_for_rate_limit().await;

        let url = format!(
            "{}/users/{}/collection/folders/{}/releases/{}/instances/{}/fields/{}",
            self.base_url, username, UNCATEGORIZED_FOLDER, release_id, instance_id, field_id
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .json(&serde_json::json!({ "value": value }))
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogClient for DiscogsClient {
    async fn search(
        &self,
        params: &SearchParams,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<CandidateRelease>, CatalogError> {
        self.wait_for_rate_limit().await;

        let url = format!("{}/database/search", self.base_url);
        let per_page = per_page.min(100); // Discogs max is 100

        debug!(
            "Discogs search: params={:?}, per_page={}, page={}",
            params, per_page, page
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .query(params)
            .query(&[("per_page", per_page.to_string()), ("page", page.to_string())])
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let search_result: DiscogsSearchResponse = response.json().await.map_err(|e| {
            CatalogError::Parse(format!("Failed to parse search response: {}", e))
        })?;

        let candidates: Vec<CandidateRelease> = search_result
            .results
            .into_iter()
            .map(|r| r.into())
            .collect();

        debug!("Discogs search returned {} results", candidates.len());
        Ok(candidates)
    }
}

// ============================================================================
// Discogs API Response Types (private)
// ============================================================================

#[derive(Debug, Deserialize)]
struct DiscogsSearchResponse {
    #[serde(default)]
    results: Vec<DiscogsSearchResult>,
}

#[derive(Debug, Deserialize)]
struct DiscogsSearchResult {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    title: String,
    /// Discogs reports the year as a string in search results.
    #[serde(default)]
    year: Option<String>,
    #[serde(default)]
    catno: Option<String>,
    #[serde(default)]
    country: Option<String>,
    /// Coarse format tags ("Vinyl", "LP", "Reissue").
    #[serde(default)]
    format: Vec<String>,
    /// Detailed format entries, present on some result types.
    #[serde(default)]
    formats: Vec<DiscogsFormat>,
    #[serde(default)]
    resource_url: Option<String>,
    #[serde(default)]
    thumb: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscogsFormat {
    #[serde(default)]
    name: String,
    #[serde(default)]
    qty: Option<String>,
    #[serde(default)]
    descriptions: Vec<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddedInstance {
    instance_id: u64,
}

#[derive(Debug, Deserialize)]
struct CollectionInstances {
    #[serde(default)]
    releases: Vec<CollectionInstance>,
}

#[derive(Debug, Deserialize)]
struct CollectionInstance {
    instance_id: u64,
}

impl From<DiscogsSearchResult> for CandidateRelease {
    fn from(result: DiscogsSearchResult) -> Self {
        let formats = if !result.formats.is_empty() {
            result
                .formats
                .into_iter()
                .map(|f| FormatEntry {
                    name: f.name,
                    qty: f.qty,
                    descriptions: f.descriptions,
                    text: f.text,
                })
                .collect()
        } else if !result.format.is_empty() {
            // Fold the coarse tag list into a single entry: first tag as the
            // format name, the rest as descriptions.
            let mut tags = result.format.into_iter();
            let name = tags.next().unwrap_or_default();
            vec![FormatEntry {
                name,
                qty: None,
                descriptions: tags.collect(),
                text: None,
            }]
        } else {
            Vec::new()
        };

        CandidateRelease {
            id: result.id,
            title: result.title,
            year: result.year.and_then(|y| y.parse().ok()),
            catno: result.catno,
            country: result.country,
            formats,
            resource_url: result.resource_url,
            thumb: result.thumb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_result_conversion() {
        let json = r#"{
            "id": 249504,
            "title": "Pink Floyd - The Dark Side Of The Moon",
            "year": "1973",
            "catno": "SHVL 804",
            "country": "UK",
            "formats": [
                {"name": "Vinyl", "qty": "1", "descriptions": ["LP", "Album"], "text": "Solid Blue Triangle"}
            ],
            "resource_url": "https://api.discogs.com/releases/249504",
            "thumb": "https://i.discogs.com/thumb.jpg"
        }"#;

        let result: DiscogsSearchResult = serde_json::from_str(json).unwrap();
        let candidate: CandidateRelease = result.into();

        assert_eq!(candidate.id, Some(249504));
        assert_eq!(candidate.year, Some(1973));
        assert_eq!(candidate.catno.as_deref(), Some("SHVL 804"));
        assert_eq!(candidate.formats.len(), 1);
        assert_eq!(
            candidate.formats[0].text.as_deref(),
            Some("Solid Blue Triangle")
        );
    }

    #[test]
    fn test_search_result_coarse_format_tags() {
        let json = r#"{
            "title": "Some Band - Some Album",
            "year": "not a year",
            "format": ["Vinyl", "LP", "Reissue"]
        }"#;

        let result: DiscogsSearchResult = serde_json::from_str(json).unwrap();
        let candidate: CandidateRelease = result.into();

        assert_eq!(candidate.year, None);
        assert_eq!(candidate.formats.len(), 1);
        assert_eq!(candidate.formats[0].name, "Vinyl");
        assert_eq!(candidate.formats[0].descriptions, vec!["LP", "Reissue"]);
    }

    #[test]
    fn test_new_requires_token() {
        let result = DiscogsClient::new(DiscogsConfig::default());
        assert!(matches!(result, Err(CatalogError::NotConfigured(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_spacing() {
        let client = DiscogsClient::new(DiscogsConfig {
            token: "test-token".to_string(),
            requests_per_minute: 60,
            ..Default::default()
        })
        .unwrap();

        let start = Instant::now();
        client.wait_for_rate_limit().await;
        client.wait_for_rate_limit().await;
        client.wait_for_rate_limit().await;

        // Two waits of at least one second each under paused time.
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Minimal one-request-per-connection HTTP stub covering the collection
    /// endpoints. Every response carries `connection: close` so the client
    /// opens a fresh connection per request.
    async fn spawn_collection_stub(already_in_collection: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                tokio::spawn(async move {
                    let (method, path) = match read_request(&mut socket).await {
                        Some(request) => request,
                        None => return,
                    };
                    let (status, body) = respond(already_in_collection, &method, &path);
                    let response = format!(
                        "HTTP/1.1 {status} Stub\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{}", addr)
    }

    /// Read one request (headers plus content-length body), returning method
    /// and path.
    async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<(String, String)> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];

        let header_end = loop {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);

        while buf.len() < header_end + content_length {
            let n = socket.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let mut request_line = head.lines().next()?.split_whitespace();
        Some((
            request_line.next()?.to_string(),
            request_line.next()?.to_string(),
        ))
    }

    fn respond(already_in_collection: bool, method: &str, path: &str) -> (u16, String) {
        match (method, path) {
            ("GET", "/oauth/identity") => (200, r#"{"id": 1, "username": "digger"}"#.to_string()),
            ("POST", "/users/digger/collection/folders/1/releases/101") => {
                if already_in_collection {
                    (
                        422,
                        r#"{"message": "Release already in collection."}"#.to_string(),
                    )
                } else {
                    (201, r#"{"instance_id": 777}"#.to_string())
                }
            }
            ("GET", "/users/digger/collection/releases/101") => {
                (200, r#"{"releases": [{"instance_id": 555}]}"#.to_string())
            }
            ("POST", p) if p.ends_with("/fields/3") => (500, r#"{"message": "boom"}"#.to_string()),
            ("POST", p) if p.contains("/fields/") => (200, "{}".to_string()),
            _ => (404, "{}".to_string()),
        }
    }

    fn stub_client(base_url: String) -> DiscogsClient {
        DiscogsClient::new(DiscogsConfig {
            token: "test-token".to_string(),
            // Keep the inter-request wait negligible.
            requests_per_minute: 60_000,
            base_url: Some(base_url),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_add_to_collection_fresh_release() {
        let base_url = spawn_collection_stub(false).await;
        let client = stub_client(base_url);

        let entry = CollectionEntry {
            condition: Some("Near Mint (NM)".to_string()),
            ..Default::default()
        };
        let instance_id = client.add_to_collection(101, &entry).await.unwrap();
        assert_eq!(instance_id, 777);
    }

    #[tokio::test]
    async fn test_add_to_collection_reuses_existing_instance() {
        let base_url = spawn_collection_stub(true).await;
        let client = stub_client(base_url);

        // The 422 add resolves to the existing instance; the notes field
        // endpoint fails with a 500, which is logged and ignored.
        let entry = CollectionEntry {
            condition: Some("Near Mint (NM)".to_string()),
            sleeve_condition: Some("Very Good Plus (VG+)".to_string()),
            notes: Some("sealed".to_string()),
        };
        let instance_id = client.add_to_collection(101, &entry).await.unwrap();
        assert_eq!(instance_id, 555);
    }
}
