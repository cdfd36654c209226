// # DigitalOcean Inventory Source
//
// This crate lists droplets from the DigitalOcean API v2 for droplet-dns.
//
// ## Behavior
//
// - One HTTP request per `list_instances` call (one page)
// - Full error propagation to the inventory (it owns deadlines and publication)
// - HTTP timeout configured per request (30 seconds)
// - Specific error handling for HTTP status codes (401, 403, 429, 5xx)
// - No retry, no caching, no background tasks
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - API token MUST be provided via environment variables only
// - Factory MUST fail fast if token is empty
//
// ## API Reference
//
// - DigitalOcean API v2: https://docs.digitalocean.com/reference/api/
// - List Droplets: GET `/droplets?page=N&per_page=M`

use async_trait::async_trait;
use droplet_dns_core::config::ServiceConfig;
use droplet_dns_core::traits::{InstancePage, InventorySource, InventorySourceFactory, PageRequest};
use droplet_dns_core::{Error, Instance, InstanceStatus, Result, SourceRegistry};
use serde::Deserialize;
use std::time::Duration;

/// Provider type name used in configuration and the registry
pub const PROVIDER_NAME: &str = "digitalocean";

/// Default DigitalOcean API base URL
pub const DIGITALOCEAN_API_BASE: &str = "https://api.digitalocean.com/v2";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// DigitalOcean droplet inventory source
///
/// Stateless and single-shot: every call fetches exactly one page.
///
/// # Security
///
/// The Debug implementation does NOT expose the API token.
pub struct DigitalOceanSource {
    /// DigitalOcean personal access token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL without trailing slash
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for DigitalOceanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitalOceanSource")
            .field("api_token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl DigitalOceanSource {
    /// Create a new DigitalOcean source
    ///
    /// # Parameters
    ///
    /// - `api_token`: Token with read access to droplets
    /// - `api_base`: API base URL, normally [`DIGITALOCEAN_API_BASE`]
    ///
    /// # Returns
    ///
    /// - `Err(Error::Config)`: If the token is empty or the HTTP client cannot be built
    pub fn new(api_token: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("DigitalOcean API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// URL of one droplet listing page
    fn droplets_url(&self, request: PageRequest) -> String {
        format!(
            "{}/droplets?page={}&per_page={}",
            self.api_base, request.page, request.per_page
        )
    }
}

#[async_trait]
impl InventorySource for DigitalOceanSource {
    /// List one page of droplets
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /droplets?page=1&per_page=200
    /// Authorization: Bearer <token>
    /// ```
    async fn list_instances(&self, request: PageRequest) -> Result<InstancePage> {
        tracing::debug!(page = request.page, per_page = request.per_page, "Listing droplets");

        let response = self
            .client
            .get(self.droplets_url(request))
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(match status.as_u16() {
                401 | 403 => Error::auth(format!(
                    "Invalid API token or insufficient permissions. Status: {}",
                    status
                )),
                429 => Error::rate_limited(format!(
                    "Rate limit exceeded. Please retry later. Status: {}",
                    status
                )),
                500..=599 => Error::http(format!(
                    "DigitalOcean server error (transient): {} - {}",
                    status, error_text
                )),
                _ => Error::provider(
                    PROVIDER_NAME,
                    format!("Droplet listing failed: {} - {}", status, error_text),
                ),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response body: {}", e)))?;

        let page = parse_droplet_page(&body, request)?;
        tracing::debug!(
            page = request.page,
            droplets = page.instances.len(),
            next_page = ?page.next_page,
            "Listed droplets"
        );
        Ok(page)
    }

    fn source_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

#[derive(Debug, Deserialize)]
struct DropletsResponse {
    #[serde(default)]
    droplets: Vec<Droplet>,
    #[serde(default)]
    links: Option<Links>,
}

#[derive(Debug, Deserialize)]
struct Droplet {
    id: u64,
    name: String,
    status: InstanceStatus,
    #[serde(default)]
    networks: Networks,
}

#[derive(Debug, Default, Deserialize)]
struct Networks {
    #[serde(default)]
    v4: Vec<NetworkV4>,
}

#[derive(Debug, Deserialize)]
struct NetworkV4 {
    ip_address: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct Links {
    #[serde(default)]
    pages: Option<Pages>,
}

#[derive(Debug, Deserialize)]
struct Pages {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    last: Option<String>,
}

impl Droplet {
    fn first_v4(&self, kind: &str) -> Option<String> {
        self.networks
            .v4
            .iter()
            .find(|n| n.kind == kind)
            .map(|n| n.ip_address.clone())
    }

    fn into_instance(self) -> Instance {
        let public_ipv4 = self.first_v4("public");
        let private_ipv4 = self.first_v4("private");

        let mut instance = Instance::new(self.id, self.name, self.status);
        instance.public_ipv4 = public_ipv4;
        instance.private_ipv4 = private_ipv4;
        instance
    }
}

/// Parse one `GET /droplets` response body
///
/// The page is the last one when the response has no `links.pages.last`
/// (and no `links.pages.next`).
pub fn parse_droplet_page(body: &str, request: PageRequest) -> Result<InstancePage> {
    let response: DropletsResponse = serde_json::from_str(body)?;

    let has_more = response
        .links
        .and_then(|links| links.pages)
        .is_some_and(|pages| pages.last.is_some() || pages.next.is_some());

    let instances = response
        .droplets
        .into_iter()
        .map(Droplet::into_instance)
        .collect();

    Ok(InstancePage::new(instances, has_more.then_some(request.page + 1)))
}

/// Factory for creating DigitalOcean sources
pub struct DigitalOceanFactory;

impl InventorySourceFactory for DigitalOceanFactory {
    fn create(&self, config: &ServiceConfig) -> Result<Box<dyn InventorySource>> {
        if config.api_token.is_empty() {
            return Err(Error::config("DigitalOcean API token is required"));
        }

        Ok(Box::new(DigitalOceanSource::new(
            config.api_token.clone(),
            config.api_base_url.clone(),
        )?))
    }
}

/// Register the DigitalOcean source with a registry
///
/// # Example
///
/// ```rust
/// use droplet_dns_core::SourceRegistry;
///
/// let registry = SourceRegistry::new();
/// droplet_dns_provider_digitalocean::register(&registry);
/// assert!(registry.has_source("digitalocean"));
/// ```
pub fn register(registry: &SourceRegistry) {
    registry.register_source(PROVIDER_NAME, Box::new(DigitalOceanFactory));
}
