//! HTTP geocoding client.
//!
//! `GET {base_url}/address-search?q=<address>` answers with a JSON array of
//! GeoJSON-ish features. Only the first feature's coordinates are used.

use std::thread;
use std::time::{Duration, Instant};

use serde::Deserialize;
use url::Url;

use locus_resolver::{GeoPoint, GeocodeError, Geocoder};

const USER_AGENT: &str = concat!("locus/", env!("CARGO_PKG_VERSION"));

/// Upper bound for a single backoff sleep.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

fn next_backoff(current: Duration) -> Duration {
    current.saturating_mul(2).min(MAX_BACKOFF)
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Minimum spacing between two requests, retries included.
    pub request_interval: Duration,
    /// Retries for 429, 5xx and network errors. Zero disables retry.
    pub max_retries: u32,
    /// First backoff delay; doubles on every retry up to [`MAX_BACKOFF`].
    pub initial_backoff: Duration,
    /// Sent as the `key` query parameter when set.
    pub api_key: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            request_interval: Duration::from_millis(500),
            max_retries: 2,
            initial_backoff: Duration::from_secs(1),
            api_key: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Vec<f64>,
}

pub struct HttpGeocoder {
    http: reqwest::blocking::Client,
    endpoint: Url,
    options: ClientOptions,
    last_request: Option<Instant>,
    requests: u64,
}

impl HttpGeocoder {
    pub fn new(base_url: &str, options: ClientOptions) -> Result<Self, GeocodeError> {
        let endpoint = Url::parse(&format!("{}/address-search", base_url.trim_end_matches('/')))
            .map_err(|e| GeocodeError::Unavailable(format!("invalid base URL '{base_url}': {e}")))?;
        let http = reqwest::blocking::Client::builder()
            .timeout(options.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GeocodeError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, endpoint, options, last_request: None, requests: 0 })
    }

    /// HTTP requests sent so far, retries included.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    fn url_for(&self, address: &str) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut q = url.query_pairs_mut();
            q.append_pair("q", address);
            if let Some(key) = &self.options.api_key {
                q.append_pair("key", key);
            }
        }
        url
    }

    /// Sleep until `last_request + request_interval`.
    fn throttle(&mut self) {
        if let Some(last) = self.last_request {
            let ready_at = last + self.options.request_interval;
            let now = Instant::now();
            if ready_at > now {
                thread::sleep(ready_at - now);
            }
        }
        self.last_request = Some(Instant::now());
        self.requests += 1;
    }

    fn fetch(&mut self, address: &str) -> Result<String, GeocodeError> {
        let url = self.url_for(address);
        let mut backoff = self.options.initial_backoff;
        let max_retries = self.options.max_retries;

        for attempt in 0..=max_retries {
            self.throttle();
            match self.http.get(url.clone()).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if status == 429 || status >= 500 {
                        if attempt == max_retries {
                            return Err(GeocodeError::Unavailable(format!(
                                "HTTP {status} after {} attempts",
                                max_retries.saturating_add(1)
                            )));
                        }
                        let wait = if status == 429 {
                            resp.headers()
                                .get("retry-after")
                                .and_then(|v| v.to_str().ok())
                                .and_then(|v| v.trim().parse::<u64>().ok())
                                .map(Duration::from_secs)
                                .unwrap_or(backoff)
                        } else {
                            backoff
                        };
                        log::warn!(
                            "geocoder retry {}/{} in {:?} (HTTP {status})",
                            attempt + 1,
                            max_retries,
                            wait
                        );
                        thread::sleep(wait);
                        backoff = next_backoff(backoff);
                        continue;
                    }
                    if !resp.status().is_success() {
                        return Err(GeocodeError::Unavailable(format!("HTTP {status}")));
                    }
                    return resp
                        .text()
                        .map_err(|e| GeocodeError::Unavailable(format!("failed to read body: {e}")));
                }
                Err(e) => {
                    if attempt == max_retries {
                        return Err(GeocodeError::Unavailable(format!(
                            "{e} after {} attempts",
                            max_retries.saturating_add(1)
                        )));
                    }
                    log::warn!("geocoder retry {}/{} in {:?} ({e})", attempt + 1, max_retries, backoff);
                    thread::sleep(backoff);
                    backoff = next_backoff(backoff);
                }
            }
        }

        Err(GeocodeError::Unavailable("retry loop exhausted".into()))
    }
}

/// First feature's point. Coordinates arrive as `[lng, lat]`.
fn parse_features(body: &str) -> Result<Option<GeoPoint>, GeocodeError> {
    let features: Vec<Feature> = serde_json::from_str(body.trim_start_matches('\u{feff}'))
        .map_err(|e| {
            let head: String = body.chars().take(200).collect();
            GeocodeError::Malformed(format!("{e} (body: {head})"))
        })?;
    Ok(features
        .first()
        .and_then(|f| f.geometry.as_ref())
        .and_then(|g| GeoPoint::from_geojson(&g.coordinates)))
}

impl Geocoder for HttpGeocoder {
    fn geocode(&mut self, address: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        let body = self.fetch(address)?;
        let point = parse_features(&body)?;
        if point.is_none() {
            log::debug!("geocoder: no result for {address}");
        }
        Ok(point)
    }
}
