//! HTTP client for the PopPool store map endpoint.
//!
//! Loads the stores inside a viewport (optionally filtered by category) so
//! they can be fed to clustering and reconciliation. Provides:
//! - Connection pooling via a shared `reqwest::Client`
//! - Dispatch throttling (spaces out request starts)
//! - Automatic retry with exponential backoff on 429, 5xx and transport errors

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::FetchError;
use crate::viewport::MapBounds;
use crate::Store;

/// Store fetcher settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// API root, e.g. `https://api.poppool.site`
    pub base_url: String,
    /// Bearer token, if the user is signed in
    pub access_token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Retries after the first attempt. Default: 3
    pub max_retries: u32,
    /// Minimum spacing between request starts. Default: 300ms
    pub min_interval: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.poppool.site".to_string(),
            access_token: None,
            timeout: Duration::from_secs(15),
            max_retries: 3,
            min_interval: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapStoresResponse {
    #[serde(default)]
    pop_up_store_list: Vec<ApiStore>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiStore {
    id: i64,
    name: String,
    #[serde(default)]
    category_name: String,
    #[serde(default)]
    address: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    start_date: String,
    #[serde(default)]
    end_date: String,
    main_image_url: Option<String>,
}

impl From<ApiStore> for Store {
    fn from(api: ApiStore) -> Self {
        Store {
            id: api.id,
            name: api.name,
            category: api.category_name,
            address: api.address,
            latitude: api.latitude,
            longitude: api.longitude,
            start_date: api.start_date,
            end_date: api.end_date,
            main_image_url: api.main_image_url,
        }
    }
}

/// Decode a map store response body.
pub fn parse_store_list(body: &[u8]) -> Result<Vec<Store>, FetchError> {
    let response: MapStoresResponse = serde_json::from_slice(body).map_err(FetchError::Decode)?;
    Ok(response.pop_up_store_list.into_iter().map(Store::from).collect())
}

/// Spaces out when requests START, so a burst of viewport changes can't
/// hammer the backend.
struct DispatchThrottle {
    next_dispatch: Mutex<Instant>,
    interval: Duration,
}

impl DispatchThrottle {
    fn new(interval: Duration) -> Self {
        Self {
            next_dispatch: Mutex::new(Instant::now()),
            interval,
        }
    }

    /// Wait for our dispatch slot. Each caller gets a unique slot spaced
    /// `interval` apart.
    async fn wait_for_slot(&self) {
        let wait = {
            let mut next = self.next_dispatch.lock().await;
            let now = Instant::now();
            let dispatch_at = if *next > now { *next } else { now };
            *next = dispatch_at + self.interval;
            dispatch_at - now
        };

        // Wait outside the lock
        if wait > Duration::from_millis(5) {
            debug!("[StoreFetcher] Waiting {:?} for dispatch slot", wait);
            tokio::time::sleep(wait).await;
        }
    }
}

/// Fetches viewport store lists from the backend.
pub struct StoreFetcher {
    client: Client,
    config: FetchConfig,
    throttle: DispatchThrottle,
}

impl StoreFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .timeout(config.timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            throttle: DispatchThrottle::new(config.min_interval),
            config,
        })
    }

    fn viewport_url(&self, bounds: &MapBounds, categories: &[i64]) -> String {
        let mut url = format!(
            "{}/popup-stores/map?northEastLat={}&northEastLon={}&southWestLat={}&southWestLon={}",
            self.config.base_url.trim_end_matches('/'),
            bounds.north_east.latitude,
            bounds.north_east.longitude,
            bounds.south_west.latitude,
            bounds.south_west.longitude,
        );
        if !categories.is_empty() {
            let joined: Vec<String> = categories.iter().map(|c| c.to_string()).collect();
            url.push_str("&categories=");
            url.push_str(&joined.join(","));
        }
        url
    }

    /// Fetch the stores inside `bounds`. An empty `categories` slice means
    /// no category filter.
    pub async fn fetch_viewport(
        &self,
        bounds: &MapBounds,
        categories: &[i64],
    ) -> Result<Vec<Store>, FetchError> {
        let url = self.viewport_url(bounds, categories);
        let start = Instant::now();
        let mut retries = 0;

        loop {
            self.throttle.wait_for_slot().await;

            let mut request = self.client.get(&url);
            if let Some(token) = &self.config.access_token {
                request = request.bearer_auth(token);
            }

            let (backoff, last) = match request.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if !status.is_success() {
                        match retry_backoff(status, retries) {
                            Some(backoff) => (backoff, status.to_string()),
                            None => return Err(FetchError::Status(status)),
                        }
                    } else {
                        let body = resp.bytes().await.map_err(FetchError::Request)?;
                        let stores = parse_store_list(&body)?;
                        info!(
                            "[StoreFetcher] {} stores in {:?} ({:.1}KB)",
                            stores.len(),
                            start.elapsed(),
                            body.len() as f64 / 1024.0
                        );
                        return Ok(stores);
                    }
                }
                Err(e) => {
                    if retries >= self.config.max_retries {
                        return Err(FetchError::Request(e));
                    }
                    warn!("[StoreFetcher] Error: {}", e);
                    (Duration::from_millis(200 * (1 << retries.min(4))), e.to_string())
                }
            };

            retries += 1;
            if retries > self.config.max_retries {
                return Err(FetchError::RetriesExhausted { attempts: retries, last });
            }
            warn!("[StoreFetcher] Retry {} after {:?}", retries, backoff);
            tokio::time::sleep(backoff).await;
        }
    }
}

/// Backoff before retrying a failed status, or `None` if it is final.
/// Rate limiting backs off longer than server errors.
fn retry_backoff(status: reqwest::StatusCode, retries: u32) -> Option<Duration> {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        Some(Duration::from_millis(500 * (1 << retries.min(3))))
    } else if status.is_server_error() {
        Some(Duration::from_millis(200 * (1 << retries.min(4))))
    } else {
        None
    }
}

/// Synchronous wrapper for FFI - runs the async fetch on a tokio runtime
#[cfg(feature = "ffi")]
pub fn fetch_viewport_sync(
    config: FetchConfig,
    bounds: MapBounds,
    categories: Vec<i64>,
) -> Result<Vec<Store>, FetchError> {
    use tokio::runtime::Builder;

    let rt = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(FetchError::Runtime)?;
    let fetcher = StoreFetcher::new(config)?;
    rt.block_on(fetcher.fetch_viewport(&bounds, &categories))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GpsPoint;

    #[tokio::test]
    async fn test_dispatch_throttle_spaces_requests() {
        let throttle = DispatchThrottle::new(Duration::from_millis(50));

        let start = Instant::now();
        throttle.wait_for_slot().await;
        assert!(start.elapsed() < Duration::from_millis(10));

        let start2 = Instant::now();
        throttle.wait_for_slot().await;
        let elapsed = start2.elapsed();
        assert!(elapsed >= Duration::from_millis(40), "Expected ~50ms wait, got {:?}", elapsed);
    }

    #[test]
    fn test_parse_store_list() {
        let body = r#"{
            "popUpStoreList": [
                {
                    "id": 12,
                    "categoryName": "패션",
                    "name": "성수 팝업",
                    "address": "서울특별시 성동구 연무장길 1",
                    "startDate": "2026-10-01",
                    "endDate": "2026-10-31",
                    "latitude": 37.5445,
                    "longitude": 127.056,
                    "mainImageUrl": null
                },
                { "id": 13, "name": "minimal", "latitude": 35.1, "longitude": 129.0 }
            ]
        }"#
        .as_bytes();
        let stores = parse_store_list(body).unwrap();
        assert_eq!(stores.len(), 2);
        assert_eq!(stores[0].id, 12);
        assert_eq!(stores[0].category, "패션");
        assert_eq!(stores[0].end_date, "2026-10-31");
        assert_eq!(stores[1].address, "");
        assert!(matches!(parse_store_list(b"not json"), Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_retry_backoff_by_status() {
        use reqwest::StatusCode;

        assert_eq!(
            retry_backoff(StatusCode::TOO_MANY_REQUESTS, 0),
            Some(Duration::from_millis(500))
        );
        assert_eq!(
            retry_backoff(StatusCode::TOO_MANY_REQUESTS, 10),
            Some(Duration::from_millis(4000))
        );
        assert_eq!(retry_backoff(StatusCode::BAD_GATEWAY, 1), Some(Duration::from_millis(400)));
        assert_eq!(
            retry_backoff(StatusCode::SERVICE_UNAVAILABLE, 0),
            Some(Duration::from_millis(200))
        );
        assert_eq!(retry_backoff(StatusCode::UNAUTHORIZED, 0), None);
        assert_eq!(retry_backoff(StatusCode::NOT_FOUND, 0), None);
    }

    #[test]
    fn test_viewport_url() {
        let fetcher = StoreFetcher::new(FetchConfig {
            base_url: "https://example.test/".to_string(),
            ..FetchConfig::default()
        })
        .unwrap();
        let bounds = MapBounds::new(GpsPoint::new(37.6, 127.1), GpsPoint::new(37.5, 126.9));
        assert_eq!(
            fetcher.viewport_url(&bounds, &[1, 4]),
            "https://example.test/popup-stores/map?northEastLat=37.6&northEastLon=127.1\
             &southWestLat=37.5&southWestLon=126.9&categories=1,4"
        );
        assert!(!fetcher.viewport_url(&bounds, &[]).contains("categories"));
    }
}
