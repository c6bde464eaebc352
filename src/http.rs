//! HTTP tile downloader with rate limiting.
//!
//! Fills a [`DiskTileCache`] before a run so the pipeline itself only ever
//! reads from disk:
//! - Tiles already in the cache are skipped
//! - Dispatch rate limiting (spaces out request starts)
//! - Parallel downloads with bounded concurrency
//! - Automatic retry with exponential backoff on 429 and transport errors

use log::{debug, info, warn};
use reqwest::Client;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::tiles::{DiskTileCache, TileFetchError};
use crate::TileIndex;

/// OSM tiles served by Wikimedia.
pub const DEFAULT_TILE_URL: &str = "https://maps.wikimedia.org/osm-intl/{z}/{x}/{y}.png";

// Tile servers ask for modest request rates: at most 10 request starts per second
const DISPATCH_INTERVAL_MS: u64 = 100;
const MAX_CONCURRENCY: usize = 4;
const MAX_RETRIES: u32 = 3;

const USER_AGENT: &str = concat!("track-heatmap/", env!("CARGO_PKG_VERSION"));

/// Outcome of downloading one tile.
#[derive(Debug, Clone)]
pub struct TileDownloadResult {
    pub tile: TileIndex,
    pub path: PathBuf,
    /// The tile was already on disk and no request was made.
    pub cached: bool,
    pub success: bool,
    pub error: Option<String>,
}

impl TileDownloadResult {
    fn ok(tile: TileIndex, path: PathBuf, cached: bool) -> Self {
        Self { tile, path, cached, success: true, error: None }
    }

    fn failed(tile: TileIndex, path: PathBuf, error: String) -> Self {
        Self { tile, path, cached: false, success: false, error: Some(error) }
    }
}

/// Progress callback type, called with (done, total)
pub type ProgressCallback = Arc<dyn Fn(u32, u32) + Send + Sync>;

/// Dispatch rate limiter - spaces out when requests START.
/// Every caller gets its own slot, DISPATCH_INTERVAL_MS after the previous one.
struct DispatchRateLimiter {
    next_dispatch: Mutex<Instant>,
    dispatched_count: AtomicU32,
    consecutive_429s: AtomicU32,
}

impl DispatchRateLimiter {
    fn new() -> Self {
        Self {
            next_dispatch: Mutex::new(Instant::now()),
            dispatched_count: AtomicU32::new(0),
            consecutive_429s: AtomicU32::new(0),
        }
    }

    /// Wait for our dispatch slot and return its sequence number.
    async fn wait_for_dispatch_slot(&self) -> u32 {
        let (wait_duration, dispatch_num) = {
            let mut next = self.next_dispatch.lock().await;
            let now = Instant::now();

            let dispatch_at = if *next > now { *next } else { now };

            // Reserve the next slot for the next caller
            *next = dispatch_at + Duration::from_millis(DISPATCH_INTERVAL_MS);

            let num = self.dispatched_count.fetch_add(1, Ordering::Relaxed) + 1;
            (dispatch_at.saturating_duration_since(now), num)
        };

        // Wait outside the lock
        if wait_duration > Duration::from_millis(5) {
            debug!("[Dispatch #{}] Waiting {:?} for slot", dispatch_num, wait_duration);
            tokio::time::sleep(wait_duration).await;
        }

        dispatch_num
    }

    fn record_success(&self) {
        self.consecutive_429s.store(0, Ordering::Relaxed);
    }

    fn record_429(&self) -> Duration {
        let count = self.consecutive_429s.fetch_add(1, Ordering::Relaxed) + 1;
        // Exponential backoff: 1s, 2s, 4s, 8s max
        let backoff = Duration::from_millis(500 * (1 << count.min(4)));
        warn!("[DispatchRateLimiter] Got 429! Consecutive: {}, backing off {:?}", count, backoff);
        backoff
    }
}

/// Downloads map tiles into a [`DiskTileCache`].
pub struct TileDownloader {
    client: Client,
    url_template: String,
    cache: DiskTileCache,
    rate_limiter: Arc<DispatchRateLimiter>,
}

impl TileDownloader {
    /// Create a downloader for the default tile server.
    pub fn new(cache: DiskTileCache) -> Result<Self, TileFetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(MAX_CONCURRENCY * 2)
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TileFetchError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url_template: DEFAULT_TILE_URL.to_string(),
            cache,
            rate_limiter: Arc::new(DispatchRateLimiter::new()),
        })
    }

    /// Use another tile server. `{z}`, `{x}` and `{y}` are substituted.
    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = template.into();
        self
    }

    pub fn cache(&self) -> &DiskTileCache {
        &self.cache
    }

    pub fn tile_url(&self, tile: TileIndex) -> String {
        self.url_template
            .replace("{z}", &tile.zoom.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }

    /// Download every tile not yet in the cache.
    ///
    /// Never fails as a whole: each tile gets its own [`TileDownloadResult`],
    /// in completion order.
    pub async fn download_tiles(
        &self,
        tiles: Vec<TileIndex>,
        on_progress: Option<ProgressCallback>,
    ) -> Vec<TileDownloadResult> {
        use futures::stream::{self, StreamExt};

        let total = tiles.len() as u32;
        let completed = Arc::new(AtomicU32::new(0));

        if let Err(e) = tokio::fs::create_dir_all(self.cache.dir()).await {
            warn!("[TileDownloader] Cannot create {}: {}", self.cache.dir().display(), e);
        }

        let (cached, missing): (Vec<TileIndex>, Vec<TileIndex>) =
            tiles.into_iter().partition(|&t| self.cache.contains(t));

        info!(
            "[TileDownloader] {} tiles: {} cached, {} to download from {} (dispatch interval: {}ms, max concurrent: {})",
            total,
            cached.len(),
            missing.len(),
            self.url_template,
            DISPATCH_INTERVAL_MS,
            MAX_CONCURRENCY
        );

        let mut results: Vec<TileDownloadResult> = Vec::with_capacity(total as usize);
        for tile in cached {
            results.push(TileDownloadResult::ok(tile, self.cache.tile_path(tile), true));
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(ref cb) = on_progress {
                cb(done, total);
            }
        }

        let start = Instant::now();

        let downloaded: Vec<TileDownloadResult> = stream::iter(missing)
            .map(|tile| {
                let completed = Arc::clone(&completed);
                let callback = on_progress.clone();

                async move {
                    let dispatch_num = self.rate_limiter.wait_for_dispatch_slot().await;
                    let dispatch_time = start.elapsed();

                    let result = self.fetch_single_tile(tile).await;

                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    info!(
                        "[Progress] {}/{} | tile {} | dispatched@{:.2}s (#{}) | done@{:.2}s | {}",
                        done,
                        total,
                        tile,
                        dispatch_time.as_secs_f64(),
                        dispatch_num,
                        start.elapsed().as_secs_f64(),
                        if result.success { "ok" } else { "failed" }
                    );

                    if let Some(ref cb) = callback {
                        cb(done, total);
                    }

                    result
                }
            })
            .buffer_unordered(MAX_CONCURRENCY)
            .collect()
            .await;

        let error_count = downloaded.iter().filter(|r| !r.success).count();
        info!(
            "[TileDownloader] DONE: {} downloaded ({} errors) in {:.2}s",
            downloaded.len() - error_count,
            error_count,
            start.elapsed().as_secs_f64()
        );

        results.extend(downloaded);
        results
    }

    async fn fetch_single_tile(&self, tile: TileIndex) -> TileDownloadResult {
        let url = self.tile_url(tile);
        let path = self.cache.tile_path(tile);
        let mut retries = 0;

        loop {
            let response = self.client.get(&url).send().await;

            let error = match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        retries += 1;
                        if retries > MAX_RETRIES {
                            return TileDownloadResult::failed(
                                tile,
                                path,
                                "Max retries exceeded (429)".to_string(),
                            );
                        }
                        let wait = self.rate_limiter.record_429();
                        warn!("[Fetch {}] 429 Too Many Requests, retry {} with {:?} backoff", tile, retries, wait);
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    self.rate_limiter.record_success();

                    if !status.is_success() {
                        return TileDownloadResult::failed(tile, path, format!("HTTP {} for {}", status, url));
                    }

                    match resp.bytes().await {
                        Ok(bytes) => {
                            return match tokio::fs::write(&path, &bytes).await {
                                Ok(()) => {
                                    debug!("[Fetch {}] {:.1}KB -> {}", tile, bytes.len() as f64 / 1024.0, path.display());
                                    TileDownloadResult::ok(tile, path, false)
                                }
                                Err(e) => TileDownloadResult::failed(
                                    tile,
                                    path,
                                    format!("Cannot write tile: {}", e),
                                ),
                            };
                        }
                        Err(e) => format!("Body download error: {}", e),
                    }
                }
                Err(e) => format!("Request error: {}", e),
            };

            retries += 1;
            if retries > MAX_RETRIES {
                return TileDownloadResult::failed(tile, path, error);
            }
            let wait = Duration::from_millis(200 * (1 << retries));
            warn!("[Fetch {}] {}, retry {} after {:?}", tile, error, retries, wait);
            tokio::time::sleep(wait).await;
        }
    }
}

/// Synchronous wrapper - runs the downloader on its own tokio runtime.
pub fn download_tiles_sync(
    cache: DiskTileCache,
    url_template: &str,
    tiles: Vec<TileIndex>,
    on_progress: Option<ProgressCallback>,
) -> Result<Vec<TileDownloadResult>, TileFetchError> {
    use tokio::runtime::Builder;

    let rt = Builder::new_multi_thread()
        .worker_threads(MAX_CONCURRENCY)
        .enable_all()
        .build()?;

    let downloader = TileDownloader::new(cache)?.with_url_template(url_template);
    Ok(rt.block_on(downloader.download_tiles(tiles, on_progress)))
}
