//! Detail and tile fetching against the forecast backend.

use bytes::Bytes;
use foundation::series::ForecastSeries;
use futures_util::future::join_all;
use reqwest::StatusCode;
use streaming::error::FetchError;
use streaming::protocol::parse_detail;
use tracing::{debug, warn};

/// `GET /detail`. A 204 or blank body is a confirmed "no data".
pub async fn fetch_detail(
    client: &reqwest::Client,
    url: &str,
) -> Result<Option<ForecastSeries>, FetchError> {
    let Some(body) = fetch_body(client, url).await? else {
        return Ok(None);
    };
    Ok(parse_detail(&body)?)
}

/// Settlement of one source's tile batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileBatch {
    pub loaded: usize,
    pub empty: usize,
    pub failed: usize,
}

/// Fetches every tile; a failing tile is logged and counted, never fatal.
pub async fn fetch_tiles(client: &reqwest::Client, urls: Vec<String>) -> TileBatch {
    let results = join_all(urls.iter().map(|url| fetch_body(client, url))).await;
    let mut batch = TileBatch::default();
    for (url, result) in urls.iter().zip(results) {
        match result {
            Ok(Some(body)) => {
                debug!(%url, bytes = body.len(), "tile loaded");
                batch.loaded += 1;
            }
            Ok(None) => batch.empty += 1,
            Err(err) => {
                warn!(%url, "tile fetch failed: {err}");
                batch.failed += 1;
            }
        }
    }
    batch
}

async fn fetch_body(client: &reqwest::Client, url: &str) -> Result<Option<Bytes>, FetchError> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;
    let status = resp.status();
    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    let body = resp
        .bytes()
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(Some(body))
}
