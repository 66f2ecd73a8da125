use tracing::warn;

use crate::utils::http::get_http_client;

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    infer::get(data).map(|kind| kind.mime_type().to_string())
}

const MEDIA_DOWNLOAD_ERROR_BODY_LIMIT: usize = 800;

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

/// Fetches a file over HTTP in a single attempt. Returns `None` on any
/// failure; the caller decides how to surface it.
pub async fn download_media(url: &str) -> Option<Vec<u8>> {
    let client = get_http_client();
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(err) => {
            warn!(
                "Failed to fetch media {url}: {err} (timeout={}, connect={})",
                err.is_timeout(),
                err.is_connect()
            );
            return None;
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(
            "Media fetch for {url} returned status {status}: {}",
            truncate_for_log(&body, MEDIA_DOWNLOAD_ERROR_BODY_LIMIT)
        );
        return None;
    }

    match response.bytes().await {
        Ok(bytes) => Some(bytes.to_vec()),
        Err(err) => {
            warn!("Failed to read media body from {url}: {err}");
            None
        }
    }
}
