use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::Client;

/// Enough headroom for Telegram file downloads; the Gemini client builds its
/// own client with a longer generation timeout.
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(HTTP_REQUEST_TIMEOUT)
        .build()
        .expect("Failed to build HTTP client")
});

pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}
