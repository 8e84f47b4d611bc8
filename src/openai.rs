//! OpenAI client configuration with sensible defaults.

use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Baseline timeout for API requests.
const BASE_TIMEOUT_SECS: u64 = 60;

/// Additional timeout granted per 1000 characters of payload.
const SECS_PER_KILOCHAR: u64 = 5;

/// Longest timeout we are willing to wait, regardless of payload.
const MAX_TIMEOUT_SECS: u64 = 600;

/// Create an OpenAI client with the baseline timeout.
pub fn create_client() -> Client<OpenAIConfig> {
    create_client_with_timeout(Duration::from_secs(BASE_TIMEOUT_SECS))
}

/// Create an OpenAI client with a custom timeout.
pub fn create_client_with_timeout(timeout: Duration) -> Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to create HTTP client");

    Client::with_config(OpenAIConfig::default()).with_http_client(http_client)
}

/// Timeout scaled to the payload size: larger chunks get longer to finish.
pub fn scaled_timeout(payload_chars: usize) -> Duration {
    let scaled = BASE_TIMEOUT_SECS + (payload_chars as u64 / 1000) * SECS_PER_KILOCHAR;
    Duration::from_secs(scaled.min(MAX_TIMEOUT_SECS))
}

/// Check if the OpenAI API key is configured.
pub fn is_api_key_configured() -> bool {
    std::env::var("OPENAI_API_KEY").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_timeout_grows_with_payload() {
        assert_eq!(scaled_timeout(0), Duration::from_secs(60));
        assert_eq!(scaled_timeout(8000), Duration::from_secs(100));
        // Capped for very large payloads.
        assert_eq!(scaled_timeout(1_000_000), Duration::from_secs(600));
    }
}
