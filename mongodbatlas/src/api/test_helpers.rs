//! Test helpers for the Atlas API

pub fn create_test_client(url: &str) -> super::Client {
    super::Client::with_config(url, "test-token", false, fast_retry_config()).unwrap()
}

pub fn fast_retry_config() -> super::RetryConfig {
    super::RetryConfig {
        max_retries: 1,
        initial_backoff_ms: 1,
        max_backoff_ms: 2,
        timeout_seconds: 5,
    }
}

#[cfg(test)]
mod tests {
    use super::super::*;

    #[tokio::test]
    async fn test_retry_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff_ms, 100);
        assert_eq!(config.max_backoff_ms, 10000);
        assert_eq!(config.timeout_seconds, 30);
    }

    #[tokio::test]
    async fn test_client_accessors_share_base_url() {
        let client = super::create_test_client("https://cloud.example.com/");
        assert_eq!(client.base_url(), "https://cloud.example.com");

        let cloned = client.clone();
        assert_eq!(cloned.base_url(), client.base_url());
    }
}
