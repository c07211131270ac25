use std::sync::Arc;

use reqwest::Client;
use reqwest_middleware::ClientWithMiddleware;

use crate::{
    config::{HttpRetryConfig, JitterSetting},
    http_client::create_retryable_http_client,
};

/// Creates an HTTP client that never retries, so failure paths stay fast.
pub fn create_test_http_client() -> Arc<ClientWithMiddleware> {
    let no_retries = HttpRetryConfig {
        max_retries: 0,
        jitter: JitterSetting::None,
        ..Default::default()
    };
    Arc::new(create_retryable_http_client(&no_retries, Client::new()))
}
