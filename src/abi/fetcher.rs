//! ABI lookup against an Etherscan-compatible `getabi` endpoint.

use std::sync::Arc;

use alloy::{json_abi::JsonAbi, primitives::Address};
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::AbiLookupConfig;

/// Transport-level failures of an ABI lookup.
///
/// A lookup that reaches the service but yields no usable ABI is not an
/// error; it is `Ok(None)`.
#[derive(Debug, Error)]
pub enum AbiFetchError {
    /// The configured base URL is not a URL.
    #[error("Invalid ABI lookup url: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// The request could not be completed.
    #[error("ABI lookup request failed: {0}")]
    Request(#[from] reqwest_middleware::Error),

    /// The response body could not be read.
    #[error("Failed to read ABI lookup response: {0}")]
    Body(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("ABI lookup answered with HTTP status {0}")]
    Status(u16),
}

/// Resolves contract ABIs over HTTP.
pub struct AbiFetcher {
    client: Arc<ClientWithMiddleware>,
    config: AbiLookupConfig,
}

impl AbiFetcher {
    /// Creates a fetcher using `client` and the endpoint in `config`.
    pub fn new(client: Arc<ClientWithMiddleware>, config: AbiLookupConfig) -> Self {
        Self { client, config }
    }

    fn lookup_url(&self, address: &Address) -> Result<Url, AbiFetchError> {
        let mut url = Url::parse(&self.config.base_url)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("module", "contract")
                .append_pair("action", "getabi")
                .append_pair("address", &format!("{address:#x}"))
                .append_pair("format", "raw");
            if let Some(api_key) = &self.config.api_key {
                query.append_pair("apikey", api_key);
            }
        }
        Ok(url)
    }

    /// Looks up the verified ABI of `address`.
    ///
    /// Returns `Ok(None)` when the service reports `NOTOK` or answers with
    /// something that is not an ABI.
    #[tracing::instrument(skip(self), fields(address = %address))]
    pub async fn fetch(&self, address: Address) -> Result<Option<JsonAbi>, AbiFetchError> {
        let url = self.lookup_url(&address)?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "ABI lookup failed.");
            return Err(AbiFetchError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let abi = parse_lookup_body(&body);
        match &abi {
            Some(abi) => tracing::info!(event_count = abi.events.len(), "ABI resolved."),
            None => tracing::info!("No ABI available."),
        }
        Ok(abi)
    }
}

/// Interprets a lookup body: a raw ABI array, or an envelope whose `result`
/// holds the ABI (as an array or as a string).
fn parse_lookup_body(body: &str) -> Option<JsonAbi> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(error) => {
            tracing::debug!(error = %error, "ABI lookup body is not JSON.");
            return None;
        }
    };

    let abi = match value {
        Value::Array(_) => value,
        Value::Object(mut envelope) => {
            if envelope.get("message").and_then(Value::as_str) == Some("NOTOK") {
                tracing::debug!(result = ?envelope.get("result"), "ABI lookup answered NOTOK.");
                return None;
            }
            match envelope.remove("result") {
                Some(Value::String(text)) => match serde_json::from_str(&text) {
                    Ok(abi) => abi,
                    Err(error) => {
                        tracing::debug!(error = %error, "ABI lookup result is not JSON.");
                        return None;
                    }
                },
                Some(result) => result,
                None => return None,
            }
        }
        _ => return None,
    };

    serde_json::from_value::<JsonAbi>(abi)
        .inspect_err(|error| tracing::debug!(error = %error, "ABI lookup result is not an ABI."))
        .ok()
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;
    use mockito::Matcher;
    use serde_json::json;

    use super::*;
    use crate::test_helpers::{create_test_http_client, erc20_abi_json};

    const TOKEN: Address = address!("0x00000000000000000000000000000000000000aa");

    fn fetcher(base_url: String, api_key: Option<&str>) -> AbiFetcher {
        AbiFetcher::new(
            create_test_http_client(),
            AbiLookupConfig { base_url, api_key: api_key.map(str::to_string) },
        )
    }

    #[tokio::test]
    async fn test_fetch_raw_abi() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("module".into(), "contract".into()),
                Matcher::UrlEncoded("action".into(), "getabi".into()),
                Matcher::UrlEncoded("address".into(), format!("{TOKEN:#x}")),
                Matcher::UrlEncoded("apikey".into(), "KEY".into()),
            ]))
            .with_status(200)
            .with_body(erc20_abi_json())
            .create_async()
            .await;

        let abi = fetcher(format!("{}/api", server.url()), Some("KEY"))
            .fetch(TOKEN)
            .await
            .unwrap()
            .unwrap();

        assert!(abi.events.contains_key("Transfer"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_envelope_with_string_result() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({"status": "1", "message": "OK", "result": erc20_abi_json()});
        let _mock = server
            .mock("GET", "/api")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let abi = fetcher(format!("{}/api", server.url()), None).fetch(TOKEN).await.unwrap();
        assert!(abi.unwrap().events.contains_key("Approval"));
    }

    #[tokio::test]
    async fn test_fetch_notok_is_none() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "status": "0",
            "message": "NOTOK",
            "result": "Contract source code not verified"
        });
        let _mock = server
            .mock("GET", "/api")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let abi = fetcher(format!("{}/api", server.url()), None).fetch(TOKEN).await.unwrap();
        assert!(abi.is_none());
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let result = fetcher(format!("{}/api", server.url()), None).fetch(TOKEN).await;
        assert!(matches!(result, Err(AbiFetchError::Status(500))));
    }

    #[tokio::test]
    async fn test_fetch_invalid_base_url() {
        let result = fetcher("not a url".to_string(), None).fetch(TOKEN).await;
        assert!(matches!(result, Err(AbiFetchError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_parse_lookup_body_rejects_non_abi() {
        assert!(parse_lookup_body("<html>").is_none());
        assert!(parse_lookup_body(r#"{"message": "OK", "result": "garbage"}"#).is_none());
        assert!(parse_lookup_body(r#"{"message": "OK"}"#).is_none());
        assert!(parse_lookup_body(r#""just a string""#).is_none());
        assert!(parse_lookup_body("[]").is_some());
    }
}
