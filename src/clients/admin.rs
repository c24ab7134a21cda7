//! GraphQL Admin API client.

use crate::clients::{user_agent, AdminApiError};
use crate::config::{ApiVersion, AppConfig, ShopDomain};
use crate::session::Session;
use std::time::Duration;

/// Seconds to wait before retrying a throttled or failed request when
/// Shopify does not send `Retry-After`.
pub const RETRY_WAIT_TIME: u64 = 1;

/// Attempts made per request unless overridden with
/// [`AdminApiClient::with_tries`].
pub const DEFAULT_TRIES: u32 = 3;

/// Client for the GraphQL Admin API, bound to one session.
///
/// Requests are POSTed to `https://{shop}/admin/api/{version}/graphql.json`
/// with the session's access token. Responses with status `429` or `500`
/// are retried, honoring `Retry-After` for throttled requests.
///
/// ```rust,ignore
/// let ctx = app.authenticate().admin(&request).await?;
/// let data = ctx
///     .admin
///     .graphql("query { shop { name } }", None)
///     .await?;
/// println!("{}", data["shop"]["name"]);
/// ```
#[derive(Clone, Debug)]
pub struct AdminApiClient {
    client: reqwest::Client,
    endpoint: String,
    shop: ShopDomain,
    access_token: String,
    user_agent: String,
    api_version: ApiVersion,
    tries: u32,
}

// Verify AdminApiClient is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<AdminApiClient>();
};

impl AdminApiClient {
    /// Creates a client for `session` using the configured API version.
    #[must_use]
    pub fn new(config: &AppConfig, session: &Session) -> Self {
        let api_version = config.api_version().clone();
        let endpoint = format!(
            "{}/admin/api/{api_version}/graphql.json",
            config.shop_origin(&session.shop)
        );

        Self {
            client: reqwest::Client::new(),
            endpoint,
            shop: session.shop.clone(),
            access_token: session.access_token.clone(),
            user_agent: user_agent(config),
            api_version,
            tries: DEFAULT_TRIES,
        }
    }

    /// Sets the number of attempts per request (at least one).
    #[must_use]
    pub fn with_tries(mut self, tries: u32) -> Self {
        self.tries = tries.max(1);
        self
    }

    /// Returns the shop this client talks to.
    #[must_use]
    pub const fn shop(&self) -> &ShopDomain {
        &self.shop
    }

    /// Returns the API version used in the endpoint.
    #[must_use]
    pub const fn api_version(&self) -> &ApiVersion {
        &self.api_version
    }

    /// Runs a GraphQL query and returns its `data` object.
    ///
    /// # Errors
    ///
    /// - [`AdminApiError::Response`] for non-retryable failures
    /// - [`AdminApiError::MaxRetries`] when every attempt was throttled or failed
    /// - [`AdminApiError::Graphql`] when the response carries top-level `errors`
    /// - [`AdminApiError::Network`] when the request could not be sent
    pub async fn graphql(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, AdminApiError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });

        let mut tries: u32 = 0;
        loop {
            tries += 1;

            let response = self
                .client
                .post(&self.endpoint)
                .header(reqwest::header::USER_AGENT, &self.user_agent)
                .header(reqwest::header::ACCEPT, "application/json")
                .header("X-Shopify-Access-Token", &self.access_token)
                .json(&body)
                .send()
                .await?;

            let status = response.status().as_u16();
            let request_id = header_value(&response, "x-request-id");
            let retry_after = header_value(&response, "retry-after")
                .and_then(|value| value.parse::<f64>().ok());
            if let Some(reason) = header_value(&response, "x-shopify-api-deprecated-reason") {
                tracing::warn!(
                    shop = %self.shop,
                    "Deprecated request to Shopify API, received reason: {reason}"
                );
            }

            let text = response.text().await.unwrap_or_default();
            let json: serde_json::Value = serde_json::from_str(&text)
                .unwrap_or_else(|_| serde_json::json!({ "raw_body": text }));

            if (200..300).contains(&status) {
                if let Some(errors) = json.get("errors") {
                    return Err(AdminApiError::Graphql(errors.clone()));
                }
                return Ok(json
                    .get("data")
                    .cloned()
                    .unwrap_or(serde_json::Value::Null));
            }

            let message = serialize_error(&json, request_id.as_deref());

            if status != 429 && status != 500 {
                return Err(AdminApiError::Response {
                    status,
                    message,
                    request_id,
                });
            }

            if tries >= self.tries {
                if self.tries == 1 {
                    return Err(AdminApiError::Response {
                        status,
                        message,
                        request_id,
                    });
                }
                return Err(AdminApiError::MaxRetries {
                    status,
                    tries,
                    message,
                });
            }

            let delay = match (status, retry_after) {
                (429, Some(seconds)) if seconds.is_finite() && seconds >= 0.0 => {
                    Duration::from_secs_f64(seconds)
                }
                _ => Duration::from_secs(RETRY_WAIT_TIME),
            };
            tracing::debug!(
                shop = %self.shop,
                status,
                attempt = tries,
                "Retrying Admin API request in {delay:?}"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

fn header_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

fn serialize_error(body: &serde_json::Value, request_id: Option<&str>) -> String {
    let mut error_body = serde_json::Map::new();

    for key in ["errors", "error", "error_description", "raw_body"] {
        if let Some(value) = body.get(key) {
            error_body.insert(key.to_string(), value.clone());
        }
    }
    if let Some(request_id) = request_id {
        error_body.insert(
            "error_reference".to_string(),
            serde_json::json!(format!(
                "If you report this error, please include this id: {request_id}."
            )),
        );
    }

    serde_json::Value::Object(error_body).to_string()
}
