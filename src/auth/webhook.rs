//! Authentication of webhook deliveries.

use crate::app::ShopifyApp;
use crate::auth::{reject, AuthenticateError};
use crate::clients::AdminApiClient;
use crate::config::ShopDomain;
use crate::session::Session;
use crate::webhooks::{verify_webhook, WebhookError, WebhookTopic};
use http::{Method, Request, StatusCode};

/// A verified webhook delivery.
#[derive(Clone, Debug)]
pub struct WebhookContext {
    /// Shop that triggered the delivery.
    pub shop: ShopDomain,
    /// Topic of the delivery.
    pub topic: WebhookTopic,
    /// API version of the payload.
    pub api_version: String,
    /// Unique delivery id, useful to deduplicate retries.
    pub webhook_id: String,
    /// The JSON payload (`null` for an empty body).
    pub payload: serde_json::Value,
    /// The shop's offline session, absent after the app is uninstalled.
    pub session: Option<Session>,
    /// Admin API client for `session`.
    pub admin: Option<AdminApiClient>,
}

pub(crate) async fn authenticate_webhook<B: AsRef<[u8]>>(
    app: &ShopifyApp,
    request: &Request<B>,
) -> Result<WebhookContext, AuthenticateError> {
    if request.method() != Method::POST {
        tracing::debug!(method = %request.method(), "Rejecting webhook request");
        return Err(reject(StatusCode::METHOD_NOT_ALLOWED));
    }

    let config = app.config();
    let body = request.body().as_ref();

    let webhook = match verify_webhook(config, request.headers(), body) {
        Ok(webhook) => webhook,
        Err(WebhookError::InvalidHmac) => {
            tracing::warn!("Rejecting webhook with an invalid HMAC");
            return Err(reject(StatusCode::UNAUTHORIZED));
        }
        Err(error) => {
            tracing::warn!("Rejecting webhook: {error}");
            return Err(reject(StatusCode::BAD_REQUEST));
        }
    };

    let payload = if body.is_empty() {
        serde_json::Value::Null
    } else {
        match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(shop = %webhook.shop, "Rejecting webhook with a malformed payload: {error}");
                return Err(reject(StatusCode::BAD_REQUEST));
            }
        }
    };

    let session = app
        .session_storage()
        .load_session(&Session::offline_id(&webhook.shop))
        .await?;
    let admin = session
        .as_ref()
        .map(|session| AdminApiClient::new(config, session));

    tracing::debug!(shop = %webhook.shop, topic = %webhook.topic, "Received webhook");

    Ok(WebhookContext {
        shop: webhook.shop,
        topic: webhook.topic,
        api_version: webhook.api_version,
        webhook_id: webhook.webhook_id,
        payload,
        session,
        admin,
    })
}
