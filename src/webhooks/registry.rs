//! Registers the app's webhook subscriptions on a shop.
//!
//! Registration is idempotent: for each configured topic the registry
//! looks up the shop's existing subscription with the same delivery kind,
//! leaves it alone when it already matches, updates it when it differs and
//! creates it when there is none.

use crate::clients::AdminApiClient;
use crate::config::{AppConfig, AppUrl};
use crate::webhooks::{
    WebhookDelivery, WebhookError, WebhookRegistration, WebhookRegistrationResult,
};
use serde_json::{json, Map, Value};

const SUBSCRIPTIONS_QUERY: &str = r"
query webhookSubscriptions($topics: [WebhookSubscriptionTopic!]) {
  webhookSubscriptions(first: 25, topics: $topics) {
    edges {
      node {
        id
        endpoint {
          __typename
          ... on WebhookHttpEndpoint { callbackUrl }
          ... on WebhookEventBridgeEndpoint { arn }
          ... on WebhookPubSubEndpoint { pubSubProject pubSubTopic }
        }
        includeFields
        metafieldNamespaces
        filter
      }
    }
  }
}";

const CREATE_MUTATION: &str = r"
mutation webhookSubscriptionCreate($topic: WebhookSubscriptionTopic!, $webhookSubscription: WebhookSubscriptionInput!) {
  webhookSubscriptionCreate(topic: $topic, webhookSubscription: $webhookSubscription) {
    webhookSubscription { id }
    userErrors { field message }
  }
}";

const UPDATE_MUTATION: &str = r"
mutation webhookSubscriptionUpdate($id: ID!, $webhookSubscription: WebhookSubscriptionInput!) {
  webhookSubscriptionUpdate(id: $id, webhookSubscription: $webhookSubscription) {
    webhookSubscription { id }
    userErrors { field message }
  }
}";

/// The app's webhook subscriptions, ready to be synced to a shop.
///
/// ```rust,ignore
/// let registry = WebhookRegistry::from_config(app.config());
/// for result in registry.register_all(&AdminApiClient::new(app.config(), &session)).await {
///     if let WebhookRegistrationResult::Failed(error) = result {
///         tracing::error!("{error}");
///     }
/// }
/// ```
#[derive(Clone, Debug)]
pub struct WebhookRegistry {
    app_url: AppUrl,
    registrations: Vec<WebhookRegistration>,
}

/// Subscription as currently configured on the shop.
#[derive(Debug)]
struct ExistingSubscription {
    id: String,
    uri: String,
    include_fields: Vec<String>,
    metafield_namespaces: Vec<String>,
    filter: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DeliveryKind {
    Http,
    EventBridge,
    PubSub,
}

impl DeliveryKind {
    const fn of(delivery: &WebhookDelivery) -> Self {
        match delivery {
            WebhookDelivery::Http { .. } => Self::Http,
            WebhookDelivery::EventBridge { .. } => Self::EventBridge,
            WebhookDelivery::PubSub { .. } => Self::PubSub,
        }
    }

    fn from_typename(typename: &str) -> Option<Self> {
        match typename {
            "WebhookHttpEndpoint" => Some(Self::Http),
            "WebhookEventBridgeEndpoint" => Some(Self::EventBridge),
            "WebhookPubSubEndpoint" => Some(Self::PubSub),
            _ => None,
        }
    }
}

impl WebhookRegistry {
    /// Creates a registry for `registrations`, resolving HTTP paths
    /// against `app_url`.
    #[must_use]
    pub const fn new(app_url: AppUrl, registrations: Vec<WebhookRegistration>) -> Self {
        Self {
            app_url,
            registrations,
        }
    }

    /// Creates a registry from the subscriptions configured on `config`.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.app_url().clone(), config.webhooks().to_vec())
    }

    /// Returns the configured registrations.
    #[must_use]
    pub fn registrations(&self) -> &[WebhookRegistration] {
        &self.registrations
    }

    /// Registers one subscription.
    ///
    /// # Errors
    ///
    /// - [`WebhookError::AdminApi`] if a GraphQL request fails
    /// - [`WebhookError::ShopifyError`] if Shopify rejects the mutation
    /// - [`WebhookError::UnexpectedResponse`] if a response is malformed
    pub async fn register(
        &self,
        client: &AdminApiClient,
        registration: &WebhookRegistration,
    ) -> Result<WebhookRegistrationResult, WebhookError> {
        let uri = registration.delivery.callback_uri(&self.app_url);
        let kind = DeliveryKind::of(&registration.delivery);

        let existing = query_existing(client, registration, kind).await?;
        let input = subscription_input(registration, &uri);

        match existing {
            Some(existing) if is_up_to_date(&existing, registration, &uri) => {
                tracing::debug!(
                    shop = %client.shop(),
                    topic = %registration.topic,
                    "Webhook subscription already registered"
                );
                Ok(WebhookRegistrationResult::AlreadyRegistered { id: existing.id })
            }
            Some(existing) => {
                let variables = json!({ "id": &existing.id, "webhookSubscription": input });
                let data = client.graphql(UPDATE_MUTATION, Some(variables)).await?;
                let id = mutation_id(&data, "webhookSubscriptionUpdate")?;
                tracing::info!(shop = %client.shop(), topic = %registration.topic, "Updated webhook subscription");
                Ok(WebhookRegistrationResult::Updated { id })
            }
            None => {
                let variables = json!({
                    "topic": registration.topic.graphql_name(),
                    "webhookSubscription": input,
                });
                let data = client.graphql(CREATE_MUTATION, Some(variables)).await?;
                let id = mutation_id(&data, "webhookSubscriptionCreate")?;
                tracing::info!(shop = %client.shop(), topic = %registration.topic, "Created webhook subscription");
                Ok(WebhookRegistrationResult::Created { id })
            }
        }
    }

    /// Registers every configured subscription.
    ///
    /// Failures are reported per topic as
    /// [`WebhookRegistrationResult::Failed`] and do not stop the remaining
    /// registrations. Compliance topics are skipped since they cannot be
    /// subscribed to through the API.
    pub async fn register_all(&self, client: &AdminApiClient) -> Vec<WebhookRegistrationResult> {
        let mut results = Vec::with_capacity(self.registrations.len());

        for registration in &self.registrations {
            if registration.topic.is_compliance_topic() {
                tracing::warn!(
                    topic = %registration.topic,
                    "Skipping compliance topic; configure it in the app settings instead"
                );
                continue;
            }

            let result = match self.register(client, registration).await {
                Ok(result) => result,
                Err(error) => {
                    tracing::error!(
                        shop = %client.shop(),
                        topic = %registration.topic,
                        "Failed to register webhook: {error}"
                    );
                    WebhookRegistrationResult::Failed(error)
                }
            };
            results.push(result);
        }

        results
    }
}

async fn query_existing(
    client: &AdminApiClient,
    registration: &WebhookRegistration,
    kind: DeliveryKind,
) -> Result<Option<ExistingSubscription>, WebhookError> {
    let variables = json!({ "topics": [registration.topic.graphql_name()] });
    let data = client.graphql(SUBSCRIPTIONS_QUERY, Some(variables)).await?;

    let edges = data["webhookSubscriptions"]["edges"]
        .as_array()
        .ok_or_else(|| WebhookError::UnexpectedResponse {
            message: "webhookSubscriptions.edges is missing".to_string(),
        })?;

    let existing = edges
        .iter()
        .map(|edge| &edge["node"])
        .find(|node| {
            node["endpoint"]["__typename"]
                .as_str()
                .and_then(DeliveryKind::from_typename)
                == Some(kind)
        })
        .and_then(parse_subscription);

    Ok(existing)
}

fn parse_subscription(node: &Value) -> Option<ExistingSubscription> {
    let endpoint = &node["endpoint"];
    let uri = if let Some(url) = endpoint["callbackUrl"].as_str() {
        url.to_string()
    } else if let Some(arn) = endpoint["arn"].as_str() {
        arn.to_string()
    } else {
        let project = endpoint["pubSubProject"].as_str()?;
        let topic = endpoint["pubSubTopic"].as_str()?;
        format!("pubsub://{project}:{topic}")
    };

    Some(ExistingSubscription {
        id: node["id"].as_str()?.to_string(),
        uri,
        include_fields: strings(&node["includeFields"]),
        metafield_namespaces: strings(&node["metafieldNamespaces"]),
        filter: node["filter"]
            .as_str()
            .filter(|filter| !filter.is_empty())
            .map(ToString::to_string),
    })
}

fn strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|values| {
            values
                .iter()
                .filter_map(|value| value.as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn is_up_to_date(existing: &ExistingSubscription, registration: &WebhookRegistration, uri: &str) -> bool {
    existing.uri == uri
        && existing.include_fields == registration.include_fields.clone().unwrap_or_default()
        && existing.metafield_namespaces
            == registration.metafield_namespaces.clone().unwrap_or_default()
        && existing.filter == registration.filter
}

fn subscription_input(registration: &WebhookRegistration, uri: &str) -> Value {
    let mut input = Map::new();
    input.insert("uri".to_string(), json!(uri));
    if let Some(fields) = &registration.include_fields {
        input.insert("includeFields".to_string(), json!(fields));
    }
    if let Some(namespaces) = &registration.metafield_namespaces {
        input.insert("metafieldNamespaces".to_string(), json!(namespaces));
    }
    if let Some(filter) = &registration.filter {
        input.insert("filter".to_string(), json!(filter));
    }
    Value::Object(input)
}

/// Reads the subscription id of a create/update payload, turning
/// `userErrors` into [`WebhookError::ShopifyError`].
fn mutation_id(data: &Value, field: &str) -> Result<String, WebhookError> {
    let payload = &data[field];

    let messages: Vec<&str> = payload["userErrors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|error| error["message"].as_str())
                .collect()
        })
        .unwrap_or_default();
    if !messages.is_empty() {
        return Err(WebhookError::ShopifyError {
            message: messages.join("; "),
        });
    }

    payload["webhookSubscription"]["id"]
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| WebhookError::UnexpectedResponse {
            message: format!("{field}.webhookSubscription.id is missing"),
        })
}
