//! Webhook subscription types.
//!
//! ```rust
//! use shopify_app::webhooks::{WebhookDelivery, WebhookRegistrationBuilder, WebhookTopic};
//!
//! let registration = WebhookRegistrationBuilder::http(WebhookTopic::OrdersCreate, "/webhooks")
//!     .include_fields(vec!["id".to_string(), "email".to_string()])
//!     .filter("financial_status:paid")
//!     .build();
//!
//! assert_eq!(registration.topic, WebhookTopic::OrdersCreate);
//! assert!(matches!(registration.delivery, WebhookDelivery::Http { .. }));
//! ```

use super::{WebhookError, WebhookTopic};
use crate::config::AppUrl;

/// Where Shopify delivers a webhook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookDelivery {
    /// HTTPS delivery. `uri` is either a path resolved against the app URL
    /// or an absolute `https://` URI.
    Http {
        /// Callback path or absolute URI.
        uri: String,
    },
    /// Amazon EventBridge delivery.
    EventBridge {
        /// The partner event source ARN.
        arn: String,
    },
    /// Google Cloud Pub/Sub delivery.
    PubSub {
        /// GCP project id.
        project_id: String,
        /// Pub/Sub topic id.
        topic_id: String,
    },
}

impl WebhookDelivery {
    /// Returns the callback the subscription should point to.
    ///
    /// HTTP paths are joined onto `app_url`; Pub/Sub targets use Shopify's
    /// `pubsub://{project}:{topic}` form.
    #[must_use]
    pub fn callback_uri(&self, app_url: &AppUrl) -> String {
        match self {
            Self::Http { uri } if is_absolute(uri) => uri.clone(),
            Self::Http { uri } => app_url.join_path(uri),
            Self::EventBridge { arn } => arn.clone(),
            Self::PubSub {
                project_id,
                topic_id,
            } => format!("pubsub://{project_id}:{topic_id}"),
        }
    }
}

fn is_absolute(uri: &str) -> bool {
    uri.starts_with("https://") || uri.starts_with("http://")
}

/// A webhook subscription the app wants on every shop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookRegistration {
    /// Topic to subscribe to.
    pub topic: WebhookTopic,
    /// Delivery target.
    pub delivery: WebhookDelivery,
    /// Only these payload fields are sent when set.
    pub include_fields: Option<Vec<String>>,
    /// Metafield namespaces added to the payload.
    pub metafield_namespaces: Option<Vec<String>>,
    /// Search-syntax filter, e.g. `status:active`.
    pub filter: Option<String>,
}

/// Builder for [`WebhookRegistration`].
///
/// The delivery method is chosen by the constructor; the optional payload
/// settings are chained afterwards.
#[derive(Debug)]
pub struct WebhookRegistrationBuilder {
    topic: WebhookTopic,
    delivery: WebhookDelivery,
    include_fields: Option<Vec<String>>,
    metafield_namespaces: Option<Vec<String>>,
    filter: Option<String>,
}

impl WebhookRegistrationBuilder {
    fn new(topic: WebhookTopic, delivery: WebhookDelivery) -> Self {
        Self {
            topic,
            delivery,
            include_fields: None,
            metafield_namespaces: None,
            filter: None,
        }
    }

    /// HTTPS delivery to a path on the app (`/webhooks`) or an absolute URI.
    #[must_use]
    pub fn http(topic: WebhookTopic, uri: impl Into<String>) -> Self {
        Self::new(topic, WebhookDelivery::Http { uri: uri.into() })
    }

    /// Amazon EventBridge delivery.
    #[must_use]
    pub fn event_bridge(topic: WebhookTopic, arn: impl Into<String>) -> Self {
        Self::new(topic, WebhookDelivery::EventBridge { arn: arn.into() })
    }

    /// Google Cloud Pub/Sub delivery.
    #[must_use]
    pub fn pub_sub(
        topic: WebhookTopic,
        project_id: impl Into<String>,
        topic_id: impl Into<String>,
    ) -> Self {
        Self::new(
            topic,
            WebhookDelivery::PubSub {
                project_id: project_id.into(),
                topic_id: topic_id.into(),
            },
        )
    }

    /// Restricts the payload to these fields.
    #[must_use]
    pub fn include_fields(mut self, fields: Vec<String>) -> Self {
        self.include_fields = Some(fields);
        self
    }

    /// Adds metafield namespaces to the payload.
    #[must_use]
    pub fn metafield_namespaces(mut self, namespaces: Vec<String>) -> Self {
        self.metafield_namespaces = Some(namespaces);
        self
    }

    /// Sets a subscription filter.
    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Builds the registration.
    #[must_use]
    pub fn build(self) -> WebhookRegistration {
        WebhookRegistration {
            topic: self.topic,
            delivery: self.delivery,
            include_fields: self.include_fields,
            metafield_namespaces: self.metafield_namespaces,
            filter: self.filter,
        }
    }
}

/// Outcome of registering one topic.
#[derive(Debug)]
pub enum WebhookRegistrationResult {
    /// A new subscription was created.
    Created {
        /// Subscription GID.
        id: String,
    },
    /// An existing subscription was changed to match.
    Updated {
        /// Subscription GID.
        id: String,
    },
    /// A matching subscription already existed.
    AlreadyRegistered {
        /// Subscription GID.
        id: String,
    },
    /// Registration failed.
    Failed(WebhookError),
}

impl WebhookRegistrationResult {
    /// Returns `true` unless registration failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }

    /// Returns the subscription id when registration succeeded.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Created { id } | Self::Updated { id } | Self::AlreadyRegistered { id } => {
                Some(id)
            }
            Self::Failed(_) => None,
        }
    }
}
