//! Webhook topics.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! webhook_topics {
    ($($(#[$meta:meta])* $variant:ident => $name:literal,)+) => {
        /// A webhook topic.
        ///
        /// Topics use Shopify's REST form (`orders/create`) for display and
        /// serde, and the GraphQL enum form (`ORDERS_CREATE`) when registering
        /// subscriptions. Topics without a variant are kept as
        /// [`Other`](Self::Other).
        ///
        /// ```rust
        /// use shopify_app::webhooks::WebhookTopic;
        ///
        /// let topic: WebhookTopic = "orders/create".parse().unwrap();
        /// assert_eq!(topic, WebhookTopic::OrdersCreate);
        /// assert_eq!(topic.graphql_name(), "ORDERS_CREATE");
        ///
        /// let topic: WebhookTopic = "bulk_operations/finish".parse().unwrap();
        /// assert_eq!(topic.as_str(), "bulk_operations/finish");
        /// ```
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        pub enum WebhookTopic {
            $($(#[$meta])* $variant,)+
            /// A topic not listed above.
            Other(String),
        }

        impl WebhookTopic {
            /// Returns the topic in `resource/event` form.
            #[must_use]
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $name,)+
                    Self::Other(topic) => topic,
                }
            }

            fn from_known(topic: &str) -> Option<Self> {
                match topic {
                    $($name => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

webhook_topics! {
    /// `app/uninstalled`
    AppUninstalled => "app/uninstalled",
    /// `app/scopes_update`
    AppScopesUpdate => "app/scopes_update",
    /// `app_subscriptions/update`
    AppSubscriptionsUpdate => "app_subscriptions/update",
    /// `orders/create`
    OrdersCreate => "orders/create",
    /// `orders/updated`
    OrdersUpdated => "orders/updated",
    /// `orders/paid`
    OrdersPaid => "orders/paid",
    /// `orders/cancelled`
    OrdersCancelled => "orders/cancelled",
    /// `orders/fulfilled`
    OrdersFulfilled => "orders/fulfilled",
    /// `orders/delete`
    OrdersDelete => "orders/delete",
    /// `products/create`
    ProductsCreate => "products/create",
    /// `products/update`
    ProductsUpdate => "products/update",
    /// `products/delete`
    ProductsDelete => "products/delete",
    /// `customers/create`
    CustomersCreate => "customers/create",
    /// `customers/update`
    CustomersUpdate => "customers/update",
    /// `customers/delete`
    CustomersDelete => "customers/delete",
    /// `customers/data_request` (mandatory compliance topic)
    CustomersDataRequest => "customers/data_request",
    /// `customers/redact` (mandatory compliance topic)
    CustomersRedact => "customers/redact",
    /// `shop/redact` (mandatory compliance topic)
    ShopRedact => "shop/redact",
    /// `shop/update`
    ShopUpdate => "shop/update",
    /// `collections/create`
    CollectionsCreate => "collections/create",
    /// `collections/update`
    CollectionsUpdate => "collections/update",
    /// `collections/delete`
    CollectionsDelete => "collections/delete",
    /// `carts/create`
    CartsCreate => "carts/create",
    /// `carts/update`
    CartsUpdate => "carts/update",
    /// `fulfillments/create`
    FulfillmentsCreate => "fulfillments/create",
    /// `fulfillments/update`
    FulfillmentsUpdate => "fulfillments/update",
    /// `refunds/create`
    RefundsCreate => "refunds/create",
    /// `themes/publish`
    ThemesPublish => "themes/publish",
    /// `inventory_levels/update`
    InventoryLevelsUpdate => "inventory_levels/update",
    /// `inventory_items/update`
    InventoryItemsUpdate => "inventory_items/update",
}

impl WebhookTopic {
    /// Returns the topic as a GraphQL `WebhookSubscriptionTopic` value,
    /// e.g. `ORDERS_CREATE`.
    #[must_use]
    pub fn graphql_name(&self) -> String {
        self.as_str().replace('/', "_").to_uppercase()
    }

    /// Returns `true` for the mandatory privacy compliance topics, which are
    /// configured in the app's settings and cannot be subscribed to through
    /// the API.
    #[must_use]
    pub const fn is_compliance_topic(&self) -> bool {
        matches!(
            self,
            Self::CustomersDataRequest | Self::CustomersRedact | Self::ShopRedact
        )
    }
}

impl fmt::Display for WebhookTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WebhookTopic {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let topic = s.trim();
        Ok(Self::from_known(topic).unwrap_or_else(|| Self::Other(topic.to_string())))
    }
}

impl Serialize for WebhookTopic {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WebhookTopic {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_topics_parse_to_variants() {
        assert_eq!(
            "app/uninstalled".parse::<WebhookTopic>().unwrap(),
            WebhookTopic::AppUninstalled
        );
        assert_eq!(
            "inventory_levels/update".parse::<WebhookTopic>().unwrap(),
            WebhookTopic::InventoryLevelsUpdate
        );
    }

    #[test]
    fn test_unknown_topics_are_preserved() {
        let topic: WebhookTopic = "bulk_operations/finish".parse().unwrap();
        assert_eq!(topic, WebhookTopic::Other("bulk_operations/finish".to_string()));
        assert_eq!(topic.graphql_name(), "BULK_OPERATIONS_FINISH");
    }

    #[test]
    fn test_graphql_name() {
        assert_eq!(WebhookTopic::AppScopesUpdate.graphql_name(), "APP_SCOPES_UPDATE");
        assert_eq!(WebhookTopic::OrdersCreate.graphql_name(), "ORDERS_CREATE");
    }

    #[test]
    fn test_serde_uses_rest_form() {
        let json = serde_json::to_string(&WebhookTopic::ProductsUpdate).unwrap();
        assert_eq!(json, r#""products/update""#);

        let topic: WebhookTopic = serde_json::from_str(r#""shop/redact""#).unwrap();
        assert!(topic.is_compliance_topic());
    }
}
