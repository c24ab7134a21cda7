//! The login form handler.

use crate::auth::admin::embedded_app_url;
use crate::auth::{query_param, redirect, AuthenticateError};
use crate::config::{AppConfig, AppDistribution, ShopDomain};
use http::{Method, Request};
use serde::Serialize;

/// Why the submitted shop was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoginError {
    /// No shop was submitted.
    MissingShop,
    /// The shop is not a valid `myshopify.com` domain.
    InvalidShop,
}

/// Validation errors to show on the login form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoginErrors {
    /// Error for the shop field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shop: Option<LoginError>,
}

impl LoginErrors {
    /// Returns `true` when there is nothing to report.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.shop.is_none()
    }
}

fn form_param(body: &[u8], name: &str) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find_map(|(key, value)| (key == name).then(|| value.into_owned()))
}

pub(crate) fn login<B: AsRef<[u8]>>(
    config: &AppConfig,
    request: &Request<B>,
) -> Result<LoginErrors, AuthenticateError> {
    if config.distribution() == AppDistribution::ShopifyAdmin {
        return Err(AuthenticateError::LoginUnavailable);
    }

    let shop = query_param(request, "shop")
        .or_else(|| form_param(request.body().as_ref(), "shop"))
        .map(|shop| shop.trim().to_string())
        .filter(|shop| !shop.is_empty());

    let Some(shop) = shop else {
        if request.method() == Method::GET {
            return Ok(LoginErrors::default());
        }
        return Ok(LoginErrors {
            shop: Some(LoginError::MissingShop),
        });
    };

    let Ok(shop) = ShopDomain::new(&shop) else {
        tracing::debug!(shop, "Login attempted with an invalid shop");
        return Ok(LoginErrors {
            shop: Some(LoginError::InvalidShop),
        });
    };

    let location = if config.is_embedded_app() {
        embedded_app_url(config, &shop, None)
    } else {
        format!("{}?shop={}", config.auth_path(), urlencoding::encode(shop.as_ref()))
    };

    tracing::debug!(shop = %shop, "Redirecting login");
    Err(AuthenticateError::response(redirect(&location)))
}
