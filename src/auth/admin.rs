//! Authentication of requests from the Shopify admin.
//!
//! Requests are first matched against the auth routes under the configured
//! prefix (`/auth`, `/auth/callback`, `/auth/exit-iframe`,
//! `/auth/session-token`), which are answered directly. Other requests are
//! authenticated with the App Bridge session token for embedded apps, or
//! with the signed session cookie for standalone apps.

use crate::app::ShopifyApp;
use crate::auth::app_bridge::{
    bounce_page, exit_iframe_page, is_allowed_exit_destination, reauth_url, redirect_out_of_app,
    redirect_to_bounce_page, respond_to_invalid_session_token,
};
use crate::auth::oauth::{
    begin_auth, clear_state_cookie, read_session_cookie, session_cookie, validate_callback,
};
use crate::auth::token_exchange::{exchange_authorization_code, exchange_token, RequestedTokenType};
use crate::auth::{
    bearer_token, query_param, redirect, reject, AppResponse, AuthenticateError, OAuthError,
    SessionTokenPayload,
};
use crate::clients::AdminApiClient;
use crate::config::{AppConfig, EmbeddedAuthStrategy, ShopDomain};
use crate::session::Session;
use base64::prelude::*;
use http::header::SET_COOKIE;
use http::{HeaderMap, HeaderValue, Request, StatusCode};

/// An authenticated admin request.
#[derive(Clone, Debug)]
pub struct AdminContext {
    /// The session the request is authenticated with.
    pub session: Session,
    /// The decoded App Bridge session token, for embedded apps.
    pub session_token: Option<SessionTokenPayload>,
    /// Admin API client bound to `session`.
    pub admin: AdminApiClient,
}

impl AdminContext {
    fn new(config: &AppConfig, session: Session, session_token: Option<SessionTokenPayload>) -> Self {
        let admin = AdminApiClient::new(config, &session);
        Self {
            session,
            session_token,
            admin,
        }
    }

    /// Adds the CORS headers the embedded app's `fetch` calls need. Does
    /// nothing for standalone requests.
    pub fn add_cors_headers(&self, headers: &mut HeaderMap) {
        if self.session_token.is_some() {
            crate::headers::add_cors_headers(headers);
        }
    }
}

fn exit(response: AppResponse) -> AuthenticateError {
    AuthenticateError::response(response)
}

fn shop_param<B>(request: &Request<B>) -> Option<ShopDomain> {
    query_param(request, "shop").and_then(|shop| ShopDomain::new(shop).ok())
}

fn is_embedded_request<B>(request: &Request<B>) -> bool {
    query_param(request, "embedded").as_deref() == Some("1")
}

/// Returns the URL of the app inside the shop's admin.
///
/// Uses the admin host from the base64 `host` parameter when it decodes to
/// a Shopify admin, otherwise the unified admin URL.
pub(crate) fn embedded_app_url(config: &AppConfig, shop: &ShopDomain, host: Option<&str>) -> String {
    let api_key = config.api_key().as_ref();
    match host.and_then(decode_host) {
        Some(admin) => format!("https://{admin}/apps/{api_key}"),
        None => format!(
            "https://admin.shopify.com/store/{}/apps/{api_key}",
            shop.shop_name()
        ),
    }
}

fn decode_host(host: &str) -> Option<String> {
    let bytes = BASE64_STANDARD
        .decode(host)
        .or_else(|_| BASE64_STANDARD_NO_PAD.decode(host))
        .ok()?;
    let admin = String::from_utf8(bytes).ok()?;
    let admin = admin.trim_end_matches('/');

    let is_admin = admin.starts_with("admin.shopify.com/store/")
        || admin
            .split_once('/')
            .is_some_and(|(domain, path)| domain.ends_with(".myshopify.com") && path == "admin");
    is_admin.then(|| admin.to_string())
}

pub(crate) async fn authenticate_admin<B>(
    app: &ShopifyApp,
    request: &Request<B>,
) -> Result<AdminContext, AuthenticateError> {
    let config = app.config();
    let path = request.uri().path();

    if path == config.auth_path() {
        return Err(begin(config, request));
    }
    if path == config.callback_path() {
        return Err(callback(app, request).await);
    }
    if path == config.exit_iframe_path() {
        return Err(exit_iframe(config, request));
    }
    if path == config.session_token_path() {
        return Err(exit(bounce_page(config)));
    }

    if config.is_embedded_app() {
        authenticate_embedded(app, request).await
    } else {
        authenticate_standalone(app, request).await
    }
}

fn begin<B>(config: &AppConfig, request: &Request<B>) -> AuthenticateError {
    let Some(shop) = shop_param(request) else {
        tracing::warn!("Rejecting auth request with a missing or invalid shop");
        return reject(StatusCode::BAD_REQUEST);
    };

    // The consent screen cannot render inside the admin iframe.
    if config.is_embedded_app() && is_embedded_request(request) {
        return exit(redirect_out_of_app(
            config,
            request,
            &shop,
            &reauth_url(config, &shop),
        ));
    }

    exit(begin_auth(config, &shop, false))
}

async fn callback<B>(app: &ShopifyApp, request: &Request<B>) -> AuthenticateError {
    let config = app.config();
    let params = match validate_callback(config, request) {
        Ok(params) => params,
        Err(error) => {
            tracing::warn!("Rejecting OAuth callback: {error}");
            return reject(StatusCode::BAD_REQUEST);
        }
    };

    let session = match exchange_authorization_code(config, &params.shop, &params.code).await {
        Ok(session) => session,
        Err(error) => return error.into(),
    };
    if let Err(error) = app.session_storage().store_session(&session).await {
        return error.into();
    }
    tracing::info!(shop = %session.shop, is_online = session.is_online, "Created session from OAuth callback");

    if !session.is_online && config.use_online_tokens() {
        return exit(begin_auth(config, &params.shop, true));
    }

    if let Err(error) = app.run_after_auth(&session).await {
        return error;
    }

    let mut response = if config.is_embedded_app() {
        redirect(&embedded_app_url(config, &params.shop, params.host.as_deref()))
    } else {
        let mut location = format!("/?shop={}", urlencoding::encode(params.shop.as_ref()));
        if let Some(host) = &params.host {
            location.push_str(&format!("&host={}", urlencoding::encode(host)));
        }
        let mut response = redirect(&location);
        append_cookie(&mut response, &session_cookie(config, &session.id));
        response
    };
    append_cookie(&mut response, &clear_state_cookie(config));

    exit(response)
}

fn append_cookie(response: &mut AppResponse, cookie: &str) {
    if let Ok(value) = HeaderValue::from_str(cookie) {
        response.headers_mut().append(SET_COOKIE, value);
    }
}

fn exit_iframe<B>(config: &AppConfig, request: &Request<B>) -> AuthenticateError {
    let destination = query_param(request, "exitIframe").unwrap_or_default();
    if !is_allowed_exit_destination(config, &destination) {
        tracing::warn!(destination, "Refusing to exit the iframe to an unknown destination");
        return reject(StatusCode::BAD_REQUEST);
    }
    exit(exit_iframe_page(config, &destination))
}

async fn authenticate_embedded<B>(
    app: &ShopifyApp,
    request: &Request<B>,
) -> Result<AdminContext, AuthenticateError> {
    let config = app.config();

    let token = bearer_token(request.headers())
        .map(ToString::to_string)
        .or_else(|| query_param(request, "id_token"));
    let Some(token) = token else {
        return Err(exit(missing_session_token(config, request)));
    };

    let payload = match SessionTokenPayload::decode(&token, config) {
        Ok(payload) => payload,
        Err(error) => {
            tracing::debug!("Invalid session token: {error}");
            return Err(exit(respond_to_invalid_session_token(config, request)));
        }
    };
    let Some(shop) = payload.shop() else {
        return Err(exit(respond_to_invalid_session_token(config, request)));
    };

    let session_id = match (config.use_online_tokens(), payload.user_id()) {
        (true, Some(user_id)) => Session::online_id(&shop, user_id),
        _ => Session::offline_id(&shop),
    };

    let stored = app.session_storage().load_session(&session_id).await?;
    let session = match stored {
        Some(session) if session.is_active(config.scopes()) => session,
        _ => match config.embedded_auth_strategy() {
            EmbeddedAuthStrategy::TokenExchange => {
                exchange_session(app, request, &shop, &token).await?
            }
            EmbeddedAuthStrategy::AuthCodeFlow => {
                tracing::debug!(shop = %shop, "No active session, redirecting to OAuth");
                return Err(exit(redirect_out_of_app(
                    config,
                    request,
                    &shop,
                    &reauth_url(config, &shop),
                )));
            }
        },
    };

    Ok(AdminContext::new(config, session, Some(payload)))
}

/// Where to send an embedded request that carries no session token.
fn missing_session_token<B>(config: &AppConfig, request: &Request<B>) -> AppResponse {
    let Some(shop) = shop_param(request) else {
        return redirect(&config.login_path());
    };

    if !is_embedded_request(request) {
        let host = query_param(request, "host");
        return redirect(&embedded_app_url(config, &shop, host.as_deref()));
    }

    redirect_to_bounce_page(config, request)
}

async fn exchange_session<B>(
    app: &ShopifyApp,
    request: &Request<B>,
    shop: &ShopDomain,
    token: &str,
) -> Result<Session, AuthenticateError> {
    let config = app.config();
    let rejected = |error: OAuthError| match error {
        OAuthError::InvalidSessionToken { .. } => {
            exit(respond_to_invalid_session_token(config, request))
        }
        other => other.into(),
    };

    let offline = exchange_token(config, shop, token, RequestedTokenType::OfflineAccessToken)
        .await
        .map_err(rejected)?;
    app.session_storage().store_session(&offline).await?;
    tracing::info!(shop = %shop, "Created offline session from token exchange");

    let session = if config.use_online_tokens() {
        let online = exchange_token(config, shop, token, RequestedTokenType::OnlineAccessToken)
            .await
            .map_err(rejected)?;
        app.session_storage().store_session(&online).await?;
        tracing::info!(shop = %shop, "Created online session from token exchange");
        online
    } else {
        offline
    };

    app.run_after_auth(&session).await?;
    Ok(session)
}

async fn authenticate_standalone<B>(
    app: &ShopifyApp,
    request: &Request<B>,
) -> Result<AdminContext, AuthenticateError> {
    let config = app.config();

    let stored = match read_session_cookie(config, request.headers()) {
        Some(id) => app.session_storage().load_session(&id).await?,
        None => None,
    };

    let stored_shop = match stored {
        Some(session) if session.is_active(config.scopes()) => {
            return Ok(AdminContext::new(config, session, None));
        }
        Some(session) => Some(session.shop),
        None => None,
    };

    match shop_param(request).or(stored_shop) {
        Some(shop) => {
            tracing::debug!(shop = %shop, "No active session, redirecting to auth");
            Err(exit(redirect(&reauth_url(config, &shop))))
        }
        None => Err(exit(redirect(&config.login_path()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::oauth::{SESSION_COOKIE, STATE_COOKIE};
    use crate::auth::session_token::tests::{claims, mint};
    use crate::auth::{app_bridge, hmac};
    use crate::config::{ApiKey, ApiSecretKey, AppUrl};
    use http::header::{AUTHORIZATION, COOKIE, LOCATION};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const API_KEY: &str = "test-api-key";
    const SECRET: &str = "test-secret";
    const SHOP: &str = "test-shop.myshopify.com";

    fn builder() -> crate::config::AppConfigBuilder {
        AppConfig::builder()
            .api_key(ApiKey::new(API_KEY).unwrap())
            .api_secret_key(ApiSecretKey::new(SECRET).unwrap())
            .app_url(AppUrl::new("https://myapp.example.com").unwrap())
            .scopes("read_products".parse().unwrap())
    }

    fn app(config: AppConfig) -> ShopifyApp {
        ShopifyApp::new(config)
    }

    fn shop() -> ShopDomain {
        ShopDomain::new(SHOP).unwrap()
    }

    fn stored_session(token: &str) -> Session {
        Session::new(
            Session::offline_id(&shop()),
            shop(),
            token.to_string(),
            "read_products".parse().unwrap(),
            false,
            None,
        )
    }

    fn response_of(result: Result<AdminContext, AuthenticateError>) -> AppResponse {
        match result {
            Err(AuthenticateError::Response(response)) => *response,
            other => panic!("expected a response, got {other:?}"),
        }
    }

    fn location(response: &AppResponse) -> &str {
        response.headers()[LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_bearer_request_with_stored_session() {
        let app = app(builder().build().unwrap());
        app.session_storage()
            .store_session(&stored_session("stored-token"))
            .await
            .unwrap();
        let token = mint(&claims(SHOP, API_KEY), SECRET);
        let request = Request::get("/api/products")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(())
            .unwrap();

        let context = app.authenticate().admin(&request).await.unwrap();

        assert_eq!(context.session.access_token, "stored-token");
        assert_eq!(context.admin.shop(), &shop());
        assert!(context.session_token.is_some());
    }

    #[tokio::test]
    async fn test_invalid_bearer_token_asks_for_retry() {
        let app = app(builder().build().unwrap());
        let token = mint(&claims(SHOP, API_KEY), "wrong-secret");
        let request = Request::get("/api/products")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(())
            .unwrap();

        let response = response_of(app.authenticate().admin(&request).await);

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[app_bridge::RETRY_INVALID_SESSION_HEADER], "1");
    }

    #[tokio::test]
    async fn test_token_exchange_creates_and_stores_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/oauth/access_token"))
            .and(body_partial_json(serde_json::json!({
                "requested_token_type": "urn:shopify:params:oauth:token-type:offline-access-token"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "exchanged-token",
                "scope": "read_products"
            })))
            .expect(1)
            .mount(&server)
            .await;
        let app = app(builder().build().unwrap().with_shop_origin(server.uri()));
        let token = mint(&claims(SHOP, API_KEY), SECRET);
        let request = Request::get(format!("/app?embedded=1&shop={SHOP}&id_token={token}"))
            .body(())
            .unwrap();

        let context = app.authenticate().admin(&request).await.unwrap();

        assert_eq!(context.session.access_token, "exchanged-token");
        let stored = app
            .session_storage()
            .load_session(&Session::offline_id(&shop()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.access_token, "exchanged-token");
    }

    #[tokio::test]
    async fn test_rejected_token_exchange_asks_for_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/oauth/access_token"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({ "error": "invalid_subject_token" })),
            )
            .mount(&server)
            .await;
        let app = app(builder().build().unwrap().with_shop_origin(server.uri()));
        let token = mint(&claims(SHOP, API_KEY), SECRET);
        let request = Request::post("/api/products")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(())
            .unwrap();

        let response = response_of(app.authenticate().admin(&request).await);

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response
            .headers()
            .contains_key(app_bridge::RETRY_INVALID_SESSION_HEADER));
    }

    #[tokio::test]
    async fn test_auth_code_flow_fetch_gets_reauth_response() {
        let app = app(
            builder()
                .embedded_auth_strategy(EmbeddedAuthStrategy::AuthCodeFlow)
                .build()
                .unwrap(),
        );
        let token = mint(&claims(SHOP, API_KEY), SECRET);
        let request = Request::get("/api/products")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(())
            .unwrap();

        let response = response_of(app.authenticate().admin(&request).await);

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[app_bridge::REAUTH_URL_HEADER],
            "https://myapp.example.com/auth?shop=test-shop.myshopify.com"
        );
    }

    #[tokio::test]
    async fn test_document_without_token_goes_to_bounce_page() {
        let app = app(builder().build().unwrap());
        let request = Request::get(format!("/app?embedded=1&shop={SHOP}&host=abc"))
            .body(())
            .unwrap();

        let response = response_of(app.authenticate().admin(&request).await);

        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(location(&response).starts_with("/auth/session-token?"));
        assert!(location(&response).contains("shopify-reload="));
    }

    #[tokio::test]
    async fn test_non_embedded_load_is_sent_into_the_admin() {
        let app = app(builder().build().unwrap());
        let request = Request::get(format!("/app?shop={SHOP}")).body(()).unwrap();

        let response = response_of(app.authenticate().admin(&request).await);

        assert_eq!(
            location(&response),
            "https://admin.shopify.com/store/test-shop/apps/test-api-key"
        );
    }

    #[tokio::test]
    async fn test_missing_shop_goes_to_login() {
        let app = app(builder().build().unwrap());
        let request = Request::get("/app").body(()).unwrap();

        let response = response_of(app.authenticate().admin(&request).await);

        assert_eq!(location(&response), "/auth/login");
    }

    #[tokio::test]
    async fn test_auth_route_begins_oauth() {
        let app = app(builder().build().unwrap());
        let request = Request::get(format!("/auth?shop={SHOP}")).body(()).unwrap();

        let response = response_of(app.authenticate().admin(&request).await);

        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(location(&response)
            .starts_with("https://test-shop.myshopify.com/admin/oauth/authorize?"));
        assert!(response.headers()[SET_COOKIE]
            .to_str()
            .unwrap()
            .starts_with(STATE_COOKIE));
    }

    #[tokio::test]
    async fn test_auth_route_rejects_invalid_shop() {
        let app = app(builder().build().unwrap());
        let request = Request::get("/auth?shop=evil.example.com").body(()).unwrap();

        let response = response_of(app.authenticate().admin(&request).await);

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_callback_stores_session_and_sets_cookie_for_standalone_apps() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/admin/oauth/access_token"))
            .and(body_partial_json(serde_json::json!({ "code": "auth-code" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "oauth-token",
                "scope": "read_products"
            })))
            .expect(1)
            .mount(&server)
            .await;
        let config = builder()
            .is_embedded_app(false)
            .build()
            .unwrap()
            .with_shop_origin(server.uri());
        let app = app(config);

        let params = vec![
            ("code".to_string(), "auth-code".to_string()),
            ("shop".to_string(), SHOP.to_string()),
            ("state".to_string(), "nonce".to_string()),
            ("timestamp".to_string(), "1700000000".to_string()),
        ];
        let signature = hmac::compute_signature(&hmac::oauth_signable(&params), SECRET);
        let request = Request::get(format!(
            "/auth/callback?code=auth-code&shop={SHOP}&state=nonce&timestamp=1700000000&hmac={signature}"
        ))
        .header(COOKIE, format!("{STATE_COOKIE}=nonce"))
        .body(())
        .unwrap();

        let response = response_of(app.authenticate().admin(&request).await);

        assert_eq!(location(&response), "/?shop=test-shop.myshopify.com");
        let cookies: Vec<&str> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|value| value.to_str().unwrap())
            .collect();
        assert!(cookies.iter().any(|cookie| cookie.starts_with(SESSION_COOKIE)));
        assert!(app
            .session_storage()
            .load_session(&Session::offline_id(&shop()))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_callback_with_bad_hmac_is_rejected() {
        let app = app(builder().build().unwrap());
        let request = Request::get(format!(
            "/auth/callback?code=c&shop={SHOP}&state=nonce&hmac=deadbeef"
        ))
        .header(COOKIE, format!("{STATE_COOKIE}=nonce"))
        .body(())
        .unwrap();

        let response = response_of(app.authenticate().admin(&request).await);

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_standalone_request_with_session_cookie() {
        let config = builder().is_embedded_app(false).build().unwrap();
        let cookie = session_cookie(&config, &Session::offline_id(&shop()));
        let app = app(config);
        app.session_storage()
            .store_session(&stored_session("cookie-token"))
            .await
            .unwrap();
        let cookie_pair = cookie.split(';').next().unwrap().to_string();
        let request = Request::get("/dashboard")
            .header(COOKIE, cookie_pair)
            .body(())
            .unwrap();

        let context = app.authenticate().admin(&request).await.unwrap();

        assert_eq!(context.session.access_token, "cookie-token");
        assert!(context.session_token.is_none());
    }

    #[tokio::test]
    async fn test_standalone_request_without_session_redirects_to_auth() {
        let app = app(builder().is_embedded_app(false).build().unwrap());
        let request = Request::get(format!("/dashboard?shop={SHOP}")).body(()).unwrap();

        let response = response_of(app.authenticate().admin(&request).await);

        assert_eq!(
            location(&response),
            "https://myapp.example.com/auth?shop=test-shop.myshopify.com"
        );
    }

    #[tokio::test]
    async fn test_exit_iframe_rejects_foreign_destinations() {
        let app = app(builder().build().unwrap());
        let request = Request::get("/auth/exit-iframe?exitIframe=https%3A%2F%2Fevil.example.com")
            .body(())
            .unwrap();

        let response = response_of(app.authenticate().admin(&request).await);

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_embedded_app_url_uses_decoded_host() {
        let config = builder().build().unwrap();
        let host = BASE64_STANDARD.encode("admin.shopify.com/store/test-shop");

        assert_eq!(
            embedded_app_url(&config, &shop(), Some(&host)),
            "https://admin.shopify.com/store/test-shop/apps/test-api-key"
        );

        let foreign = BASE64_STANDARD.encode("evil.example.com");
        assert_eq!(
            embedded_app_url(&config, &shop(), Some(&foreign)),
            "https://admin.shopify.com/store/test-shop/apps/test-api-key"
        );
    }
}
