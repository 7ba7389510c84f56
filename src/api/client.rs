use std::sync::Arc;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{config::Config, error::ApiError, session::SessionStore};

// ---------------------------------------------------------------------------
// Login redirect hook
// ---------------------------------------------------------------------------

/// Invoked when the backend rejects the current session.
///
/// The UI layer decides what "go to the login page" means; the façade only
/// guarantees it is asked exactly once per invalidated session.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self);
}

/// Default hook for headless consumers: logs the redirect.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRedirect;

impl LoginRedirect for LogRedirect {
    fn redirect_to_login(&self) {
        warn!("Session rejected by backend; login required");
    }
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// Typed, authenticated access to the monitoring backend.
///
/// Cheap to clone; clones share the HTTP connection pool and the session.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    base_url: String,
    /// Parsed form of `base_url`, used to build paths with encoded segments.
    base: Url,
    session: SessionStore,
    redirect: Arc<dyn LoginRedirect>,
}

impl ApiClient {
    pub fn new(
        config: &Config,
        session: SessionStore,
        redirect: Arc<dyn LoginRedirect>,
    ) -> Result<Self, ApiError> {
        let base_url = config.api_url.trim_end_matches('/').to_owned();
        let base = Url::parse(&base_url).map_err(|e| ApiError::BaseUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ApiError::BaseUrl {
                url: base_url,
                reason: "not a hierarchical URL".to_owned(),
            });
        }

        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                base,
                session,
                redirect,
            }),
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.inner.base_url, path);
        debug!(method = %method, url = %url, "Building request");
        self.inner.http.request(method, url)
    }

    /// Request to the path made of `segments`, each percent-encoded, so ids
    /// containing `/`, `?` or `#` stay inside their own segment.
    pub(crate) fn request_at(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let mut url = self.inner.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        debug!(method = %method, url = %url, "Building request");
        self.inner.http.request(method, url)
    }

    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    pub(crate) fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    /// Send with the session's current token, if any. A 401 always ends in a
    /// login redirect, even for a request that went out without a token.
    pub(crate) async fn send(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let token = self.inner.session.token();
        self.execute(req, token, true).await
    }

    /// Send with an explicit token (or anonymously) instead of the session's.
    ///
    /// Used by the auth endpoints themselves: a 401 only invalidates the
    /// session when `token` is still the session's current token, and an
    /// anonymous rejection (bad credentials) never redirects.
    pub(crate) async fn send_as(
        &self,
        req: RequestBuilder,
        token: Option<String>,
    ) -> Result<Response, ApiError> {
        self.execute(req, token, false).await
    }

    async fn execute(
        &self,
        req: RequestBuilder,
        token: Option<String>,
        protected: bool,
    ) -> Result<Response, ApiError> {
        let req = match token.as_deref() {
            Some(t) => req.bearer_auth(t),
            None => req,
        };

        let resp = req.send().await?;
        let status = resp.status();

        if status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized(token.as_deref(), protected);
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(status = %status, body = %body, "Backend returned error status");
            return Err(ApiError::Status { status, body });
        }

        Ok(resp)
    }

    /// Send and decode the JSON body as `T`.
    pub(crate) async fn json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        context: &'static str,
    ) -> Result<T, ApiError> {
        let bytes = self.send(req).await?.bytes().await?;
        decode(&bytes, context)
    }

    pub(crate) async fn json_as<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        token: Option<String>,
        context: &'static str,
    ) -> Result<T, ApiError> {
        let bytes = self.send_as(req, token).await?.bytes().await?;
        decode(&bytes, context)
    }

    fn handle_unauthorized(&self, token: Option<&str>, protected: bool) {
        match token {
            Some(token) => {
                if self.inner.session.invalidate(token) {
                    warn!("Backend returned 401; session invalidated");
                    self.inner.redirect.redirect_to_login();
                }
            }
            None if protected => {
                // A session created while the request was in flight is newer
                // than the rejection.
                if self.inner.session.is_authenticated() {
                    debug!("Ignoring anonymous 401 that predates the current session");
                    return;
                }
                self.inner.session.clear_auth();
                warn!("Anonymous request to a protected endpoint rejected");
                self.inner.redirect.redirect_to_login();
            }
            None => debug!("Anonymous auth request rejected with 401"),
        }
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8], context: &'static str) -> Result<T, ApiError> {
    serde_json::from_slice(bytes).map_err(|source| ApiError::Decode { context, source })
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{models::User, session::MemoryStorage};

    #[derive(Default)]
    struct CountingRedirect(AtomicUsize);

    impl LoginRedirect for CountingRedirect {
        fn redirect_to_login(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn client() -> (ApiClient, Arc<CountingRedirect>) {
        let config = Config::local("http://127.0.0.1:9/").unwrap();
        let session = SessionStore::new(Arc::new(MemoryStorage::new()));
        let redirect = Arc::new(CountingRedirect::default());
        let api = ApiClient::new(&config, session, redirect.clone()).unwrap();
        (api, redirect)
    }

    #[test]
    fn base_url_has_no_trailing_slash() {
        let (api, _) = client();
        assert_eq!(api.base_url(), "http://127.0.0.1:9");
    }

    #[test]
    fn request_joins_base_and_path() {
        let (api, _) = client();
        let req = api.get("/sensors/latest").build().unwrap();
        assert_eq!(req.url().as_str(), "http://127.0.0.1:9/sensors/latest");
        assert!(req.headers().get(reqwest::header::AUTHORIZATION).is_none());
    }

    #[test]
    fn unauthorized_redirects_once_per_session() {
        let (api, redirect) = client();
        api.session().set_auth(
            User {
                email: "a@b.com".into(),
                full_name: "A".into(),
                role: "user".into(),
                is_active: true,
            },
            "tok1".into(),
        );

        api.handle_unauthorized(Some("tok1"), true);
        api.handle_unauthorized(Some("tok1"), true);
        api.handle_unauthorized(None, false);

        assert_eq!(redirect.0.load(Ordering::SeqCst), 1);
        assert!(!api.session().is_authenticated());
    }

    #[test]
    fn anonymous_rejection_of_protected_call_redirects() {
        let (api, redirect) = client();
        api.handle_unauthorized(None, true);
        assert_eq!(redirect.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn anonymous_rejection_does_not_end_a_newer_session() {
        let (api, redirect) = client();
        api.session().set_auth(
            User {
                email: "a@b.com".into(),
                full_name: "A".into(),
                role: "user".into(),
                is_active: true,
            },
            "tok2".into(),
        );
        api.handle_unauthorized(None, true);
        assert_eq!(redirect.0.load(Ordering::SeqCst), 0);
        assert!(api.session().is_authenticated());
    }

    #[test]
    fn request_at_encodes_segments() {
        let (api, _) = client();
        let req = api
            .request_at(Method::PATCH, &["alerts", "a/b?c#d", "acknowledge"])
            .build()
            .unwrap();
        assert_eq!(
            req.url().as_str(),
            "http://127.0.0.1:9/alerts/a%2Fb%3Fc%23d/acknowledge"
        );
    }

    #[test]
    fn request_at_keeps_base_path() {
        let config = Config::local("http://127.0.0.1:9/backend").unwrap();
        let session = SessionStore::new(Arc::new(MemoryStorage::new()));
        let api = ApiClient::new(&config, session, Arc::new(LogRedirect)).unwrap();
        let req = api.request_at(Method::GET, &["api", "zones", "z1", "fire-spread"]);
        assert_eq!(
            req.build().unwrap().url().as_str(),
            "http://127.0.0.1:9/backend/api/zones/z1/fire-spread"
        );
    }
}
