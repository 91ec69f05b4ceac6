//! Purpose: Provide the HTTP client for the Collavo API.
//! Exports: `ApiClient`, `PendingInvitationsPage`.
//! Role: Transport layer feeding the guarded-fetch contract in `guard`.
//! Invariants: Transport failures propagate unclassified; only HTTP-status
//! failures reach the error classifier.
//! Invariants: Base URLs are root-only (scheme + authority), http or https.
#![allow(clippy::result_large_err)]

use crate::api::guard::{ErrorClassifier, GuardedJson, ProjectGuard, resolve_failure};
use crate::core::error::{Error, ErrorKind};
use crate::core::invitations::PendingInvitation;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use url::Url;

type ApiResult<T> = Result<T, Error>;

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    base_url: Url,
    token: Option<String>,
    agent: ureq::Agent,
    classifier: Arc<dyn ErrorClassifier>,
}

/// Payload of `GET /api/invitations/pending`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct PendingInvitationsPage {
    pub invitations: Vec<PendingInvitation>,
    pub count: u64,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let agent = ureq::AgentBuilder::new().build();
        Ok(Self {
            inner: Arc::new(ApiClientInner {
                base_url,
                token: None,
                agent,
                classifier: Arc::new(ProjectGuard::detached()),
            }),
        })
    }

    pub fn with_token(self, token: impl Into<String>) -> Self {
        let token = Some(token.into());
        self.map_inner(|inner| ApiClientInner { token, ..inner })
    }

    pub fn with_classifier(self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.map_inner(|inner| ApiClientInner { classifier, ..inner })
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn pending_invitations(&self) -> ApiResult<GuardedJson<PendingInvitationsPage>> {
        self.fetch_json_guarded("GET", &["api", "invitations", "pending"], None, None)
    }

    /// Perform a request and interpret the response under the guard
    /// contract: 2xx parses as `T`; non-2xx is classified and either
    /// resolves as already handled or errors; transport failures error
    /// unmodified. No retry, no timeout beyond the agent's own.
    pub fn fetch_json_guarded<T>(
        &self,
        method: &str,
        segments: &[&str],
        body: Option<&serde_json::Value>,
        on_permission_refresh: Option<&dyn Fn()>,
    ) -> ApiResult<GuardedJson<T>>
    where
        T: DeserializeOwned,
    {
        let url = build_url(&self.inner.base_url, segments)?;
        let request = self.request(method, &url).set("Accept", "application/json");
        let response = match body {
            None => request.call(),
            Some(value) => {
                let payload = serde_json::to_string(value).map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to encode request json")
                        .with_source(err)
                })?;
                request
                    .set("Content-Type", "application/json")
                    .send_string(&payload)
            }
        };

        match response {
            Ok(resp) => {
                let data = read_json_response(resp)?;
                Ok(GuardedJson::parsed(data))
            }
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                resolve_failure(
                    self.inner.classifier.as_ref(),
                    code,
                    &body,
                    on_permission_refresh,
                )
            }
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message("request failed")
                .with_source(err)),
        }
    }

    fn request(&self, method: &str, url: &Url) -> ureq::Request {
        let mut request = self.inner.agent.request(method, url.as_str());
        if let Some(token) = &self.inner.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        request
    }

    fn map_inner(mut self, apply: impl FnOnce(ApiClientInner) -> ApiClientInner) -> Self {
        let inner = match Arc::try_unwrap(self.inner) {
            Ok(inner) => inner,
            Err(shared) => ApiClientInner {
                base_url: shared.base_url.clone(),
                token: shared.token.clone(),
                agent: shared.agent.clone(),
                classifier: Arc::clone(&shared.classifier),
            },
        };
        self.inner = Arc::new(apply(inner));
        self
    }
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid api base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(
            Error::new(ErrorKind::Usage).with_message("api base url must use http or https scheme")
        );
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(
            Error::new(ErrorKind::Usage).with_message("api base url must not include a path")
        );
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base_url: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| Error::new(ErrorKind::Usage).with_message("api base url cannot be a base"))?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn read_json_response<R>(response: ureq::Response) -> ApiResult<R>
where
    R: DeserializeOwned,
{
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("invalid response json")
            .with_source(err)
    })
}
