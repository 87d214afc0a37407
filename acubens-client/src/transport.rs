use acubens_common::prelude::*;
use acubens_common::{
    AcquireReply, AcquireRequest, ReleaseReply, ReleaseRequest, RenewReply, RenewRequest,
    StatusReply,
};
use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::StatusCode;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Method, Request};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// RPC seam between the reconciliation state machine and the coordinator.
///
/// Every failure mode below the protocol level (connect error, timeout,
/// unexpected status, malformed payload) surfaces as an `ErrorCode`; the
/// state machine converts it into a mode change and never into a fatal
/// error for the surrounding application.
#[async_trait]
pub trait CoordinatorTransport: Send + Sync {
    /// Capability probe and snapshot fetch issued once at session start.
    async fn probe_status(&self) -> AcuResult<StatusReply>;

    async fn acquire(&self, request: AcquireRequest) -> AcuResult<AcquireReply>;

    async fn renew(&self, request: RenewRequest) -> AcuResult<RenewReply>;

    async fn release(&self, request: ReleaseRequest) -> AcuResult<ReleaseReply>;

    /// Best-effort release for page teardown: the send is dispatched
    /// without awaiting delivery or reply. If it never arrives, the lease
    /// dies by TTL on the coordinator.
    fn release_detached(&self, request: ReleaseRequest);
}

/// HTTP transport speaking the coordinator's `/api/lock/*` surface.
pub struct HttpTransport {
    base_url: String,
    client: Client<HttpConnector>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: Client::new(),
        }
    }

    fn request_for<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> AcuResult<Request<Body>> {
        let uri = format!("{}{}", self.base_url, path);
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(body)?))?,
            None => builder.body(Body::empty())?,
        };
        Ok(request)
    }

    async fn roundtrip<R: DeserializeOwned>(&self, request: Request<Body>) -> AcuResult<R> {
        let path = request.uri().path().to_string();
        let response = self.client.request(request).await?;
        let status = response.status();
        // a denied acquire comes back as 423 Locked with a well-formed
        // body; anything else outside 2xx is a transport failure
        if !status.is_success() && status != StatusCode::LOCKED {
            return fmt_err!(Transport, "coordinator replied {} for {}", status, path);
        }
        let bytes = hyper::body::to_bytes(response.into_body()).await?;
        serde_json::from_slice(&bytes).map_err(ErrorCode::from)
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> AcuResult<R> {
        let request = self.request_for(Method::POST, path, Some(body))?;
        self.roundtrip(request).await
    }
}

#[async_trait]
impl CoordinatorTransport for HttpTransport {
    async fn probe_status(&self) -> AcuResult<StatusReply> {
        let request = self.request_for::<()>(Method::GET, "/api/lock/status", None)?;
        self.roundtrip(request).await
    }

    async fn acquire(&self, request: AcquireRequest) -> AcuResult<AcquireReply> {
        self.post_json("/api/lock/acquire", &request).await
    }

    async fn renew(&self, request: RenewRequest) -> AcuResult<RenewReply> {
        self.post_json("/api/lock/renew", &request).await
    }

    async fn release(&self, request: ReleaseRequest) -> AcuResult<ReleaseReply> {
        self.post_json("/api/lock/release", &request).await
    }

    fn release_detached(&self, request: ReleaseRequest) {
        let client = self.client.clone();
        let built = self.request_for(Method::POST, "/api/lock/release", Some(&request));
        match built {
            Ok(http_request) => {
                // not awaited past dispatch; delivery is not guaranteed
                // during page teardown
                tokio::spawn(async move {
                    if let Err(e) = client.request(http_request).await {
                        debug!("detached release not delivered: {}", e);
                    }
                });
            }
            Err(e) => debug!("detached release not dispatched: {}", e),
        }
    }
}
