//! Audit recording middleware
//!
//! Every request outside the ignored path prefixes gets one audit entry:
//! - inputs are recorded before the inner service runs
//! - the entry id is handed to handlers as an [`AuditEntryId`] extension
//! - timing, memory and response headers are recorded once it returns
//!
//! Recording failures are logged by the recorder and never alter the response.
//! A body that fails while being buffered reaches the handler with the same
//! error.

use axum::{
    body::{Body, Bytes},
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use http_body::{Body as HttpBody, Frame};
use http_body_util::BodyExt;
use reqtrail_core::context::{CaptureContext, RequestKind, ResponseContext};
use reqtrail_core::probe::now_seconds;
use reqtrail_core::AuditRecorder;
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::extract::{wants_body, web_request, AuditEntryId, BodyCapture, RequestStart};
use crate::config::AuditConfig;

/// Audit recording layer
#[derive(Clone)]
pub struct AuditLayer {
    recorder: AuditRecorder,
    config: Arc<AuditConfig>,
}

impl AuditLayer {
    pub fn new(recorder: AuditRecorder, config: AuditConfig) -> Self {
        Self {
            recorder,
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for AuditLayer {
    type Service = AuditMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuditMiddleware {
            inner,
            recorder: self.recorder.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

/// Audit middleware service
#[derive(Clone)]
pub struct AuditMiddleware<S> {
    inner: S,
    recorder: AuditRecorder,
    config: Arc<AuditConfig>,
}

impl<S> Service<Request> for AuditMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let mut inner = self.inner.clone();
        let recorder = self.recorder.clone();
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            if config.is_ignored(request.uri().path()) {
                return inner.call(request).await;
            }

            let started_at = request
                .extensions()
                .get::<RequestStart>()
                .map(|s| s.0)
                .unwrap_or_else(now_seconds);
            let route = request
                .extensions()
                .get::<MatchedPath>()
                .map(|p| p.as_str().to_string());

            let (parts, body) = request.into_parts();
            let (capture, body) = if wants_body(&parts.headers, config.max_body_bytes) {
                match body.collect().await {
                    Ok(collected) => {
                        let bytes = collected.to_bytes();
                        let capture = BodyCapture::read(&parts.headers, bytes.clone()).await;
                        (capture, Body::from(bytes))
                    },
                    Err(e) => {
                        warn!(uri = %parts.uri, error = %e, "Failed to capture request body");
                        (BodyCapture::default(), Body::new(FailedBody(Some(e))))
                    },
                }
            } else {
                (BodyCapture::default(), body)
            };

            let mut context = CaptureContext::new(
                started_at,
                RequestKind::Web(web_request(&parts, capture, started_at)),
            );
            context.route = route;

            let mut entry = recorder.begin(&context).await;
            let mut request = Request::from_parts(parts, body);
            if let Some(id) = entry.id() {
                request.extensions_mut().insert(AuditEntryId(id));
            }

            let response = inner.call(request).await?;

            let response_context = ResponseContext {
                status: Some(response.status().as_u16()),
                headers: response.headers().clone(),
            };
            let saved = entry.finalize(Some(&response_context)).await;

            debug!(
                entry_id = ?entry.id(),
                status = %response.status(),
                saved,
                "Request audited"
            );

            Ok(response)
        })
    }
}

/// Record when the request reached the server, unless an outer layer
/// already did
pub async fn stamp_request_start(mut request: Request, next: Next) -> Response {
    if request.extensions().get::<RequestStart>().is_none() {
        request.extensions_mut().insert(RequestStart(now_seconds()));
    }
    next.run(request).await
}

/// Replays the error hit while buffering a request body
#[derive(Debug)]
struct FailedBody(Option<axum::Error>);

impl HttpBody for FailedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Ready(self.0.take().map(Err))
    }

    fn is_end_stream(&self) -> bool {
        self.0.is_none()
    }
}
