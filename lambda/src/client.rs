use crate::{types::Diagnostic, Error, RuntimeError};
use hyper::{client::HttpConnector, Body, Method, Request, Response, Uri};
use serde::Serialize;
use tracing::trace;

const RUNTIME_API_VERSION: &str = "2018-06-01";

/// Thin client over the Lambda Runtime API endpoints.
#[derive(Debug, Clone)]
pub(crate) struct Client {
    endpoint: String,
    client: hyper::Client<HttpConnector>,
}

impl Client {
    pub(crate) fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: hyper::Client::new(),
        }
    }

    fn uri(&self, path: &str) -> Result<Uri, Error> {
        let uri = format!("http://{}/{}/{}", self.endpoint, RUNTIME_API_VERSION, path);
        Ok(uri.parse()?)
    }

    /// Long-polls the next invocation. The Runtime API holds the request open
    /// until an event is available.
    pub(crate) async fn next_event(&self) -> Result<Response<Body>, Error> {
        let path = "runtime/invocation/next";
        let req = Request::builder()
            .method(Method::GET)
            .uri(self.uri(path)?)
            .body(Body::empty())?;
        self.send(path, req).await
    }

    pub(crate) async fn send_response<T: Serialize>(&self, request_id: &str, body: &T) -> Result<(), Error> {
        let path = format!("runtime/invocation/{}/response", request_id);
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.uri(&path)?)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(body)?))?;
        self.send(&path, req).await.map(drop)
    }

    pub(crate) async fn send_error(&self, request_id: &str, diagnostic: &Diagnostic) -> Result<(), Error> {
        let path = format!("runtime/invocation/{}/error", request_id);
        let req = Request::builder()
            .method(Method::POST)
            .uri(self.uri(&path)?)
            .header(http::header::CONTENT_TYPE, "application/json")
            .header("lambda-runtime-function-error-type", "Unhandled")
            .body(Body::from(serde_json::to_vec(diagnostic)?))?;
        self.send(&path, req).await.map(drop)
    }

    async fn send(&self, path: &str, req: Request<Body>) -> Result<Response<Body>, Error> {
        trace!(path, "calling runtime api");
        let res = self.client.request(req).await?;
        if !res.status().is_success() {
            return Err(RuntimeError::UnexpectedStatus {
                status: res.status(),
                path: path.to_owned(),
            }
            .into());
        }
        Ok(res)
    }
}
