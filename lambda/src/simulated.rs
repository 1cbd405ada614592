//! An in-process stand-in for the Lambda Runtime API.
//!
//! Events queued with [`Server::invoke`] are handed out on
//! `GET /2018-06-01/runtime/invocation/next`; whatever the runtime posts back
//! is recorded and can be read with [`Server::outcome`].

use crate::{Config, Error};
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, StatusCode,
};
use serde_json::Value;
use std::{
    collections::{HashMap, VecDeque},
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::sync::{Mutex, Notify};
use tracing::{debug, error};

const INVOCATION_TIMEOUT: Duration = Duration::from_secs(30);

/// What the runtime reported for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Body posted to `/invocation/{id}/response`.
    Response(Value),
    /// Body posted to `/invocation/{id}/error`.
    Error(Value),
}

#[derive(Default)]
struct State {
    next_id: AtomicU64,
    pending: Mutex<VecDeque<(String, Value)>>,
    ready: Notify,
    outcomes: Mutex<HashMap<String, Outcome>>,
}

/// A running Runtime API emulator bound to a local ephemeral port.
pub struct Server {
    addr: SocketAddr,
    state: Arc<State>,
}

impl Server {
    /// Binds the emulator on `127.0.0.1` and serves it on the current tokio runtime.
    pub async fn start() -> Result<Self, Error> {
        let state = Arc::new(State::default());
        let shared = Arc::clone(&state);
        let make_svc = make_service_fn(move |_conn| {
            let state = Arc::clone(&shared);
            async move { Ok::<_, Infallible>(service_fn(move |req| route(Arc::clone(&state), req))) }
        });

        let server = hyper::Server::try_bind(&SocketAddr::from(([127, 0, 0, 1], 0)))?.serve(make_svc);
        let addr = server.local_addr();
        tokio::spawn(async move {
            if let Err(err) = server.await {
                error!(error = %err, "simulated runtime api stopped");
            }
        });
        debug!(%addr, "simulated runtime api listening");

        Ok(Self { addr, state })
    }

    /// Runtime configuration pointing at this emulator.
    pub fn config(&self) -> Config {
        Config {
            endpoint: self.addr.to_string(),
            function_name: "simulated".into(),
            memory: 128,
            version: "$LATEST".into(),
            log_stream: "simulated".into(),
            log_group: "/aws/lambda/simulated".into(),
        }
    }

    /// Queues an event and returns the request id it will be delivered with.
    pub async fn invoke(&self, event: Value) -> String {
        let n = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        let request_id = format!("simulated-{}", n);
        self.state.pending.lock().await.push_back((request_id.clone(), event));
        self.state.ready.notify_one();
        request_id
    }

    /// The response or error posted for `request_id`, if any.
    pub async fn outcome(&self, request_id: &str) -> Option<Outcome> {
        self.state.outcomes.lock().await.get(request_id).cloned()
    }
}

async fn route(state: Arc<State>, req: Request<Body>) -> Result<Response<Body>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    match (method, segments.as_slice()) {
        (Method::GET, ["2018-06-01", "runtime", "invocation", "next"]) => Ok(next(&state).await),
        (Method::POST, ["2018-06-01", "runtime", "invocation", request_id, kind]) => {
            let body = hyper::body::to_bytes(req.into_body()).await?;
            let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
            let outcome = match *kind {
                "response" => Outcome::Response(body),
                "error" => Outcome::Error(body),
                _ => return Ok(status(StatusCode::NOT_FOUND)),
            };
            state.outcomes.lock().await.insert((*request_id).to_owned(), outcome);
            Ok(status(StatusCode::ACCEPTED))
        }
        _ => Ok(status(StatusCode::NOT_FOUND)),
    }
}

async fn next(state: &State) -> Response<Body> {
    loop {
        if let Some((request_id, event)) = state.pending.lock().await.pop_front() {
            let deadline = SystemTime::now()
                .checked_add(INVOCATION_TIMEOUT)
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_millis())
                .unwrap_or_default();
            let mut res = Response::new(Body::from(event.to_string()));
            let headers = res.headers_mut();
            headers.insert("lambda-runtime-aws-request-id", header(&request_id));
            headers.insert("lambda-runtime-deadline-ms", header(&deadline.to_string()));
            headers.insert(
                "lambda-runtime-invoked-function-arn",
                header("arn:aws:lambda:us-east-1:000000000000:function:simulated"),
            );
            headers.insert(
                "lambda-runtime-trace-id",
                header("Root=1-00000000-000000000000000000000000;Parent=0000000000000000;Sampled=0"),
            );
            return res;
        }
        state.ready.notified().await;
    }
}

fn header(value: &str) -> http::HeaderValue {
    http::HeaderValue::from_str(value).unwrap_or_else(|_| http::HeaderValue::from_static(""))
}

fn status(code: StatusCode) -> Response<Body> {
    let mut res = Response::new(Body::empty());
    *res.status_mut() = code;
    res
}
