#![deny(missing_docs)]

//! The Lambda Runtime API client the visitor counter function runs on.
//!
//! A handler is any type implementing [`Handler`]; plain async functions are
//! lifted with [`handler_fn`]. [`run`] reads the function configuration from
//! the environment and then serves invocations until the process is frozen
//! or the Runtime API reports an error.
//!
//! ```no_run
//! use serde_json::Value;
//! use visitor_runtime::{handler_fn, run, Context, Error};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     run(handler_fn(echo)).await
//! }
//!
//! async fn echo(event: Value, _: Context) -> Result<Value, Error> {
//!     Ok(event)
//! }
//! ```

use futures_core::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future};
use tracing::{error, info_span, trace};
use tracing_futures::Instrument;

mod client;
mod error;
#[cfg(feature = "simulated")]
pub mod simulated;
mod types;

use client::Client;
pub use error::RuntimeError;
pub use types::{Config, Context};
use types::Diagnostic;

/// Error type that handlers and the runtime return.
pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A trait describing an asynchronous function `A` to `B`.
pub trait Handler<A, B> {
    /// Errors returned by this handler.
    type Error;
    /// Response of this handler.
    type Fut: Future<Output = Result<B, Self::Error>>;
    /// Handle the incoming event.
    fn call(&mut self, event: A, context: Context) -> Self::Fut;
}

/// Returns a new [`HandlerFn`] with the given closure.
pub fn handler_fn<F>(f: F) -> HandlerFn<F> {
    HandlerFn { f }
}

/// A [`Handler`] implemented by a closure.
#[derive(Clone, Debug)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F, A, B, E, Fut> Handler<A, B> for HandlerFn<F>
where
    F: Fn(A, Context) -> Fut,
    Fut: Future<Output = Result<B, E>>,
    E: fmt::Display,
{
    type Error = E;
    type Fut = Fut;
    fn call(&mut self, event: A, context: Context) -> Self::Fut {
        (self.f)(event, context)
    }
}

/// Starts the Lambda runtime and begins polling for events on the
/// [Lambda Runtime APIs](https://docs.aws.amazon.com/lambda/latest/dg/runtimes-api.html).
pub async fn run<A, B, F>(handler: F) -> Result<(), Error>
where
    F: Handler<A, B>,
    F::Error: fmt::Display,
    A: for<'de> Deserialize<'de>,
    B: Serialize,
{
    let config = Config::from_env()?;
    Runtime::new(config).run(handler).await
}

/// A runtime bound to one Runtime API endpoint.
#[derive(Debug)]
pub struct Runtime {
    client: Client,
    config: Config,
}

impl Runtime {
    /// Creates a runtime talking to `config.endpoint`.
    pub fn new(config: Config) -> Self {
        Self {
            client: Client::new(config.endpoint.clone()),
            config,
        }
    }

    /// Serves invocations until the Runtime API fails.
    pub async fn run<A, B, F>(&self, handler: F) -> Result<(), Error>
    where
        F: Handler<A, B>,
        F::Error: fmt::Display,
        A: for<'de> Deserialize<'de>,
        B: Serialize,
    {
        self.serve(incoming(&self.client), handler).await
    }

    /// Serves exactly `invocations` invocations, then returns.
    pub async fn run_for<A, B, F>(&self, handler: F, invocations: usize) -> Result<(), Error>
    where
        F: Handler<A, B>,
        F::Error: fmt::Display,
        A: for<'de> Deserialize<'de>,
        B: Serialize,
    {
        self.serve(incoming(&self.client).take(invocations), handler).await
    }

    async fn serve<S, A, B, F>(&self, incoming: S, mut handler: F) -> Result<(), Error>
    where
        S: Stream<Item = Result<http::Response<hyper::Body>, Error>>,
        F: Handler<A, B>,
        F::Error: fmt::Display,
        A: for<'de> Deserialize<'de>,
        B: Serialize,
    {
        tokio::pin!(incoming);
        while let Some(event) = incoming.next().await {
            let (parts, body) = event?.into_parts();
            let ctx = Context::try_from(&parts.headers)?.with_config(&self.config);
            let body: bytes::Bytes = hyper::body::to_bytes(body).await?;
            let request_id = ctx.request_id.clone();

            if let Some(trace_id) = &ctx.xray_trace_id {
                std::env::set_var("_X_AMZN_TRACE_ID", trace_id);
            }

            let span = info_span!("invocation", request_id = %request_id);
            let outcome = async {
                trace!(bytes = body.len(), "received event");
                let mut de = serde_json::Deserializer::from_slice(&body);
                let event: A = match serde_path_to_error::deserialize(&mut de) {
                    Ok(event) => event,
                    Err(err) => {
                        error!(error = %err, "failed to deserialize event");
                        return Err(diagnostic(&err));
                    }
                };
                match handler.call(event, ctx).await {
                    Ok(response) => Ok(response),
                    Err(err) => {
                        error!(error = %err, "handler failed");
                        Err(diagnostic(&err))
                    }
                }
            }
            .instrument(span)
            .await;

            match outcome {
                Ok(response) => self.client.send_response(&request_id, &response).await?,
                Err(diagnostic) => self.client.send_error(&request_id, &diagnostic).await?,
            }
        }
        Ok(())
    }
}

fn diagnostic<E: fmt::Display>(err: &E) -> Diagnostic {
    Diagnostic {
        error_type: std::any::type_name::<E>().to_owned(),
        error_message: err.to_string(),
    }
}

fn incoming(client: &Client) -> impl Stream<Item = Result<http::Response<hyper::Body>, Error>> + '_ {
    async_stream::stream! {
        loop {
            trace!("waiting for next event");
            yield client.next_event().await;
        }
    }
}
