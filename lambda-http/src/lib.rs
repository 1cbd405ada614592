#![warn(missing_docs)]
//! HTTP front door for the visitor counter function.
//!
//! API Gateway REST and HTTP APIs as well as Application Load Balancers invoke
//! the function with differently shaped JSON events. This crate folds them
//! all into [`http::Request`](https://docs.rs/http/0.2/http/request/struct.Request.html)
//! values and shapes the handler's [`http::Response`] back into whatever the
//! invoking trigger expects.
//!
//! ```rust,no_run
//! use visitor_http::{handler, lambda::{self, Context, Error}, Request, Response};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     lambda::run(handler(hello)).await
//! }
//!
//! async fn hello(_: Request, _: Context) -> Result<Response<String>, Error> {
//!     Ok(Response::new("hello".to_string()))
//! }
//! ```

pub use aws_lambda_events::encodings::Body;
pub use http::{self, Response};
pub use visitor_runtime::{self as lambda, Context, Error};

pub mod request;
mod response;

use crate::{request::RequestContext, response::LambdaResponse};
pub use crate::{request::LambdaRequest, response::IntoResponse};
use request::RequestOrigin;
use std::{
    future::Future,
    pin::Pin,
    task::{Context as TaskContext, Poll},
};

/// Type alias for `http::Request`s with a fixed [`Body`] type
pub type Request = http::Request<Body>;

/// Access to the trigger metadata carried by converted requests.
pub trait RequestExt {
    /// The API Gateway or ALB request context of this request, if it came from one.
    fn request_context(&self) -> Option<&RequestContext>;
}

impl RequestExt for Request {
    fn request_context(&self) -> Option<&RequestContext> {
        self.extensions().get::<RequestContext>()
    }
}

/// Functions serving as ALB and API Gateway REST and HTTP API handlers must conform to this type.
pub trait Handler: Sized {
    /// The type of Error that this Handler will return
    type Error;
    /// The type of Response this Handler will return
    type Response: IntoResponse;
    /// The type of Future this Handler will return
    type Fut: Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
    /// Function used to execute handler behavior
    fn call(&mut self, event: Request, context: Context) -> Self::Fut;
}

/// Adapts a [`Handler`] to the `visitor_runtime::run` interface
pub fn handler<H: Handler>(handler: H) -> Adapter<H> {
    Adapter { handler }
}

/// An implementation of `Handler` for a given closure return a `Future` representing the computed response
impl<F, R, Fut> Handler for F
where
    F: FnMut(Request, Context) -> Fut,
    R: IntoResponse,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
{
    type Response = R;
    type Error = Error;
    type Fut = Fut;
    fn call(&mut self, event: Request, context: Context) -> Self::Fut {
        (self)(event, context)
    }
}

/// Future that converts the inner handler's response into the origin's response shape.
#[doc(hidden)]
pub struct TransformResponse<R, E> {
    request_origin: RequestOrigin,
    fut: Pin<Box<dyn Future<Output = Result<R, E>> + Send>>,
}

impl<R, E> Future for TransformResponse<R, E>
where
    R: IntoResponse,
{
    type Output = Result<LambdaResponse, E>;
    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext) -> Poll<Self::Output> {
        let request_origin = self.request_origin;
        match self.fut.as_mut().poll(cx) {
            Poll::Ready(result) => Poll::Ready(
                result.map(|resp| LambdaResponse::from_response(&request_origin, resp.into_response())),
            ),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Exists only to satisfy the trait cover rule for `visitor_runtime::Handler` impl
///
/// User code should never need to interact with this type directly. Since `Adapter` implements `Handler`
/// It serves as a opaque trait covering type.
///
/// See [this article](http://smallcultfollowing.com/babysteps/blog/2015/01/14/little-orphan-impls/)
/// for a larger explanation of why this is necessary
pub struct Adapter<H: Handler> {
    handler: H,
}

impl<H: Handler> lambda::Handler<LambdaRequest, LambdaResponse> for Adapter<H> {
    type Error = H::Error;
    type Fut = TransformResponse<H::Response, Self::Error>;

    fn call(&mut self, event: LambdaRequest, context: Context) -> Self::Fut {
        let request_origin = event.request_origin();
        let fut = Box::pin(self.handler.call(event.into(), context));
        TransformResponse { request_origin, fut }
    }
}
