//! ALB and API Gateway request adaptations
//!
//! Every supported trigger is folded into a plain `http::Request<Body>`. The
//! trigger-specific metadata travels along as a [`RequestContext`] extension.
//!
use aws_lambda_events::encodings::Body;
use aws_lambda_events::event::alb::{AlbTargetGroupRequest, AlbTargetGroupRequestContext};
use aws_lambda_events::event::apigw::{
    ApiGatewayProxyRequest, ApiGatewayProxyRequestContext, ApiGatewayV2httpRequest, ApiGatewayV2httpRequestContext,
};
use http::{
    header::{HeaderName, HeaderValue, COOKIE, HOST},
    HeaderMap, Method,
};
use serde::Deserialize;
use serde_json::error::Error as JsonError;
use std::{collections::HashMap, io::Read, mem};

/// Internal representation of an Lambda http event from
/// ALB, API Gateway REST and HTTP API proxy event perspectives
///
/// Serde tries the variants in declaration order.
#[doc(hidden)]
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum LambdaRequest {
    ApiGatewayV1(ApiGatewayProxyRequest),
    ApiGatewayV2(ApiGatewayV2httpRequest),
    Alb(AlbTargetGroupRequest),
}

impl LambdaRequest {
    /// The trigger this event came from, which decides the response shape.
    pub fn request_origin(&self) -> RequestOrigin {
        match self {
            LambdaRequest::ApiGatewayV1 { .. } => RequestOrigin::ApiGatewayV1,
            LambdaRequest::ApiGatewayV2 { .. } => RequestOrigin::ApiGatewayV2,
            LambdaRequest::Alb { .. } => RequestOrigin::Alb,
        }
    }
}

/// Represents the origin from which the lambda was requested from.
#[doc(hidden)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    /// API Gateway proxy request origin
    ApiGatewayV1,
    /// API Gateway v2 request origin
    ApiGatewayV2,
    /// ALB request origin
    Alb,
}

/// Event request context as an enumeration of request contexts
/// for both ALB and API Gateway and HTTP API events
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum RequestContext {
    /// API Gateway proxy request context
    ApiGatewayV1(ApiGatewayProxyRequestContext),
    /// API Gateway v2 request context
    ApiGatewayV2(ApiGatewayV2httpRequestContext),
    /// ALB request context
    Alb(AlbTargetGroupRequestContext),
}

impl From<LambdaRequest> for http::Request<Body> {
    fn from(value: LambdaRequest) -> Self {
        match value {
            LambdaRequest::ApiGatewayV1(ag) => {
                // multi-value headers are a superset of the single value ones;
                // merge both and treat the result as the canonical header set
                let mut headers = ag.multi_value_headers;
                headers.extend(ag.headers);
                let query = encode_query(ag.query_string_parameters, ag.multi_value_query_string_parameters);
                let uri = uri(&headers, None, ag.path.as_deref(), query.as_deref());
                Parts {
                    method: ag.http_method,
                    uri,
                    headers,
                    body: decode_body(ag.is_base64_encoded.unwrap_or_default(), ag.body),
                    context: RequestContext::ApiGatewayV1(ag.request_context),
                }
                .into_request()
            }
            LambdaRequest::ApiGatewayV2(ag) => {
                let mut headers = ag.headers;
                if let Some(cookies) = ag.cookies {
                    if let Ok(value) = HeaderValue::from_str(&cookies.join(";")) {
                        headers.append(COOKIE, value);
                    }
                }
                let uri = uri(
                    &headers,
                    ag.request_context.domain_name.as_deref(),
                    ag.raw_path.as_deref(),
                    ag.raw_query_string.as_deref(),
                );
                Parts {
                    method: ag.request_context.http.method.clone(),
                    uri,
                    headers,
                    body: decode_body(ag.is_base64_encoded, ag.body),
                    context: RequestContext::ApiGatewayV2(ag.request_context),
                }
                .into_request()
            }
            LambdaRequest::Alb(alb) => {
                let mut headers = alb.multi_value_headers;
                headers.extend(alb.headers);
                let query = encode_query(alb.query_string_parameters, alb.multi_value_query_string_parameters);
                let uri = uri(&headers, None, alb.path.as_deref(), query.as_deref());
                Parts {
                    method: alb.http_method,
                    uri,
                    headers,
                    body: decode_body(alb.is_base64_encoded, alb.body),
                    context: RequestContext::Alb(alb.request_context),
                }
                .into_request()
            }
        }
    }
}

struct Parts {
    method: Method,
    uri: String,
    headers: HeaderMap,
    body: Body,
    context: RequestContext,
}

impl Parts {
    fn into_request(self) -> http::Request<Body> {
        let mut req = http::Request::new(self.body);
        // an unparsable path leaves the default `/` in place
        if let Ok(uri) = self.uri.parse() {
            *req.uri_mut() = uri;
        }
        // no builder method that sets headers in batch
        let _ = mem::replace(req.headers_mut(), self.headers);
        *req.method_mut() = self.method;
        req.extensions_mut().insert(self.context);
        req
    }
}

fn uri(headers: &HeaderMap, domain_name: Option<&str>, path: Option<&str>, query: Option<&str>) -> String {
    let scheme = headers
        .get(x_forwarded_proto())
        .and_then(|s| s.to_str().ok())
        .unwrap_or("https");
    let host = headers
        .get(HOST)
        .and_then(|s| s.to_str().ok())
        .or(domain_name)
        .unwrap_or("localhost");

    let mut url = format!("{}://{}{}", scheme, host, path.unwrap_or_default());
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// REST and ALB events deliver the query string already parsed. Multi-valued
/// parameters are a superset of the single-valued ones and win when present.
fn encode_query(single: HashMap<String, String>, multi: HashMap<String, Vec<String>>) -> Option<String> {
    let mut pairs: Vec<(String, String)> = if multi.is_empty() {
        single.into_iter().collect()
    } else {
        multi
            .into_iter()
            .flat_map(|(name, values)| values.into_iter().map(move |value| (name.clone(), value)))
            .collect()
    };
    // map order is arbitrary; the sort is stable so repeated values keep their order
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    serde_urlencoded::to_string(&pairs).ok()
}

fn decode_body(is_base64_encoded: bool, body: Option<String>) -> Body {
    match body {
        None => Body::Empty,
        Some(body) if body.is_empty() => Body::Empty,
        Some(body) if is_base64_encoded => match base64::decode(&body) {
            Ok(bytes) => Body::Binary(bytes),
            Err(_) => Body::Text(body),
        },
        Some(body) => Body::Text(body),
    }
}

/// Deserializes a `Request` from a `Read` impl providing JSON events.
///
/// # Example
///
/// ```rust,no_run
/// use visitor_http::request::from_reader;
/// use std::fs::File;
/// use std::error::Error;
///
/// fn main() -> Result<(), Box<dyn Error>> {
///     let request = from_reader(
///         File::open("path/to/request.json")?
///     )?;
///     Ok(println!("{:#?}", request))
/// }
/// ```
pub fn from_reader<R>(rdr: R) -> Result<crate::Request, JsonError>
where
    R: Read,
{
    serde_json::from_reader(rdr).map(LambdaRequest::into)
}

/// Deserializes a `Request` from a string of JSON text.
pub fn from_str(s: &str) -> Result<crate::Request, JsonError> {
    serde_json::from_str(s).map(LambdaRequest::into)
}

fn x_forwarded_proto() -> HeaderName {
    HeaderName::from_static("x-forwarded-proto")
}
