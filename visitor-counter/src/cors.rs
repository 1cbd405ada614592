use http::{
    header::{
        HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
        CONTENT_TYPE,
    },
    HeaderMap,
};

/// The header set attached to every counter response, success or failure.
///
/// Names go out lowercased (`access-control-allow-origin`); `http` normalises
/// them and header names are case-insensitive on the wire.
#[derive(Debug, Clone)]
pub struct CorsHeaders {
    allow_origin: HeaderValue,
}

impl CorsHeaders {
    pub fn new(allow_origin: HeaderValue) -> Self {
        Self { allow_origin }
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("OPTIONS,POST,GET"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
}
