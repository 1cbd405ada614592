use crate::{Error, RuntimeError};
use http::HeaderMap;
use serde::Serialize;
use std::{
    env,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Configuration derived from environment variables set by the Lambda service.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Config {
    /// The host and port of the Runtime API, e.g. `127.0.0.1:9001`.
    pub endpoint: String,
    /// The name of the function.
    pub function_name: String,
    /// The amount of memory available to the function in MB.
    pub memory: i32,
    /// The version of the function being executed.
    pub version: String,
    /// The name of the Amazon CloudWatch Logs stream for the function.
    pub log_stream: String,
    /// The name of the Amazon CloudWatch Logs group for the function.
    pub log_group: String,
}

impl Config {
    /// Attempts to read configuration from environment variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &'static str| lookup(name).ok_or(RuntimeError::MissingEnv(name));
        let memory = require("AWS_LAMBDA_FUNCTION_MEMORY_SIZE")?;
        let memory = memory.parse::<i32>().map_err(|_| RuntimeError::InvalidEnv {
            name: "AWS_LAMBDA_FUNCTION_MEMORY_SIZE",
            value: memory.clone(),
        })?;

        Ok(Config {
            endpoint: require("AWS_LAMBDA_RUNTIME_API")?,
            function_name: require("AWS_LAMBDA_FUNCTION_NAME")?,
            memory,
            version: require("AWS_LAMBDA_FUNCTION_VERSION")?,
            log_stream: require("AWS_LAMBDA_LOG_STREAM_NAME")?,
            log_group: require("AWS_LAMBDA_LOG_GROUP_NAME")?,
        })
    }
}

/// The Lambda function execution context. The values in this struct
/// are populated using the [Lambda environment variables](https://docs.aws.amazon.com/lambda/latest/dg/current-supported-versions.html)
/// and the headers returned by the poll request to the Runtime APIs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Context {
    /// The AWS request ID generated by the Lambda service.
    pub request_id: String,
    /// The execution deadline for the current invocation in milliseconds since the epoch.
    pub deadline: u64,
    /// The ARN of the Lambda function being invoked.
    pub invoked_function_arn: String,
    /// The X-Ray trace ID for the current invocation.
    pub xray_trace_id: Option<String>,
    /// Raw client context sent by the AWS Mobile SDK.
    pub client_context: Option<String>,
    /// Raw Cognito identity that invoked the function.
    pub identity: Option<String>,
    /// Lambda function configuration from the local environment variables.
    pub env_config: Config,
}

impl Context {
    /// The execution deadline as a point in time.
    pub fn deadline(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.deadline)
    }

    pub(crate) fn with_config(self, config: &Config) -> Self {
        Self {
            env_config: config.clone(),
            ..self
        }
    }
}

impl TryFrom<&HeaderMap> for Context {
    type Error = RuntimeError;

    fn try_from(headers: &HeaderMap) -> Result<Self, Self::Error> {
        let text = |name: &'static str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned);
        let required = |name: &'static str| text(name).ok_or(RuntimeError::MissingHeader(name));

        let deadline = required("lambda-runtime-deadline-ms")?
            .parse::<u64>()
            .map_err(|_| RuntimeError::MissingHeader("lambda-runtime-deadline-ms"))?;

        Ok(Context {
            request_id: required("lambda-runtime-aws-request-id")?,
            deadline,
            invoked_function_arn: required("lambda-runtime-invoked-function-arn")?,
            xray_trace_id: text("lambda-runtime-trace-id"),
            client_context: text("lambda-runtime-client-context"),
            identity: text("lambda-runtime-cognito-identity"),
            env_config: Config::default(),
        })
    }
}

/// Error payload reported to the Runtime API.
#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Diagnostic {
    pub(crate) error_type: String,
    pub(crate) error_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use std::collections::HashMap;

    fn invocation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("lambda-runtime-aws-request-id", HeaderValue::from_static("my-id"));
        headers.insert("lambda-runtime-deadline-ms", HeaderValue::from_static("1542409706888"));
        headers.insert(
            "lambda-runtime-invoked-function-arn",
            HeaderValue::from_static("arn:aws:lambda:us-east-2:123456789012:function:custom-runtime"),
        );
        headers
    }

    #[test]
    fn context_with_required_headers() {
        let ctx = Context::try_from(&invocation_headers()).expect("failed to parse context");
        assert_eq!(ctx.request_id, "my-id");
        assert_eq!(ctx.deadline, 1_542_409_706_888);
        assert_eq!(ctx.xray_trace_id, None);
        assert_eq!(ctx.deadline(), UNIX_EPOCH + Duration::from_millis(1_542_409_706_888));
    }

    #[test]
    fn context_with_trace_id() {
        let mut headers = invocation_headers();
        headers.insert(
            "lambda-runtime-trace-id",
            HeaderValue::from_static("Root=1-5bef4de7-ad49b0e87f6ef6c87fc2e700;Parent=9a9197af755a6419"),
        );
        let ctx = Context::try_from(&headers).expect("failed to parse context");
        assert_eq!(
            ctx.xray_trace_id.as_deref(),
            Some("Root=1-5bef4de7-ad49b0e87f6ef6c87fc2e700;Parent=9a9197af755a6419")
        );
    }

    #[test]
    fn context_without_request_id() {
        let mut headers = invocation_headers();
        headers.remove("lambda-runtime-aws-request-id");
        let err = Context::try_from(&headers).expect_err("request id is required");
        assert!(matches!(err, RuntimeError::MissingHeader("lambda-runtime-aws-request-id")));
    }

    #[test]
    fn context_with_bad_deadline() {
        let mut headers = invocation_headers();
        headers.insert("lambda-runtime-deadline-ms", HeaderValue::from_static("soon"));
        assert!(Context::try_from(&headers).is_err());
    }

    fn lambda_env() -> HashMap<&'static str, &'static str> {
        let mut env = HashMap::new();
        env.insert("AWS_LAMBDA_RUNTIME_API", "127.0.0.1:9001");
        env.insert("AWS_LAMBDA_FUNCTION_NAME", "visitor-counter");
        env.insert("AWS_LAMBDA_FUNCTION_MEMORY_SIZE", "128");
        env.insert("AWS_LAMBDA_FUNCTION_VERSION", "$LATEST");
        env.insert("AWS_LAMBDA_LOG_STREAM_NAME", "2021/01/01/[$LATEST]abc");
        env.insert("AWS_LAMBDA_LOG_GROUP_NAME", "/aws/lambda/visitor-counter");
        env
    }

    #[test]
    fn config_from_lambda_environment() {
        let env = lambda_env();
        let config = Config::from_lookup(|name| env.get(name).map(|v| v.to_string())).expect("failed to load config");
        assert_eq!(config.endpoint, "127.0.0.1:9001");
        assert_eq!(config.function_name, "visitor-counter");
        assert_eq!(config.memory, 128);
    }

    #[test]
    fn config_requires_runtime_api() {
        let mut env = lambda_env();
        env.remove("AWS_LAMBDA_RUNTIME_API");
        let err = Config::from_lookup(|name| env.get(name).map(|v| v.to_string())).expect_err("endpoint is required");
        assert_eq!(err.to_string(), "missing environment variable AWS_LAMBDA_RUNTIME_API");
    }

    #[test]
    fn config_rejects_non_numeric_memory() {
        let mut env = lambda_env();
        env.insert("AWS_LAMBDA_FUNCTION_MEMORY_SIZE", "lots");
        assert!(Config::from_lookup(|name| env.get(name).map(|v| v.to_string())).is_err());
    }

    #[test]
    fn diagnostic_serializes_in_camel_case() {
        let diagnostic = Diagnostic {
            error_type: "my::Error".into(),
            error_message: "boom".into(),
        };
        assert_eq!(
            serde_json::to_string(&diagnostic).expect("failed to serialize diagnostic"),
            r#"{"errorType":"my::Error","errorMessage":"boom"}"#
        );
    }
}
