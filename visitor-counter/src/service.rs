//! The counter service: one increment per invocation, one JSON response back.

use crate::{
    config::{Config, IncrementMode},
    cors::CorsHeaders,
    error::StoreError,
    store::{CounterStore, COUNTER_ID},
};
use http::StatusCode;
use serde_json::{json, Value};
use tracing::{error, info};
use visitor_http::{Body, Request, Response};

#[derive(Debug)]
pub struct CounterService<S> {
    store: S,
    mode: IncrementMode,
    cors: CorsHeaders,
}

impl<S: CounterStore> CounterService<S> {
    pub fn new(store: S, config: &Config) -> Self {
        Self {
            store,
            mode: config.increment_mode,
            cors: CorsHeaders::new(config.allowed_origin.clone()),
        }
    }

    /// Increments the visitor counter and reports the committed value.
    ///
    /// The request itself is not inspected: every invocation counts as one
    /// visit. Store failures turn into a 500 response instead of an error, so
    /// the caller always receives a JSON body with the CORS headers attached.
    pub async fn handle_increment_request(&self, _request: Request) -> Response<Body> {
        match self.increment().await {
            Ok(count) => {
                info!(count, "visitor counter incremented");
                self.respond(StatusCode::OK, json!({ "Count": count }))
            }
            Err(err) => {
                error!(error = %err, "failed to increment visitor counter");
                self.respond(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": err.to_string() }))
            }
        }
    }

    /// Advances the counter once and returns the value the store committed.
    pub async fn increment(&self) -> Result<u64, StoreError> {
        match self.mode {
            IncrementMode::Atomic => self.store.add(COUNTER_ID, 1).await,
            IncrementMode::ReadModifyWrite => {
                let current = self.store.fetch(COUNTER_ID).await?.unwrap_or(0);
                let next = current.checked_add(1).ok_or(StoreError::Overflow)?;
                self.store.update(COUNTER_ID, next).await
            }
        }
    }

    fn respond(&self, status: StatusCode, body: Value) -> Response<Body> {
        let mut response = Response::new(Body::from(body.to_string()));
        *response.status_mut() = status;
        self.cors.apply(response.headers_mut());
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use http::HeaderValue;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn config(mode: IncrementMode) -> Config {
        Config {
            table_name: "visitor-count".into(),
            allowed_origin: HeaderValue::from_static("https://thomaskjohn.com"),
            increment_mode: mode,
        }
    }

    fn body_json(response: &Response<Body>) -> Value {
        match response.body() {
            Body::Text(text) => serde_json::from_str(text).expect("body is not json"),
            _ => panic!("expected a text body"),
        }
    }

    fn assert_fixed_headers(response: &Response<Body>) {
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-headers"], "Content-Type");
        assert_eq!(headers["access-control-allow-origin"], "https://thomaskjohn.com");
        assert_eq!(headers["access-control-allow-methods"], "OPTIONS,POST,GET");
        assert_eq!(headers["content-type"], "application/json");
    }

    /// Store that fails `fetch` and/or `update` with a fixed description and
    /// counts the writes it was asked to make.
    #[derive(Default)]
    struct FaultyStore {
        inner: MemoryStore,
        fetch_error: Option<&'static str>,
        update_error: Option<&'static str>,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl CounterStore for FaultyStore {
        async fn fetch(&self, id: &str) -> Result<Option<u64>, StoreError> {
            match self.fetch_error {
                Some(err) => Err(StoreError::Fetch(err.into())),
                None => self.inner.fetch(id).await,
            }
        }

        async fn update(&self, id: &str, value: u64) -> Result<u64, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            match self.update_error {
                Some(err) => Err(StoreError::Update(err.into())),
                None => self.inner.update(id, value).await,
            }
        }

        async fn add(&self, id: &str, delta: u64) -> Result<u64, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            match self.update_error {
                Some(err) => Err(StoreError::Update(err.into())),
                None => self.inner.add(id, delta).await,
            }
        }
    }

    #[tokio::test]
    async fn first_visit_counts_one() {
        for mode in &[IncrementMode::Atomic, IncrementMode::ReadModifyWrite] {
            let service = CounterService::new(MemoryStore::new(), &config(*mode));
            let response = service.handle_increment_request(Request::default()).await;

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_json(&response), json!({ "Count": 1 }));
            assert_fixed_headers(&response);
        }
    }

    #[tokio::test]
    async fn existing_count_is_incremented_and_stored() {
        for mode in &[IncrementMode::Atomic, IncrementMode::ReadModifyWrite] {
            let store = Arc::new(MemoryStore::with_counter(COUNTER_ID, 41));
            let service = CounterService::new(Arc::clone(&store), &config(*mode));
            let response = service.handle_increment_request(Request::default()).await;

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_json(&response), json!({ "Count": 42 }));
            assert_eq!(store.fetch(COUNTER_ID).await, Ok(Some(42)));
        }
    }

    #[tokio::test]
    async fn sequential_invocations_add_up() {
        let store = Arc::new(MemoryStore::with_counter(COUNTER_ID, 10));
        let service = CounterService::new(Arc::clone(&store), &config(IncrementMode::ReadModifyWrite));
        for expected in 11..=15u64 {
            let response = service.handle_increment_request(Request::default()).await;
            assert_eq!(body_json(&response), json!({ "Count": expected }));
        }
        assert_eq!(store.fetch(COUNTER_ID).await, Ok(Some(15)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn atomic_mode_loses_no_concurrent_increments() {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(CounterService::new(Arc::clone(&store), &config(IncrementMode::Atomic)));

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.handle_increment_request(Request::default()).await })
            })
            .collect();
        for task in tasks {
            let response = task.await.expect("invocation panicked");
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(store.fetch(COUNTER_ID).await, Ok(Some(64)));
    }

    #[tokio::test]
    async fn fetch_failure_is_a_500_without_count() {
        let store = FaultyStore {
            fetch_error: Some("ProvisionedThroughputExceededException"),
            ..FaultyStore::default()
        };
        let service = CounterService::new(store, &config(IncrementMode::ReadModifyWrite));
        let response = service.handle_increment_request(Request::default()).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(&response),
            json!({ "error": "ProvisionedThroughputExceededException" })
        );
        assert_fixed_headers(&response);
        assert_eq!(service.store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn update_failure_is_a_500_without_count() {
        let store = FaultyStore {
            update_error: Some("AccessDeniedException"),
            ..FaultyStore::default()
        };
        let service = CounterService::new(store, &config(IncrementMode::ReadModifyWrite));
        let response = service.handle_increment_request(Request::default()).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(&response);
        assert_eq!(body, json!({ "error": "AccessDeniedException" }));
        assert!(body.get("Count").is_none());
        assert_fixed_headers(&response);
        assert_eq!(service.store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn atomic_failure_is_a_500() {
        let store = FaultyStore {
            update_error: Some("ResourceNotFoundException"),
            ..FaultyStore::default()
        };
        let service = CounterService::new(store, &config(IncrementMode::Atomic));
        let response = service.handle_increment_request(Request::default()).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(&response), json!({ "error": "ResourceNotFoundException" }));
        assert_eq!(service.store.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn overflow_is_reported_not_wrapped() {
        let store = Arc::new(MemoryStore::with_counter(COUNTER_ID, u64::MAX));
        let service = CounterService::new(Arc::clone(&store), &config(IncrementMode::ReadModifyWrite));
        let response = service.handle_increment_request(Request::default()).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(&response), json!({ "error": "visitor_count overflow" }));
        assert_eq!(store.fetch(COUNTER_ID).await, Ok(Some(u64::MAX)));
    }
}
