use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use visitor_counter::{Config, CounterService, DynamoStore};
use visitor_http::{
    handler,
    lambda::{self, Context, Error},
    Request,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        // CloudWatch adds the ingestion time
        .without_time()
        .with_target(false)
        .init();

    let config = Config::from_env()?;
    info!(table = %config.table_name, mode = ?config.increment_mode, "starting visitor counter");

    // one client per execution environment, shared by every invocation it serves
    let store = DynamoStore::from_env(config.table_name.clone()).await;
    let service = Arc::new(CounterService::new(store, &config));

    lambda::run(handler(move |request: Request, _: Context| {
        let service = Arc::clone(&service);
        async move { Ok::<_, Error>(service.handle_increment_request(request).await) }
    }))
    .await
}
