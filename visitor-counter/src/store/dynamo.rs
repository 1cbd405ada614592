use super::{CounterStore, COUNT_ATTRIBUTE, KEY_ATTRIBUTE};
use crate::error::StoreError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::{
    error::{DisplayErrorContext, ProvideErrorMetadata},
    types::{AttributeValue, ReturnValue},
    Client,
};
use std::collections::HashMap;
use tracing::debug;

/// Counter records in a DynamoDB table keyed by the string attribute `id`.
#[derive(Debug, Clone)]
pub struct DynamoStore {
    client: Client,
    table_name: String,
}

impl DynamoStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Builds the client from the ambient AWS configuration (region, credentials)
    /// of the execution environment.
    pub async fn from_env(table_name: impl Into<String>) -> Self {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::new(Client::new(&sdk_config), table_name)
    }

    fn key(id: &str) -> AttributeValue {
        AttributeValue::S(id.to_owned())
    }

    /// Applies `expression` with `:operand` bound and returns the committed count.
    /// With a `ceiling`, the write only happens while the stored count is at most
    /// that value; a refused write is [`StoreError::Overflow`].
    async fn set(&self, id: &str, expression: &str, operand: u64, ceiling: Option<u64>) -> Result<u64, StoreError> {
        let mut request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(KEY_ATTRIBUTE, Self::key(id))
            .update_expression(expression)
            .expression_attribute_names("#count", COUNT_ATTRIBUTE)
            .expression_attribute_values(":operand", AttributeValue::N(operand.to_string()))
            .return_values(ReturnValue::UpdatedNew);
        if let Some(ceiling) = ceiling {
            request = request
                .condition_expression("attribute_not_exists(#count) OR #count <= :ceiling")
                .expression_attribute_values(":ceiling", AttributeValue::N(ceiling.to_string()));
        }

        let output = request.send().await.map_err(|err| {
            let err = err.into_service_error();
            if err.is_conditional_check_failed_exception() {
                StoreError::Overflow
            } else {
                StoreError::Update(describe(err))
            }
        })?;

        match output.attributes().map(count_of).transpose()?.flatten() {
            Some(count) => Ok(count),
            None => Err(StoreError::Update(format!(
                "update of {} returned no {} attribute",
                self.table_name, COUNT_ATTRIBUTE
            ))),
        }
    }
}

#[async_trait]
impl CounterStore for DynamoStore {
    async fn fetch(&self, id: &str) -> Result<Option<u64>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(KEY_ATTRIBUTE, Self::key(id))
            .consistent_read(true)
            .send()
            .await
            .map_err(|err| StoreError::Fetch(describe(err.into_service_error())))?;

        let count = match output.item() {
            Some(item) => count_of(item)?,
            None => None,
        };
        debug!(table = %self.table_name, id, ?count, "fetched counter");
        Ok(count)
    }

    async fn update(&self, id: &str, value: u64) -> Result<u64, StoreError> {
        self.set(id, "SET #count = :operand", value, None).await
    }

    async fn add(&self, id: &str, delta: u64) -> Result<u64, StoreError> {
        let ceiling = u64::MAX.checked_sub(delta).ok_or(StoreError::Overflow)?;
        self.set(id, "ADD #count :operand", delta, Some(ceiling)).await
    }
}

/// Reads `visitor_count` out of an item. An absent attribute is `None`.
fn count_of(item: &HashMap<String, AttributeValue>) -> Result<Option<u64>, StoreError> {
    match item.get(COUNT_ATTRIBUTE) {
        None => Ok(None),
        Some(AttributeValue::N(n)) => n.parse().map(Some).map_err(|_| StoreError::Malformed {
            attribute: COUNT_ATTRIBUTE,
            value: n.clone(),
        }),
        Some(other) => Err(StoreError::Malformed {
            attribute: COUNT_ATTRIBUTE,
            value: format!("{:?}", other),
        }),
    }
}

/// The service error code (e.g. `ProvisionedThroughputExceededException`) when
/// DynamoDB returned one, otherwise the full error chain.
fn describe<E>(err: E) -> String
where
    E: ProvideErrorMetadata + std::error::Error,
{
    match err.code() {
        Some(code) => code.to_owned(),
        None => DisplayErrorContext(&err).to_string(),
    }
}
