use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client as DynamoClient;

use super::attributes::{from_attribute_map, to_attribute, to_attribute_map};
use super::{item_key, Filter, Item, ItemStore, ReturnMode, StorageError, KEY_ATTRIBUTE};

/// [`ItemStore`] backed by DynamoDB tables whose partition key is `id`.
pub struct DynamoStore {
    client: DynamoClient,
}

impl DynamoStore {
    pub fn new(client: DynamoClient) -> Self {
        Self { client }
    }
}

fn transport<E>(err: E) -> StorageError
where
    E: std::error::Error + 'static,
{
    StorageError::Transport(DisplayErrorContext(&err).to_string())
}

fn key_value(key: &str) -> AttributeValue {
    AttributeValue::S(key.to_string())
}

#[async_trait]
impl ItemStore for DynamoStore {
    async fn put(&self, table: &str, item: Item) -> Result<(), StorageError> {
        let key = item_key(&item)?.to_string();

        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(to_attribute_map(&item)))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("DynamoDB put_item failed on {} for {}: {}", table, key, DisplayErrorContext(&e));
                transport(e)
            })?;

        Ok(())
    }

    async fn insert(&self, table: &str, item: Item) -> Result<(), StorageError> {
        let key = item_key(&item)?.to_string();

        let result = self
            .client
            .put_item()
            .table_name(table)
            .set_item(Some(to_attribute_map(&item)))
            .condition_expression("attribute_not_exists(#pk)")
            .expression_attribute_names("#pk", KEY_ATTRIBUTE)
            .send()
            .await;

        if let Err(e) = result {
            let taken = e
                .as_service_error()
                .map(|se| se.is_conditional_check_failed_exception())
                .unwrap_or(false);
            if taken {
                return Err(StorageError::AlreadyExists(key));
            }
            tracing::error!("DynamoDB put_item failed on {} for {}: {}", table, key, DisplayErrorContext(&e));
            return Err(transport(e));
        }

        Ok(())
    }

    async fn get(&self, table: &str, key: &str) -> Result<Option<Item>, StorageError> {
        let result = self
            .client
            .get_item()
            .table_name(table)
            .key(KEY_ATTRIBUTE, key_value(key))
            .send()
            .await
            .map_err(transport)?;

        result.item().map(from_attribute_map).transpose()
    }

    async fn update(
        &self,
        table: &str,
        key: &str,
        fields: Item,
        mode: ReturnMode,
    ) -> Result<Option<Item>, StorageError> {
        let mut update_expr = vec![];
        let mut expr_names = HashMap::new();
        let mut expr_values = HashMap::new();

        expr_names.insert("#pk".to_string(), KEY_ATTRIBUTE.to_string());

        for (i, (name, value)) in fields
            .iter()
            .filter(|(name, _)| name.as_str() != KEY_ATTRIBUTE)
            .enumerate()
        {
            update_expr.push(format!("#f{i} = :v{i}"));
            expr_names.insert(format!("#f{i}"), name.clone());
            expr_values.insert(format!(":v{i}"), to_attribute(value));
        }

        if update_expr.is_empty() {
            // Nothing to write; still honour the "record must exist" contract.
            return match self.get(table, key).await? {
                Some(item) => Ok((mode == ReturnMode::AllNew).then_some(item)),
                None => Err(StorageError::ConditionFailed(key.to_string())),
            };
        }

        let return_values = match mode {
            ReturnMode::Nothing => ReturnValue::None,
            ReturnMode::AllNew => ReturnValue::AllNew,
        };

        let mut builder = self
            .client
            .update_item()
            .table_name(table)
            .key(KEY_ATTRIBUTE, key_value(key))
            .update_expression(format!("SET {}", update_expr.join(", ")))
            .condition_expression("attribute_exists(#pk)")
            .return_values(return_values);

        for (k, v) in expr_names {
            builder = builder.expression_attribute_names(k, v);
        }

        for (k, v) in expr_values {
            builder = builder.expression_attribute_values(k, v);
        }

        let result = match builder.send().await {
            Ok(result) => result,
            Err(e) => {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if missing {
                    return Err(StorageError::ConditionFailed(key.to_string()));
                }
                tracing::error!("DynamoDB update_item failed on {} for {}: {}", table, key, DisplayErrorContext(&e));
                return Err(transport(e));
            }
        };

        match mode {
            ReturnMode::Nothing => Ok(None),
            ReturnMode::AllNew => result.attributes().map(from_attribute_map).transpose(),
        }
    }

    async fn query(&self, table: &str, filter: &Filter) -> Result<Vec<Item>, StorageError> {
        let mut filter_expr = vec![];
        let mut expr_names = HashMap::new();
        let mut expr_values = HashMap::new();

        for (i, (name, value)) in filter.conditions().iter().enumerate() {
            filter_expr.push(format!("#c{i} = :c{i}"));
            expr_names.insert(format!("#c{i}"), name.clone());
            expr_values.insert(format!(":c{i}"), to_attribute(value));
        }

        let mut items = Vec::new();
        let mut continuation: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut req = self
                .client
                .scan()
                .table_name(table)
                .set_exclusive_start_key(continuation.take());

            if !filter_expr.is_empty() {
                req = req
                    .filter_expression(filter_expr.join(" AND "))
                    .set_expression_attribute_names(Some(expr_names.clone()))
                    .set_expression_attribute_values(Some(expr_values.clone()));
            }

            let resp = req.send().await.map_err(|e| {
                tracing::error!("DynamoDB scan failed on {}: {}", table, DisplayErrorContext(&e));
                transport(e)
            })?;

            for item in resp.items() {
                items.push(from_attribute_map(item)?);
            }

            match resp.last_evaluated_key() {
                Some(last) if !last.is_empty() => continuation = Some(last.clone()),
                _ => break,
            }
        }

        Ok(items)
    }
}
