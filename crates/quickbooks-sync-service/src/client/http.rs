//! 基于 reqwest 的 QuickBooks HTTP 客户端
//!
//! 访问 QuickBooks Online v3 形态的 JSON API：
//! - 查询：`GET /v3/company/{realm}/query?query=select * from Item where Name = '...'`
//! - 创建/更新：`POST /v3/company/{realm}/{entity}`，作废附加 `?operation=void`
//! - 读取：`GET /v3/company/{realm}/{entity}/{id}`
//! - 同步状态：`GET /v3/company/{realm}/syncstatus/{domain}/{id}`
//! - 消息日志：`GET /v3/company/{realm}/messages`

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use qbsync_shared::config::QuickbooksConfig;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::AccountingClient;
use super::wire::{
    WireFaultEnvelope, WireItem, WireMessage, WireNamed, WireNewCustomer, WireNewPaymentMethod,
    WireReceipt, WireSyncStatus,
};
use crate::error::{Result, SyncError};
use crate::models::{
    EntityKind, Item, MessageLogEntry, NamedEntity, NewCustomer, NewItem, Receipt, ReceiptKind,
    RecordId, SyncStatusReport,
};

/// QuickBooks HTTP 客户端
#[derive(Clone)]
pub struct QuickbooksHttpClient {
    http: Client,
    base_url: String,
    realm_id: String,
    access_token: String,
    default_domain: String,
}

impl QuickbooksHttpClient {
    pub fn new(config: &QuickbooksConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| SyncError::Transport(format!("HTTP 客户端初始化失败: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            realm_id: config.realm_id.clone(),
            access_token: config.access_token.clone(),
            default_domain: config.default_identifier_domain.clone(),
        })
    }

    fn company_url(&self, path: &str) -> String {
        format!("{}/v3/company/{}/{}", self.base_url, self.realm_id, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(reqwest::header::ACCEPT, "application/json");
        if self.access_token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.access_token)
        }
    }

    /// 执行查询并取出 QueryResponse 中指定实体的数组
    async fn query<T: DeserializeOwned>(&self, entity: &str, clause: Option<String>) -> Result<Vec<T>> {
        let statement = match clause {
            Some(clause) => format!("select * from {} where {}", entity, clause),
            None => format!("select * from {}", entity),
        };
        debug!(query = %statement, "QuickBooks 查询");

        let response = self
            .authorized(self.http.get(self.company_url("query")))
            .query(&[("query", statement.as_str())])
            .send()
            .await?;
        let body: Value = Self::json_or_fault(response, entity).await?;

        match body.get("QueryResponse").and_then(|r| r.get(entity)) {
            Some(rows) => Ok(serde_json::from_value(rows.clone()).map_err(decode_error)?),
            None => Ok(Vec::new()),
        }
    }

    async fn query_one<T: DeserializeOwned>(&self, entity: &str, clause: String) -> Result<Option<T>> {
        Ok(self.query(entity, Some(clause)).await?.into_iter().next())
    }

    /// POST 实体并取出响应中以实体名为键的对象
    async fn post_entity<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        entity: &str,
        body: &B,
        operation: Option<&str>,
        name_for_conflict: &str,
    ) -> Result<T> {
        let mut request = self.http.post(self.company_url(&entity.to_ascii_lowercase()));
        if let Some(operation) = operation {
            request = request.query(&[("operation", operation)]);
        }

        let response = self.authorized(request).json(body).send().await?;
        let body: Value = Self::json_or_fault(response, name_for_conflict)
            .await
            .map_err(|e| match e {
                SyncError::Conflict { name, .. } => SyncError::Conflict {
                    entity: entity.to_string(),
                    name,
                },
                other => other,
            })?;

        let inner = body
            .get(entity)
            .cloned()
            .ok_or_else(|| SyncError::Api {
                status: 200,
                message: format!("响应缺少 {} 对象", entity),
            })?;
        serde_json::from_value(inner).map_err(decode_error)
    }

    /// GET 单个对象，404 视为不存在
    async fn get_optional(&self, path: &str) -> Result<Option<Value>> {
        let response = self
            .authorized(self.http.get(self.company_url(path)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::json_or_fault(response, path).await.map(Some)
    }

    /// 成功响应解析为 JSON，失败响应解析 Fault 并映射为错误
    async fn json_or_fault(response: Response, subject: &str) -> Result<Value> {
        let status = response.status();
        if status.is_success() {
            return response.json::<Value>().await.map_err(SyncError::from);
        }

        let text = response.text().await.unwrap_or_default();
        let fault = serde_json::from_str::<WireFaultEnvelope>(&text)
            .map(|envelope| envelope.fault)
            .unwrap_or_default();

        if fault.is_duplicate_name() {
            return Err(SyncError::Conflict {
                entity: String::new(),
                name: subject.to_string(),
            });
        }

        let message = if fault.errors.is_empty() {
            text
        } else {
            fault.describe()
        };
        warn!(status = status.as_u16(), message = %message, "QuickBooks 返回错误");
        Err(SyncError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

fn decode_error(err: serde_json::Error) -> SyncError {
    SyncError::Transport(format!("QuickBooks 响应无法解析: {}", err))
}

/// 查询语言中的字符串字面量
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

#[async_trait]
impl AccountingClient for QuickbooksHttpClient {
    async fn find_by_name(&self, kind: EntityKind, name: &str) -> Result<Option<NamedEntity>> {
        let clause = format!("{} = {}", kind.name_field(), quote(name));
        let found: Option<WireNamed> = self.query_one(kind.as_str(), clause).await?;
        Ok(found.map(|w| w.into_entity(kind)))
    }

    async fn create_payment_method(&self, name: &str) -> Result<NamedEntity> {
        let created: WireNamed = self
            .post_entity("PaymentMethod", &WireNewPaymentMethod { name }, None, name)
            .await?;
        Ok(created.into_entity(EntityKind::PaymentMethod))
    }

    async fn create_customer(&self, customer: &NewCustomer) -> Result<NamedEntity> {
        let created: WireNamed = self
            .post_entity(
                "Customer",
                &WireNewCustomer::from(customer),
                None,
                &customer.display_name,
            )
            .await?;
        Ok(created.into_entity(EntityKind::Customer))
    }

    async fn find_item_by_sku(&self, sku: &str) -> Result<Option<Item>> {
        let found: Option<WireItem> = self
            .query_one("Item", format!("Name = {}", quote(sku)))
            .await?;
        Ok(found.map(Item::from))
    }

    async fn create_item(&self, item: &NewItem) -> Result<Item> {
        let created: WireItem = self
            .post_entity("Item", &WireItem::from(item), None, &item.sku)
            .await?;
        Ok(created.into())
    }

    async fn update_item(&self, item: &Item) -> Result<Item> {
        let updated: WireItem = self
            .post_entity("Item", &WireItem::from(item), None, &item.sku)
            .await?;
        Ok(updated.into())
    }

    async fn list_items(&self, modified_since: Option<DateTime<Utc>>) -> Result<Vec<Item>> {
        let clause = modified_since.map(|since| {
            format!(
                "MetaData.LastUpdatedTime > {}",
                quote(&since.to_rfc3339_opts(SecondsFormat::Secs, true))
            )
        });
        let items: Vec<WireItem> = self.query("Item", clause).await?;
        Ok(items.into_iter().map(Item::from).collect())
    }

    async fn find_receipt_by_doc_number(
        &self,
        kind: ReceiptKind,
        doc_number: &str,
    ) -> Result<Option<Receipt>> {
        let found: Option<WireReceipt> = self
            .query_one(kind.as_str(), format!("DocNumber = {}", quote(doc_number)))
            .await?;
        Ok(found.map(|w| w.into_receipt(&self.default_domain)))
    }

    async fn fetch_receipt(&self, kind: ReceiptKind, id: &RecordId) -> Result<Option<Receipt>> {
        let path = format!("{}/{}", kind.resource(), id.id);
        let Some(body) = self.get_optional(&path).await? else {
            return Ok(None);
        };
        let wire: WireReceipt = match body.get(kind.as_str()) {
            Some(inner) => serde_json::from_value(inner.clone()).map_err(decode_error)?,
            None => return Ok(None),
        };
        Ok(Some(wire.into_receipt(&id.identifier_domain)))
    }

    async fn create_receipt(&self, kind: ReceiptKind, receipt: &Receipt) -> Result<Receipt> {
        let created: WireReceipt = self
            .post_entity(kind.as_str(), &WireReceipt::from(receipt), None, &receipt.doc_number)
            .await?;
        Ok(created.into_receipt(&self.default_domain))
    }

    async fn update_receipt(&self, kind: ReceiptKind, receipt: &Receipt) -> Result<Receipt> {
        let id = receipt
            .id
            .as_ref()
            .ok_or_else(|| SyncError::Validation("更新收据时缺少记录 ID".to_string()))?;

        let operation = receipt.voided.then_some("void");
        let updated: WireReceipt = self
            .post_entity(kind.as_str(), &WireReceipt::from(receipt), operation, &receipt.doc_number)
            .await?;
        Ok(updated.into_receipt(&id.identifier_domain))
    }

    async fn fetch_status(&self, id: &RecordId) -> Result<Option<SyncStatusReport>> {
        let path = format!("syncstatus/{}/{}", id.identifier_domain, id.id);
        let Some(body) = self.get_optional(&path).await? else {
            return Ok(None);
        };
        match body.get("SyncStatus") {
            Some(Value::Null) | None => Ok(None),
            Some(inner) => {
                let status: WireSyncStatus =
                    serde_json::from_value(inner.clone()).map_err(decode_error)?;
                Ok(Some(status.into_report(id)))
            }
        }
    }

    async fn list_messages(&self) -> Result<Vec<MessageLogEntry>> {
        let Some(body) = self.get_optional("messages").await? else {
            return Ok(Vec::new());
        };
        let messages: Vec<WireMessage> = match body.get("Messages") {
            Some(rows) => serde_json::from_value(rows.clone()).map_err(decode_error)?,
            None => Vec::new(),
        };
        Ok(messages.into_iter().map(MessageLogEntry::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("Brian Quinn"), "'Brian Quinn'");
        assert_eq!(quote("O'Reilly"), "'O\\'Reilly'");
    }

    #[test]
    fn test_company_url() {
        let config = QuickbooksConfig {
            base_url: "http://localhost:4000/".to_string(),
            realm_id: "123".to_string(),
            ..Default::default()
        };
        let client = QuickbooksHttpClient::new(&config).unwrap();
        assert_eq!(
            client.company_url("query"),
            "http://localhost:4000/v3/company/123/query"
        );
    }
}
