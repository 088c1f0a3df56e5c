//! HTTP 客户端集成测试
//!
//! 在随机端口上启动 mock-quickbooks，经真实 HTTP 往返验证线上格式。

use std::sync::Arc;

use chrono::{Duration, Utc};
use mock_quickbooks::{Ledger, LoggedMessage, RunningMock, SyncFlag};
use qbsync_shared::config::QuickbooksConfig;
use quickbooks_sync::client::{AccountingClient, QuickbooksHttpClient};
use quickbooks_sync::endpoint::Reply;
use quickbooks_sync::models::{
    EntityKind, EntityRef, NewCustomer, NewItem, Receipt, ReceiptKind, ReceiptLine, SyncState,
};
use quickbooks_sync::xref::MemoryCrossReferenceStore;
use quickbooks_sync::{AppState, Operation, SyncError, dispatch};
use serde_json::json;
use tokio::net::TcpListener;

async fn start_mock() -> RunningMock {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let ledger = Arc::new(Ledger::with_defaults().unwrap());
    mock_quickbooks::spawn(listener, ledger).await.unwrap()
}

fn config_for(mock: &RunningMock) -> QuickbooksConfig {
    QuickbooksConfig {
        base_url: mock.base_url(),
        realm_id: "123145".to_string(),
        access_token: "test-token".to_string(),
        ..Default::default()
    }
}

fn receipt(doc_number: &str, account: EntityRef, customer: EntityRef, item: EntityRef) -> Receipt {
    Receipt {
        id: None,
        sync_token: None,
        doc_number: doc_number.to_string(),
        txn_date: None,
        customer,
        deposit_account: account,
        payment_method: None,
        lines: vec![ReceiptLine {
            item,
            description: Some("Spree T-Shirt".to_string()),
            quantity: 2.0,
            unit_price: 19.99,
            amount: 39.98,
        }],
        total_amount: 39.98,
        voided: false,
        private_note: None,
    }
}

#[tokio::test]
async fn test_named_entities() {
    let mock = start_mock().await;
    let client = QuickbooksHttpClient::new(&config_for(&mock)).unwrap();

    let account = client
        .find_by_name(EntityKind::Account, "Undeposited Funds")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.kind, EntityKind::Account);
    assert!(
        client
            .find_by_name(EntityKind::Account, "Blaat")
            .await
            .unwrap()
            .is_none()
    );

    let method = client.create_payment_method("Bitcoin").await.unwrap();
    assert_eq!(method.name, "Bitcoin");
    let err = client.create_payment_method("Bitcoin").await.unwrap_err();
    assert!(matches!(err, SyncError::Conflict { .. }));

    let customer = client
        .create_customer(&NewCustomer {
            display_name: "Brian O'Quinn".to_string(),
            given_name: Some("Brian".to_string()),
            family_name: Some("O'Quinn".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    let found = client
        .find_by_name(EntityKind::Customer, "Brian O'Quinn")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, customer.id);
}

#[tokio::test]
async fn test_item_lifecycle() {
    let mock = start_mock().await;
    let client = QuickbooksHttpClient::new(&config_for(&mock)).unwrap();
    let before = Utc::now() - Duration::minutes(1);

    let created = client
        .create_item(&NewItem {
            sku: "test-abc".to_string(),
            description: Some("Test".to_string()),
            unit_price: 14.99,
        })
        .await
        .unwrap();
    assert_eq!(created.sku, "test-abc");
    assert_eq!(created.sync_token.as_deref(), Some("0"));

    let duplicate = client
        .create_item(&NewItem {
            sku: "test-abc".to_string(),
            description: None,
            unit_price: 1.0,
        })
        .await
        .unwrap_err();
    assert!(matches!(duplicate, SyncError::Conflict { .. }));

    let mut changed = created.clone();
    changed.unit_price = 15.5;
    let updated = client.update_item(&changed).await.unwrap();
    assert_eq!(updated.unit_price, 15.5);
    assert_eq!(updated.description.as_deref(), Some("Test"));
    assert_eq!(updated.sync_token.as_deref(), Some("1"));

    // 旧的 SyncToken 被拒绝
    assert!(client.update_item(&changed).await.is_err());

    let listed = client.list_items(Some(before)).await.unwrap();
    assert_eq!(listed.len(), 1);
    let future = client
        .list_items(Some(Utc::now() + Duration::hours(1)))
        .await
        .unwrap();
    assert!(future.is_empty());

    let found = client.find_item_by_sku("TEST-ABC").await.unwrap().unwrap();
    assert_eq!(found.id, created.id);
}

#[tokio::test]
async fn test_receipt_lifecycle_and_status() {
    let mock = start_mock().await;
    let client = QuickbooksHttpClient::new(&config_for(&mock)).unwrap();

    let account = client
        .find_by_name(EntityKind::Account, "Undeposited Funds")
        .await
        .unwrap()
        .unwrap();
    let customer = client
        .create_customer(&NewCustomer {
            display_name: "Brian Quinn".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let item = client
        .create_item(&NewItem {
            sku: "SPREE-T-SHIRT".to_string(),
            description: None,
            unit_price: 19.99,
        })
        .await
        .unwrap();

    let created = client
        .create_receipt(
            ReceiptKind::SalesReceipt,
            &receipt("R100", account.to_ref(), customer.to_ref(), item.to_ref()),
        )
        .await
        .unwrap();
    let id = created.id.clone().unwrap();
    assert_eq!(id.identifier_domain, "QBO");
    assert_eq!(created.lines.len(), 1);

    let by_doc = client
        .find_receipt_by_doc_number(ReceiptKind::SalesReceipt, "R100")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_doc.id, Some(id.clone()));
    assert!(
        client
            .find_receipt_by_doc_number(ReceiptKind::RefundReceipt, "R100")
            .await
            .unwrap()
            .is_none()
    );

    let status = client.fetch_status(&id).await.unwrap().unwrap();
    assert_eq!(status.state, SyncState::Pending);
    assert!(mock.ledger.set_sync_flag(&id.id, SyncFlag::Synchronized));
    let status = client.fetch_status(&id).await.unwrap().unwrap();
    assert_eq!(status.state, SyncState::Synchronized);

    let mut voided = client
        .fetch_receipt(ReceiptKind::SalesReceipt, &id)
        .await
        .unwrap()
        .unwrap();
    voided.void();
    let voided = client
        .update_receipt(ReceiptKind::SalesReceipt, &voided)
        .await
        .unwrap();
    assert!(voided.voided);
    assert_eq!(voided.total_amount, 0.0);

    let missing = quickbooks_sync::models::RecordId::new("999", "QBO");
    assert!(
        client
            .fetch_receipt(ReceiptKind::SalesReceipt, &missing)
            .await
            .unwrap()
            .is_none()
    );
    assert!(client.fetch_status(&missing).await.unwrap().is_none());
}

#[tokio::test]
async fn test_message_log() {
    let mock = start_mock().await;
    let client = QuickbooksHttpClient::new(&config_for(&mock)).unwrap();
    assert!(client.list_messages().await.unwrap().is_empty());

    mock.ledger
        .push_message(LoggedMessage {
            object_type: "SalesReceipt".to_string(),
            object_id: "7".to_string(),
            description: "Business Validation Error".to_string(),
        })
        .await;

    let messages = client.list_messages().await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].object_id, "7");
    assert_eq!(messages[0].description, "Business Validation Error");
}

#[tokio::test]
async fn test_order_round_trip_through_http_client() {
    let mock = start_mock().await;
    let config = config_for(&mock);
    let client = Arc::new(QuickbooksHttpClient::new(&config).unwrap());
    let state = AppState::new(client, Arc::new(MemoryCrossReferenceStore::new()), config);

    let message = json!({
        "request_id": "r1",
        "order": {
            "id": "R200",
            "status": "complete",
            "email": "spree@example.com",
            "placed_on": "2013-06-04T10:30:00Z",
            "totals": { "item": 19.99, "adjustment": 0, "tax": 0, "shipping": 0, "payment": 19.99, "order": 19.99 },
            "line_items": [
                { "product_id": "SPREE-T-SHIRT", "name": "Spree T-Shirt", "quantity": 1, "price": 19.99 }
            ],
            "payments": [ { "amount": 19.99, "payment_method": "Credit Card" } ],
            "credit_cards": [ { "cc_type": "visa", "last_digits": "1111" } ],
            "billing_address": { "firstname": "Brian", "lastname": "Quinn" }
        }
    });

    let Reply::Sync(first) = dispatch(Operation::AddOrder, &state, "r1", message.clone())
        .await
        .unwrap()
    else {
        panic!("应返回同步响应");
    };
    let xref = first.xref.unwrap();

    // 重放同一消息不产生第二张收据
    let Reply::Sync(second) = dispatch(Operation::AddOrder, &state, "r2", message)
        .await
        .unwrap()
    else {
        panic!("应返回同步响应");
    };
    assert_eq!(second.xref, Some(xref.clone()));

    let client = QuickbooksHttpClient::new(&config_for(&mock)).unwrap();
    let stored = client
        .fetch_receipt(ReceiptKind::SalesReceipt, &xref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.doc_number, "R200");
    assert_eq!(stored.total_amount, 19.99);
    assert_eq!(
        stored.payment_method.and_then(|m| m.name).as_deref(),
        Some("Visa")
    );
}
