//! HTTP 端点集成测试
//!
//! 通过 tower::ServiceExt::oneshot 逐个驱动每个操作路由。

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use qbsync_shared::config::QuickbooksConfig;
use quickbooks_sync::models::{ReceiptKind, RecordId, SyncState};
use quickbooks_sync::test_utils::InMemoryAccounting;
use quickbooks_sync::xref::MemoryCrossReferenceStore;
use quickbooks_sync::{AppState, Operation, router};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> (Arc<InMemoryAccounting>, Router) {
    let ledger = Arc::new(InMemoryAccounting::with_standard_ledger());
    let state = AppState::new(
        ledger.clone(),
        Arc::new(MemoryCrossReferenceStore::new()),
        QuickbooksConfig::default(),
    );
    (ledger, router(state))
}

async fn post(app: &Router, op: Operation, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(op.path())
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn order_json(id: &str, total: f64) -> Value {
    json!({
        "id": id,
        "status": "complete",
        "email": "spree@example.com",
        "placed_on": "2013-06-04T10:30:00Z",
        "totals": { "item": 19.99, "adjustment": 0, "tax": 0, "shipping": 0, "payment": total, "order": total },
        "line_items": [
            { "product_id": "SPREE-T-SHIRT", "name": "Spree T-Shirt", "quantity": 1, "price": 19.99 }
        ],
        "payments": [ { "amount": total, "payment_method": "Credit Card" } ],
        "credit_cards": [ { "cc_type": "visa", "last_digits": "1111" } ],
        "billing_address": { "firstname": "Brian", "lastname": "Quinn" }
    })
}

#[tokio::test]
async fn test_order_lifecycle_over_http() {
    let (ledger, app) = app();

    let (status, body) = post(
        &app,
        Operation::AddOrder,
        json!({ "request_id": "r1", "order": order_json("R100", 19.99) }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request_id"], "r1");
    assert_eq!(body["parameters"]["quickbooks_status_check_delay"], 300);
    let xref: RecordId = serde_json::from_value(body["xref"].clone()).unwrap();

    let (status, body) = post(
        &app,
        Operation::UpdateOrder,
        json!({
            "request_id": "r2",
            "order": order_json("R100", 25.0),
            "changes": { "totals": { "order": 25.0 } }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["summary"].as_str().unwrap().starts_with("Updated"));
    assert_eq!(
        ledger
            .receipt(ReceiptKind::SalesReceipt, &xref)
            .unwrap()
            .total_amount,
        25.0
    );

    let (status, body) = post(
        &app,
        Operation::CancelOrder,
        json!({ "request_id": "r3", "order": order_json("R100", 25.0) }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["summary"].as_str().unwrap().starts_with("Voided"));
    assert!(ledger.receipt(ReceiptKind::SalesReceipt, &xref).unwrap().voided);
    assert_eq!(ledger.receipt_creates(), 1);
}

#[tokio::test]
async fn test_update_with_original_diff() {
    let (ledger, app) = app();
    post(
        &app,
        Operation::AddOrder,
        json!({ "request_id": "r1", "order": order_json("R101", 19.99) }),
    )
    .await;

    let (status, _) = post(
        &app,
        Operation::UpdateOrder,
        json!({
            "request_id": "r2",
            "order": order_json("R101", 19.99),
            "original": order_json("R101", 19.99)
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger.receipt_updates(), 0);
}

#[tokio::test]
async fn test_update_without_delta_pushes_all_fields() {
    let (ledger, app) = app();
    let (_, body) = post(
        &app,
        Operation::AddOrder,
        json!({ "request_id": "r1", "order": order_json("R102", 19.99) }),
    )
    .await;
    let xref: RecordId = serde_json::from_value(body["xref"].clone()).unwrap();

    let (status, body) = post(
        &app,
        Operation::UpdateOrder,
        json!({ "request_id": "r2", "order": order_json("R102", 25.0) }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["summary"].as_str().unwrap().starts_with("Updated"));
    assert_eq!(ledger.receipt_updates(), 1);
    assert_eq!(
        ledger
            .receipt(ReceiptKind::SalesReceipt, &xref)
            .unwrap()
            .total_amount,
        25.0
    );
}

#[tokio::test]
async fn test_add_order_replay_without_delta_writes_nothing() {
    let (ledger, app) = app();
    for request_id in ["r1", "r2"] {
        let (status, _) = post(
            &app,
            Operation::AddOrder,
            json!({ "request_id": request_id, "order": order_json("R103", 25.0) }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    assert_eq!(ledger.receipt_creates(), 1);
    assert_eq!(ledger.receipt_updates(), 0);
}

#[tokio::test]
async fn test_cancel_unknown_order_is_404() {
    let (_, app) = app();
    let (status, body) = post(
        &app,
        Operation::CancelOrder,
        json!({ "request_id": "r1", "order": order_json("R404", 1.0) }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["request_id"], "r1");
    assert_eq!(body["errors"][0]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_product_import_over_http() {
    let (ledger, app) = app();
    let product = json!({ "sku": "ROR-MUG", "name": "Ruby on Rails Mug", "price": 13.99 });

    let (status, _) = post(
        &app,
        Operation::AddProduct,
        json!({ "request_id": "p1", "product": product }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        &app,
        Operation::UpdateProduct,
        json!({ "request_id": "p2", "product": { "sku": "ROR-MUG", "name": "Mug", "price": 15.0 } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["summary"].as_str().unwrap().starts_with("Updated"));

    let item = ledger.item("ROR-MUG").unwrap();
    assert_eq!(item.unit_price, 15.0);
    assert_eq!(ledger.item_creates(), 1);
}

#[tokio::test]
async fn test_return_over_http() {
    let (_, app) = app();
    let message = json!({
        "request_id": "ra1",
        "return": {
            "id": "RA100",
            "order_id": "R100",
            "line_items": [ { "sku": "ROR-MUG", "name": "Mug", "quantity": 1, "price": 13.99 } ]
        },
        "order": order_json("R100", 19.99)
    });

    let (status, body) = post(&app, Operation::AddReturn, message.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["xref"]["id"].is_string());

    let (status, body) = post(&app, Operation::UpdateReturn, message).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["summary"].as_str().unwrap().starts_with("Verified"));
}

#[tokio::test]
async fn test_inventory_over_http() {
    let (ledger, app) = app();
    ledger.seed_item("SPREE-T-SHIRT", 19.99, Some(12.0));
    ledger.seed_item("Shipping", 0.0, None);

    let (status, body) = post(
        &app,
        Operation::GetInventory,
        json!({ "request_id": "i1", "sku": "SPREE-T-SHIRT" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["inventories"],
        json!([{ "sku": "SPREE-T-SHIRT", "quantity": 12 }])
    );

    let since = (Utc::now() - Duration::hours(1)).to_rfc3339();
    let (status, body) = post(
        &app,
        Operation::GetInventory,
        json!({ "request_id": "i2", "parameters": { "quickbooks_poll_stock_timestamp": since } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inventories"].as_array().unwrap().len(), 1);
    assert!(body["parameters"]["quickbooks_poll_stock_timestamp"].is_string());
}

#[tokio::test]
async fn test_status_check_over_http() {
    let (ledger, app) = app();
    let (_, body) = post(
        &app,
        Operation::AddOrder,
        json!({ "request_id": "r1", "order": order_json("R102", 19.99) }),
    )
    .await;
    let xref: RecordId = serde_json::from_value(body["xref"].clone()).unwrap();

    let (status, body) = post(
        &app,
        Operation::StatusCheck,
        json!({ "message_id": "m1", "order_id": "R102" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delay"], 6000);

    ledger.set_status(&xref, SyncState::Synchronized);
    let (_, body) = post(
        &app,
        Operation::StatusCheck,
        json!({ "message_id": "m2", "parameters": { "xref": body_xref(&xref) } }),
    )
    .await;
    assert_eq!(body, json!({ "message_id": "m2" }));
}

fn body_xref(xref: &RecordId) -> Value {
    json!({ "id": xref.id, "id_domain": xref.identifier_domain })
}

#[tokio::test]
async fn test_every_operation_is_routed() {
    let (_, app) = app();
    for op in Operation::ALL {
        // 空消息要么被校验拒绝，要么被正常处理，但不会落到 404/405
        let (status, body) = post(&app, op, json!({ "request_id": op.name() })).await;
        assert_ne!(status, StatusCode::NOT_FOUND, "{} 未注册", op.name());
        assert_ne!(status, StatusCode::METHOD_NOT_ALLOWED);
        let id_field = if op == Operation::StatusCheck && status == StatusCode::OK {
            "message_id"
        } else {
            "request_id"
        };
        assert_eq!(body[id_field], op.name());
    }
}
