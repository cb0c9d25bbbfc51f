//! Tests for the order workflow against the in-memory broker and store.

use std::sync::Arc;
use std::time::Duration;

use common::{
    CartId, CartSubmission, CustomerId, LineItem, ORDER_PROCESSED_QUEUE, ORDERS_QUEUE, OrderId,
    OrderStatus, OrderStatusEvent,
};
use messaging::{
    Disposition, InMemoryBroker, Message, MessageChannel, MessageChannelExt, MessageHandler,
    RetryPolicy, dead_letter_queue,
};
use order_service::{InMemoryOrderStore, OrderStore, OrderWorkflow};
use serde_json::json;
use tokio::sync::watch;

fn submission() -> CartSubmission {
    CartSubmission {
        cart_id: CartId::new(1),
        details: vec![LineItem::new(7, 10.0, 2)],
        total: 20.0,
        customer_id: CustomerId::new("c1"),
    }
}

fn setup() -> (
    InMemoryOrderStore,
    InMemoryBroker,
    OrderWorkflow<InMemoryOrderStore, InMemoryBroker>,
) {
    let store = InMemoryOrderStore::new();
    let broker = InMemoryBroker::new();
    let workflow = OrderWorkflow::new(store.clone(), Arc::new(broker.clone()));
    (store, broker, workflow)
}

async fn status_events(broker: &InMemoryBroker) -> Vec<OrderStatusEvent> {
    broker.published_json(ORDER_PROCESSED_QUEUE).await
}

#[tokio::test]
async fn submission_creates_one_order_and_one_event() {
    let (store, broker, workflow) = setup();
    let payload = json!({
        "CartId": 1,
        "Details": [{"ProductId": 7, "Price": 10, "Quantity": 2}],
        "Total": 20,
        "CustomerId": "c1"
    });

    let disposition = workflow
        .handle(&Message::new(serde_json::to_vec(&payload).unwrap()))
        .await;

    assert_eq!(disposition, Disposition::Ack);

    let orders = store.list().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].cart_id, CartId::new(1));
    assert_eq!(orders[0].total, 20.0);
    assert_eq!(orders[0].customer_id.as_str(), "c1");
    assert_eq!(orders[0].status, OrderStatus::Success);

    assert_eq!(
        status_events(&broker).await,
        vec![OrderStatusEvent::succeeded(CartId::new(1), orders[0].order_id)]
    );
}

#[tokio::test]
async fn full_cart_payload_is_accepted() {
    let (store, _broker, workflow) = setup();
    let payload = json!({
        "CartId": 3,
        "Details": [],
        "Total": 0,
        "CustomerId": "c9",
        "Status": "INITIATED",
        "OrderId": 0
    });

    let disposition = workflow
        .handle(&Message::new(serde_json::to_vec(&payload).unwrap()))
        .await;

    assert_eq!(disposition, Disposition::Ack);
    assert!(store.find_by_cart(CartId::new(3)).await.unwrap().is_some());
}

#[tokio::test]
async fn negative_quantity_is_not_malformed() {
    let (store, broker, workflow) = setup();
    let payload = json!({
        "CartId": 4,
        "Details": [{"ProductId": 7, "Price": 10, "Quantity": -1}],
        "Total": -10,
        "CustomerId": "c1"
    });

    let disposition = workflow
        .handle(&Message::new(serde_json::to_vec(&payload).unwrap()))
        .await;

    assert_eq!(disposition, Disposition::Ack);
    let order = store.find_by_cart(CartId::new(4)).await.unwrap().unwrap();
    assert_eq!(order.details, vec![LineItem::new(7, 10.0, -1)]);
    assert_eq!(status_events(&broker).await.len(), 1);
}

#[tokio::test]
async fn malformed_submission_is_dropped() {
    let (store, broker, workflow) = setup();

    for payload in [b"hello".to_vec(), br#"{"Total": 3}"#.to_vec()] {
        assert_eq!(workflow.handle(&Message::new(payload)).await, Disposition::Ack);
    }

    assert_eq!(store.order_count().await, 0);
    assert!(broker.published(ORDER_PROCESSED_QUEUE).await.is_empty());
}

#[tokio::test]
async fn store_failure_still_reports_failed() {
    let (store, broker, workflow) = setup();
    store.set_fail_on_write(true).await;

    let disposition = workflow.process(submission()).await;

    assert_eq!(disposition, Disposition::Ack);
    assert_eq!(
        status_events(&broker).await,
        vec![OrderStatusEvent::failed(CartId::new(1))]
    );

    // FAILED travels without an order id.
    let raw = broker.published(ORDER_PROCESSED_QUEUE).await;
    let value: serde_json::Value = serde_json::from_slice(&raw[0].payload).unwrap();
    assert_eq!(value["Status"], "FAILED");
    assert_eq!(value["CartId"], 1);
}

#[tokio::test]
async fn redelivered_submission_is_idempotent() {
    let (store, broker, workflow) = setup();

    assert_eq!(workflow.process(submission()).await, Disposition::Ack);
    assert_eq!(workflow.process(submission()).await, Disposition::Ack);

    assert_eq!(store.order_count().await, 1);
    let events = status_events(&broker).await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], events[1]);
    assert_eq!(events[0].order_id, Some(OrderId::new(1)));
}

#[tokio::test]
async fn publish_failure_asks_for_retry() {
    let (store, broker, workflow) = setup();
    broker.fail_publishes_to(ORDER_PROCESSED_QUEUE, true).await;

    let disposition = workflow.process(submission()).await;

    assert!(matches!(disposition, Disposition::Retry { .. }));
    assert_eq!(store.order_count().await, 1);
}

async fn wait_for_events(broker: &InMemoryBroker, count: usize) {
    for _ in 0..300 {
        if status_events(broker).await.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {count} status events");
}

#[tokio::test]
async fn consumer_retries_publish_without_duplicating_orders() {
    let store = InMemoryOrderStore::new();
    let broker = InMemoryBroker::new();
    // Unbounded budget so the retries cannot run out before the broker heals.
    let consumer = order_service::order_consumer(
        store.clone(),
        Arc::new(broker.clone()),
        RetryPolicy::new(u32::MAX),
    );

    broker.fail_publishes_to(ORDER_PROCESSED_QUEUE, true).await;
    broker.publish_json(ORDERS_QUEUE, &submission()).await.unwrap();

    let (shutdown, mut rx) = watch::channel(false);
    let consumer_broker = broker.clone();
    let task = tokio::spawn(async move { consumer.run(&consumer_broker, &mut rx).await });

    // Let at least one attempt fail, then heal the broker.
    for _ in 0..300 {
        if broker.published(ORDERS_QUEUE).await.len() > 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    broker.fail_publishes_to(ORDER_PROCESSED_QUEUE, false).await;
    wait_for_events(&broker, 1).await;

    shutdown.send(true).unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(store.order_count().await, 1);
    assert_eq!(
        status_events(&broker).await,
        vec![OrderStatusEvent::succeeded(CartId::new(1), OrderId::new(1))]
    );
}

#[tokio::test]
async fn unpublishable_status_is_dead_lettered() {
    let store = InMemoryOrderStore::new();
    let broker = InMemoryBroker::new();
    let consumer = order_service::order_consumer(
        store.clone(),
        Arc::new(broker.clone()),
        RetryPolicy::new(2),
    );

    broker.fail_publishes_to(ORDER_PROCESSED_QUEUE, true).await;
    broker.publish_json(ORDERS_QUEUE, &submission()).await.unwrap();

    let (shutdown, mut rx) = watch::channel(false);
    let consumer_broker = broker.clone();
    let task = tokio::spawn(async move { consumer.run(&consumer_broker, &mut rx).await });

    let dlq = dead_letter_queue(ORDERS_QUEUE);
    for _ in 0..300 {
        if !broker.published(&dlq).await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown.send(true).unwrap();
    task.await.unwrap().unwrap();

    let dead: Vec<CartSubmission> = broker.published_json(&dlq).await;
    assert_eq!(dead, vec![submission()]);
    assert_eq!(store.order_count().await, 1);
    assert_eq!(broker.ready_count(ORDERS_QUEUE).await, 0);
}

#[tokio::test]
async fn consumer_survives_non_json() {
    let store = InMemoryOrderStore::new();
    let broker = InMemoryBroker::new();
    let consumer = order_service::order_consumer(
        store.clone(),
        Arc::new(broker.clone()),
        RetryPolicy::default(),
    );

    broker
        .publish(ORDERS_QUEUE, Message::new(b"<xml/>".to_vec()))
        .await
        .unwrap();
    broker.publish_json(ORDERS_QUEUE, &submission()).await.unwrap();

    let (shutdown, mut rx) = watch::channel(false);
    let consumer_broker = broker.clone();
    let task = tokio::spawn(async move { consumer.run(&consumer_broker, &mut rx).await });

    wait_for_events(&broker, 1).await;
    shutdown.send(true).unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(store.order_count().await, 1);
    assert_eq!(broker.unacked_count(ORDERS_QUEUE).await, 0);
}
