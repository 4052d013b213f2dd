//! Concurrent operations on shared wallets and orders.

mod common;

use common::Marketplace;
use escrow_engine::{error::EscrowError, models::OrderStatus};
use rust_decimal_macros::dec;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_cannot_double_spend() {
    let m = Marketplace::new(dec!(50.00)).await;

    let first = {
        let service = m.service.clone();
        let (client, request) = (m.client, m.order_request(dec!(40.00)));
        tokio::spawn(async move { service.place_order(&client, request).await })
    };
    let second = {
        let service = m.service.clone();
        let (client, request) = (m.client, m.order_request(dec!(40.00)));
        tokio::spawn(async move { service.place_order(&client, request).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let placed = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(EscrowError::InsufficientFunds { .. })))
        .count();

    assert_eq!(placed, 1);
    assert_eq!(rejected, 1);
    assert_eq!(m.balance(m.client.user_id).await, dec!(10.00));
    assert_eq!(m.store.orders().await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn complete_and_cancel_race_settles_once() {
    let m = Marketplace::new(dec!(100.00)).await;
    let order = m
        .service
        .place_order(&m.client, m.order_request(dec!(40.00)))
        .await
        .unwrap();
    m.service
        .update_status(&m.freelancer, order.id, OrderStatus::Accepted)
        .await
        .unwrap();
    m.service
        .update_status(&m.freelancer, order.id, OrderStatus::InProgress)
        .await
        .unwrap();

    let complete = {
        let (service, client) = (m.service.clone(), m.client);
        tokio::spawn(async move { service.complete(&client, order.id).await })
    };
    let cancel = {
        let (service, client) = (m.service.clone(), m.client);
        tokio::spawn(async move { service.cancel(&client, order.id).await })
    };

    let (completed, cancelled) = (complete.await.unwrap(), cancel.await.unwrap());
    assert!(completed.is_ok() != cancelled.is_ok(), "exactly one settlement wins");
    let loser = if completed.is_ok() { cancelled } else { completed };
    assert!(matches!(loser, Err(EscrowError::InvalidTransition { .. })));

    let client = m.balance(m.client.user_id).await;
    let freelancer = m.balance(m.freelancer.user_id).await;
    assert!(
        (client, freelancer) == (dec!(60.00), dec!(40.00))
            || (client, freelancer) == (dec!(100.00), dec!(0.00))
    );
    assert_eq!(m.total_value().await, dec!(100.00));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_clients_in_parallel_keep_their_own_balances() {
    let m = Marketplace::new(dec!(1000.00)).await;

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let (service, client, request) =
                (m.service.clone(), m.client, m.order_request(dec!(25.00)));
            tokio::spawn(async move { service.place_order(&client, request).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(m.balance(m.client.user_id).await, dec!(500.00));
    assert_eq!(m.total_value().await, dec!(1000.00));
}
