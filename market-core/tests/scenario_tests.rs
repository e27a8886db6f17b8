//! End-to-end marketplace scenarios
//!
//! Runs the primary sale, swap and resale flows against the public API,
//! directly and through the actor, plus a restart from RocksDB.

use market_core::{
    spawn_market_actor, BalanceBook, Config, Error, EventKind, Identity, Listing, Marketplace,
    Metrics, Sale, Storage, TicketId, TicketState,
};
use rust_decimal::Decimal;

const PRICE: u64 = 100_000_000_000_000_000;
const RESALE: u64 = 150_000_000_000_000_000;

fn sale() -> Sale {
    Sale {
        operator: Identity::new("operator"),
        ticket_price: Decimal::from(PRICE),
        total_tickets: 100,
        fee_rate: Decimal::new(10, 2),
        max_markup: None,
    }
}

fn funded_book(names: &[&str]) -> BalanceBook {
    let book = BalanceBook::new();
    for name in names {
        book.deposit(&Identity::new(*name), Decimal::from(PRICE) * Decimal::from(10)).unwrap();
    }
    book
}

#[test]
fn test_buy_then_resell() {
    let book = funded_book(&["buyer1", "buyer2"]);
    let mut market = Marketplace::new(sale(), book.clone()).unwrap();
    let (buyer1, buyer2) = (Identity::new("buyer1"), Identity::new("buyer2"));
    let ticket = TicketId::new(1);

    market.buy_ticket(ticket, &buyer1, Decimal::from(PRICE)).unwrap();
    assert_eq!(market.ticket_of(&buyer1), Some(ticket));

    let second = market.buy_ticket(ticket, &buyer2, Decimal::from(PRICE));
    assert!(matches!(second, Err(Error::AlreadySold(_))));

    market.resale_ticket(Decimal::from(RESALE), &buyer1).unwrap();
    assert!(market.check_resale().contains(&ticket));

    let event = market
        .accept_resale(ticket, &buyer2, Decimal::from(RESALE))
        .unwrap();
    assert_eq!(market.ticket_of(&buyer2), Some(ticket));
    assert_eq!(market.ticket_of(&buyer1), None);
    assert!(!market.check_resale().contains(&ticket));

    let fee = Decimal::from(RESALE / 10);
    assert!(matches!(
        event.kind,
        EventKind::ResaleCompleted { operator_fee, .. } if operator_fee == fee
    ));
    assert_eq!(
        book.balance_of(market.operator()),
        Decimal::from(PRICE) + fee
    );
}

#[test]
fn test_swap_between_holders() {
    let book = funded_book(&["alice", "bob"]);
    let mut market = Marketplace::new(sale(), book.clone()).unwrap();
    let (alice, bob) = (Identity::new("alice"), Identity::new("bob"));

    market.buy_ticket(TicketId::new(10), &alice, Decimal::from(PRICE)).unwrap();
    market.buy_ticket(TicketId::new(20), &bob, Decimal::from(PRICE)).unwrap();
    let operator_balance = book.balance_of(market.operator());

    market.offer_swap(TicketId::new(20), &alice).unwrap();
    assert_eq!(
        market.ticket_state(TicketId::new(10)).unwrap().listing(),
        Some(Listing::SwapOffer(TicketId::new(20)))
    );

    market.accept_swap(TicketId::new(10), &bob).unwrap();

    assert_eq!(market.ticket_of(&alice), Some(TicketId::new(20)));
    assert_eq!(market.ticket_of(&bob), Some(TicketId::new(10)));
    assert_eq!(book.balance_of(market.operator()), operator_balance);
}

#[test]
fn test_holder_cannot_buy_second_ticket() {
    let book = funded_book(&["alice"]);
    let mut market = Marketplace::new(sale(), book.clone()).unwrap();
    let alice = Identity::new("alice");

    market.buy_ticket(TicketId::new(1), &alice, Decimal::from(PRICE)).unwrap();
    let balance = book.balance_of(&alice);

    let result = market.buy_ticket(TicketId::new(2), &alice, Decimal::from(PRICE));

    assert!(matches!(result, Err(Error::AlreadyHolding { .. })));
    assert_eq!(*market.ticket_state(TicketId::new(2)).unwrap(), TicketState::Unsold);
    assert_eq!(book.balance_of(&alice), balance);
}

#[tokio::test]
async fn test_scenario_through_actor() {
    let book = funded_book(&["buyer1", "buyer2"]);
    let market = Marketplace::new(sale(), book.clone()).unwrap();
    let handle = spawn_market_actor(market, None, Metrics::new().unwrap(), &Config::default());
    let (buyer1, buyer2) = (Identity::new("buyer1"), Identity::new("buyer2"));
    let ticket = TicketId::new(1);

    handle
        .buy_ticket(ticket, buyer1.clone(), Decimal::from(PRICE))
        .await
        .unwrap();
    assert_eq!(handle.ticket_of(buyer1.clone()).await.unwrap(), Some(ticket));

    let second = handle
        .buy_ticket(ticket, buyer2.clone(), Decimal::from(PRICE))
        .await;
    assert!(matches!(second, Err(Error::AlreadySold(_))));

    handle
        .resale_ticket(Decimal::from(RESALE), buyer1.clone())
        .await
        .unwrap();
    assert_eq!(handle.check_resale().await.unwrap(), vec![ticket]);

    handle
        .accept_resale(ticket, buyer2.clone(), Decimal::from(RESALE))
        .await
        .unwrap();
    assert_eq!(handle.ticket_of(buyer2).await.unwrap(), Some(ticket));
    assert!(handle.check_resale().await.unwrap().is_empty());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_restart_restores_snapshot() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.data_dir = temp_dir.path().to_path_buf();
    config.snapshot.interval_ops = 0;

    let book = funded_book(&["alice", "bob"]);
    let (alice, bob) = (Identity::new("alice"), Identity::new("bob"));

    {
        let storage = Storage::open(&config.storage).unwrap();
        assert!(storage.load_snapshot().unwrap().is_none());

        let market = Marketplace::new(sale(), book.clone()).unwrap();
        let handle = spawn_market_actor(market, Some(storage), Metrics::new().unwrap(), &config);
        handle
            .buy_ticket(TicketId::new(4), alice.clone(), Decimal::from(PRICE))
            .await
            .unwrap();
        handle
            .buy_ticket(TicketId::new(5), bob.clone(), Decimal::from(PRICE))
            .await
            .unwrap();
        handle
            .resale_ticket(Decimal::from(RESALE), bob.clone())
            .await
            .unwrap();
        handle.shutdown().await.unwrap();
    }

    let storage = Storage::open(&config.storage).unwrap();
    let snapshot = storage.load_snapshot().unwrap().unwrap();
    let mut market = Marketplace::from_snapshot(snapshot, book.clone()).unwrap();

    assert_eq!(market.sale(), &sale());
    assert_eq!(market.ticket_of(&alice), Some(TicketId::new(4)));
    assert_eq!(market.check_resale(), vec![TicketId::new(5)]);

    // Reverse index was rebuilt
    let result = market.buy_ticket(TicketId::new(6), &alice, Decimal::from(PRICE));
    assert!(matches!(result, Err(Error::AlreadyHolding { .. })));
}
