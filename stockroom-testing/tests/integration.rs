//! End-to-end scenarios over the simulated network.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Barrier;
use turmoil::Builder;

use stockroom_client::api::StoreError;
use stockroom_core::ReplicaId;
use stockroom_testing::{connect_client, init_tracing, start_replica};

const CLUSTER: &[&str] = &["s1", "s2", "s3"];

fn sim() -> turmoil::Sim<'static> {
    let mut sim = Builder::new()
        .simulation_duration(Duration::from_secs(120))
        .build();
    for name in CLUSTER {
        start_replica(&mut sim, name, CLUSTER);
    }
    sim
}

#[test]
fn create_add_query() {
    let _guard = init_tracing();
    let mut sim = sim();

    sim.client("shopper", async move {
        let mut client = connect_client(CLUSTER);
        client.create_item("cheese").await?;
        assert_eq!(client.add_stock("cheese", 10).await?, 10);
        assert_eq!(client.query_stock("cheese").await?, 10);
        Ok(())
    });

    sim.run().unwrap();
}

#[test]
fn duplicate_create_is_reported() {
    let _guard = init_tracing();
    let mut sim = sim();

    sim.client("shopper", async move {
        let mut client = connect_client(CLUSTER);
        client.create_item("bread").await?;
        assert_eq!(
            client.create_item("bread").await,
            Err(StoreError::DuplicateItem)
        );
        Ok(())
    });

    sim.run().unwrap();
}

#[test]
fn insufficient_stock_leaves_level_unchanged() {
    let _guard = init_tracing();
    let mut sim = sim();

    sim.client("shopper", async move {
        let mut client = connect_client(CLUSTER);
        client.create_item("milk").await?;
        assert_eq!(client.add_stock("milk", 3).await?, 3);
        assert_eq!(
            client.remove_stock("milk", 5).await,
            Err(StoreError::InsufficientStock)
        );
        assert_eq!(client.query_stock("milk").await?, 3);
        Ok(())
    });

    sim.run().unwrap();
}

#[test]
fn missing_items_are_reported() {
    let _guard = init_tracing();
    let mut sim = sim();

    sim.client("shopper", async move {
        let mut client = connect_client(CLUSTER);
        assert_eq!(
            client.query_stock("ghost").await,
            Err(StoreError::NoSuchItem)
        );
        assert_eq!(
            client.remove_stock("ghost", 1).await,
            Err(StoreError::NoSuchItem)
        );
        assert_eq!(client.delete_item("ghost").await, Err(StoreError::NoSuchItem));
        Ok(())
    });

    sim.run().unwrap();
}

#[test]
fn concurrent_adds_from_two_clients() {
    let _guard = init_tracing();
    let mut sim = sim();

    let created = Arc::new(Barrier::new(2));
    let added = Arc::new(Barrier::new(2));

    let (created_a, added_a) = (created.clone(), added.clone());
    sim.client("alice", async move {
        let mut client = connect_client(CLUSTER);
        client.create_item("cheese").await?;
        created_a.wait().await;

        assert!(matches!(client.add_stock("cheese", 5).await, Ok(5 | 10)));
        added_a.wait().await;

        // Both adds landed, in whichever order consensus picked.
        assert_eq!(client.query_stock("cheese").await?, 10);
        Ok(())
    });

    sim.client("bob", async move {
        let mut client = connect_client(CLUSTER);
        created.wait().await;

        assert!(matches!(client.add_stock("cheese", 5).await, Ok(5 | 10)));
        added.wait().await;
        Ok(())
    });

    sim.run().unwrap();
}

#[test]
fn clients_converge_on_same_leader() {
    let _guard = init_tracing();
    let mut sim = sim();

    let barrier = Arc::new(Barrier::new(2));

    let barrier_a = barrier.clone();
    sim.client("alice", async move {
        let client = connect_client(CLUSTER);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(client.leader().await, Some(ReplicaId::from("s1")));
        barrier_a.wait().await;
        Ok(())
    });

    sim.client("bob", async move {
        let client = connect_client(CLUSTER);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(client.leader().await, Some(ReplicaId::from("s1")));
        barrier.wait().await;
        Ok(())
    });

    sim.run().unwrap();
}
