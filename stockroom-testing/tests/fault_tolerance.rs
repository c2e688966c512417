//! Crash and failover scenarios.

use std::time::Duration;

use turmoil::Builder;

use stockroom_client::api::StoreError;
use stockroom_core::ReplicaId;
use stockroom_testing::{connect_client, init_tracing, start_replica};

#[test]
fn leader_failover_preserves_reads() {
    let _guard = init_tracing();
    let mut sim = Builder::new()
        .simulation_duration(Duration::from_secs(120))
        .build();

    const CLUSTER: &[&str] = &["s1", "s2", "s3"];
    for name in CLUSTER {
        start_replica(&mut sim, name, CLUSTER);
    }

    // Phase 1: write through the initial leader, s1.
    sim.client("writer", async move {
        let mut client = connect_client(CLUSTER);
        assert_eq!(client.leader().await, Some(ReplicaId::from("s1")));
        client.create_item("cheese").await?;
        assert_eq!(client.add_stock("cheese", 10).await?, 10);
        Ok(())
    });
    while !sim.step().unwrap() {}

    // Kill the leader. The remaining replicas hold a quorum.
    sim.crash("s1");

    // Phase 2: a fresh client suspects s1 after a failed probe round,
    // fails over to s2, and still reads the committed value.
    sim.client("reader", async move {
        let mut client = connect_client(CLUSTER);
        tokio::time::sleep(Duration::from_secs(8)).await;
        assert_eq!(client.leader().await, Some(ReplicaId::from("s2")));
        assert_eq!(client.query_stock("cheese").await?, 10);
        Ok(())
    });
    sim.run().unwrap();
}

#[test]
fn minority_crashes_are_tolerated_and_quorum_loss_is_not() {
    let _guard = init_tracing();
    let mut sim = Builder::new()
        .simulation_duration(Duration::from_secs(120))
        .build();

    const CLUSTER: &[&str] = &["r1", "r2", "r3", "r4", "r5"];
    for name in CLUSTER {
        start_replica(&mut sim, name, CLUSTER);
    }

    sim.client("writer", async move {
        let mut client = connect_client(CLUSTER);
        client.create_item("bolts").await?;
        assert_eq!(client.add_stock("bolts", 100).await?, 100);
        Ok(())
    });
    while !sim.step().unwrap() {}

    // Two of five down: three remain, still a majority.
    sim.crash("r4");
    sim.crash("r5");

    sim.client("survivor", async move {
        let mut client = connect_client(CLUSTER);
        assert_eq!(client.add_stock("bolts", 1).await?, 101);
        assert_eq!(client.query_stock("bolts").await?, 101);
        Ok(())
    });
    while !sim.step().unwrap() {}

    // A third crash destroys the quorum; proposals cannot decide and
    // submissions surface as timeouts.
    sim.crash("r3");

    sim.client("stranded", async move {
        let mut client = connect_client(CLUSTER);
        let result = client.add_stock("bolts", 1).await;
        assert!(
            matches!(result, Err(StoreError::Timeout | StoreError::Unavailable)),
            "expected a liveness failure, got {result:?}"
        );
        Ok(())
    });
    sim.run().unwrap();
}
