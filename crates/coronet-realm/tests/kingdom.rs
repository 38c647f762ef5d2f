//! End-to-end kingdom lifecycles over the in-process memory fabric.
//!
//! Each device runs a full [`Realm`] with real wire framing between them;
//! the tests play the role of the beacon by submitting discovery events
//! and the role of the acceptor by registering inbound connections.

use std::sync::Arc;
use std::time::Duration;

use std::sync::atomic::{AtomicBool, Ordering};

use coronet_protocol::{DeviceId, Role};
use coronet_realm::{
    Beacon, DiscoveryEvent, Event, NullAcceptor, NullBeacon, Realm, RealmConfig, RealmHandle,
};
use coronet_transport::memory::{MemoryConnector, MemoryNet};
use coronet_transport::{Connection, ConnectionManager};
use tokio::sync::mpsc;

fn device(id: &str) -> DeviceId {
    DeviceId::new(id)
}

fn fast_config() -> RealmConfig {
    RealmConfig::default()
        .with_crowning_preparation_timeout(Duration::from_millis(50))
        .with_discovery_timeout(Duration::from_millis(100))
        .with_census_interval(Duration::from_millis(200))
}

/// A config for devices that must wait for a submitted discovery instead
/// of self-promoting.
fn patient_config() -> RealmConfig {
    fast_config().with_discovery_timeout(Duration::from_secs(600))
}

fn start(net: &Arc<MemoryNet>, id: &str, config: RealmConfig) -> RealmHandle {
    coronet_logging::init_with_filter("warn");
    let connector = Arc::new(MemoryConnector::new(net.clone(), device(id)));
    Realm::start(
        device(id),
        config,
        connector,
        Arc::new(NullBeacon),
        Arc::new(NullAcceptor),
    )
}

/// Register every inbound fabric connection with the device's manager,
/// standing in for a transport acceptor.
fn accept_all(mut inbound: mpsc::UnboundedReceiver<Arc<dyn Connection>>, manager: ConnectionManager) {
    tokio::spawn(async move {
        while let Some(conn) = inbound.recv().await {
            manager.register(conn);
        }
    });
}

fn discovered_king(id: &str) -> Event {
    Event::DeviceDiscovered(DiscoveryEvent {
        device: device(id),
        role: Role::King,
    })
}

async fn wait_for_role(handle: &RealmHandle, role: Role) {
    let mut changes = handle.role_changes();
    tokio::time::timeout(Duration::from_secs(30), async {
        while *changes.borrow_and_update() != role {
            changes.changed().await.expect("state machine stopped");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for role {role}"));
}

async fn wait_for_connections(manager: &ConnectionManager, count: usize) {
    tokio::time::timeout(Duration::from_secs(30), async {
        while manager.connection_count() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for connections");
}

#[tokio::test(start_paused = true)]
async fn lone_device_crowns_itself() {
    let net = MemoryNet::new();
    let king = start(&net, "loner", fast_config());
    assert_eq!(king.role(), Role::Free);

    wait_for_role(&king, Role::King).await;
    king.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn discovered_king_gains_a_peasant_who_becomes_prince() {
    let net = MemoryNet::new();
    let king = start(&net, "aaa", fast_config());
    wait_for_role(&king, Role::King).await;
    accept_all(net.listen(device("aaa")).await, king.manager());

    let newcomer = start(&net, "bbb", patient_config());
    newcomer.submit(discovered_king("aaa"));
    wait_for_role(&newcomer, Role::Peasant).await;

    // The sole subject is pronounced heir and confirms over the wire.
    wait_for_role(&newcomer, Role::Prince).await;
    assert_eq!(king.role(), Role::King);
    assert_eq!(king.manager().connection_count(), 1);

    newcomer.shutdown().await;
    king.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn prince_succeeds_the_fallen_king_and_peasants_follow() {
    let net = MemoryNet::new();
    let king = start(&net, "aaa", fast_config());
    wait_for_role(&king, Role::King).await;
    accept_all(net.listen(device("aaa")).await, king.manager());

    let heir = start(&net, "bbb", patient_config());
    accept_all(net.listen(device("bbb")).await, heir.manager());
    heir.submit(discovered_king("aaa"));
    wait_for_role(&heir, Role::Prince).await;

    let follower = start(&net, "ccc", patient_config());
    follower.submit(discovered_king("aaa"));
    wait_for_role(&follower, Role::Peasant).await;
    wait_for_connections(&king.manager(), 2).await;

    // The King dies. The heir takes the throne and the peasant follows
    // it into the new kingdom.
    king.shutdown().await;
    wait_for_role(&heir, Role::King).await;
    wait_for_connections(&heir.manager(), 1).await;
    assert_eq!(follower.role(), Role::Peasant);

    follower.shutdown().await;
    heir.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn meeting_kingdoms_merge_under_the_smaller_id() {
    let net = MemoryNet::new();
    let winner = start(&net, "aaa", fast_config());
    let loser = start(&net, "zzz", fast_config());
    wait_for_role(&winner, Role::King).await;
    wait_for_role(&loser, Role::King).await;
    accept_all(net.listen(device("aaa")).await, winner.manager());

    winner.submit(discovered_king("zzz"));
    loser.submit(discovered_king("aaa"));

    // The loser abdicates and joins the winner's kingdom; as its only
    // subject it is then pronounced heir.
    wait_for_role(&loser, Role::Prince).await;
    assert_eq!(winner.role(), Role::King);
    assert_eq!(winner.manager().connection_count(), 1);

    loser.shutdown().await;
    winner.shutdown().await;
}

#[derive(Default)]
struct FlagBeacon {
    advertising: AtomicBool,
}

impl Beacon for FlagBeacon {
    fn start(&self) {
        self.advertising.store(true, Ordering::SeqCst);
    }
    fn stop(&self) {
        self.advertising.store(false, Ordering::SeqCst);
    }
    fn set_active_discovery(&self, _active: bool) {}
}

#[tokio::test(start_paused = true)]
async fn shutdown_silences_the_beacon() {
    let net = MemoryNet::new();
    let beacon = Arc::new(FlagBeacon::default());
    let connector = Arc::new(MemoryConnector::new(net.clone(), device("solo")));
    let handle = Realm::start(
        device("solo"),
        fast_config(),
        connector,
        beacon.clone(),
        Arc::new(NullAcceptor),
    );

    wait_for_role(&handle, Role::King).await;
    assert!(beacon.advertising.load(Ordering::SeqCst));

    handle.shutdown().await;
    assert!(!beacon.advertising.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn unreachable_new_king_leaves_the_device_free() {
    let net = MemoryNet::new();
    let loser = start(&net, "zzz", fast_config());
    wait_for_role(&loser, Role::King).await;

    // Nobody listens for the rival, so the bow-down join cannot land.
    loser.submit(discovered_king("aaa"));
    wait_for_role(&loser, Role::Free).await;

    // Back in Free the discovery window re-arms and the device recrowns.
    wait_for_role(&loser, Role::King).await;
    loser.shutdown().await;
}
