//! Misbehavior decay and broker session scenarios.

use lattice_network::{
    BrokerAction, BrokerEvent, BrokerHandler, MisbehaviorStatus, MisbehaviorStorage,
    NetworkSettings, Offense, Payload,
};
use lattice_types::{BrokerInfo, Hash};
use std::net::IpAddr;

fn peer() -> IpAddr {
    "192.0.2.7".parse().unwrap()
}

#[test]
fn test_misbehavior_below_threshold_stays_unbanned() {
    let storage = MisbehaviorStorage::new(NetworkSettings {
        ban_threshold: 100,
        ..NetworkSettings::default()
    });
    storage.update(peer(), 10, 0);
    assert!(!storage.is_banned(peer(), 0));
    assert_eq!(storage.get(peer(), 0), MisbehaviorStatus::Penalty(10));
}

#[test]
fn test_misbehavior_ban_and_decay() {
    let settings = NetworkSettings {
        ban_threshold: 10,
        ban_duration_ms: 5_000,
        ..NetworkSettings::default()
    };
    let storage = MisbehaviorStorage::new(settings);

    // Score reaches the threshold: banned.
    let status = storage.update(peer(), 10, 0);
    assert_eq!(status, MisbehaviorStatus::Banned { until: 5_000 });
    assert!(storage.is_banned(peer(), 4_999));

    // Past the ban duration the peer reads as a clean penalty record.
    assert!(!storage.is_banned(peer(), 5_001));
    assert_eq!(storage.get(peer(), 5_001), MisbehaviorStatus::Penalty(0));
}

/// Full broker conversation: handshake, sync framing, ping liveness.
#[test]
fn test_broker_session_conversation() {
    let local = BrokerInfo::solo(Hash::hash(b"clique-a"), 2);
    let (mut handler, opening) = BrokerHandler::new(local);
    assert!(matches!(
        opening.as_slice(),
        [BrokerAction::Send(Payload::Hello { .. })]
    ));

    // Remote hello from a foreign clique.
    let remote = BrokerInfo::solo(Hash::hash(b"clique-b"), 2);
    let actions = handler
        .handle(BrokerEvent::Payload(Payload::Hello {
            clique_id: remote.clique_id,
            broker_info: remote,
        }))
        .unwrap();
    assert_eq!(
        actions,
        vec![BrokerAction::StartSync {
            intra_clique: false
        }]
    );

    // Inter-clique sync request is handed to the sync layer.
    let request = Payload::SyncRequest {
        locators: vec![vec![], vec![]],
    };
    let actions = handler
        .handle(BrokerEvent::Payload(request.clone()))
        .unwrap();
    assert_eq!(
        actions,
        vec![BrokerAction::Deliver {
            payload: request,
            intra_clique: false
        }]
    );

    // Ping goes out; matching pong keeps the session alive.
    let actions = handler
        .handle(BrokerEvent::PingTick { now: 10_000 })
        .unwrap();
    let nonce = match actions.as_slice() {
        [BrokerAction::Send(Payload::Ping { nonce, .. })] => *nonce,
        other => panic!("unexpected actions {other:?}"),
    };
    assert!(handler
        .handle(BrokerEvent::Payload(Payload::Pong { nonce }))
        .unwrap()
        .is_empty());

    // A missed pong at the next tick tears the session down with a
    // timeout report, and the closed session refuses further events.
    handler
        .handle(BrokerEvent::PingTick { now: 20_000 })
        .unwrap();
    let actions = handler
        .handle(BrokerEvent::PingTick { now: 30_000 })
        .unwrap();
    assert_eq!(
        actions,
        vec![
            BrokerAction::Report(Offense::RequestTimeout),
            BrokerAction::Close
        ]
    );
    assert!(handler
        .handle(BrokerEvent::PingTick { now: 40_000 })
        .is_err());
}

/// Payload before hello is spam and feeds the penalty ledger.
#[test]
fn test_spam_before_hello_feeds_misbehavior() {
    let local = BrokerInfo::solo(Hash::hash(b"clique-a"), 2);
    let (mut handler, _) = BrokerHandler::new(local);
    let actions = handler
        .handle(BrokerEvent::Payload(Payload::Ping {
            nonce: 5,
            timestamp: 0,
        }))
        .unwrap();

    let storage = MisbehaviorStorage::new(NetworkSettings::default());
    for action in actions {
        if let BrokerAction::Report(offense) = action {
            storage.report(peer(), offense, 0);
        }
    }
    // Spamming alone crosses the default threshold.
    assert!(storage.is_banned(peer(), 0));
}
