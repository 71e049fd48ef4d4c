//! Two clients play a full round against a live server

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dinewheel_core::{
    DiningPreferences, MatchType, MemoryStorage, Restaurant, RoomCode, RoomEvent, RoomState,
    SessionManager,
};
use dinewheel_net::{Client, Request, Response, RoomHub, Server};

fn dataset() -> Vec<Restaurant> {
    vec![
        Restaurant::new("1", "Balthazar")
            .located("SoHo", "80 Spring St")
            .priced("$$")
            .serving(["French"]),
        Restaurant::new("2", "Katz's")
            .located("Lower East Side", "205 E Houston St")
            .priced("$")
            .serving(["Deli"]),
    ]
}

async fn start() -> (Server, SocketAddr) {
    let hub = Arc::new(RoomHub::default());
    let sessions = Arc::new(SessionManager::with_seed(
        MemoryStorage::with_restaurants(dataset()),
        hub.clone(),
        2024,
    ));
    let server = Server::start(0, sessions, hub, 8).await.unwrap();
    let addr = SocketAddr::from(([127, 0, 0, 1], server.addr().port()));
    (server, addr)
}

/// Wait for the first event matching `pred`, skipping others
async fn wait_for<F>(client: &mut Client, mut pred: F) -> RoomEvent
where
    F: FnMut(&RoomEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let (_, event) = client.next_event().await.expect("connection closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

fn expect_ack(response: Response) {
    match response {
        Response::Ack { success, error, .. } => assert!(success, "request failed: {:?}", error),
        other => panic!("Expected Ack, got {:?}", other),
    }
}

#[tokio::test]
async fn test_full_round_over_tcp() {
    let (server, addr) = start().await;
    let mut owner = Client::connect(addr).await.unwrap();
    let mut guest = Client::connect(addr).await.unwrap();

    let code: RoomCode = match owner
        .request(&Request::CreateRoom {
            name: "Olivia".into(),
            preferences: DiningPreferences::new("SoHo", "$$").with_categories(["Italian"]),
        })
        .await
        .unwrap()
    {
        Response::RoomCreated { code, member } => {
            assert_eq!(member.id, "owner");
            code
        }
        other => panic!("Expected RoomCreated, got {:?}", other),
    };

    match guest
        .request(&Request::JoinRoom {
            code,
            name: "Gus".into(),
            preferences: DiningPreferences::new("Lower East Side", "$").with_categories(["Deli"]),
            user_id: Some("42".into()),
        })
        .await
        .unwrap()
    {
        Response::Joined { member, .. } => assert_eq!(member.id, "user_42"),
        other => panic!("Expected Joined, got {:?}", other),
    }
    wait_for(&mut owner, |e| matches!(e, RoomEvent::MemberJoined { .. })).await;

    expect_ack(owner.request(&Request::StartSpinning).await.unwrap());
    wait_for(&mut guest, |e| matches!(e, RoomEvent::SpinStarted { .. })).await;

    // Guest is second in turn order
    match guest.request(&Request::Spin).await.unwrap() {
        Response::SpinResult { success, error, .. } => {
            assert!(!success);
            assert_eq!(error.as_deref(), Some("not your turn"));
        }
        other => panic!("Expected SpinResult, got {:?}", other),
    }

    match owner.request(&Request::Spin).await.unwrap() {
        Response::SpinResult { success, spin, .. } => {
            assert!(success);
            let spin = spin.unwrap();
            assert_eq!(spin.match_type, MatchType::LocationPrice);
            assert_eq!(spin.restaurant.unwrap().name, "Balthazar");
        }
        other => panic!("Expected SpinResult, got {:?}", other),
    }
    match wait_for(&mut guest, |e| matches!(e, RoomEvent::SpinResult { .. })).await {
        RoomEvent::SpinResult { next_member_id, .. } => {
            assert_eq!(next_member_id.as_deref(), Some("user_42"))
        }
        _ => unreachable!(),
    }

    match guest.request(&Request::Spin).await.unwrap() {
        Response::SpinResult { success, spin, .. } => {
            assert!(success);
            assert_eq!(spin.unwrap().match_type, MatchType::Exact);
        }
        other => panic!("Expected SpinResult, got {:?}", other),
    }

    let options = match owner.request(&Request::Reveal).await.unwrap() {
        Response::Revealed {
            success, options, ..
        } => {
            assert!(success);
            options
        }
        other => panic!("Expected Revealed, got {:?}", other),
    };
    assert_eq!(options.len(), 2);
    let katz = options
        .iter()
        .position(|o| o.member_id == "user_42")
        .unwrap();

    expect_ack(owner.request(&Request::Vote { option_index: katz }).await.unwrap());
    expect_ack(guest.request(&Request::Vote { option_index: katz }).await.unwrap());
    expect_ack(owner.request(&Request::ConfirmVote).await.unwrap());
    expect_ack(guest.request(&Request::ConfirmVote).await.unwrap());

    match wait_for(&mut owner, |e| matches!(e, RoomEvent::WinnerSelected { .. })).await {
        RoomEvent::WinnerSelected { winner } => {
            assert_eq!(winner.restaurant.unwrap().name, "Katz's");
            assert_eq!(winner.votes, 2);
            assert!(!winner.tie_broken);
        }
        _ => unreachable!(),
    }

    match guest.request(&Request::Status { code: None }).await.unwrap() {
        Response::Status { status } => {
            assert_eq!(status.state, RoomState::Complete);
            assert_eq!(status.current_round, 1);
            assert!(status.winner.is_some());
        }
        other => panic!("Expected Status, got {:?}", other),
    }

    expect_ack(guest.request(&Request::StartNewRound).await.unwrap());
    match wait_for(&mut owner, |e| matches!(e, RoomEvent::RoundStarted { .. })).await {
        RoomEvent::RoundStarted { round, turn_order } => {
            assert_eq!(round, 2);
            assert_eq!(turn_order, vec!["owner", "user_42"]);
        }
        _ => unreachable!(),
    }

    server.shutdown();
}

#[tokio::test]
async fn test_owner_closes_room() {
    let (server, addr) = start().await;
    let mut owner = Client::connect(addr).await.unwrap();
    let mut guest = Client::connect(addr).await.unwrap();

    let code = match owner
        .request(&Request::CreateRoom {
            name: "Olivia".into(),
            preferences: DiningPreferences::new("SoHo", "$$").with_categories(["French"]),
        })
        .await
        .unwrap()
    {
        Response::RoomCreated { code, .. } => code,
        other => panic!("Expected RoomCreated, got {:?}", other),
    };
    match guest
        .request(&Request::JoinRoom {
            code,
            name: "Gus".into(),
            preferences: DiningPreferences::new("SoHo", "$").with_categories(["Deli"]),
            user_id: None,
        })
        .await
        .unwrap()
    {
        Response::Joined { .. } => {}
        other => panic!("Expected Joined, got {:?}", other),
    }

    match guest.request(&Request::CloseRoom).await.unwrap() {
        Response::Ack {
            success,
            error,
            kind,
        } => {
            assert!(!success);
            assert_eq!(error.as_deref(), Some("only the owner can close the room"));
            assert_eq!(kind, Some(dinewheel_core::ErrorKind::StateViolation));
        }
        other => panic!("Expected Ack, got {:?}", other),
    }

    expect_ack(owner.request(&Request::CloseRoom).await.unwrap());
    wait_for(&mut guest, |e| matches!(e, RoomEvent::RoomClosed)).await;

    // The guest is still pointed at the old code, the owner at nothing
    match guest.request(&Request::Status { code: None }).await.unwrap() {
        Response::Error { kind, .. } => assert_eq!(kind, Some(dinewheel_core::ErrorKind::NotFound)),
        other => panic!("Expected Error, got {:?}", other),
    }
    match owner.request(&Request::Status { code: None }).await.unwrap() {
        Response::Error { reason, .. } => assert_eq!(reason, "create or join a room first"),
        other => panic!("Expected Error, got {:?}", other),
    }

    server.shutdown();
}

#[tokio::test]
async fn test_invalid_requests_fail_cleanly() {
    let (server, addr) = start().await;
    let mut client = Client::connect(addr).await.unwrap();

    match client
        .request(&Request::CreateRoom {
            name: "Olivia".into(),
            preferences: DiningPreferences::new("SoHo", ""),
        })
        .await
        .unwrap()
    {
        Response::Error { kind, .. } => {
            assert_eq!(kind, Some(dinewheel_core::ErrorKind::Validation))
        }
        other => panic!("Expected Error, got {:?}", other),
    }

    let missing = RoomCode::new(1000).unwrap();
    match client
        .request(&Request::Status {
            code: Some(missing),
        })
        .await
        .unwrap()
    {
        Response::Error { kind, .. } => assert_eq!(kind, Some(dinewheel_core::ErrorKind::NotFound)),
        other => panic!("Expected Error, got {:?}", other),
    }

    client.ping().await.unwrap();
    server.shutdown();
}
