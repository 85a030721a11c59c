use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use mindclash::{
    client::{
        bus_feed, ClientSnapshot, EndReason, GameApi, InProcessGameApi, RoomSubscription, Screen,
        SubscriptionHandle,
    },
    config::{CleanupConfig, ClientConfig},
    game::{GameRules, StragglerPolicy},
    quiz::{AnswerValue, Difficulty, StaticQuizSource},
    room::{repository::InMemoryRoomRepository, types::CreateRoomRequest, RoomServiceConfig},
    session::PlayerIdentity,
    EventBus, RoomService,
};

mod utils;

use utils::quiz_questions;

fn player(id: &str) -> PlayerIdentity {
    PlayerIdentity {
        id: id.to_string(),
        username: id.to_string(),
        avatar_url: None,
    }
}

async fn room_service(config: RoomServiceConfig) -> (Arc<RoomService>, String) {
    let service = Arc::new(RoomService::new(
        Arc::new(InMemoryRoomRepository::new()),
        Arc::new(StaticQuizSource::new(quiz_questions(2))),
        EventBus::new(),
        config,
    ));
    let pin = service
        .create_room(
            &player("host"),
            CreateRoomRequest {
                topic: "planets".to_string(),
                difficulty: Difficulty::Medium,
                count: 2,
                creator_avatar_url: None,
                questions: None,
            },
        )
        .await
        .unwrap()
        .pin;
    (service, pin)
}

fn follow(
    service: &Arc<RoomService>,
    pin: &str,
    id: &str,
    feed: Option<mindclash::client::ChangeStream>,
) -> SubscriptionHandle {
    let api: Arc<dyn GameApi> = Arc::new(InProcessGameApi::new(service.clone(), player(id)));
    RoomSubscription::start(api, pin, ClientConfig::default(), feed)
}

async fn screen(handle: &SubscriptionHandle, expected: Screen) -> ClientSnapshot {
    handle.wait_for(|s| s.screen == expected).await.unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_two_clients_converge_through_a_game() {
    let (service, pin) = room_service(RoomServiceConfig::default()).await;
    service.join_room(&pin, &player("guest")).await.unwrap();

    let feed = bus_feed(service.subscribe(&pin, "host").await.unwrap());
    let host = follow(&service, &pin, "host", Some(feed));
    let guest = follow(&service, &pin, "guest", None);
    screen(&host, Screen::Lobby).await;
    screen(&guest, Screen::Lobby).await;

    host.start_game().await.unwrap();
    screen(&host, Screen::Question { index: 0 }).await;
    screen(&guest, Screen::Question { index: 0 }).await;

    host.submit_answer(0, Some(AnswerValue::Index(0)), Some(2.0))
        .await
        .unwrap();
    screen(&host, Screen::WaitingForPlayers { index: 0 }).await;
    guest
        .submit_answer(0, Some(AnswerValue::Index(3)), Some(4.0))
        .await
        .unwrap();

    let host_results = screen(&host, Screen::Results { index: 0 }).await;
    let guest_results = screen(&guest, Screen::Results { index: 0 }).await;
    assert_eq!(host_results.results, guest_results.results);
    assert_eq!(host_results.results.as_ref().unwrap().correct_answer, "Red");

    screen(&guest, Screen::Leaderboard { index: 0 }).await;
    host.advance_question().await.unwrap();
    let next = screen(&host, Screen::Question { index: 1 }).await;
    assert!(next.selected_answer.is_none());
    assert!(next.results.is_none());
    screen(&guest, Screen::Question { index: 1 }).await;

    host.submit_answer(1, Some(AnswerValue::Index(1)), None)
        .await
        .unwrap();
    guest
        .submit_answer(1, Some(AnswerValue::Index(1)), None)
        .await
        .unwrap();

    let host_final = screen(&host, Screen::Finished).await;
    let guest_final = screen(&guest, Screen::Finished).await;
    assert_eq!(host_final.leaderboard, guest_final.leaderboard);
    assert_eq!(host_final.leaderboard[0].id, "host");
    assert_eq!(host_final.leaderboard[0].score, 200);
    assert_eq!(host_final.leaderboard[1].score, 100);

    // Displayed scores are exactly what the server holds
    let view = service.get_room_view(&pin, "guest").await.unwrap();
    let guest_final = guest.wait_for(|s| s.scores == view.players).await.unwrap();
    assert_eq!(guest_final.screen, Screen::Finished);

    host.shutdown().await;
    guest.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_stale_submission_clears_selection() {
    let config = RoomServiceConfig {
        rules: GameRules {
            straggler_policy: StragglerPolicy::ScoreAsNoAnswer,
            ..GameRules::default()
        },
        ..RoomServiceConfig::default()
    };
    let (service, pin) = room_service(config).await;
    service.join_room(&pin, &player("guest")).await.unwrap();
    service.start_game(&pin, "host").await.unwrap();

    let guest = follow(&service, &pin, "guest", None);
    screen(&guest, Screen::Question { index: 0 }).await;

    // The host moves on before the guest's answer lands
    service.advance_question(&pin, "host").await.unwrap();
    guest
        .submit_answer(0, Some(AnswerValue::Index(0)), None)
        .await
        .unwrap();

    let snapshot = screen(&guest, Screen::Question { index: 1 }).await;
    assert!(snapshot.selected_answer.is_none());
    assert!(snapshot.last_answer.is_none());
    assert!(snapshot.transient_error.is_none());

    let view = service.get_room_view(&pin, "guest").await.unwrap();
    assert_eq!(view.player("guest").unwrap().score, 0);
    guest.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_expired_room_ends_every_client() {
    let (service, pin) = room_service(RoomServiceConfig::default()).await;
    service.join_room(&pin, &player("guest")).await.unwrap();

    let feed = bus_feed(service.subscribe(&pin, "host").await.unwrap());
    let host = follow(&service, &pin, "host", Some(feed));
    let guest = follow(&service, &pin, "guest", None);
    screen(&host, Screen::Lobby).await;
    screen(&guest, Screen::Lobby).await;

    let cleanup = CleanupConfig {
        interval: Duration::from_secs(60),
        completed_room_ttl: Duration::from_secs(1),
        idle_room_ttl: Duration::from_secs(1),
    };
    let removed = service
        .expire_rooms(Utc::now() + chrono::Duration::hours(1), &cleanup)
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let host_end = host.wait_for(|s| s.screen.is_ended()).await.unwrap();
    let guest_end = guest.wait_for(|s| s.screen.is_ended()).await.unwrap();
    assert_eq!(host_end.screen, Screen::Ended(EndReason::RoomGone));
    assert_eq!(guest_end.screen, Screen::Ended(EndReason::RoomGone));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(host.is_finished());
    assert!(guest.is_finished());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_cancels_subscription() {
    let (service, pin) = room_service(RoomServiceConfig::default()).await;
    let host = follow(&service, &pin, "host", None);
    screen(&host, Screen::Lobby).await;

    let mut state = host.watch();
    state.borrow_and_update();
    drop(host);

    // Once the task is gone the watch channel closes
    assert!(state.changed().await.is_err());
}
