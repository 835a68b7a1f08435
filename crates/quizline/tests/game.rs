//! End-to-end tests: a host node and participant nodes playing over
//! loopback TCP.
//!
//! These run on the real clock. Games that must not time out use a long
//! countdown; the timeout test shortens the tick interval instead.

use std::time::Duration;

use quizline::prelude::*;
use quizline_transport::TransportError;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

// =========================================================================
// Helpers
// =========================================================================

const WAIT: Duration = Duration::from_secs(5);

async fn host() -> QuizHandle {
    host_with(QuizBuilder::new().countdown_secs(60)).await
}

async fn host_with(builder: QuizBuilder) -> QuizHandle {
    builder
        .codes(FixedCodes::new(["777777"]))
        .host_on("127.0.0.1:0".parse().unwrap())
        .await
        .expect("host should bind")
}

async fn join(host: &QuizHandle, name: &str) -> QuizHandle {
    QuizBuilder::new()
        .player_name(name)
        .countdown_secs(60)
        .port(host.local_addr().unwrap().port())
        .join("127.0.0.1")
        .await
        .expect("participant should connect")
}

/// Skips events until one matches.
async fn wait_for(
    handle: &mut QuizHandle,
    mut pred: impl FnMut(&QuizEvent) -> bool,
) -> QuizEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            let event = handle.next_event().await.expect("node should be running");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event should arrive")
}

async fn player_joined(handle: &mut QuizHandle, name: &str) {
    wait_for(handle, |e| {
        matches!(e, QuizEvent::Session(SessionEvent::PlayerJoined { player }) if player == name)
    })
    .await;
}

async fn question_changed(handle: &mut QuizHandle, index: usize) -> Question {
    match wait_for(handle, |e| {
        matches!(e, QuizEvent::Session(SessionEvent::QuestionChanged { index: i, .. }) if *i == index)
    })
    .await
    {
        QuizEvent::Session(SessionEvent::QuestionChanged { question, .. }) => question,
        other => unreachable!("{other:?}"),
    }
}

async fn results_ready(handle: &mut QuizHandle) -> Vec<(String, bool)> {
    match wait_for(handle, |e| {
        matches!(e, QuizEvent::Session(SessionEvent::ResultsReady { .. }))
    })
    .await
    {
        QuizEvent::Session(SessionEvent::ResultsReady { results }) => results,
        other => unreachable!("{other:?}"),
    }
}

async fn game_ended(handle: &mut QuizHandle) -> Winner {
    match wait_for(handle, |e| {
        matches!(e, QuizEvent::Session(SessionEvent::GameEnded { .. }))
    })
    .await
    {
        QuizEvent::Session(SessionEvent::GameEnded { winner }) => winner,
        other => unreachable!("{other:?}"),
    }
}

async fn disconnected(handle: &mut QuizHandle) {
    wait_for(handle, |e| {
        matches!(e, QuizEvent::Transport(TransportEvent::Disconnected { .. }))
    })
    .await;
}

/// A `join_game` line as a raw client would write it.
fn join_frame(name: &str) -> Vec<u8> {
    format!(
        "{{\"type\":\"join_game\",\"data\":{{\"playerName\":\"{name}\"}},\"sender\":\"{name}\"}}\n"
    )
    .into_bytes()
}

fn wrong(question: &Question) -> usize {
    (question.correct_index + 1) % question.choices.len()
}

// =========================================================================
// Setup
// =========================================================================

#[tokio::test]
async fn test_host_reports_created_and_listening() {
    let mut host = host().await;
    let addr = host.local_addr().unwrap();

    wait_for(&mut host, |e| {
        *e == QuizEvent::Session(SessionEvent::Created {
            code: "777777".into(),
        })
    })
    .await;
    wait_for(&mut host, |e| {
        *e == QuizEvent::Transport(TransportEvent::Listening { addr })
    })
    .await;

    let snapshot = host.snapshot().await.unwrap();
    assert_eq!(snapshot.role, Role::Host);
    assert_eq!(snapshot.code, "777777");
    assert_eq!(snapshot.state, GameState::Waiting);
    assert_eq!(snapshot.total_questions, 5);
    assert!(snapshot.players.is_empty());
    assert_eq!(snapshot.winner, None);
}

#[tokio::test]
async fn test_join_closed_port_returns_connect_error() {
    let port = {
        let scratch = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        scratch.local_addr().unwrap().port()
    };

    let result = QuizBuilder::new()
        .player_name("Alice")
        .port(port)
        .join("127.0.0.1")
        .await;

    assert!(matches!(
        result,
        Err(QuizError::Transport(TransportError::Connect(_)))
    ));
}

#[tokio::test]
async fn test_participant_join_registers_on_host() {
    let mut host = host().await;
    let alice = join(&host, "Alice").await;

    player_joined(&mut host, "Alice").await;

    assert_eq!(alice.role(), Role::Participant);
    assert_eq!(alice.player_name(), Some("Alice"));
    assert_eq!(host.snapshot().await.unwrap().players, vec!["Alice"]);
}

#[tokio::test]
async fn test_participant_without_name_gets_generated_one() {
    let mut host = host().await;
    let anon = QuizBuilder::new()
        .port(host.local_addr().unwrap().port())
        .join("127.0.0.1")
        .await
        .unwrap();
    let name = anon.player_name().unwrap().to_string();
    assert!(name.starts_with("player_"));

    player_joined(&mut host, &name).await;
}

#[tokio::test]
async fn test_garbage_frame_is_discarded_and_connection_kept() {
    let mut host = host().await;
    let mut raw = TcpStream::connect(host.local_addr().unwrap()).await.unwrap();

    raw.write_all(b"not json at all\n{\"type\":\"bogus\"}\n").await.unwrap();
    raw.write_all(b"{\"type\":\"join_game\",\"data\":{\"playerName\":\"Raw\"},\"sender\":\"Raw\"}\n")
        .await
        .unwrap();

    player_joined(&mut host, "Raw").await;
}

// =========================================================================
// Playing
// =========================================================================

#[tokio::test]
async fn test_full_game_host_scores_and_participants_mirror() {
    let mut host = host().await;
    let mut alice = join(&host, "Alice").await;
    player_joined(&mut host, "Alice").await;
    let mut bob = join(&host, "Bob").await;
    player_joined(&mut host, "Bob").await;

    host.start_game().unwrap();
    wait_for(&mut alice, |e| *e == QuizEvent::Session(SessionEvent::GameStarted)).await;

    for index in 0..5 {
        let question = question_changed(&mut alice, index).await;
        assert_eq!(question_changed(&mut bob, index).await, question);

        alice.submit_answer(question.correct_index).unwrap();
        bob.submit_answer(wrong(&question)).unwrap();

        let on_host = results_ready(&mut host).await;
        assert_eq!(
            on_host,
            vec![("Alice".to_string(), true), ("Bob".to_string(), false)]
        );
        let on_alice = results_ready(&mut alice).await;
        assert!(on_alice.contains(&("Alice".to_string(), true)));
        assert!(on_alice.contains(&("Bob".to_string(), false)));
        results_ready(&mut bob).await;

        host.next_question().unwrap();
    }

    let expected = Winner::Player {
        name: "Alice".into(),
        score: 5,
    };
    assert_eq!(game_ended(&mut host).await, expected);
    assert_eq!(game_ended(&mut alice).await, expected);
    assert_eq!(game_ended(&mut bob).await, expected);

    let snapshot = host.snapshot().await.unwrap();
    assert_eq!(snapshot.state, GameState::Finished);
    assert_eq!(
        snapshot.scores,
        vec![("Alice".to_string(), 5), ("Bob".to_string(), 0)]
    );
    assert_eq!(snapshot.winner, Some(expected));

    let mirror = bob.snapshot().await.unwrap();
    assert_eq!(mirror.state, GameState::Finished);
    assert_eq!(mirror.scores.iter().find(|(n, _)| n == "Alice").unwrap().1, 5);
}

#[tokio::test]
async fn test_participant_mirror_loads_host_theme() {
    let mut host = host_with(QuizBuilder::new().theme(Theme::Culture).countdown_secs(60)).await;
    let mut alice = join(&host, "Alice").await;
    player_joined(&mut host, "Alice").await;

    host.start_game().unwrap();
    let question = question_changed(&mut alice, 0).await;

    assert_eq!(question, Theme::Culture.questions()[0]);
    assert_eq!(alice.snapshot().await.unwrap().theme, Theme::Culture);
}

#[tokio::test]
async fn test_countdown_expiry_closes_question_on_host_and_mirror() {
    let mut host = host_with(
        QuizBuilder::new()
            .countdown_secs(3)
            .tick_interval(Duration::from_millis(25)),
    )
    .await;
    let mut alice = join(&host, "Alice").await;
    player_joined(&mut host, "Alice").await;

    host.start_game().unwrap();

    let mut seconds = Vec::new();
    loop {
        match wait_for(&mut host, |e| {
            matches!(
                e,
                QuizEvent::Session(
                    SessionEvent::CountdownTick { .. } | SessionEvent::ResultsReady { .. }
                )
            )
        })
        .await
        {
            QuizEvent::Session(SessionEvent::CountdownTick { seconds_left }) => {
                seconds.push(seconds_left)
            }
            QuizEvent::Session(SessionEvent::ResultsReady { results }) => {
                assert_eq!(results, vec![("Alice".to_string(), false)]);
                break;
            }
            other => unreachable!("{other:?}"),
        }
    }
    assert_eq!(seconds, vec![3, 2, 1, 0]);

    assert_eq!(
        results_ready(&mut alice).await,
        vec![("Alice".to_string(), false)]
    );
    assert_eq!(host.snapshot().await.unwrap().state, GameState::ShowingResults);
}

#[tokio::test]
async fn test_host_with_player_name_plays_its_own_game() {
    let mut host = host_with(
        QuizBuilder::new()
            .player_name("Quizmaster")
            .countdown_secs(60),
    )
    .await;
    let mut alice = join(&host, "Alice").await;
    player_joined(&mut host, "Alice").await;

    host.start_game().unwrap();
    let question = question_changed(&mut alice, 0).await;
    host.submit_answer(question.correct_index).unwrap();
    alice.submit_answer(wrong(&question)).unwrap();

    assert_eq!(
        results_ready(&mut host).await,
        vec![("Quizmaster".to_string(), true), ("Alice".to_string(), false)]
    );
    results_ready(&mut alice).await;
    let mirror = alice.snapshot().await.unwrap();
    assert!(mirror.scores.contains(&("Quizmaster".to_string(), 1)));
}

#[tokio::test]
async fn test_participant_cannot_drive_the_game() {
    let mut host = host().await;
    let alice = join(&host, "Alice").await;
    player_joined(&mut host, "Alice").await;

    alice.start_game().unwrap();
    alice.next_question().unwrap();

    assert_eq!(alice.snapshot().await.unwrap().state, GameState::Waiting);
    assert_eq!(host.snapshot().await.unwrap().state, GameState::Waiting);
}

#[tokio::test]
async fn test_late_joiner_catches_up_to_open_question() {
    let mut host = host().await;
    let mut alice = join(&host, "Alice").await;
    player_joined(&mut host, "Alice").await;
    host.start_game().unwrap();
    let first = question_changed(&mut alice, 0).await;
    alice.submit_answer(first.correct_index).unwrap();
    results_ready(&mut alice).await;
    host.next_question().unwrap();
    let second = question_changed(&mut alice, 1).await;

    let mut carol = join(&host, "Carol").await;
    player_joined(&mut host, "Carol").await;

    assert_eq!(question_changed(&mut carol, 1).await, second);
    let snapshot = carol.snapshot().await.unwrap();
    assert_eq!(snapshot.state, GameState::QuestionActive);
    assert_eq!(snapshot.question_index, 1);
}

// =========================================================================
// Leaving
// =========================================================================

#[tokio::test]
async fn test_disconnect_mid_question_keeps_score_and_closes_question() {
    let mut host = host().await;
    let mut alice = join(&host, "Alice").await;
    player_joined(&mut host, "Alice").await;
    let mut bob = join(&host, "Bob").await;
    player_joined(&mut host, "Bob").await;

    // First question: both right, so Bob has a score to keep.
    host.start_game().unwrap();
    let first = question_changed(&mut alice, 0).await;
    question_changed(&mut bob, 0).await;
    alice.submit_answer(first.correct_index).unwrap();
    bob.submit_answer(first.correct_index).unwrap();
    results_ready(&mut host).await;
    host.next_question().unwrap();

    // Second question: Alice answers, then Bob drops.
    let second = question_changed(&mut alice, 1).await;
    alice.submit_answer(wrong(&second)).unwrap();
    wait_for(&mut host, |e| {
        matches!(e, QuizEvent::Session(SessionEvent::AnswerSubmitted { player, .. }) if player == "Alice")
    })
    .await;
    bob.shutdown().await;

    wait_for(&mut host, |e| {
        matches!(e, QuizEvent::Session(SessionEvent::PlayerLeft { player }) if player == "Bob")
    })
    .await;
    assert_eq!(
        results_ready(&mut host).await,
        vec![("Alice".to_string(), false), ("Bob".to_string(), false)]
    );

    let snapshot = host.snapshot().await.unwrap();
    assert_eq!(snapshot.players, vec!["Alice"]);
    assert_eq!(
        snapshot.scores,
        vec![("Alice".to_string(), 1), ("Bob".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_dropped_connection_using_host_name_keeps_host_player() {
    let mut host = host_with(
        QuizBuilder::new()
            .player_name("Quizmaster")
            .countdown_secs(60),
    )
    .await;
    let mut raw = TcpStream::connect(host.local_addr().unwrap()).await.unwrap();
    raw.write_all(&join_frame("Quizmaster")).await.unwrap();

    drop(raw);
    disconnected(&mut host).await;

    let snapshot = host.snapshot().await.unwrap();
    assert_eq!(snapshot.players, vec!["Quizmaster"]);
}

#[tokio::test]
async fn test_second_join_on_one_connection_is_ignored() {
    let mut host = host().await;
    let mut raw = TcpStream::connect(host.local_addr().unwrap()).await.unwrap();
    raw.write_all(&join_frame("Ann")).await.unwrap();
    raw.write_all(&join_frame("Ben")).await.unwrap();
    player_joined(&mut host, "Ann").await;

    drop(raw);
    wait_for(&mut host, |e| {
        matches!(e, QuizEvent::Session(SessionEvent::PlayerLeft { player }) if player == "Ann")
    })
    .await;

    let snapshot = host.snapshot().await.unwrap();
    assert!(snapshot.players.is_empty());
    assert_eq!(snapshot.scores, vec![("Ann".to_string(), 0)]);
}

#[tokio::test]
async fn test_host_shutdown_disconnects_participants() {
    let mut host = host().await;
    let mut alice = join(&host, "Alice").await;
    player_joined(&mut host, "Alice").await;

    host.shutdown().await;

    wait_for(&mut alice, |e| {
        matches!(e, QuizEvent::Transport(TransportEvent::Disconnected { .. }))
    })
    .await;
    // The participant node keeps running with its mirror intact.
    assert_eq!(alice.snapshot().await.unwrap().players, vec!["Alice"]);
}

#[tokio::test]
async fn test_commands_after_shutdown_return_stopped() {
    let mut host = host().await;

    host.shutdown().await;

    assert!(matches!(host.start_game(), Err(QuizError::Stopped)));
    assert!(matches!(host.snapshot().await, Err(QuizError::Stopped)));
}
