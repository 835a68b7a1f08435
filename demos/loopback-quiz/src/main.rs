//! A host and two bot participants playing one game over loopback.
//!
//! ```text
//! RUST_LOG=debug QUIZ_PORT=12345 cargo run -p loopback-quiz
//! ```

use std::time::Duration;

use quizline::prelude::*;
use rand::Rng;
use tracing_subscriber::EnvFilter;

const BOTS: [&str; 2] = ["Ada", "Grace"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = match std::env::var("QUIZ_PORT") {
        Ok(value) => value.parse()?,
        Err(_) => DEFAULT_PORT,
    };

    let mut host = QuizBuilder::new()
        .theme(Theme::Science)
        .port(port)
        .host()
        .await?;
    // The host may have fallen back to another port.
    let port = host.local_addr().map_or(port, |addr| addr.port());
    let snapshot = host.snapshot().await?;
    println!("hosting game {} on port {port}", snapshot.code);

    let mut bots = Vec::new();
    for name in BOTS {
        let bot = QuizBuilder::new()
            .player_name(name)
            .code(snapshot.code.clone())
            .port(port)
            .join("127.0.0.1")
            .await?;
        bots.push(tokio::spawn(play(bot)));
    }

    run_host(&mut host).await?;

    for bot in bots {
        bot.await?;
    }
    host.shutdown().await;
    Ok(())
}

async fn run_host(host: &mut QuizHandle) -> Result<(), QuizError> {
    let mut joined = 0;
    while let Some(event) = host.next_event().await {
        let QuizEvent::Session(event) = event else {
            continue;
        };
        match event {
            SessionEvent::PlayerJoined { player } => {
                println!("{player} joined");
                joined += 1;
                if joined == BOTS.len() {
                    host.start_game()?;
                }
            }
            SessionEvent::QuestionChanged {
                question,
                index,
                total,
            } => {
                println!("\nQ{}/{total}: {}", index + 1, question.prompt);
                for (i, choice) in question.choices.iter().enumerate() {
                    println!("  {i}) {choice}");
                }
            }
            SessionEvent::ResultsReady { results } => {
                for (player, correct) in results {
                    println!("  {player}: {}", if correct { "correct" } else { "wrong" });
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
                host.next_question()?;
            }
            SessionEvent::GameEnded { winner } => {
                match winner {
                    Winner::Player { name, score } => println!("\n{name} wins with {score}"),
                    Winner::NoWinner => println!("\nno winner"),
                }
                break;
            }
            _ => {}
        }
    }
    Ok(())
}

/// Answers every question with a random choice after a short think.
async fn play(mut bot: QuizHandle) {
    while let Some(event) = bot.next_event().await {
        match event {
            QuizEvent::Session(SessionEvent::QuestionChanged { question, .. }) => {
                let (think, choice) = {
                    let mut rng = rand::rng();
                    (
                        rng.random_range(200..2_000u64),
                        rng.random_range(0..question.choices.len().max(1)),
                    )
                };
                tokio::time::sleep(Duration::from_millis(think)).await;
                if let Err(e) = bot.submit_answer(choice) {
                    tracing::warn!(error = %e, "bot could not answer");
                    break;
                }
            }
            QuizEvent::Session(SessionEvent::GameEnded { .. })
            | QuizEvent::Transport(TransportEvent::Disconnected { .. }) => break,
            _ => {}
        }
    }
    bot.shutdown().await;
}
