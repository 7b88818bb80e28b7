//! Console command - the device's serial-style line console.
//!
//! Single-character commands drive the face; anything else is chat.

use miette::IntoDiagnostic;
use mochi_ai::{AgentConfig, CancelToken, ConversationManager, ErrorKind};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::face::{ConsoleFace, FaceController};

/// Message sent by the `h` command.
pub(crate) const GREETING: &str = "こんにちは!";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConsoleCommand {
    Blink,
    Talk,
    Surprise,
    Reset,
    Help,
    /// `l` without a message.
    Usage,
    Chat(String),
}

impl ConsoleCommand {
    /// Parse a line; blank lines yield `None`.
    pub(crate) fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let command = match line {
            "" => return None,
            "b" => ConsoleCommand::Blink,
            "t" => ConsoleCommand::Talk,
            "s" => ConsoleCommand::Surprise,
            "r" => ConsoleCommand::Reset,
            "h" => ConsoleCommand::Chat(GREETING.to_string()),
            "?" => ConsoleCommand::Help,
            "l" => ConsoleCommand::Usage,
            _ => match line.strip_prefix("l ") {
                Some(message) if !message.trim().is_empty() => {
                    ConsoleCommand::Chat(message.trim().to_string())
                }
                Some(_) => ConsoleCommand::Usage,
                None => ConsoleCommand::Chat(line.to_string()),
            },
        };
        Some(command)
    }
}

pub(crate) async fn run(config: &AgentConfig) -> miette::Result<()> {
    println!("✨ Mochi");
    println!("Backend: {}", config.mode);
    print_help();

    let mut manager = ConversationManager::from_config(config);
    if manager.mode() != config.mode {
        println!("Falling back to {} replies", manager.mode());
    }
    let mut face = ConsoleFace::new();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.into_diagnostic()?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        if let Some(command) = ConsoleCommand::parse(&line) {
            handle(command, &mut manager, &mut face).await;
        }
    }

    println!("👋 またね!");
    Ok(())
}

pub(crate) async fn handle<F: FaceController>(
    command: ConsoleCommand,
    manager: &mut ConversationManager,
    face: &mut F,
) {
    match command {
        ConsoleCommand::Blink => face.blink(),
        ConsoleCommand::Talk => face.talk("テストだよ!"),
        ConsoleCommand::Surprise => face.surprise(),
        ConsoleCommand::Reset => face.reset(),
        ConsoleCommand::Help => print_help(),
        ConsoleCommand::Usage => println!("Usage: l <message>"),
        ConsoleCommand::Chat(message) => {
            let reply = chat(manager, &message).await;
            face.talk(&reply);
        }
    }
}

/// Chat once; Ctrl-C cancels the request in flight.
async fn chat(manager: &mut ConversationManager, message: &str) -> String {
    let token = CancelToken::new();
    let canceller = token.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    let result = manager.chat_with_cancel(message, &token).await;
    watcher.abort();

    match result {
        Ok(reply) if reply.is_empty() => ErrorKind::EmptyResponse.fallback_text().to_string(),
        Ok(reply) => reply,
        Err(kind) => {
            debug!("Chat error: {}", kind);
            kind.fallback_text().to_string()
        }
    }
}

fn print_help() {
    println!();
    println!("Commands:");
    println!("  b            - blink");
    println!("  t            - talk");
    println!("  s            - surprise");
    println!("  r            - reset to idle");
    println!("  h            - say hello");
    println!("  l <message>  - chat");
    println!("  ?            - this help");
    println!("Any other line is sent as chat.");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use mochi_ai::{Backend, BackendDispatcher, RuleBasedResponder, StaticProbe};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingFace {
        calls: Vec<String>,
    }

    impl FaceController for RecordingFace {
        fn blink(&mut self) {
            self.calls.push("blink".into());
        }

        fn talk(&mut self, text: &str) {
            self.calls.push(format!("talk:{text}"));
        }

        fn surprise(&mut self) {
            self.calls.push("surprise".into());
        }

        fn reset(&mut self) {
            self.calls.push("reset".into());
        }
    }

    fn manager() -> ConversationManager {
        let responder = RuleBasedResponder::builder()
            .add_rule("こんにちは", "やっほー!", 1.0)
            .acknowledgements(["ok"])
            .build();
        let dispatcher = BackendDispatcher::new(
            Some(Backend::RuleBased(responder)),
            Arc::new(StaticProbe(true)),
            None,
        );
        ConversationManager::new("P", 3, dispatcher)
    }

    #[test]
    fn test_parse_single_char_commands() {
        assert_eq!(ConsoleCommand::parse("b"), Some(ConsoleCommand::Blink));
        assert_eq!(ConsoleCommand::parse(" t \n"), Some(ConsoleCommand::Talk));
        assert_eq!(ConsoleCommand::parse("s"), Some(ConsoleCommand::Surprise));
        assert_eq!(ConsoleCommand::parse("r"), Some(ConsoleCommand::Reset));
        assert_eq!(ConsoleCommand::parse("?"), Some(ConsoleCommand::Help));
        assert_eq!(
            ConsoleCommand::parse("h"),
            Some(ConsoleCommand::Chat(GREETING.to_string()))
        );
    }

    #[test]
    fn test_parse_chat_lines() {
        assert_eq!(
            ConsoleCommand::parse("l how are you"),
            Some(ConsoleCommand::Chat("how are you".to_string()))
        );
        assert_eq!(ConsoleCommand::parse("l"), Some(ConsoleCommand::Usage));
        assert_eq!(ConsoleCommand::parse("l   "), Some(ConsoleCommand::Usage));
        // Words starting with a command letter are chat, not commands.
        assert_eq!(
            ConsoleCommand::parse("bye"),
            Some(ConsoleCommand::Chat("bye".to_string()))
        );
        assert_eq!(ConsoleCommand::parse("   "), None);
    }

    #[tokio::test]
    async fn test_greeting_reaches_chat() {
        let mut manager = manager();
        let mut face = RecordingFace::default();

        handle(ConsoleCommand::parse("h").unwrap(), &mut manager, &mut face).await;
        handle(ConsoleCommand::Blink, &mut manager, &mut face).await;

        assert_eq!(face.calls, vec!["talk:やっほー!", "blink"]);
        assert_eq!(manager.history().len(), 1);
    }
}
