//! Console presentation client.
//!
//! Prints whatever the service sends and turns typed commands into protocol
//! messages. Reconnects with the configured backoff; once the attempts run
//! out it reports the failure and returns instead of crashing.

use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use quicktype_core::source::CSV_PATTERN;
use quicktype_core::{
    CustomLanguageDefinition, IpcMessage, MessageBody, SettingsPatch, StorageKind,
};

use crate::config::IpcConfig;
use crate::ipc::client::{IpcClient, IpcState};
use crate::ipc::IpcError;

pub const HELP: &str = "commands: <n> | pick <word> | settings | reset | max <n> | accents on|off | recreate <language> | quit";

/// Parse one command line.
pub fn parse_command(line: &str) -> Option<IpcMessage> {
    let line = line.trim();
    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((c, a)) => (c, a.trim()),
        None => (line, ""),
    };
    let body = match command {
        n if !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()) => MessageBody::Selection {
            index: n.parse().ok(),
            word: None,
        },
        "pick" if !arg.is_empty() => MessageBody::Selection {
            index: None,
            word: Some(arg.to_string()),
        },
        "settings" => MessageBody::SettingsRequest { reset: false },
        "reset" => MessageBody::SettingsRequest { reset: true },
        "max" => MessageBody::Settings {
            settings: SettingsPatch {
                max_suggestions: Some(arg.parse().ok()?),
                ..Default::default()
            },
        },
        "accents" => MessageBody::Settings {
            settings: SettingsPatch {
                ignore_accent: Some(match arg {
                    "off" => true,
                    "on" => false,
                    _ => return None,
                }),
                ..Default::default()
            },
        },
        "recreate" if !arg.is_empty() => MessageBody::RecreateLanguageDatabase {
            language: CustomLanguageDefinition {
                name: arg.to_string(),
                priority: 0,
                has_accents: false,
                accent_map: Default::default(),
                storage: StorageKind::Hybrid,
                frequency_threshold: None,
                file_path: PathBuf::new(),
                line_pattern: CSV_PATTERN.to_string(),
                loaded: false,
            },
        },
        "quit" => MessageBody::ServiceShutdown,
        _ => return None,
    };
    Some(IpcMessage::new(body))
}

/// One line of human-readable output for a service message.
pub fn render(message: &IpcMessage) -> String {
    let text = match &message.body {
        MessageBody::Status { text } => format!("status: {text}"),
        MessageBody::Suggestion { words, caret } => {
            let list: Vec<String> = words
                .iter()
                .enumerate()
                .map(|(i, w)| format!("{}:{}({})", i + 1, w.text, w.frequency))
                .collect();
            match caret {
                Some(c) => format!("suggestions @({},{}): {}", c.left, c.top, list.join(" ")),
                None => format!("suggestions: {}", list.join(" ")),
            }
        }
        MessageBody::Close => "close".to_string(),
        MessageBody::Settings { settings } => match serde_json::to_string(settings) {
            Ok(json) => format!("settings: {json}"),
            Err(e) => format!("settings: <{e}>"),
        },
        other => format!("{other:?}"),
    };
    match &message.error {
        Some(error) => format!("{text} [error: {error}]"),
        None => text,
    }
}

/// Run the console client until the service shuts down, stdin closes, or
/// reconnection gives up.
pub async fn run(config: &IpcConfig) -> Result<IpcState> {
    let (commands_tx, mut commands) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_command(&line) {
                Some(message) => {
                    if commands_tx.send(message).is_err() {
                        break;
                    }
                }
                None => println!("{HELP}"),
            }
        }
    });

    loop {
        let mut client = match IpcClient::connect(&config.endpoint, &config.retry).await {
            Ok(client) => client,
            Err(IpcError::RetriesExhausted { attempts }) => {
                error!(attempts, "service unreachable, giving up");
                return Ok(IpcState::Failed);
            }
            Err(e) => return Err(e.into()),
        };
        info!(state = ?IpcState::Connected, "attached to service");
        println!("{HELP}");

        loop {
            tokio::select! {
                received = client.recv() => match received {
                    Ok(Some(message)) => println!("{}", render(&message)),
                    Ok(None) => {
                        warn!(state = ?IpcState::Disconnected, "service hung up");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, state = ?IpcState::Disconnected, "read failed");
                        break;
                    }
                },
                command = commands.recv() => match command {
                    Some(message) => {
                        let quitting = matches!(message.body, MessageBody::ServiceShutdown);
                        if let Err(e) = client.send(&message).await {
                            warn!(error = %e, "send failed");
                            break;
                        }
                        if quitting {
                            return Ok(IpcState::Disconnected);
                        }
                    }
                    None => return Ok(IpcState::Connected),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quicktype_core::Word;

    #[test]
    fn commands_map_to_messages() {
        assert_eq!(
            parse_command("2").map(|m| m.body),
            Some(MessageBody::Selection {
                index: Some(2),
                word: None
            })
        );
        assert_eq!(
            parse_command("pick óra").map(|m| m.body),
            Some(MessageBody::Selection {
                index: None,
                word: Some("óra".into())
            })
        );
        assert_eq!(
            parse_command("quit").map(|m| m.body),
            Some(MessageBody::ServiceShutdown)
        );
        match parse_command("max 7").map(|m| m.body) {
            Some(MessageBody::Settings { settings }) => {
                assert_eq!(settings.max_suggestions, Some(7))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_commands_are_rejected() {
        assert!(parse_command("").is_none());
        assert!(parse_command("pick").is_none());
        assert!(parse_command("max lots").is_none());
        assert!(parse_command("dance").is_none());
    }

    #[test]
    fn render_numbers_suggestions() {
        let message = IpcMessage::suggestion(vec![Word::new("cat", 50), Word::new("car", 5)], None);
        assert_eq!(render(&message), "suggestions: 1:cat(50) 2:car(5)");
        let failed = IpcMessage::status("x").with_error("boom");
        assert_eq!(render(&failed), "status: x [error: boom]");
    }
}
