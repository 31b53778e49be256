//! Interactive call view.
//!
//! Status changes are printed with the elapsed call time; the prompt reads
//! typed turns and slash commands on a dedicated thread.

use anas_live::{
    CallHandle, CallStatus, ChannelObserver, LiveCallClient, LiveError, Locale, VoiceProfile,
};
use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// One line typed at the call prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Text(String),
    Mute,
    Unmute,
    Hangup,
    Help,
    Unknown(String),
}

impl ConsoleCommand {
    /// `None` for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let command = match line {
            "/mute" => Self::Mute,
            "/unmute" => Self::Unmute,
            "/hangup" | "/quit" | "/exit" => Self::Hangup,
            "/help" => Self::Help,
            other if other.starts_with('/') => Self::Unknown(other.to_string()),
            text => Self::Text(text.to_string()),
        };
        Some(command)
    }
}

/// How long to wait for the last statuses to be printed.
const PRINTER_DRAIN: Duration = Duration::from_secs(1);

const HELP: &str = "Type a message to send it as a turn. /mute, /unmute, /hangup (or Ctrl-D).";

/// `m:ss`, minutes unbounded.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Status line shown in the call view.
pub fn status_line(status: CallStatus, locale: Locale, elapsed: Option<Duration>) -> String {
    match elapsed {
        Some(elapsed) => format!("[{}] {}", format_elapsed(elapsed), status.localized(locale)),
        None => format!("[-:--] {}", status.localized(locale)),
    }
}

/// Prints statuses as they arrive. The clock starts once the call connects.
async fn print_statuses(mut statuses: mpsc::UnboundedReceiver<CallStatus>, locale: Locale) {
    let mut connected_at: Option<Instant> = None;
    while let Some(status) = statuses.recv().await {
        if status == CallStatus::Connected && connected_at.is_none() {
            connected_at = Some(Instant::now());
        }
        println!("{}", status_line(status, locale, connected_at.map(|t| t.elapsed())));
    }
}

/// Reads prompt lines until end of input, forwarding commands.
///
/// Runs on a plain thread so the process can exit while it is blocked on
/// the terminal.
fn spawn_prompt(commands: mpsc::UnboundedSender<ConsoleCommand>) {
    std::thread::spawn(move || {
        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                tracing::warn!(error = %e, "Prompt unavailable");
                return;
            }
        };
        loop {
            match editor.readline("> ") {
                Ok(line) => {
                    let Some(command) = ConsoleCommand::parse(&line) else { continue };
                    let _ = editor.add_history_entry(line.as_str());
                    let hangup = command == ConsoleCommand::Hangup;
                    if commands.send(command).is_err() || hangup {
                        return;
                    }
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                    let _ = commands.send(ConsoleCommand::Hangup);
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Prompt failed");
                    let _ = commands.send(ConsoleCommand::Hangup);
                    return;
                }
            }
        }
    });
}

fn apply(handle: &CallHandle, command: ConsoleCommand) {
    match command {
        ConsoleCommand::Text(text) => {
            if let Err(e) = handle.send_text(&text) {
                eprintln!("Not sent: {e}");
            }
        }
        ConsoleCommand::Mute => {
            handle.set_mute(true);
            println!("Microphone muted");
        }
        ConsoleCommand::Unmute => {
            handle.set_mute(false);
            println!("Microphone on");
        }
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Unknown(command) => eprintln!("Unknown command {command}. {HELP}"),
        ConsoleCommand::Hangup => {}
    }
}

/// Commands typed before the call is up. Mute changes are kept for later.
fn apply_while_connecting(muted: &mut bool, command: ConsoleCommand) {
    match command {
        ConsoleCommand::Text(_) => eprintln!("Not sent: still connecting"),
        ConsoleCommand::Mute => {
            *muted = true;
            println!("Microphone will start muted");
        }
        ConsoleCommand::Unmute => {
            *muted = false;
            println!("Microphone will start on");
        }
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Unknown(command) => eprintln!("Unknown command {command}. {HELP}"),
        ConsoleCommand::Hangup => {}
    }
}

/// Run one call until it ends and return its terminal status.
///
/// The prompt is up from the start, so hanging up during the handshake
/// abandons the call.
pub async fn run_call(
    client: &LiveCallClient,
    voice: VoiceProfile,
    start_muted: bool,
) -> Result<CallStatus> {
    let locale = client.config().locale;
    let dismiss_delay = client.config().dismiss_delay;

    let (observer, statuses) = ChannelObserver::new();
    let printer = tokio::spawn(print_statuses(statuses, locale));

    println!("Calling with voice {voice}. {HELP}");
    let (command_tx, mut commands) = mpsc::unbounded_channel();
    spawn_prompt(command_tx);

    let mut muted = start_muted;
    let mut hung_up = false;
    let connecting = client.connect(voice, Arc::new(observer));
    tokio::pin!(connecting);
    let connected = loop {
        tokio::select! {
            result = &mut connecting => break result,
            command = commands.recv(), if !hung_up => match command {
                Some(ConsoleCommand::Hangup) | None => {
                    hung_up = true;
                    if let Err(e) = client.disconnect().await {
                        tracing::debug!(error = %e, "Nothing to hang up");
                    }
                }
                Some(command) => apply_while_connecting(&mut muted, command),
            },
        }
    };

    let handle = match connected {
        Ok(handle) => handle,
        Err(e) => {
            let cancelled = matches!(e, LiveError::Cancelled);
            if !cancelled {
                tracing::error!(error = %e, "Call failed to connect");
            }
            let _ = tokio::time::timeout(PRINTER_DRAIN, printer).await;
            tokio::time::sleep(dismiss_delay).await;
            if cancelled {
                return Ok(CallStatus::Disconnected);
            }
            return Err(e.into());
        }
    };
    if hung_up {
        handle.disconnect().await?;
    } else if muted {
        apply(&handle, ConsoleCommand::Mute);
    }

    let status = loop {
        tokio::select! {
            status = handle.closed() => break status,
            command = commands.recv(), if !hung_up => match command {
                Some(ConsoleCommand::Hangup) | None => {
                    handle.disconnect().await?;
                    break handle.closed().await;
                }
                Some(command) => apply(&handle, command),
            },
        }
    };

    // The observer is released at teardown, which ends the printer.
    drop(handle);
    let _ = tokio::time::timeout(PRINTER_DRAIN, printer).await;
    tokio::time::sleep(dismiss_delay).await;
    Ok(status)
}
