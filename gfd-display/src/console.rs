//! Line-based operator console.
//!
//! Stands in for the kiosk's touch UI: each line on stdin is one action.

use crate::render;
use gfd_core::session::SessionCommand;
use gfd_core::store::DisplaySnapshot;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use url::Url;

pub const HELP: &str = "\
commands:
  connect <otp>      pair this display and open the event stream
  reconnect          reopen the stream with the stored device id
  disconnect         end the session
  tap                tap the cart icon (7 quick taps open the admin dialog)
  unlock <passcode>  submit the admin passcode
  cancel             close the admin dialog
  clear              dismiss the connection error
  url <base_url>     change the backend address
  status             print the current screen
  help               print this help";

/// A parsed console line.
#[derive(Debug, Clone)]
pub enum ConsoleInput {
    Command(SessionCommand),
    Status,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("unknown command `{0}`, try `help`")]
    UnknownCommand(String),

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Parse one console line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ConsoleInput>, ConsoleError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let mut argument = |name: &'static str| {
        words
            .next()
            .map(str::to_owned)
            .ok_or(ConsoleError::MissingArgument(name))
    };

    let input = match verb.to_ascii_lowercase().as_str() {
        "connect" => ConsoleInput::Command(SessionCommand::Connect {
            otp: argument("otp")?,
        }),
        "reconnect" => ConsoleInput::Command(SessionCommand::Reconnect),
        "disconnect" => ConsoleInput::Command(SessionCommand::Disconnect),
        "tap" => ConsoleInput::Command(SessionCommand::TapCartIcon),
        "unlock" => ConsoleInput::Command(SessionCommand::SubmitAdminPasscode(argument(
            "passcode",
        )?)),
        "cancel" => ConsoleInput::Command(SessionCommand::CloseAdminDialog),
        "clear" => ConsoleInput::Command(SessionCommand::ClearError),
        "url" => ConsoleInput::Command(SessionCommand::SetApiBaseUrl(Url::parse(&argument(
            "base_url",
        )?)?)),
        "status" => ConsoleInput::Status,
        "help" | "?" => ConsoleInput::Help,
        other => return Err(ConsoleError::UnknownCommand(other.to_owned())),
    };
    Ok(Some(input))
}

/// Read commands from stdin until it closes.
pub fn spawn_console(
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<DisplaySnapshot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::debug!("Console input closed");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read console input");
                    break;
                }
            };

            match parse_line(&line) {
                Ok(None) => {}
                Ok(Some(ConsoleInput::Command(command))) => {
                    if commands.send(command).await.is_err() {
                        break;
                    }
                }
                Ok(Some(ConsoleInput::Status)) => {
                    println!("{}", render::describe(&snapshots.borrow()));
                }
                Ok(Some(ConsoleInput::Help)) => println!("{HELP}"),
                Err(e) => tracing::warn!(error = %e, "Invalid console command"),
            }
        }
    })
}
