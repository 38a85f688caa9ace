//! Line-mode chat loop: sign in, then read commands and messages one line at
//! a time while replies stream to the output.

use std::error::Error;
use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::debug;

use crate::core::app::ChatApp;
use crate::core::controller::{SubmitOutcome, SubmitRejection};
use crate::ui::render::{format_session_list, format_transcript, ReplyPrinter};

const HELP_LINES: &[&str] = &[
    "Type a message and press Enter to send it.",
    "  /new            Start a new chat",
    "  /sessions       List chats, newest first",
    "  /switch <n>     Switch to chat number <n>",
    "  /show           Print the current chat",
    "  /logout         Sign out and forget every chat",
    "  /help           Show this help",
    "  /quit           Exit",
    "Start a message with // to send a line beginning with /.",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Send(String),
    New,
    Sessions,
    Switch(usize),
    Show,
    Logout,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ReplCommand::Empty;
        }
        if let Some(escaped) = trimmed.strip_prefix("//") {
            return ReplCommand::Send(format!("/{escaped}"));
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return ReplCommand::Send(trimmed.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match name {
            "new" => ReplCommand::New,
            "sessions" | "ls" => ReplCommand::Sessions,
            "switch" => match arg.parse::<usize>() {
                Ok(number) if number > 0 => ReplCommand::Switch(number),
                _ => ReplCommand::Invalid("Usage: /switch <number>".to_string()),
            },
            "show" => ReplCommand::Show,
            "logout" => ReplCommand::Logout,
            "help" => ReplCommand::Help,
            "quit" | "exit" => ReplCommand::Quit,
            _ => ReplCommand::Invalid(format!(
                "Unknown command: /{name}. Type /help for commands."
            )),
        }
    }
}

fn prompt<W: Write>(out: &mut W, text: &str) -> std::io::Result<()> {
    write!(out, "{text}")?;
    out.flush()
}

/// Ask for credentials until a login succeeds. Returns `false` when input
/// runs out first.
async fn sign_in<R, W>(
    app: &mut ChatApp,
    lines: &mut Lines<R>,
    out: &mut W,
    mut email: Option<String>,
) -> Result<bool, Box<dyn Error>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    loop {
        let address = match email.take() {
            Some(address) => address,
            None => {
                prompt(out, "Email: ")?;
                match lines.next_line().await? {
                    Some(line) => line.trim().to_string(),
                    None => return Ok(false),
                }
            }
        };
        if address.is_empty() {
            continue;
        }

        prompt(out, "Password: ")?;
        let Some(password) = lines.next_line().await? else {
            return Ok(false);
        };

        match app.login(&address, &password).await {
            Ok(user) => {
                writeln!(out, "Signed in as {}.", user.name)?;
                return Ok(true);
            }
            Err(err) => writeln!(out, "Sign in failed: {err}")?,
        }
    }
}

/// Submit `text` and print the reply as it streams.
async fn stream_reply<W: Write>(
    app: &ChatApp,
    text: &str,
    out: &mut W,
) -> Result<SubmitOutcome, Box<dyn Error>> {
    let mut rx = app.store().subscribe();
    let _ = rx.borrow_and_update();
    let mut printer = ReplyPrinter::new();

    let mut submit = Box::pin(app.submit(text));
    let outcome = loop {
        tokio::select! {
            outcome = &mut submit => break outcome,
            changed = rx.changed() => {
                if changed.is_err() {
                    break (&mut submit).await;
                }
                let snapshot = rx.borrow_and_update().clone();
                printer.flush(&snapshot, out)?;
            }
        }
    };
    drop(submit);

    match &outcome {
        SubmitOutcome::Ignored(SubmitRejection::EmptyInput) => {}
        SubmitOutcome::Ignored(rejection) => writeln!(out, "[{rejection}]")?,
        _ => {
            if let Some((session_id, message_id)) = outcome.reply_id() {
                printer.pin(session_id, message_id);
            }
            printer.flush(&app.store().snapshot(), out)?;
            writeln!(out)?;
        }
    }
    debug!(?outcome, "submit finished");
    Ok(outcome)
}

fn write_lines<W: Write>(out: &mut W, lines: &[impl AsRef<str>]) -> std::io::Result<()> {
    for line in lines {
        writeln!(out, "{}", line.as_ref())?;
    }
    Ok(())
}

/// Run the interactive loop until `/quit` or end of input.
pub async fn run_repl<R, W>(
    app: &mut ChatApp,
    input: R,
    out: &mut W,
    email: Option<String>,
) -> Result<(), Box<dyn Error>>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    if !app.auth_state().is_authenticated() && !sign_in(app, &mut lines, out, email).await? {
        return Ok(());
    }
    writeln!(out, "Type /help for commands.")?;

    loop {
        prompt(out, "> ")?;
        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Send(text) => {
                stream_reply(app, &text, out).await?;
            }
            ReplCommand::New => {
                app.new_session();
                writeln!(out, "Started a new chat.")?;
            }
            ReplCommand::Sessions => {
                write_lines(out, &format_session_list(&app.store().snapshot()))?;
            }
            ReplCommand::Switch(number) => {
                let snapshot = app.store().snapshot();
                match snapshot.sessions().get(number - 1) {
                    Some(session) => {
                        app.select_session(session.id());
                        write_lines(out, &format_transcript(session))?;
                    }
                    None => writeln!(out, "No chat number {number}.")?,
                }
            }
            ReplCommand::Show => match app.store().current_session() {
                Some(session) => write_lines(out, &format_transcript(&session))?,
                None => writeln!(out, "No chat selected.")?,
            },
            ReplCommand::Logout => {
                app.logout();
                writeln!(out, "Signed out.")?;
                if !sign_in(app, &mut lines, out, None).await? {
                    break;
                }
            }
            ReplCommand::Help => write_lines(out, HELP_LINES)?,
            ReplCommand::Quit => break,
            ReplCommand::Invalid(message) => writeln!(out, "{message}")?,
        }
    }
    Ok(())
}
