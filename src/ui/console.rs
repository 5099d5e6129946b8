//! Line-oriented terminal host for a chat session.
//!
//! Input is read only while no reply is streaming, so each line becomes the
//! next turn once the previous reply has finished.

use std::error::Error;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::model_list::render_model_list;
use crate::core::assembler::AssembleOutcome;
use crate::core::catalog::BUILTIN_MODELS;
use crate::core::config::Settings;
use crate::core::credentials::KeyringCredentials;
use crate::core::dispatcher::DispatchRejected;
use crate::core::relay::ProxyRelay;
use crate::core::session::ChatSession;
use crate::core::surface::{ActionOutcome, ChatSurface, UserAction};
use crate::core::transport::Transport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Quit,
    ListModels,
    ShowModel,
    SelectModel(String),
    Submit(String),
}

pub fn parse_line(line: &str) -> ConsoleCommand {
    let trimmed = line.trim();
    let (command, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (trimmed, ""),
    };
    match command {
        "/quit" | "/exit" => ConsoleCommand::Quit,
        "/models" => ConsoleCommand::ListModels,
        "/model" if rest.is_empty() => ConsoleCommand::ShowModel,
        "/model" => ConsoleCommand::SelectModel(rest.to_string()),
        _ => ConsoleCommand::Submit(line.to_string()),
    }
}

enum Flow {
    Continue,
    Quit,
}

enum ConsoleEvent {
    Line(Option<String>),
    Inbound(Option<String>),
}

pub struct Console<W> {
    surface: ChatSurface,
    out: W,
    // Bytes of the streaming reply already written to `out`.
    printed: usize,
}

impl<W: AsyncWrite + Unpin> Console<W> {
    pub fn new(surface: ChatSurface, out: W) -> Self {
        Self {
            surface,
            out,
            printed: 0,
        }
    }

    pub fn surface(&self) -> &ChatSurface {
        &self.surface
    }

    /// Run until `/quit`, or until input ends and no reply is outstanding.
    pub async fn run<R>(&mut self, input: R) -> Result<(), Box<dyn Error>>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut input_open = true;

        while input_open || self.surface.session().loading() {
            let read_input = input_open && !self.surface.session().loading();
            let event = tokio::select! {
                biased;
                raw = self.surface.recv_inbound() => ConsoleEvent::Inbound(raw),
                line = lines.next_line(), if read_input => ConsoleEvent::Line(line?),
            };

            match event {
                ConsoleEvent::Line(Some(line)) => {
                    if let Flow::Quit = self.handle_line(&line).await? {
                        break;
                    }
                }
                ConsoleEvent::Line(None) => input_open = false,
                ConsoleEvent::Inbound(Some(raw)) => self.render_inbound(&raw).await?,
                ConsoleEvent::Inbound(None) => {
                    self.write("\n[relay stopped]\n").await?;
                    break;
                }
            }
        }
        self.out.flush().await?;
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> Result<Flow, Box<dyn Error>> {
        match parse_line(line) {
            ConsoleCommand::Quit => return Ok(Flow::Quit),
            ConsoleCommand::ListModels => {
                let listing = render_model_list(BUILTIN_MODELS, self.surface.session().model().as_str());
                self.write(&listing).await?;
            }
            ConsoleCommand::ShowModel => {
                let model = self.surface.session().model();
                self.write(&format!("Current model: {} ({})\n", model, model.display_name()))
                    .await?;
            }
            ConsoleCommand::SelectModel(id) => {
                let message = match self.surface.handle_action(UserAction::SelectModel(id)) {
                    ActionOutcome::ModelChanged(model) => format!("Switched to {model}\n"),
                    ActionOutcome::ModelRejected(err) => format!("{err}\n"),
                    other => format!("Unexpected outcome: {other:?}\n"),
                };
                self.write(&message).await?;
            }
            ConsoleCommand::Submit(text) => {
                self.surface.handle_action(UserAction::EditInput(text));
                match self.surface.handle_action(UserAction::Submit) {
                    ActionOutcome::Dispatched(_) => {
                        self.printed = 0;
                        self.write("assistant> ").await?;
                    }
                    ActionOutcome::Rejected(DispatchRejected::EmptyInput) => {}
                    ActionOutcome::Rejected(rejected) => {
                        self.write(&format!("Not sent: {rejected}\n")).await?;
                    }
                    other => debug!(outcome = ?other, "Ignoring submit outcome"),
                }
            }
        }
        Ok(Flow::Continue)
    }

    async fn render_inbound(&mut self, raw: &str) -> Result<(), Box<dyn Error>> {
        match self.surface.handle_inbound(raw) {
            AssembleOutcome::Appended { fragments, .. } if fragments > 0 => {
                let delta = self
                    .surface
                    .session()
                    .sentinel()
                    .and_then(|reply| reply.content.get(self.printed..))
                    .unwrap_or_default()
                    .to_string();
                self.printed += delta.len();
                self.write(&delta).await?;
            }
            AssembleOutcome::Finalized { failed, .. } => {
                let tail = if failed {
                    let content = self
                        .surface
                        .session()
                        .messages()
                        .last()
                        .map(|reply| reply.content.clone())
                        .unwrap_or_default();
                    let separator = if self.printed > 0 { "\n" } else { "" };
                    format!("{separator}{content}\n\n")
                } else {
                    "\n\n".to_string()
                };
                self.printed = 0;
                self.write(&tail).await?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn write(&mut self, text: &str) -> Result<(), Box<dyn Error>> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }
}

/// Wire the surface to a relay for `settings` and run on stdin and stdout.
pub async fn run_chat(settings: Settings) -> Result<(), Box<dyn Error>> {
    let (surface_end, relay_end) = Transport::pair();
    let relay = ProxyRelay::new(
        settings.endpoint.clone(),
        Arc::new(KeyringCredentials::new()),
        settings.request_timeout,
    )?;
    let shutdown = CancellationToken::new();
    let relay_task = tokio::spawn(relay.run(relay_end, shutdown.clone()));

    let session = match settings.system_prompt.as_deref() {
        Some(prompt) => ChatSession::with_system_prompt(settings.model, prompt),
        None => ChatSession::new(settings.model),
    };
    let surface = ChatSurface::new(session, surface_end);

    eprintln!("DevDoc chat ({}) via {}", settings.model, settings.endpoint);
    eprintln!("Type a message and press Enter. /models, /model <id>, /quit");

    let mut console = Console::new(surface, tokio::io::stdout());
    let result = console.run(BufReader::new(tokio::io::stdin())).await;

    shutdown.cancel();
    if let Err(err) = relay_task.await {
        debug!(error = %err, "Relay task ended abnormally");
    }
    result
}
