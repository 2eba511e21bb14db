pub mod controller;
pub mod prompt;
pub mod renderer;
pub mod transcript;

use std::io::Write;
use std::process::ExitCode;

use controller::ChatController;
use eyre::Result;
use prompt::generate_prompt;
use renderer::TerminalRenderer;
use transcript::Role;
use rustyline::error::ReadlineError;
use tracing::{debug, info};

use crate::chat_client::ChatClient;
use crate::config::WidgetConfig;

const WELCOME_TEXT: &str = "
Hi, ask me anything.

/help         Show the help dialogue
/quit         Quit the application
";

const HELP_TEXT: &str = "
Chat Widget

Type a message and press Enter to send it.

/help         Show this help dialogue
/quit         Quit the application
";

/// What to do after a line of input has been handled.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct ChatContext {
    controller: ChatController<ChatClient, TerminalRenderer>,
    input: Option<String>,
    interactive: bool,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        config: &WidgetConfig,
        input: Option<String>,
        interactive: bool,
    ) -> Result<Self> {
        let client = ChatClient::new(&config.endpoint)?;
        Ok(Self::with_client(output, client, config, input, interactive))
    }

    pub fn with_client(
        output: Box<dyn Write>,
        client: ChatClient,
        config: &WidgetConfig,
        input: Option<String>,
        interactive: bool,
    ) -> Self {
        let renderer = TerminalRenderer::new(output);

        Self {
            controller: ChatController::new(client, renderer, config),
            input,
            interactive,
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        info!("Chatting with {}", self.controller.backend().endpoint());

        // Handle non-interactive mode (single message)
        if let Some(input) = self.input.take() {
            self.handle_input(&input).await?;
            return Ok(ExitCode::SUCCESS);
        }

        if self.interactive {
            self.print_welcome()?;
            self.run_interactive().await?;
        }

        let transcript = self.controller.transcript();
        if !transcript.is_empty() {
            let sent = transcript
                .messages()
                .iter()
                .filter(|message| message.role() == Role::User)
                .count();
            info!("Session ended after {} sent messages", sent);
        }
        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        self.controller.renderer_mut().print_notice(WELCOME_TEXT)?;
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            let prompt_text = generate_prompt(None);

            match rl.readline(&prompt_text) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        rl.add_history_entry(line.as_str());
                    }

                    if self.handle_input(&line).await? == Flow::Quit {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    debug!("Input closed, leaving chat");
                    break;
                }
                Err(e) => {
                    self.controller
                        .renderer_mut()
                        .print_notice(&format!("Error: {}", e))?;
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<Flow> {
        match input.trim() {
            "/quit" => return Ok(Flow::Quit),
            "/help" => {
                self.controller.renderer_mut().print_notice(HELP_TEXT)?;
            }
            _ => {
                self.controller.renderer_mut().set_draft(input);
                self.controller.send_message().await;
            }
        }

        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::renderer::tests::SharedBuffer;
    use super::*;
    use crate::chat_client::tests::{direct_client, serve_raw, truncated_error_response};
    use crate::config::Profile;

    /// An endpoint on a port nothing listens on.
    async fn dead_endpoint() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}/api/chat/", addr)
    }

    async fn context(input: &str) -> (ChatContext, SharedBuffer, WidgetConfig) {
        context_for(dead_endpoint().await, input)
    }

    fn context_for(endpoint: String, input: &str) -> (ChatContext, SharedBuffer, WidgetConfig) {
        let mut config = WidgetConfig::preset(Profile::English);
        config.endpoint = endpoint;
        let buffer = SharedBuffer::default();
        let context = ChatContext::with_client(
            Box::new(buffer.clone()),
            direct_client(&config.endpoint),
            &config,
            Some(input.to_string()),
            false,
        );
        (context, buffer, config)
    }

    #[tokio::test]
    async fn one_shot_send_reports_connection_error() {
        let (mut context, buffer, config) = context("is anyone there?").await;

        context.run().await.unwrap();

        let output = buffer.contents();
        assert!(output.contains("is anyone there?"));
        assert!(output.contains(&config.fallback_messages.connection_error));
        assert_eq!(context.controller.transcript().len(), 2);
        assert!(!context.controller.is_busy());
    }

    #[tokio::test]
    async fn unreadable_error_body_asks_to_retry() {
        let (endpoint, server) = serve_raw(truncated_error_response()).await;
        let (mut context, buffer, _) = context_for(endpoint, "hello");

        context.run().await.unwrap();
        server.await.unwrap();

        assert!(buffer.contents().contains("Server error (500). Please try again."));
        assert_eq!(context.controller.transcript().len(), 2);
    }

    #[tokio::test]
    async fn help_is_not_sent() {
        let (mut context, buffer, _) = context("/help").await;

        context.run().await.unwrap();

        assert!(buffer.contents().contains("Type a message and press Enter"));
        assert!(context.controller.transcript().is_empty());
    }

    #[tokio::test]
    async fn quit_stops_the_session() {
        let (mut context, _, _) = context("unused").await;
        assert_eq!(context.handle_input(" /quit ").await.unwrap(), Flow::Quit);
        assert_eq!(context.handle_input("   ").await.unwrap(), Flow::Continue);
        assert!(context.controller.transcript().is_empty());
    }
}
