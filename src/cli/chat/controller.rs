use tracing::{debug, error, warn};

use super::renderer::TranscriptRenderer;
use super::transcript::{Message, Transcript};
use crate::chat_client::{ChatBackend, ChatReply, ClientError, RawReply};
use crate::config::{FallbackMessages, WidgetConfig};

/// Which branch a call to [`ChatController::send_message`] took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The draft was blank; nothing happened.
    Skipped,
    /// The server answered successfully, with or without an answer.
    Answered,
    /// The server answered with a non-success status.
    HttpError { status: u16 },
    /// The request never completed or its body was unusable.
    TransportError,
}

/// Runs the send lifecycle between a composer, a transcript and the chat
/// endpoint.
///
/// Every non-blank send renders exactly two messages: the user's text before
/// the request goes out, and one bot message once it settles. Failures never
/// leave this type; they become bot messages.
pub struct ChatController<B, R> {
    backend: B,
    renderer: R,
    fallback_messages: FallbackMessages,
    has_typing_indicator: bool,
    transcript: Transcript,
    busy: bool,
}

impl<B, R> ChatController<B, R>
where
    B: ChatBackend,
    R: TranscriptRenderer,
{
    pub fn new(backend: B, renderer: R, config: &WidgetConfig) -> Self {
        Self {
            backend,
            renderer,
            fallback_messages: config.fallback_messages.clone(),
            has_typing_indicator: config.has_typing_indicator,
            transcript: Transcript::new(),
            busy: false,
        }
    }

    /// Send whatever is in the composer.
    ///
    /// Taking `&mut self` means one controller has at most one request in
    /// flight.
    pub async fn send_message(&mut self) -> SendOutcome {
        let draft = self.renderer.draft();
        let text = draft.trim();
        if text.is_empty() {
            debug!("Ignoring blank draft");
            return SendOutcome::Skipped;
        }
        let text = text.to_string();

        self.append(Message::user(text.as_str()));
        self.renderer.clear_draft();
        self.set_busy(true);

        let result = self.backend.post_message(&text).await;
        let (reply, outcome) = self.describe(result);
        debug!("Send finished with {:?}", outcome);

        self.append(Message::bot(reply));
        self.set_busy(false);
        self.renderer.focus_composer();

        outcome
    }

    /// Turn a settled request into the bot message that reports it.
    fn describe(&self, result: Result<RawReply, ClientError>) -> (String, SendOutcome) {
        let messages = &self.fallback_messages;

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                error!("Chat request failed: {}", e);
                return (messages.connection_error.clone(), SendOutcome::TransportError);
            }
        };

        if !reply.is_success() {
            warn!("Chat endpoint returned status {}", reply.status);
            let detail = if reply.body.is_empty() {
                messages.retry_prompt.as_str()
            } else {
                reply.body.as_str()
            };
            let text = format!("{} ({}). {}", messages.server_error, reply.status, detail);
            return (text, SendOutcome::HttpError { status: reply.status });
        }

        match ChatReply::from_body(&reply.body) {
            Ok(ChatReply { answer: Some(answer) }) => (answer, SendOutcome::Answered),
            Ok(ChatReply { answer: None }) => (messages.no_answer.clone(), SendOutcome::Answered),
            Err(e) => {
                error!("Could not parse chat response: {}", e);
                (messages.connection_error.clone(), SendOutcome::TransportError)
            }
        }
    }

    fn append(&mut self, message: Message) {
        let message = self.transcript.push(message);
        self.renderer.append_message(message);
    }

    fn set_busy(&mut self, busy: bool) {
        if self.busy == busy {
            return;
        }
        self.busy = busy;
        if self.has_typing_indicator {
            self.renderer.set_busy(busy);
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    #[cfg(test)]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}
