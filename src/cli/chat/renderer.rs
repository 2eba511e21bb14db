use std::io::{self, Write};

use color_print::cformat;
use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use tracing::warn;

use super::transcript::{Message, Role};

const TYPING_TEXT: &str = "typing…";

/// The UI surface the chat controller drives.
///
/// Implementations own the composer draft and whatever shows the transcript.
/// None of these calls can fail from the controller's point of view; a
/// surface that hits an error deals with it itself.
pub trait TranscriptRenderer {
    /// Current contents of the composer.
    fn draft(&self) -> String;

    /// Show `message` at the end of the transcript and keep it in view.
    fn append_message(&mut self, message: &Message);

    /// Show or hide the typing indicator.
    fn set_busy(&mut self, busy: bool);

    fn clear_draft(&mut self);

    /// Hand input back to the composer.
    fn focus_composer(&mut self);
}

/// Renders the transcript as lines on a terminal. New lines always land at
/// the bottom, so the latest message is the one in view.
pub struct TerminalRenderer {
    output: Box<dyn Write>,
    draft: String,
    busy: bool,
}

impl TerminalRenderer {
    pub fn new(output: Box<dyn Write>) -> Self {
        Self {
            output,
            draft: String::new(),
            busy: false,
        }
    }

    /// Replace the composer contents, as if the user had typed `text`.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Write something that is not part of the transcript, such as help text.
    pub fn print_notice(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.output, "{}", text)?;
        self.output.flush()
    }

    fn draw_indicator(&mut self) -> io::Result<()> {
        write!(self.output, "{}", cformat!("<dim>{}</>", TYPING_TEXT))?;
        self.output.flush()
    }

    fn erase_indicator(&mut self) -> io::Result<()> {
        queue!(self.output, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        self.output.flush()
    }

    fn write_message(&mut self, message: &Message) -> io::Result<()> {
        if self.busy {
            self.erase_indicator()?;
        }

        let line = match message.role() {
            Role::User => cformat!("<bold><blue>you</></> {}", message.text()),
            Role::Bot => cformat!("<bold><green>bot</></> {}", message.text()),
        };
        writeln!(self.output, "{}", line)?;

        if self.busy {
            self.draw_indicator()?;
        }
        self.output.flush()
    }
}

impl TranscriptRenderer for TerminalRenderer {
    fn draft(&self) -> String {
        self.draft.clone()
    }

    fn append_message(&mut self, message: &Message) {
        if let Err(e) = self.write_message(message) {
            warn!("Failed to write {} message to terminal: {}", message.role(), e);
        }
    }

    fn set_busy(&mut self, busy: bool) {
        if busy == self.busy {
            return;
        }
        self.busy = busy;

        let result = if busy {
            self.draw_indicator()
        } else {
            self.erase_indicator()
        };
        if let Err(e) = result {
            warn!("Failed to update typing indicator: {}", e);
        }
    }

    fn clear_draft(&mut self) {
        self.draft.clear();
    }

    fn focus_composer(&mut self) {
        if let Err(e) = self.output.flush() {
            warn!("Failed to flush terminal output: {}", e);
        }
    }
}
