use std::io::{self, Write};

use claude_chat_client_core::ChatEvent;

/// Writes the `completion` text of chat events as they arrive.
///
/// Events without a string `completion` field (stop reasons, pings,
/// metadata) are counted but not printed.
pub struct CompletionPrinter<W: Write> {
    out: W,
    events_seen: usize,
    wrote_text: bool,
}

impl<W: Write> CompletionPrinter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            events_seen: 0,
            wrote_text: false,
        }
    }

    pub fn print(&mut self, event: &ChatEvent) -> io::Result<()> {
        self.events_seen += 1;
        if let Some(text) = completion_text(event) {
            self.out.write_all(text.as_bytes())?;
            self.out.flush()?;
            self.wrote_text |= !text.is_empty();
        }
        Ok(())
    }

    /// Ends the reply with a newline if anything was printed.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.wrote_text {
            writeln!(self.out)?;
        }
        self.out.flush()
    }

    pub fn events_seen(&self) -> usize {
        self.events_seen
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn completion_text(event: &ChatEvent) -> Option<&str> {
    event.get("completion").and_then(|value| value.as_str())
}
