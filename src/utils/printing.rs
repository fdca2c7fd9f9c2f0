//! Render streamed results as Markdown in a terminal.
//!
//! Every publish redraws the whole result from an anchored cursor position, so a growing result appears to be
//! typed out in place.

use std::io::{self, stdout, Write};
use std::sync::Mutex;
use log::warn;
use termimad::crossterm::{cursor, ExecutableCommand};
use termimad::crossterm::terminal::Clear;
use termimad::crossterm::terminal::ClearType::FromCursorDown;
use termimad::{FmtLine, FmtText, MadSkin};
use crate::streaming::{PublishSink, StreamPayload};

struct RenderedMarkdown {
    text: String,
    rows: u16,
    last_line_width: u16,
}

impl RenderedMarkdown {
    fn render(skin: &MadSkin, markdown: &str, wrap_width: Option<usize>) -> Self {
        let fmt_text = FmtText::from(skin, markdown, wrap_width);
        let line_width: Vec<usize> = fmt_text.lines.iter().map(FmtLine::visible_length).collect();
        Self {
            text: format!("{}", fmt_text),
            rows: u16::try_from(line_width.len()).unwrap_or(u16::MAX),
            last_line_width: line_width.last().map_or(0, |w| u16::try_from(*w).unwrap_or(u16::MAX)),
        }
    }
}

/// Redraws Markdown in place, starting at the cursor position it was activated at.
#[derive(Default)]
struct AnchoredPrinter {
    anchor: Option<(u16, u16)>,
    cursor_hidden: bool,
}

impl AnchoredPrinter {
    fn activate(&mut self, hide_cursor: bool) -> io::Result<()> {
        self.anchor = Some(cursor::position()?);
        if hide_cursor {
            stdout().execute(cursor::Hide)?;
            self.cursor_hidden = true;
        }
        Ok(())
    }

    fn deactivate(&mut self) -> io::Result<()> {
        self.anchor = None;
        if self.cursor_hidden {
            stdout().execute(cursor::Show)?;
            self.cursor_hidden = false;
        }
        println!();
        Ok(())
    }

    fn redraw(&mut self, rendered: &RenderedMarkdown) -> io::Result<()> {
        let (column, row) = match self.anchor {
            Some(anchor) => anchor,
            None => cursor::position()?,
        };
        stdout()
            .execute(cursor::MoveTo(column, row))?
            .execute(Clear(FromCursorDown))?;
        print!("{}", rendered.text);
        stdout().flush()?;
        // the anchor drifts upwards once the output scrolls the terminal
        let (end_column, end_row) = cursor::position()?;
        self.anchor = Some((end_column.saturating_sub(rendered.last_line_width), end_row.saturating_sub(rendered.rows)));
        Ok(())
    }
}

/// A [PublishSink] drawing the results of one channel in the terminal.
///
/// Payloads for other channels or for other recipients are ignored. The terminal payload of a stream releases the
/// cursor, and the next publish starts a new drawing below it.
pub struct TerminalSink {
    pub skin: MadSkin,
    pub wrap_width: Option<usize>,
    channel: String,
    recipient: Option<u64>,
    hide_cursor: bool,
    printer: Mutex<AnchoredPrinter>,
}

impl TerminalSink {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            skin: MadSkin::default(),
            wrap_width: None,
            channel: channel.into(),
            recipient: None,
            hide_cursor: true,
            printer: Mutex::new(AnchoredPrinter::default()),
        }
    }

    /// Only draw payloads addressed to `recipient`.
    pub fn for_recipient(mut self, recipient: u64) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn hide_cursor(mut self, hide_cursor: bool) -> Self {
        self.hide_cursor = hide_cursor;
        self
    }

    /// Whether this sink draws a payload published on `channel` to `recipients`.
    pub fn accepts(&self, channel: &str, recipients: &[u64]) -> bool {
        channel == self.channel && self.recipient.map_or(true, |r| recipients.contains(&r))
    }

    fn draw(&self, payload: &StreamPayload) -> io::Result<()> {
        let rendered = RenderedMarkdown::render(&self.skin, &payload.result, self.wrap_width);
        let mut printer = self.printer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if printer.anchor.is_none() {
            printer.activate(self.hide_cursor)?;
        }
        printer.redraw(&rendered)?;
        if payload.done {
            printer.deactivate()?;
        }
        Ok(())
    }
}

impl PublishSink for TerminalSink {
    fn publish(&self, channel: &str, payload: &StreamPayload, recipients: &[u64]) {
        if !self.accepts(channel, recipients) {
            return;
        }
        if let Err(err) = self.draw(payload) {
            warn!("cannot draw result of {} in the terminal: {}", channel, err);
        }
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        let printer = self.printer.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner());
        if printer.cursor_hidden {
            if let Err(err) = printer.deactivate() {
                warn!("cannot restore the terminal cursor: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod test_printing {
    use super::TerminalSink;

    #[test]
    fn test_accepts_only_its_channel_and_recipient() {
        let sink = TerminalSink::new("/stream");
        assert!(sink.accepts("/stream", &[1]));
        assert!(!sink.accepts("/other", &[1]));

        let sink = sink.for_recipient(7);
        assert!(sink.accepts("/stream", &[3, 7]));
        assert!(!sink.accepts("/stream", &[3]));
    }
}
