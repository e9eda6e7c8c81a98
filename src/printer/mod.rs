//! Printers: text and markdown (termimad).

use std::io;

use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use termimad::MadSkin;

pub struct TextPrinter {
    pub color: Option<&'static str>,
}

impl TextPrinter {
    /// Colored only when stdout is a terminal.
    pub fn for_stdout(color: &'static str) -> Self {
        let color = io::stdout().is_terminal().then_some(color);
        Self { color }
    }

    pub fn render(&self, text: &str) -> String {
        match self.color {
            Some("green") => text.green().to_string(),
            Some("cyan") => text.cyan().to_string(),
            Some("magenta") => text.magenta().to_string(),
            Some("yellow") => text.yellow().to_string(),
            Some("red") => text.red().to_string(),
            _ => text.to_string(),
        }
    }
}

pub struct MarkdownPrinter {
    pub skin: MadSkin,
    pub width: usize,
}

impl Default for MarkdownPrinter {
    fn default() -> Self {
        Self { skin: MadSkin::default(), width: 100 }
    }
}

impl MarkdownPrinter {
    pub fn render(&self, text: &str) -> String {
        self.skin.text(text, Some(self.width)).to_string()
    }
}

/// Everything the handlers need to present answers, banners and errors.
pub struct Printers {
    pub answer: Option<MarkdownPrinter>,
    pub banner: TextPrinter,
    pub error: TextPrinter,
}

impl Printers {
    /// Markdown rendering only when requested and stdout is a terminal.
    pub fn for_stdout(markdown: bool) -> Self {
        let answer = (markdown && io::stdout().is_terminal()).then(MarkdownPrinter::default);
        Self {
            answer,
            banner: TextPrinter::for_stdout("cyan"),
            error: TextPrinter::for_stdout("red"),
        }
    }

    pub fn plain() -> Self {
        Self {
            answer: None,
            banner: TextPrinter { color: None },
            error: TextPrinter { color: None },
        }
    }

    pub fn answer(&self, text: &str) -> String {
        match &self.answer {
            Some(md) => md.render(text),
            None => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_printers_pass_text_through() {
        let p = Printers::plain();
        assert_eq!(p.answer("**bold**"), "**bold**");
        assert_eq!(p.error.render("oops"), "oops");
    }
}
