//! Terminal and JSON rendering shared by all commands
//!
//! Listings and documents go to stdout. Status notices go to stderr, except
//! success notices which belong to the command's normal output.

use console::Style;
use jiff::Timestamp;
use serde::Serialize;

use super::OutputConfig;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_WIDTH: usize = 19;

/// Styles applied to each kind of output fragment
#[derive(Debug, Clone)]
pub struct Palette {
    pub directory: Style,
    pub file: Style,
    pub timestamp: Style,
    /// Backend names and paths being acted on
    pub emphasis: Style,
    /// `backend:path` locations
    pub location: Style,
    pub added: Style,
    pub removed: Style,
    pub updated: Style,
}

impl Palette {
    /// Colored palette, or one that leaves text untouched
    pub fn new(colored: bool) -> Self {
        let pick = |style: Style| if colored { style } else { Style::new() };
        Self {
            directory: pick(Style::new().blue().bold()),
            file: Style::new(),
            timestamp: pick(Style::new().dim()),
            emphasis: pick(Style::new().bold()),
            location: pick(Style::new().cyan().underlined()),
            added: pick(Style::new().green()),
            removed: pick(Style::new().red()),
            updated: pick(Style::new().yellow()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notice {
    Success,
    Warning,
    Failure,
}

impl Notice {
    fn icon(self) -> &'static str {
        match self {
            Notice::Success => "✓",
            Notice::Warning => "⚠",
            Notice::Failure => "✗",
        }
    }

    fn style(self, colored: bool) -> Style {
        if !colored {
            return Style::new();
        }
        match self {
            Notice::Success => Style::new().green(),
            Notice::Warning => Style::new().yellow(),
            Notice::Failure => Style::new().red(),
        }
    }
}

#[derive(Serialize)]
struct ErrorDocument<'a> {
    error: &'a str,
}

/// Renders command output according to the global flags
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
    palette: Palette,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self {
            palette: Palette::new(Self::colored(config)),
            config,
        }
    }

    fn colored(config: OutputConfig) -> bool {
        !(config.json || config.no_color)
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    pub fn style_dir(&self, text: &str) -> String {
        paint(&self.palette.directory, text)
    }

    pub fn style_file(&self, text: &str) -> String {
        paint(&self.palette.file, text)
    }

    pub fn style_name(&self, text: &str) -> String {
        paint(&self.palette.emphasis, text)
    }

    pub fn style_location(&self, text: &str) -> String {
        paint(&self.palette.location, text)
    }

    /// Fixed-width UTC timestamp, blank for entries without one
    pub fn style_date(&self, ts: Option<Timestamp>) -> String {
        let text = ts.map_or_else(
            || " ".repeat(DATE_WIDTH),
            |ts| ts.strftime(DATE_FORMAT).to_string(),
        );
        paint(&self.palette.timestamp, &text)
    }

    /// `+`, `-` or `~` followed by the path, colored by the kind of change
    pub fn change_line(&self, marker: char, path: &str) -> String {
        let style = match marker {
            '+' => &self.palette.added,
            '-' => &self.palette.removed,
            _ => &self.palette.updated,
        };
        paint(style, &format!("{marker} {path}"))
    }

    /// Silent in JSON and quiet modes
    pub fn success(&self, message: &str) {
        self.notice(Notice::Success, message);
    }

    pub fn warning(&self, message: &str) {
        self.notice(Notice::Warning, message);
    }

    /// Never suppressed; a JSON `{"error": ...}` document in JSON mode
    pub fn error(&self, message: &str) {
        if self.config.json {
            match serde_json::to_string_pretty(&ErrorDocument { error: message }) {
                Ok(doc) => eprintln!("{doc}"),
                Err(_) => eprintln!("{message}"),
            }
        } else {
            self.notice(Notice::Failure, message);
        }
    }

    fn notice(&self, kind: Notice, message: &str) {
        if kind != Notice::Failure && (self.config.quiet || self.config.json) {
            return;
        }
        let icon = paint(&kind.style(Self::colored(self.config)), kind.icon());
        match kind {
            Notice::Success => println!("{icon} {message}"),
            Notice::Warning | Notice::Failure => eprintln!("{icon} {message}"),
        }
    }

    /// Write one pretty-printed JSON document to stdout
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(doc) => println!("{doc}"),
            Err(e) => self.error(&format!("cannot render output: {e}")),
        }
    }

    /// A line of regular output, dropped in quiet mode
    pub fn println(&self, message: &str) {
        if !self.config.quiet {
            println!("{message}");
        }
    }
}

fn paint(style: &Style, text: &str) -> String {
    style.apply_to(text).to_string()
}
