use std::io::IsTerminal;

pub use console::{Style, StyledObject, Term};

pub struct Styles {
    pub style_heading: Style,
    pub style_product: Style,
    pub style_ok: Style,
    pub style_failed: Style,
    pub style_skipped: Style,
    pub style_metadata: Style,
}

impl Styles {
    pub fn new(use_color: bool) -> Self {
        let stdout_is_tty = std::io::stdout().is_terminal();
        let is_term = Term::stdout().is_term();

        // Enable color only when requested and stdout is a terminal.
        let enabled = use_color && stdout_is_tty && is_term;
        Self {
            style_heading: Style::new().bold().force_styling(enabled),
            style_product: Style::new().bright().bold().blue().force_styling(enabled),
            style_ok: Style::new().green().force_styling(enabled),
            style_failed: Style::new().bold().red().force_styling(enabled),
            style_skipped: Style::new().yellow().force_styling(enabled),
            style_metadata: Style::new().bright().blue().force_styling(enabled),
        }
    }
}
