//! Terminal styles for the REPL, plain text without the `extra` feature.

use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Ret,
    Intro,
    Insn,
    Warning,
    Error,
    Info,
}

impl Tone {
    #[cfg(feature = "extra")]
    pub fn paint(self, text: impl Display) -> String {
        use owo_colors::{OwoColorize, style};
        let style = match self {
            Tone::Ret => style().blue().bold(),
            Tone::Intro => style().blue().bold().underline(),
            Tone::Insn => style().cyan(),
            Tone::Warning => style().yellow().bold(),
            Tone::Error => style().red().bold(),
            Tone::Info => style().white().bold(),
        };
        text.style(style).to_string()
    }

    #[cfg(not(feature = "extra"))]
    #[inline(always)]
    pub fn paint(self, text: impl Display) -> String {
        text.to_string()
    }
}

macro_rules! def_styles {
    ($($name:ident => $tone:ident),* $(,)?) => {
        pub trait Stylize: Display {
            $(fn $name(&self) -> String { Tone::$tone.paint(self) })*
        }
    };
}

def_styles! {
    style_ret => Ret,
    style_intro => Intro,
    style_insn => Insn,
    style_warning => Warning,
    style_error => Error,
    style_info => Info,
    style_prompt => Info,
}

impl<T: Display + ?Sized> Stylize for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn styles_keep_the_text() {
        assert!("=> ".style_ret().contains("=> "));
        assert!(String::from("oops").style_error().contains("oops"));
    }
}
