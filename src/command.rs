//! Command parsing
//!
//! Turns a raw inbound line into either a known command or free text that the
//! dispatcher interprets against the owner's conversation state.

use crate::error::BotError;
use crate::Result;

/// Sentinel that closes the tag attachment window
pub const DONE: &str = "Done";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    AddEntry,
    GetReport,
    GetDayReport,
    GetMonthReport,
    GetPdfReport,
    RemoveLast,
    Clear,
    AddTag,
    ListTag,
}

/// Literal command table, matched case-sensitively
const COMMANDS: &[(&str, Command)] = &[
    ("/start", Command::Start),
    ("/help", Command::Help),
    ("/addentry", Command::AddEntry),
    ("/getreport", Command::GetReport),
    ("/getdayreport", Command::GetDayReport),
    ("/getmonthreport", Command::GetMonthReport),
    ("/getpdfreport", Command::GetPdfReport),
    ("/removelast", Command::RemoveLast),
    ("/clear", Command::Clear),
    ("/addtag", Command::AddTag),
    ("/listtag", Command::ListTag),
];

impl Command {
    /// Exact literal match; anything else is free text
    pub fn parse(text: &str) -> Option<Command> {
        COMMANDS
            .iter()
            .find(|(literal, _)| *literal == text)
            .map(|(_, command)| *command)
    }
}

/// Amount and description parsed from `"<signed-number> [description...]"`
#[derive(Debug, Clone, PartialEq)]
pub struct EntryText {
    pub amount: f64,
    pub description: String,
}

/// Parse an entry line. The first space-separated token is the amount, the
/// rest (joined back with single spaces) is the description.
pub fn parse_entry_text(text: &str) -> Result<EntryText> {
    let mut parts = text.split(' ');
    let first = parts.next().unwrap_or("");

    let amount: f64 = first.parse().map_err(|_| {
        BotError::InvalidEntry(format!(
            "\"{}\" is not a number, send something like `14.00 pot`",
            first
        ))
    })?;

    if !amount.is_finite() {
        return Err(BotError::InvalidEntry(format!(
            "\"{}\" is not a finite amount",
            first
        )));
    }

    let description = parts.collect::<Vec<_>>().join(" ");

    Ok(EntryText {
        amount,
        description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/getpdfreport"), Some(Command::GetPdfReport));
        assert_eq!(Command::parse("/listtag"), Some(Command::ListTag));
    }

    #[test]
    fn test_commands_are_exact_and_case_sensitive() {
        assert_eq!(Command::parse("/Start"), None);
        assert_eq!(Command::parse("/addentry "), None);
        assert_eq!(Command::parse("addentry"), None);
        assert_eq!(Command::parse(DONE), None);
    }

    #[test]
    fn test_every_table_literal_parses() {
        for (literal, command) in COMMANDS {
            assert_eq!(Command::parse(literal), Some(*command));
        }
    }

    #[test]
    fn test_parse_income() {
        let parsed = parse_entry_text("14.00 pot").unwrap();
        assert_eq!(parsed.amount, 14.0);
        assert_eq!(parsed.description, "pot");
    }

    #[test]
    fn test_parse_payment() {
        let parsed = parse_entry_text("-5 coffee").unwrap();
        assert_eq!(parsed.amount, -5.0);
        assert_eq!(parsed.description, "coffee");
    }

    #[test]
    fn test_parse_keeps_multi_word_description() {
        let parsed = parse_entry_text("12.5 lunch with  friends").unwrap();
        assert_eq!(parsed.description, "lunch with  friends");

        let bare = parse_entry_text("3").unwrap();
        assert_eq!(bare.description, "");
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert!(matches!(
            parse_entry_text("abc"),
            Err(BotError::InvalidEntry(_))
        ));
        assert!(parse_entry_text("").is_err());
        assert!(parse_entry_text("NaN tea").is_err());
    }
}
