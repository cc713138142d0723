//! Commands handled locally instead of being sent to the model.

use std::io::{self, Write};

/// A recognised built-in command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Builtin {
    Help,
    Exit,
    Clear,
    History,
    Config,
    Pwd,
    ApiKey,
    ChangeDirectory(String),
}

impl Builtin {
    /// Recognises a built-in. Keywords must match the whole (trimmed) input;
    /// `cd` takes the rest of the line as its target.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let builtin = match input {
            "help" => Self::Help,
            "exit" | "quit" => Self::Exit,
            "clear" => Self::Clear,
            "history" => Self::History,
            "config" => Self::Config,
            "pwd" => Self::Pwd,
            "api-key" => Self::ApiKey,
            "cd" => Self::ChangeDirectory("~".to_string()),
            _ => {
                let rest = input.strip_prefix("cd")?;
                if !rest.starts_with(char::is_whitespace) {
                    return None;
                }
                Self::ChangeDirectory(rest.trim().to_string())
            }
        };
        Some(builtin)
    }
}

pub fn show_banner<W: Write + ?Sized>(output: &mut W) -> io::Result<()> {
    writeln!(output, "╔══════════════════════════════════════════╗")?;
    writeln!(output, "║ Terminal AI Assistant                    ║")?;
    writeln!(output, "║ Type 'exit' to quit, 'help' for commands ║")?;
    writeln!(output, "╚══════════════════════════════════════════╝")
}

/// Clears the screen and redraws the banner.
pub fn clear_screen<W: Write + ?Sized>(output: &mut W) -> io::Result<()> {
    write!(output, "\x1b[2J\x1b[H")?;
    show_banner(output)?;
    output.flush()
}

pub fn show_help<W: Write + ?Sized>(output: &mut W) -> io::Result<()> {
    writeln!(output, "Available Commands:")?;
    writeln!(output, "  help     - Show this help message")?;
    writeln!(output, "  exit     - Exit the program (also: quit)")?;
    writeln!(output, "  clear    - Clear the screen")?;
    writeln!(output, "  history  - Show command history")?;
    writeln!(output, "  config   - Show current configuration")?;
    writeln!(output, "  cd DIR   - Change directory")?;
    writeln!(output, "  pwd      - Show current directory")?;
    writeln!(output, "  api-key  - Update your API key")?;
    writeln!(output)?;
    writeln!(output, "Anything else is sent to the model as a task.")?;
    writeln!(
        output,
        "Commands matching a dangerous pattern ask for confirmation first. This check is a"
    )?;
    writeln!(
        output,
        "best-effort text match, not a sandbox: review every command before approving it."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_keywords() {
        assert_eq!(Builtin::parse("help"), Some(Builtin::Help));
        assert_eq!(Builtin::parse("exit"), Some(Builtin::Exit));
        assert_eq!(Builtin::parse("quit"), Some(Builtin::Exit));
        assert_eq!(Builtin::parse("clear"), Some(Builtin::Clear));
        assert_eq!(Builtin::parse("history"), Some(Builtin::History));
        assert_eq!(Builtin::parse("config"), Some(Builtin::Config));
        assert_eq!(Builtin::parse("pwd"), Some(Builtin::Pwd));
        assert_eq!(Builtin::parse("api-key"), Some(Builtin::ApiKey));
    }

    #[test]
    fn test_surrounding_whitespace_is_ignored() {
        assert_eq!(Builtin::parse("  pwd \n"), Some(Builtin::Pwd));
    }

    #[test]
    fn test_keywords_do_not_match_as_prefixes() {
        assert_eq!(Builtin::parse("help me find big files"), None);
        assert_eq!(Builtin::parse("history of git commits"), None);
        assert_eq!(Builtin::parse("pwdx"), None);
    }

    #[test]
    fn test_cd_takes_rest_of_line() {
        assert_eq!(
            Builtin::parse("cd /tmp"),
            Some(Builtin::ChangeDirectory("/tmp".to_string()))
        );
        assert_eq!(
            Builtin::parse("cd   my dir  "),
            Some(Builtin::ChangeDirectory("my dir".to_string()))
        );
    }

    #[test]
    fn test_bare_cd_goes_home() {
        assert_eq!(Builtin::parse("cd"), Some(Builtin::ChangeDirectory("~".to_string())));
    }

    #[test]
    fn test_cd_needs_separator() {
        assert_eq!(Builtin::parse("cdrom eject"), None);
    }

    #[test]
    fn test_tasks_are_not_builtins() {
        assert_eq!(Builtin::parse("show current directory"), None);
        assert_eq!(Builtin::parse(""), None);
    }

    #[test]
    fn test_help_warns_check_is_not_a_sandbox() {
        let mut output = Vec::new();
        show_help(&mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("not a sandbox"));
        assert!(text.contains("cd DIR"));
    }

    #[test]
    fn test_clear_redraws_banner() {
        let mut output = Vec::new();
        clear_screen(&mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("\x1b[2J\x1b[H"));
        assert!(text.contains("Type 'exit' to quit"));
    }
}
