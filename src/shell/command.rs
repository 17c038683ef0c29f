//! Shell command parsing.
//!
//! Lines starting with `/` are commands; anything else is SQL sent as typed.

use std::path::PathBuf;

use crate::api::{ComprobanteQuery, SeedScale};
use crate::session::ActiveView;

/// Help text displayed for the /help command.
pub const HELP_TEXT: &str = r#"Type SQL and press Enter to run it against the lab backend.

Views:
  /view [tables|dashboard|learning]  - Switch view (no argument shows the current one)
  /tables                            - Same as /view tables
  /dashboard                         - Same as /view dashboard
  /learn                             - Same as /view learning

Data:
  /table <name>                      - Preview the first 100 rows of a table
  /seed [small|medium|large]         - Regenerate the dataset (default: small)
  /browse [text] [--skip N] [--limit N]
                                     - Page through documents, optionally filtered by UUID/folio
  /export [dir]                      - Save the current result as CSV

Session:
  /status                            - Show connectivity and session state
  /retry                             - Probe the backend now
  /help                              - Show this help message
  /quit, /exit, /q                   - Exit"#;

/// Parsed shell input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Raw SQL statement.
    Sql(String),
    /// Switch view, or show the current one when `None`.
    View(Option<ActiveView>),
    /// Preview a table.
    Table(String),
    Seed(SeedScale),
    Browse(ComprobanteQuery),
    /// Export the current result, optionally into a specific directory.
    Export(Option<PathBuf>),
    Status,
    Retry,
    Help,
    Quit,
    /// Blank input.
    Empty,
    /// A known command with bad arguments.
    Invalid(String),
    /// Unknown command.
    Unknown(String),
}

/// Parser for shell input.
pub struct CommandRouter;

impl CommandRouter {
    /// Parse one line of input into a Command.
    pub fn parse(input: &str) -> Command {
        let input = input.trim();

        if input.is_empty() {
            return Command::Empty;
        }

        if !input.starts_with('/') {
            return Command::Sql(input.to_string());
        }

        let (command, args) = match input.split_once(char::is_whitespace) {
            Some((command, args)) => (command.to_lowercase(), args.trim()),
            None => (input.to_lowercase(), ""),
        };

        match command.as_str() {
            "/sql" if args.is_empty() => Command::Invalid("Usage: /sql <statement>".to_string()),
            "/sql" => Command::Sql(args.to_string()),
            "/view" => Self::parse_view(args),
            "/tables" => Command::View(Some(ActiveView::Tables)),
            "/dashboard" => Command::View(Some(ActiveView::Dashboard)),
            "/learn" | "/learning" => Command::View(Some(ActiveView::Learning)),
            "/table" => Self::parse_table(args),
            "/seed" => Self::parse_seed(args),
            "/browse" => Self::parse_browse(args),
            "/export" => Command::Export(first_word(args).map(PathBuf::from)),
            "/status" => Command::Status,
            "/retry" => Command::Retry,
            "/help" | "/?" => Command::Help,
            "/quit" | "/exit" | "/q" => Command::Quit,
            _ => Command::Unknown(command),
        }
    }

    fn parse_view(args: &str) -> Command {
        let Some(name) = first_word(args) else {
            return Command::View(None);
        };
        match ActiveView::parse(&name.to_lowercase()) {
            Some(view) => Command::View(Some(view)),
            None => Command::Invalid(format!(
                "Unknown view: {name}. Expected: tables, dashboard, or learning"
            )),
        }
    }

    fn parse_table(args: &str) -> Command {
        match first_word(args) {
            Some(name) => Command::Table(name),
            None => Command::Invalid("Usage: /table <name>".to_string()),
        }
    }

    fn parse_seed(args: &str) -> Command {
        match first_word(args) {
            None => Command::Seed(SeedScale::default()),
            Some(scale) => match scale.parse() {
                Ok(scale) => Command::Seed(scale),
                Err(e) => Command::Invalid(e),
            },
        }
    }

    fn parse_browse(args: &str) -> Command {
        let mut query = ComprobanteQuery::default();
        let mut text: Vec<String> = Vec::new();
        let mut words = split_args(args).into_iter();

        while let Some(word) = words.next() {
            let target = match word.as_str() {
                "--skip" => &mut query.skip,
                "--limit" => &mut query.limit,
                _ => {
                    text.push(word);
                    continue;
                }
            };
            match words.next().map(|n| n.parse::<u32>()) {
                Some(Ok(n)) => *target = n,
                _ => return Command::Invalid(format!("{word} expects a non-negative number")),
            }
        }

        if !text.is_empty() {
            query.q = Some(text.join(" "));
        }
        Command::Browse(query)
    }
}

fn first_word(args: &str) -> Option<String> {
    split_args(args).into_iter().next()
}

/// Splits on whitespace, keeping double- or single-quoted runs together.
fn split_args(args: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in args.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}
