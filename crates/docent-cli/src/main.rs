use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use docent_cli::{format_source, CliClient, CliError, SourceReply};
use docent_protocol::ChatMessage;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

const REPL_COMMANDS: &[&str] = &[
    "/stats", "/sources", "/clear", "/new", "help", "exit", "quit",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplCommand {
    Ask(String),
    Stats,
    Sources,
    Clear,
    New,
    Help,
    Exit,
    Empty,
    Unknown(String),
}

#[derive(Default)]
struct ReplHelper;

impl Helper for ReplHelper {}
impl Hinter for ReplHelper {
    type Hint = String;
}
impl Highlighter for ReplHelper {}
impl Validator for ReplHelper {}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let pos = pos.min(line.len());
        let input = &line[..pos];
        let start = input
            .rfind(char::is_whitespace)
            .map_or(0, |last_ws| last_ws + 1);
        let prefix = &input[start..];

        let pairs = complete_candidates(prefix)
            .into_iter()
            .map(|candidate| Pair {
                display: candidate.to_string(),
                replacement: candidate.to_string(),
            })
            .collect();
        Ok((start, pairs))
    }
}

fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }

    match line {
        "exit" | "quit" => return ReplCommand::Exit,
        "help" | "?" => return ReplCommand::Help,
        "/stats" => return ReplCommand::Stats,
        "/sources" => return ReplCommand::Sources,
        "/clear" => return ReplCommand::Clear,
        "/new" => return ReplCommand::New,
        _ => {}
    }

    if let Some(rest) = line.strip_prefix('/') {
        return ReplCommand::Unknown(format!("unknown command: /{rest}"));
    }

    ReplCommand::Ask(line.to_string())
}

fn help_text() -> String {
    [
        "Type a question to chat. Commands:",
        "  /stats                 Show session stats",
        "  /sources               Show the sources behind the last answer",
        "  /clear                 Delete the session on the server and locally",
        "  /new                   Start a fresh session",
        "  help                   Show this help",
        "  exit | quit            Exit",
    ]
    .join("\n")
}

struct ReplState {
    session_id: String,
    history: Vec<ChatMessage>,
    last_sources: Vec<SourceReply>,
    client: CliClient,
}

impl ReplState {
    fn new(server: String) -> Self {
        Self {
            session_id: fresh_session_id(),
            history: Vec::new(),
            last_sources: Vec::new(),
            client: CliClient::new(server),
        }
    }

    fn reset(&mut self) {
        self.session_id = fresh_session_id();
        self.history.clear();
        self.last_sources.clear();
    }
}

fn fresh_session_id() -> String {
    std::env::var("DOCENT_SESSION")
        .unwrap_or_else(|_| format!("cli_{}", uuid::Uuid::new_v4().simple()))
}

#[tokio::main]
async fn main() {
    if std::env::args().count() > 1 {
        let cli = docent_cli::Cli::parse();
        match docent_cli::run(cli).await {
            Ok(output) => {
                println!("{output}");
            }
            Err(err) => {
                eprintln!("error: {err}");
                std::process::exit(1);
            }
        }
        return;
    }

    let mut editor = match Editor::<ReplHelper, rustyline::history::DefaultHistory>::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("error: failed to start REPL: {err}");
            std::process::exit(1);
        }
    };
    editor.set_helper(Some(ReplHelper));
    let history = history_file();
    let _ = editor.load_history(&history);

    let server =
        std::env::var("DOCENT_SERVER").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
    let mut state = ReplState::new(server);
    println!(
        "{}",
        "Docent CLI interactive mode. Type `help`.".bright_green()
    );
    println!("{} {}", "session:".green(), state.session_id.cyan());

    loop {
        match editor.readline("docent> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(trimmed);
                match run_repl_command(&mut state, parse_command(trimmed)).await {
                    Ok(should_exit) => {
                        if should_exit {
                            break;
                        }
                    }
                    Err(err) => eprintln!("{} {}", "error:".red(), err),
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted)
            | Err(rustyline::error::ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => {
                eprintln!("{} {err}", "error:".red());
                break;
            }
        }
    }

    if let Err(err) = editor.save_history(&history) {
        eprintln!("{} failed to save history: {err}", "warning:".yellow());
    }
}

async fn run_repl_command(state: &mut ReplState, command: ReplCommand) -> Result<bool, CliError> {
    match command {
        ReplCommand::Ask(query) => {
            let reply = state
                .client
                .chat(&state.session_id, &state.history, &query)
                .await?;

            println!("{}", reply.answer);
            if reply.context_compacted {
                println!(
                    "{}",
                    "(older turns were summarized to fit the token budget)".yellow()
                );
            }
            if !reply.sources.is_empty() {
                println!(
                    "{} {}",
                    "sources:".dimmed(),
                    reply
                        .sources
                        .iter()
                        .map(|s| s.title.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                        .dimmed()
                );
            }

            // The client owns the history: append the recorded pair so the
            // next turn uploads the full authoritative list.
            state.history.extend(reply.messages);
            state.last_sources = reply.sources;
        }
        ReplCommand::Stats => {
            let stats = state.client.stats(&state.session_id).await?;
            println!(
                "{} {} messages, {} tokens at last turn, summary: {}",
                "stats:".green(),
                stats.message_count,
                stats.total_tokens,
                if stats.has_summary {
                    match stats.last_summarized_index {
                        Some(index) => format!("yes (through message {index})"),
                        None => "yes".to_string(),
                    }
                } else {
                    "no".to_string()
                }
            );
        }
        ReplCommand::Sources => {
            if state.last_sources.is_empty() {
                println!("{}", "no sources recorded yet".yellow());
            } else {
                for source in &state.last_sources {
                    print!("{}", format_source(source));
                }
            }
        }
        ReplCommand::Clear => {
            state.client.clear_session(&state.session_id).await?;
            println!("{} {}", "cleared session".green(), state.session_id.cyan());
            state.reset();
            println!("{} {}", "session:".green(), state.session_id.cyan());
        }
        ReplCommand::New => {
            state.reset();
            println!("{} {}", "session:".green(), state.session_id.cyan());
        }
        ReplCommand::Help => {
            println!("{}", help_text());
        }
        ReplCommand::Exit => {
            println!("{}", "bye".bright_green());
            return Ok(true);
        }
        ReplCommand::Empty => {}
        ReplCommand::Unknown(message) => {
            println!("{} {message}", "warning:".yellow());
            println!("{}", "Type `help` for available commands.".yellow());
        }
    }

    Ok(false)
}

fn history_file() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".docent-cli-history");
    }
    PathBuf::from(".docent-cli-history")
}

fn complete_candidates(prefix: &str) -> BTreeSet<&'static str> {
    REPL_COMMANDS
        .iter()
        .copied()
        .filter(|command| command.starts_with(prefix))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{complete_candidates, help_text, parse_command, ReplCommand};

    #[test]
    fn plain_text_is_a_question() {
        let command = parse_command("how do I reset the hub?");
        assert_eq!(
            command,
            ReplCommand::Ask("how do I reset the hub?".to_string())
        );
    }

    #[test]
    fn slash_commands_parse() {
        assert_eq!(parse_command("/stats"), ReplCommand::Stats);
        assert_eq!(parse_command("/sources"), ReplCommand::Sources);
        assert_eq!(parse_command("/clear"), ReplCommand::Clear);
        assert_eq!(parse_command("/new"), ReplCommand::New);
    }

    #[test]
    fn unknown_slash_command_is_flagged() {
        let command = parse_command("/frobnicate");
        assert_eq!(
            command,
            ReplCommand::Unknown("unknown command: /frobnicate".to_string())
        );
    }

    #[test]
    fn exit_aliases() {
        assert_eq!(parse_command("exit"), ReplCommand::Exit);
        assert_eq!(parse_command("quit"), ReplCommand::Exit);
    }

    #[test]
    fn complete_candidates_matches_prefix() {
        let slash_candidates = complete_candidates("/s");
        assert!(slash_candidates.contains("/stats"));
        assert!(slash_candidates.contains("/sources"));
        assert!(!slash_candidates.contains("/new"));
    }

    #[test]
    fn help_text_lists_core_commands() {
        let help = help_text();
        for command in ["/stats", "/sources", "/clear", "/new", "exit | quit"] {
            assert!(help.contains(command), "help text missing `{command}`");
        }
    }
}
