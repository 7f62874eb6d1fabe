use crate::catalog::ListFilter;
use crate::domain::format_timestamp_ms;
use crate::search::{DEFAULT_RESULT_LIMIT, SearchError, SearchOptions};
use crate::service::{ServiceError, SessionService};
use std::io::{self, Write};
use thiserror::Error;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliInvocation {
    PrintHelp,
    PrintVersion,
    Command(CliCommand),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CliCommand {
    Sessions {
        all: bool,
        archived: bool,
    },
    Directories,
    Search {
        query: String,
        directory: Option<String>,
        regex: bool,
        limit: usize,
    },
    Archive {
        session_id: String,
    },
    Rename {
        session_id: String,
        /// `None` clears the override.
        title: Option<String>,
    },
    Unarchive {
        session_id: String,
    },
    Export {
        session_id: String,
    },
}

#[derive(Debug, Error)]
pub enum CliParseError {
    #[error("unknown subcommand: {0}")]
    UnknownSubcommand(String),

    #[error("unknown flag: {0}")]
    UnknownFlag(String),

    #[error("missing value for flag: {0}")]
    MissingFlagValue(String),

    #[error("invalid value for {flag}: {value}")]
    InvalidFlagValue { flag: String, value: String },

    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

pub fn parse_invocation(args: &[String]) -> Result<CliInvocation, CliParseError> {
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        return Ok(CliInvocation::PrintHelp);
    }
    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        return Ok(CliInvocation::PrintVersion);
    }

    let mut iter = args.iter().skip(1);
    let Some(subcommand) = iter.next() else {
        return Ok(CliInvocation::PrintHelp);
    };

    match subcommand.as_str() {
        "sessions" => {
            let mut all = false;
            let mut archived = false;
            for arg in iter {
                match arg.as_str() {
                    "--all" | "-a" => all = true,
                    "--archived" => archived = true,
                    _ if arg.starts_with('-') => {
                        return Err(CliParseError::UnknownFlag(arg.to_string()));
                    }
                    _ => return Err(CliParseError::UnexpectedArgument(arg.to_string())),
                }
            }
            Ok(CliInvocation::Command(CliCommand::Sessions { all, archived }))
        }
        "directories" => {
            if let Some(arg) = iter.next() {
                return Err(CliParseError::UnexpectedArgument(arg.to_string()));
            }
            Ok(CliInvocation::Command(CliCommand::Directories))
        }
        "search" => {
            let mut query: Option<String> = None;
            let mut directory: Option<String> = None;
            let mut regex = false;
            let mut limit = DEFAULT_RESULT_LIMIT;

            let mut args = iter;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--directory" | "-d" => {
                        let value = args.next().ok_or_else(|| {
                            CliParseError::MissingFlagValue("--directory".to_string())
                        })?;
                        directory = Some(value.to_string());
                    }
                    "--regex" | "-r" => regex = true,
                    "--limit" | "-n" => {
                        let value = args.next().ok_or_else(|| {
                            CliParseError::MissingFlagValue("--limit".to_string())
                        })?;
                        limit = value.parse().map_err(|_| CliParseError::InvalidFlagValue {
                            flag: "--limit".to_string(),
                            value: value.to_string(),
                        })?;
                    }
                    _ if arg.starts_with('-') && arg.len() > 1 => {
                        return Err(CliParseError::UnknownFlag(arg.to_string()));
                    }
                    _ if query.is_none() => query = Some(arg.to_string()),
                    _ => return Err(CliParseError::UnexpectedArgument(arg.to_string())),
                }
            }

            let query = query.ok_or(CliParseError::MissingArgument("query"))?;
            Ok(CliInvocation::Command(CliCommand::Search {
                query,
                directory,
                regex,
                limit,
            }))
        }
        "archive" | "unarchive" => {
            let session_id = iter
                .next()
                .ok_or(CliParseError::MissingArgument("session id"))?
                .to_string();
            if let Some(arg) = iter.next() {
                return Err(CliParseError::UnexpectedArgument(arg.to_string()));
            }
            if subcommand == "archive" {
                Ok(CliInvocation::Command(CliCommand::Archive { session_id }))
            } else {
                Ok(CliInvocation::Command(CliCommand::Unarchive { session_id }))
            }
        }
        "rename" => {
            let session_id = iter
                .next()
                .ok_or(CliParseError::MissingArgument("session id"))?
                .to_string();
            let title = match iter.next() {
                Some(arg) if arg == "--clear" => None,
                Some(arg) if arg.starts_with('-') => {
                    return Err(CliParseError::UnknownFlag(arg.to_string()));
                }
                Some(arg) => Some(arg.to_string()),
                None => return Err(CliParseError::MissingArgument("title or --clear")),
            };
            if let Some(arg) = iter.next() {
                return Err(CliParseError::UnexpectedArgument(arg.to_string()));
            }
            Ok(CliInvocation::Command(CliCommand::Rename {
                session_id,
                title,
            }))
        }
        "export" => {
            let session_id = iter
                .next()
                .ok_or(CliParseError::MissingArgument("session id"))?
                .to_string();
            if let Some(arg) = iter.next() {
                return Err(CliParseError::UnexpectedArgument(arg.to_string()));
            }
            Ok(CliInvocation::Command(CliCommand::Export { session_id }))
        }
        other => Err(CliParseError::UnknownSubcommand(other.to_string())),
    }
}

pub fn help_text() -> String {
    [
        "ocbox - browse and search OpenCode session logs",
        "",
        "USAGE:",
        "  ocbox sessions [--all] [--archived]",
        "  ocbox directories",
        "  ocbox search <query> [--directory <dir>] [--regex] [--limit <n>]",
        "  ocbox archive <session-id>",
        "  ocbox unarchive <session-id>",
        "  ocbox rename <session-id> <title>",
        "  ocbox rename <session-id> --clear",
        "  ocbox export <session-id>",
        "",
        "FLAGS:",
        "  -a, --all          include subagent sessions",
        "      --archived     include archived sessions",
        "  -d, --directory    filter by working directory (substring)",
        "  -r, --regex        treat the query as a regular expression",
        "  -n, --limit        maximum number of sessions returned",
        "  -h, --help         print help",
        "  -V, --version      print version",
    ]
    .join("\n")
}

#[derive(Debug, Error)]
pub enum CliRunError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("failed to encode export: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

pub fn run_command(service: &SessionService, command: CliCommand) -> Result<(), CliRunError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for notice in service.notices() {
        eprintln!("warning: {notice}");
    }

    match command {
        CliCommand::Sessions { all, archived } => {
            let sessions = service.sessions(&ListFilter {
                include_archived: archived,
                include_subagents: all,
            });
            for session in sessions {
                writeln!(
                    out,
                    "{}  {}  {}  {}",
                    session.id,
                    format_timestamp_ms(session.time_updated_ms),
                    session.directory.display(),
                    session.title
                )?;
            }
        }
        CliCommand::Directories => {
            for directory in service.directories() {
                writeln!(out, "{directory}")?;
            }
        }
        CliCommand::Search {
            query,
            directory,
            regex,
            limit,
        } => {
            let results = service.search(
                &query,
                &SearchOptions {
                    directory,
                    regex,
                    limit,
                },
            )?;
            for result in results {
                writeln!(
                    out,
                    "{}  {}  {}",
                    result.session_id,
                    result.directory.display(),
                    result.title
                )?;
                for entry in &result.matches {
                    writeln!(out, "  [{}] {}", entry.role.as_str(), entry.snippet)?;
                }
                if result.total_matches > result.matches.len() {
                    writeln!(out, "  +{} more", result.total_matches - result.matches.len())?;
                }
            }
        }
        CliCommand::Archive { session_id } => {
            service.set_archived(&session_id, true)?;
            writeln!(out, "archived {session_id}")?;
        }
        CliCommand::Unarchive { session_id } => {
            service.set_archived(&session_id, false)?;
            writeln!(out, "unarchived {session_id}")?;
        }
        CliCommand::Rename { session_id, title } => {
            service.set_title(&session_id, title.as_deref())?;
            match title {
                Some(title) => writeln!(out, "renamed {session_id} to {title:?}")?,
                None => writeln!(out, "cleared title for {session_id}")?,
            }
        }
        CliCommand::Export { session_id } => {
            let export = service.export(&session_id)?;
            let text = serde_json::to_string_pretty(&export)?;
            writeln!(out, "{text}")?;
        }
    }

    Ok(())
}
