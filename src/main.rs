//! Purpose: `collavo` CLI entry point and command dispatch.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand, error::ErrorKind as ClapErrorKind};
use serde_json::{Map, Value, json};

mod serve;

use collavo::api::{
    ApiClient, Error, ErrorKind, PendingInvitation, load_invitations, save_invitations,
    to_exit_code,
};
use serve::{ServeConfig, serve};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `collavo --help`."));
            }
        },
    };

    match cli.command {
        Command::Serve {
            bind,
            store,
            sessions,
            cors_origins,
            allow_non_loopback,
            max_body_bytes,
        } => {
            let config = ServeConfig {
                bind,
                store_path: store,
                sessions_path: sessions,
                cors_origins,
                allow_non_loopback,
                max_body_bytes,
            };
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| {
                    Error::new(ErrorKind::Internal)
                        .with_message("failed to start runtime")
                        .with_source(err)
                })?;
            runtime.block_on(serve(config))?;
            Ok(RunOutcome::ok())
        }
        Command::Invitations { url, token } => {
            let mut client = ApiClient::new(url)?;
            if let Some(token) = token {
                client = client.with_token(token);
            }
            let guarded = client.pending_invitations()?;
            // handled failures were surfaced below this layer; print nothing.
            let Some(page) = guarded.data else {
                return Ok(RunOutcome::ok());
            };
            let payload = json!({ "invitations": page.invitations, "count": page.count });
            println!("{}", encode_pretty(&payload)?);
            Ok(RunOutcome::ok())
        }
        Command::Invite {
            store,
            project,
            project_name,
            from,
            to,
            role,
        } => {
            let mut invitations = load_invitations(&store)?;
            let invitation = build_invitation(project, project_name, from, to, role)?;
            invitations.push(invitation.clone());
            save_invitations(&store, &invitations)?;
            let payload = json!({ "invitation": invitation });
            println!("{}", encode_pretty(&payload)?);
            Ok(RunOutcome::ok())
        }
    }
}

#[derive(Parser)]
#[command(
    name = "collavo",
    version,
    about = "Invitation API service and client for Collavo project workspaces",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the API server
    Serve {
        #[arg(long, default_value = "127.0.0.1:4700", help = "Listen address")]
        bind: SocketAddr,
        #[arg(long, help = "Invitation store file (JSON array)")]
        store: PathBuf,
        #[arg(long, help = "Bearer-token sessions file")]
        sessions: Option<PathBuf>,
        #[arg(long = "cors-origin", help = "Allowed CORS origin (repeatable)")]
        cors_origins: Vec<String>,
        #[arg(long, help = "Permit binding to non-loopback addresses")]
        allow_non_loopback: bool,
        #[arg(long, default_value_t = 1024 * 1024, help = "Request body size limit")]
        max_body_bytes: u64,
    },
    /// Fetch the caller's pending invitations
    Invitations {
        #[arg(long, help = "API base url, e.g. http://127.0.0.1:4700")]
        url: String,
        #[arg(long, help = "Bearer token identifying the session")]
        token: Option<String>,
    },
    /// Append an invitation to a store file
    Invite {
        #[arg(long, help = "Invitation store file (JSON array)")]
        store: PathBuf,
        #[arg(long, help = "Project id")]
        project: String,
        #[arg(long = "project-name", help = "Human-readable project name")]
        project_name: String,
        #[arg(long, help = "Inviter email")]
        from: String,
        #[arg(long, help = "Invitee email")]
        to: String,
        #[arg(long, default_value = "member", help = "Granted role")]
        role: String,
    },
}

fn build_invitation(
    project_id: String,
    project_name: String,
    inviter_email: String,
    invitee_email: String,
    role: String,
) -> Result<PendingInvitation, Error> {
    let (created_at, nanos) = now_rfc3339()?;
    Ok(PendingInvitation {
        id: format!("inv-{nanos:x}"),
        project_id,
        project_name,
        inviter_email,
        invitee_email,
        role,
        created_at,
    })
}

fn now_rfc3339() -> Result<(String, u128), Error> {
    use time::format_description::well_known::Rfc3339;
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("time went backwards")
                .with_source(err)
        })?;
    let nanos = duration.as_nanos();
    let ts = time::OffsetDateTime::from_unix_timestamp_nanos(nanos as i128).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("invalid timestamp")
            .with_source(err)
    })?;
    let formatted = ts.format(&Rfc3339).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("timestamp format failed")
            .with_source(err)
    })?;
    Ok((formatted, nanos))
}

fn encode_pretty(value: &Value) -> Result<String, Error> {
    serde_json::to_string_pretty(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode output json")
            .with_source(err)
    })
}

fn emit_error(err: &Error) {
    let json = serde_json::to_string(&error_json(err)).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert(
        "message".to_string(),
        json!(err.message().unwrap_or("error")),
    );
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(status) = err.status() {
        inner.insert("status".to_string(), json!(status));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

#[cfg(test)]
mod tests {
    use super::{build_invitation, error_json};
    use collavo::api::{Error, ErrorKind};

    #[test]
    fn error_json_includes_kind_message_and_hint() {
        let err = Error::new(ErrorKind::Usage)
            .with_message("bad flag")
            .with_hint("Try `collavo --help`.");
        let value = error_json(&err);
        let inner = value
            .get("error")
            .and_then(|v| v.as_object())
            .expect("error object");
        assert_eq!(inner.get("kind").and_then(|v| v.as_str()), Some("Usage"));
        assert_eq!(
            inner.get("message").and_then(|v| v.as_str()),
            Some("bad flag")
        );
        assert_eq!(
            inner.get("hint").and_then(|v| v.as_str()),
            Some("Try `collavo --help`.")
        );
    }

    #[test]
    fn build_invitation_stamps_id_and_created_at() {
        let invitation = build_invitation(
            "p-1".to_string(),
            "Research Notes".to_string(),
            "owner@example.com".to_string(),
            "alice@example.com".to_string(),
            "member".to_string(),
        )
        .expect("invitation");
        assert!(invitation.id.starts_with("inv-"));
        assert!(invitation.created_at.contains('T'));
        assert_eq!(invitation.role, "member");
    }
}
