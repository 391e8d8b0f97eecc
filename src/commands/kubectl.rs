use crate::error::{Error, Result};
use crate::state::AppState;

/// Verbs `run_kubectl` may execute. All of them only read cluster state.
const READ_ONLY_VERBS: &[&str] = &["get", "describe", "logs", "top", "version", "cluster-info"];

/// Flags that would keep kubectl running until killed.
const STREAMING_FLAGS: &[&str] = &["-f", "--follow", "-w", "--watch", "--watch-only"];

/// Short flags that take a value, so the rest of a `-xVALUE` group is data.
const VALUED_SHORT_FLAGS: &[char] = &['c', 'k', 'l', 'L', 'n', 'o', 's'];

fn streams_forever(arg: &str) -> bool {
    if STREAMING_FLAGS
        .iter()
        .any(|f| arg == *f || arg.starts_with(&format!("{f}=")))
    {
        return true;
    }
    // grouped short flags such as `-Aw` or `-pf`
    let Some(group) = arg.strip_prefix('-').filter(|g| !g.starts_with('-')) else {
        return false;
    };
    for flag in group.chars() {
        if flag == 'f' || flag == 'w' {
            return true;
        }
        if flag == '=' || VALUED_SHORT_FLAGS.contains(&flag) {
            break;
        }
    }
    false
}

/// Splits a user-typed command line into kubectl arguments and rejects
/// anything that is not a read. A leading `kubectl` is accepted and dropped.
pub fn parse_read_only_command(command: &str) -> Result<Vec<String>> {
    let mut args = shell_words::split(command.trim())
        .map_err(|e| Error::InvalidCommand(format!("{e}")))?;

    if args.first().map(String::as_str) == Some("kubectl") {
        args.remove(0);
    }

    let verb = args
        .first()
        .ok_or_else(|| Error::InvalidCommand("command is required".into()))?;
    if !READ_ONLY_VERBS.contains(&verb.as_str()) {
        return Err(Error::CommandNotAllowed(verb.clone()));
    }

    if let Some(flag) = args.iter().find(|a| streams_forever(a)) {
        return Err(Error::InvalidCommand(format!(
            "`{flag}` streams forever, use the live log stream instead"
        )));
    }

    Ok(args)
}

/// Runs a read-only kubectl command and returns its stdout.
pub async fn run_kubectl(state: &AppState, command: &str) -> Result<String> {
    let args = parse_read_only_command(command)?;
    log::info!("kubectl: running `{}`", args.join(" "));
    state.kubectl.run(&args).await
}

pub async fn describe_pod(state: &AppState, namespace: &str, name: &str) -> Result<String> {
    let args = vec![
        "describe".to_string(),
        "pod".to_string(),
        name.to_string(),
        "-n".to_string(),
        namespace.to_string(),
    ];
    state.kubectl.run(&args).await
}
