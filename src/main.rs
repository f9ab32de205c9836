use std::path::PathBuf;

use comment_feed::app::{Command, Options};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "comment-feed — Read, post, and moderate a post's comment thread.

Usage:
  comment-feed [--config PATH] list <post-id>
  comment-feed [--config PATH] post <post-id> <body...>
  comment-feed [--config PATH] delete <post-id> <comment-id>

  --config PATH        Read configuration from PATH
  --version, -V        Show version and exit
  --help,    -h        Show this help message";

fn main() {
    init_tracing();

    let opts = match parse_args(std::env::args().skip(1).collect()) {
        Ok(Some(opts)) => opts,
        Ok(None) => return,
        Err(message) => {
            eprintln!("error: {message}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    if let Err(err) = comment_feed::run(opts) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// `Ok(None)` means an informational flag was handled and there is nothing
/// left to run.
fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut config_file = None;
    let mut positional = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("comment-feed {}", comment_feed::VERSION);
                return Ok(None);
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return Ok(None);
            }
            "--config" => {
                let path = iter.next().ok_or("--config requires a path")?;
                config_file = Some(PathBuf::from(path));
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("list") => Command::List {
            post_id: next_arg(&mut positional, "post-id")?,
        },
        Some("post") => {
            let post_id = next_arg(&mut positional, "post-id")?;
            let body = positional.by_ref().collect::<Vec<_>>().join(" ");
            if body.trim().is_empty() {
                return Err("post requires a comment body".into());
            }
            Command::Post { post_id, body }
        }
        Some("delete") => Command::Delete {
            post_id: next_arg(&mut positional, "post-id")?,
            comment_id: next_arg(&mut positional, "comment-id")?,
        },
        Some(other) => return Err(format!("unknown command {other:?}")),
        None => return Err("missing command".into()),
    };
    if let Some(extra) = positional.next() {
        return Err(format!("unexpected argument {extra:?}"));
    }

    Ok(Some(Options {
        config_file,
        command,
    }))
}

fn next_arg(args: &mut impl Iterator<Item = String>, name: &str) -> Result<String, String> {
    args.next()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| format!("missing <{name}>"))
}
