use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;

use crate::api;
use crate::config;
use crate::data::{ApiCommentService, CommentService};
use crate::feed::{Feed, ListState, NotificationLevel};
use crate::identity::{IdentityProvider, StaticIdentity};
use crate::render;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List { post_id: String },
    Post { post_id: String, body: String },
    Delete { post_id: String, comment_id: String },
}

impl Command {
    fn post_id(&self) -> &str {
        match self {
            Command::List { post_id }
            | Command::Post { post_id, .. }
            | Command::Delete { post_id, .. } => post_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub config_file: Option<PathBuf>,
    pub command: Command,
}

pub fn run(opts: Options) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_with(opts, &mut out)
}

pub fn run_with(opts: Options, out: &mut dyn Write) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: opts.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;

    let client = api::Client::new(api::ClientConfig {
        base_url: Some(cfg.api.base_url.clone()),
        user_agent: cfg.api.user_agent.clone(),
        timeout: Some(cfg.api.timeout),
        http_client: None,
    })
    .context("build comments client")?;
    let service: Arc<dyn CommentService> = Arc::new(ApiCommentService::new(Arc::new(client)));
    let token = Some(cfg.identity.token.clone());
    let identity: Arc<dyn IdentityProvider> =
        StaticIdentity::new(cfg.identity.viewer(), token).shared();

    // Load, then at most one mutation, then the follow-up refresh.
    let budget = cfg.api.timeout.saturating_mul(3) + Duration::from_secs(1);
    let render_opts = || render::Options {
        width: cfg.ui.wrap_width,
        now: chrono::Utc::now(),
    };

    let mut feed = Feed::new(service, identity, opts.command.post_id());
    feed.on_mutation_settled(|event| {
        info!(post_id = %event.post_id, kind = ?event.kind, outcome = ?event.outcome, "mutation settled");
    });
    feed.load_comments(opts.command.post_id());
    if !feed.wait_until_settled(budget) {
        bail!("timed out loading comments");
    }

    let mut failed = None;
    match &opts.command {
        Command::List { .. } => {}
        Command::Post { body, .. } => {
            if let ListState::Error(err) = feed.list() {
                bail!("{err}");
            }
            feed.submit_comment(body)?;
            print_lines(out, &render::feed_lines(&feed, render_opts()))?;
            writeln!(out)?;
        }
        Command::Delete { comment_id, .. } => {
            if let ListState::Error(err) = feed.list() {
                bail!("{err}");
            }
            feed.delete_comment(comment_id)?;
        }
    }

    if !feed.wait_until_settled(budget) {
        bail!("timed out waiting for the server");
    }
    for note in feed.take_notifications() {
        match note.level {
            NotificationLevel::Success => writeln!(out, "{note}")?,
            // Reported once, by the caller, through the returned error.
            NotificationLevel::Error => failed = Some(note.message),
        }
    }

    print_lines(out, &render::feed_lines(&feed, render_opts()))?;

    if let Some(message) = failed {
        return Err(anyhow!(message));
    }
    if let ListState::Error(err) = feed.list() {
        bail!("{err}");
    }
    Ok(())
}

fn print_lines(out: &mut dyn Write, lines: &[String]) -> Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
