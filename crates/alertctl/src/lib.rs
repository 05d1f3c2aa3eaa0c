use clap::Parser;

mod backlog;
mod output;
mod watch;

pub use output::{Output, OutputType};

/// A command-line tool for following the live security alert feed.
#[derive(Debug, Parser)]
#[clap(author, about, version)]
pub struct Cli {
    #[clap(subcommand)]
    cmd: Command,

    #[clap(flatten)]
    config: alert_feed::Config,

    #[clap(flatten)]
    output: Output,

    /// Emit logs as JSON rather than human-readable text.
    #[clap(global = true, long, env = "ALERTCTL_LOG_JSON")]
    pub log_json: bool,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Fetch the backlog of existing alerts once, and print it.
    Backlog,
    /// Follow the live alert feed, printing it after every change.
    ///
    /// The feed is seeded from the alert backlog and then kept current by
    /// the real-time alert stream. Alerts are dismissed by writing
    /// `dismiss <image-id> <timestamp>` lines to stdin. Watch runs until
    /// stdin is closed (CTRL-D) or it's interrupted.
    Watch,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let Self {
            cmd,
            config,
            output,
            log_json: _,
        } = self;

        match cmd {
            Command::Backlog => backlog::do_backlog(&config, &output).await,
            Command::Watch => watch::do_watch(&config, &output).await,
        }
    }
}
