use crate::Output;
use alert_feed::{AlertKey, Session};
use tokio::io::AsyncBufReadExt;

/// A command read from stdin while watching the feed.
#[derive(Debug, PartialEq)]
enum StdinCommand {
    Dismiss(AlertKey),
}

pub async fn do_watch(config: &alert_feed::Config, output: &Output) -> anyhow::Result<()> {
    let session = Session::start(config)?;
    let store = session.store().clone();
    let mut feed = store.subscribe();
    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    output.print_alerts(&feed.snapshot(), config.api_base())?;

    loop {
        tokio::select! {
            changed = feed.changed() => {
                if !changed {
                    break;
                }
                output.print_alerts(&feed.snapshot(), config.api_base())?;
            }
            line = stdin.next_line() => {
                let Some(line) = line? else {
                    break; // Stdin was closed.
                };
                match parse_command(&line) {
                    Ok(Some(StdinCommand::Dismiss(key))) => {
                        tracing::info!(%key, "dismissing alert");
                        store.dismiss_key(&key);
                    }
                    Ok(None) => (),
                    Err(err) => tracing::warn!(%err, line, "ignoring invalid command"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.closed().await;
    Ok(())
}

fn parse_command(line: &str) -> Result<Option<StdinCommand>, String> {
    let mut words = line.split_whitespace();

    match words.next() {
        None => Ok(None),
        Some("dismiss") => match (words.next(), words.next(), words.next()) {
            (Some(image_id), Some(timestamp), None) => Ok(Some(StdinCommand::Dismiss(
                AlertKey::new(image_id, timestamp),
            ))),
            _ => Err("usage: dismiss <image-id> <timestamp>".to_string()),
        },
        Some(other) => Err(format!("unknown command {other:?}")),
    }
}
