use crate::Output;
use anyhow::Context;

pub async fn do_backlog(config: &alert_feed::Config, output: &Output) -> anyhow::Result<()> {
    let http_client = alert_feed::new_http_client(&config.user_agent)?;
    let client = alert_feed::BacklogClient::new(config.api_base(), http_client);

    let alerts = client
        .fetch()
        .await
        .with_context(|| format!("fetching alert backlog from {}", config.api_base()))?;

    tracing::debug!(count = alerts.len(), "fetched alert backlog");

    // Apply the backlog as a session would, so that it's deduplicated and capped.
    let store = alert_feed::AlertStore::new();
    store.apply_backlog(alerts, alert_feed::BacklogPolicy::Replace);

    output.print_alerts(&store.snapshot(), config.api_base())
}
