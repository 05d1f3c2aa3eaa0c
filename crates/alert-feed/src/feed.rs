use crate::models::{Alert, AlertKey, MAX_ALERTS};
use std::collections::VecDeque;

/// Feed is the ordered list of active alerts, most recently arrived first.
///
/// A Feed never holds two alerts having the same key, and never holds more
/// than MAX_ALERTS alerts. Ordering is by arrival: alerts are never re-sorted
/// by their timestamp.
///
/// Mutations return true if they changed the Feed, and bump its version.
#[derive(Debug, Default, Clone)]
pub struct Feed {
    alerts: VecDeque<Alert>,
    version: u64,
}

impl Feed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a newly arrived `alert` at the head of the Feed,
    /// evicting from the tail if the Feed is full.
    ///
    /// Malformed alerts and alerts already present are ignored.
    pub fn ingest(&mut self, alert: Alert) -> bool {
        if !alert.is_well_formed() {
            tracing::debug!(image_id = %alert.image_id, "dropping alert without a timestamp");
            return false;
        }
        if self.alerts.iter().any(|existing| existing.same_key(&alert)) {
            tracing::trace!(key = %alert.key(), "ignoring duplicate alert");
            return false;
        }

        self.alerts.push_front(alert);
        self.alerts.truncate(MAX_ALERTS);
        self.version += 1;
        true
    }

    /// Remove every alert sharing the key of `alert`.
    pub fn dismiss(&mut self, alert: &Alert) -> bool {
        self.remove_where(|existing| existing.same_key(alert))
    }

    /// Remove every alert identified by `key`.
    pub fn dismiss_key(&mut self, key: &AlertKey) -> bool {
        self.remove_where(|existing| existing.has_key(key))
    }

    /// Replace the Feed's contents with `backlog`, preserving its order.
    /// Repeated keys keep their first occurrence, and the result is capped.
    pub fn replace(&mut self, backlog: Vec<Alert>) -> bool {
        let mut next = VecDeque::with_capacity(backlog.len().min(MAX_ALERTS));
        extend_unique(&mut next, backlog);

        if next.is_empty() && self.alerts.is_empty() {
            return false;
        }
        self.alerts = next;
        self.version += 1;
        true
    }

    /// Merge `backlog` behind alerts which have already arrived.
    /// Alerts of the backlog already in the Feed are skipped, and the result is capped.
    pub fn merge_backlog(&mut self, backlog: Vec<Alert>) -> bool {
        let before = self.alerts.len();
        extend_unique(&mut self.alerts, backlog);

        if self.alerts.len() == before {
            return false;
        }
        self.version += 1;
        true
    }

    /// Version of the Feed, which increases with every change.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Alert> {
        self.alerts.get(index)
    }

    pub fn contains(&self, key: &AlertKey) -> bool {
        self.alerts.iter().any(|alert| alert.has_key(key))
    }

    /// Iterate alerts, most recently arrived first.
    pub fn iter(&self) -> impl Iterator<Item = &Alert> + '_ {
        self.alerts.iter()
    }

    pub fn to_vec(&self) -> Vec<Alert> {
        self.alerts.iter().cloned().collect()
    }

    fn remove_where<F>(&mut self, pred: F) -> bool
    where
        F: Fn(&Alert) -> bool,
    {
        let before = self.alerts.len();
        self.alerts.retain(|alert| !pred(alert));

        if self.alerts.len() == before {
            return false;
        }
        self.version += 1;
        true
    }
}

fn extend_unique(into: &mut VecDeque<Alert>, alerts: Vec<Alert>) {
    for alert in alerts {
        if into.len() == MAX_ALERTS {
            break;
        }
        if !into.iter().any(|existing| existing.same_key(&alert)) {
            into.push_back(alert);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(image_id: &str, timestamp: &str) -> Alert {
        Alert {
            image_id: image_id.to_string(),
            timestamp: Some(timestamp.to_string()),
            visitor_id: format!("visitor-{image_id}"),
            cam_id: "cam-1".to_string(),
            status: "unverified".to_string(),
            image_url: None,
        }
    }

    fn keys(feed: &Feed) -> Vec<String> {
        feed.iter().map(|a| a.key().to_string()).collect()
    }

    #[test]
    fn test_duplicates_are_ingested_once() {
        let mut feed = Feed::new();
        assert!(feed.ingest(alert("1", "t1")));
        assert!(feed.ingest(alert("2", "t1")));
        assert!(feed.ingest(alert("1", "t2")));

        // Same key, with a different status, is still a duplicate.
        let mut dup = alert("1", "t1");
        dup.status = "handled".to_string();
        assert!(!feed.ingest(dup));

        insta::assert_json_snapshot!(keys(&feed), @r###"
        [
          "1@t2",
          "2@t1",
          "1@t1"
        ]
        "###);
        assert_eq!(feed.version(), 3);
    }

    #[test]
    fn test_feed_is_capped_by_arrival() {
        let mut feed = Feed::new();
        for i in 0..150 {
            // Timestamps run backwards, to show they don't influence order.
            feed.ingest(alert(&i.to_string(), &format!("2024-01-01T00:00:{:03}Z", 999 - i)));
        }

        assert_eq!(feed.len(), MAX_ALERTS);
        let ids: Vec<usize> = feed.iter().map(|a| a.image_id.parse().unwrap()).collect();
        assert_eq!(ids, (50..150).rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_malformed_alerts_are_dropped() {
        let mut feed = Feed::new();
        feed.ingest(alert("1", "t1"));

        let mut missing = alert("2", "t2");
        missing.timestamp = None;
        let empty = alert("3", "");

        assert!(!feed.ingest(missing));
        assert!(!feed.ingest(empty));
        assert_eq!(keys(&feed), vec!["1@t1"]);
        assert_eq!(feed.version(), 1);
    }

    #[test]
    fn test_dismiss_is_idempotent() {
        let mut feed = Feed::new();
        feed.ingest(alert("1", "t1"));
        feed.ingest(alert("2", "t2"));

        assert!(feed.dismiss(&alert("1", "t1")));
        assert_eq!(feed.len(), 1);
        assert!(!feed.dismiss(&alert("1", "t1")));
        assert!(!feed.dismiss(&alert("9", "t9")));
        assert!(!feed.dismiss_key(&AlertKey::new("2", "other")));
        assert_eq!(feed.len(), 1);

        assert!(feed.dismiss_key(&AlertKey::new("2", "t2")));
        assert!(feed.is_empty());
    }

    #[test]
    fn test_replace_overwrites_ingested_alerts() {
        let mut feed = Feed::new();
        feed.ingest(alert("A", "t0"));

        assert!(feed.replace(vec![alert("B", "t1"), alert("C", "t2")]));
        assert_eq!(keys(&feed), vec!["B@t1", "C@t2"]);
    }

    #[test]
    fn test_replace_dedups_and_caps_backlog() {
        let mut backlog: Vec<Alert> = (0..120).map(|i| alert(&i.to_string(), "t")).collect();
        backlog.insert(1, alert("0", "t"));

        let mut feed = Feed::new();
        assert!(feed.replace(backlog));
        assert_eq!(feed.len(), MAX_ALERTS);
        assert_eq!(feed.get(0).unwrap().image_id, "0");
        assert_eq!(feed.get(1).unwrap().image_id, "1");
        assert_eq!(feed.get(99).unwrap().image_id, "99");

        // Replacing an empty Feed with an empty backlog isn't a change.
        let mut feed = Feed::new();
        assert!(!feed.replace(Vec::new()));
        assert_eq!(feed.version(), 0);
    }

    #[test]
    fn test_merge_backlog_keeps_arrived_alerts() {
        let mut feed = Feed::new();
        feed.ingest(alert("A", "t0"));
        feed.ingest(alert("B", "t1"));

        assert!(feed.merge_backlog(vec![alert("B", "t1"), alert("C", "t2")]));
        assert_eq!(keys(&feed), vec!["B@t1", "A@t0", "C@t2"]);
        assert!(!feed.merge_backlog(vec![alert("C", "t2")]));
    }

    #[test]
    fn test_fetch_ingest_dismiss_scenario() {
        let mut feed = Feed::new();
        feed.replace(vec![alert("1", "2024-01-01T10:00:00Z")]);
        assert_eq!(feed.len(), 1);

        feed.ingest(alert("2", "2024-01-01T10:01:00Z"));
        assert_eq!(
            keys(&feed),
            vec!["2@2024-01-01T10:01:00Z", "1@2024-01-01T10:00:00Z"]
        );

        feed.dismiss(&alert("1", "2024-01-01T10:00:00Z"));
        assert_eq!(keys(&feed), vec!["2@2024-01-01T10:01:00Z"]);
    }
}
