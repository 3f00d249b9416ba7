use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::error::PayloadError;
use super::push::PushSubscriptions;
use super::table::{TableRow, TableView};
use super::types::Topic;

const STATUS_HISTORY: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarrelStatus {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "time", deserialize_with = "string_or_number")]
    pub last_update_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopSearchEntry {
    #[serde(rename = "name")]
    pub query: String,
    pub count: u64,
}

impl TableRow for BarrelStatus {
    const HEADERS: &'static [&'static str] = &["Barrel", "Last update"];

    fn cells(&self) -> Vec<String> {
        vec![self.id.clone(), self.last_update_time.clone()]
    }
}

impl TableRow for TopSearchEntry {
    const HEADERS: &'static [&'static str] = &["Query", "Count"];

    fn cells(&self) -> Vec<String> {
        vec![self.query.clone(), self.count.to_string()]
    }
}

// Barrel ids and times arrive as numbers from some gateways and strings from others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}

/// Admin view state. Each table is replaced wholesale by the newest payload
/// of its topic.
#[derive(Debug, Default)]
pub struct LiveDashboard {
    barrels: Vec<BarrelStatus>,
    top_searches: Vec<TopSearchEntry>,
    barrels_updated: Option<DateTime<Utc>>,
    searches_updated: Option<DateTime<Utc>>,
    status_messages: VecDeque<String>,
}

impl LiveDashboard {
    pub fn with_snapshot(barrels: Vec<BarrelStatus>, top_searches: Vec<TopSearchEntry>) -> Self {
        Self {
            barrels,
            top_searches,
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn barrels(&self) -> &[BarrelStatus] {
        &self.barrels
    }

    #[cfg(test)]
    pub fn top_searches(&self) -> &[TopSearchEntry] {
        &self.top_searches
    }

    pub fn status_messages(&self) -> impl Iterator<Item = &str> {
        self.status_messages.iter().map(String::as_str)
    }

    pub fn push_status(&mut self, message: impl Into<String>) {
        self.status_messages.push_front(message.into());
        while self.status_messages.len() > STATUS_HISTORY {
            self.status_messages.pop_back();
        }
    }

    /// Applies one payload to the table of `topic`. On error the table keeps
    /// its previous rows.
    pub fn apply(&mut self, topic: Topic, payload: &str) -> Result<usize, PayloadError> {
        let decode_err = |source| PayloadError { topic, source };
        let now = Utc::now();
        match topic {
            Topic::BarrelUpdates => {
                let barrels: Vec<BarrelStatus> =
                    serde_json::from_str(payload).map_err(decode_err)?;
                self.barrels = barrels;
                self.barrels_updated = Some(now);
                Ok(self.barrels.len())
            }
            Topic::SearchUpdates => {
                let searches: Vec<TopSearchEntry> =
                    serde_json::from_str(payload).map_err(decode_err)?;
                self.top_searches = searches;
                self.searches_updated = Some(now);
                Ok(self.top_searches.len())
            }
        }
    }

    /// Handles one inbound message, containing any failure to its own topic.
    pub fn handle_message(&mut self, topic: Topic, payload: &str) -> bool {
        match self.apply(topic, payload) {
            Ok(rows) => {
                info!(%topic, rows, "dashboard table replaced");
                true
            }
            Err(err) => {
                warn!(error = %err, "dropping push message");
                self.push_status(err.to_string());
                false
            }
        }
    }

    /// Drains everything queued on both subscriptions. Returns the topics
    /// whose table changed.
    pub fn drain(&mut self, subscriptions: &mut PushSubscriptions) -> Vec<Topic> {
        let mut changed = Vec::new();
        for topic in Topic::ALL {
            while let Some(payload) = subscriptions.try_recv(topic) {
                if self.handle_message(topic, &payload) && !changed.contains(&topic) {
                    changed.push(topic);
                }
            }
        }
        changed
    }

    pub fn barrels_table(&self) -> TableView {
        TableView::from_rows(
            table_title("Active barrels", self.barrels_updated),
            &self.barrels,
        )
    }

    pub fn searches_table(&self) -> TableView {
        TableView::from_rows(
            table_title("Top searches", self.searches_updated),
            &self.top_searches,
        )
    }

    pub fn table(&self, topic: Topic) -> TableView {
        match topic {
            Topic::BarrelUpdates => self.barrels_table(),
            Topic::SearchUpdates => self.searches_table(),
        }
    }
}

fn table_title(base: &str, updated: Option<DateTime<Utc>>) -> String {
    match updated {
        Some(at) => format!("{base} - updated {}", at.format("%H:%M:%S")),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn barrel_updates_replace_instead_of_accumulating() {
        let mut dashboard = LiveDashboard::default();
        dashboard
            .apply(Topic::BarrelUpdates, r#"[{"id":"b1","time":"10:00"}]"#)
            .unwrap();
        dashboard
            .apply(Topic::BarrelUpdates, r#"[{"id":"b2","time":"10:05"}]"#)
            .unwrap();

        assert_eq!(
            dashboard.barrels(),
            &[BarrelStatus {
                id: "b2".to_string(),
                last_update_time: "10:05".to_string(),
            }]
        );
        assert_eq!(
            dashboard.barrels_table().rows,
            vec![vec!["b2".to_string(), "10:05".to_string()]]
        );
    }

    #[test]
    fn payload_order_is_kept() {
        let mut dashboard = LiveDashboard::default();
        dashboard
            .apply(
                Topic::SearchUpdates,
                r#"[{"name":"rust","count":9},{"name":"java","count":3},{"name":"go","count":5}]"#,
            )
            .unwrap();
        let queries: Vec<_> = dashboard
            .top_searches()
            .iter()
            .map(|entry| entry.query.as_str())
            .collect();
        assert_eq!(queries, vec!["rust", "java", "go"]);
    }

    #[test]
    fn numeric_barrel_fields_are_accepted() {
        let mut dashboard = LiveDashboard::default();
        let rows = dashboard
            .apply(Topic::BarrelUpdates, r#"[{"id":3,"time":12.5,"extra":true}]"#)
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(dashboard.barrels()[0].id, "3");
        assert_eq!(dashboard.barrels()[0].last_update_time, "12.5");
    }

    #[test]
    fn empty_payload_clears_table() {
        let mut dashboard = LiveDashboard::with_snapshot(
            vec![BarrelStatus {
                id: "b1".to_string(),
                last_update_time: "09:00".to_string(),
            }],
            Vec::new(),
        );
        dashboard.apply(Topic::BarrelUpdates, "[]").unwrap();
        assert!(dashboard.barrels().is_empty());
    }

    #[test]
    fn malformed_payload_keeps_previous_rows() {
        let mut dashboard = LiveDashboard::default();
        dashboard
            .apply(Topic::SearchUpdates, r#"[{"name":"rust","count":2}]"#)
            .unwrap();
        let err = dashboard
            .apply(Topic::SearchUpdates, r#"{"name":"rust"}"#)
            .unwrap_err();
        assert_eq!(err.topic, Topic::SearchUpdates);
        assert_eq!(dashboard.top_searches().len(), 1);
    }

    #[test]
    fn malformed_payload_on_one_topic_does_not_touch_the_other() {
        let (mut subscriptions, senders) = PushSubscriptions::channel();
        let mut dashboard = LiveDashboard::default();

        senders
            .send(Topic::BarrelUpdates, "not json".to_string())
            .unwrap();
        senders
            .send(
                Topic::SearchUpdates,
                r#"[{"name":"rust","count":4}]"#.to_string(),
            )
            .unwrap();

        let changed = dashboard.drain(&mut subscriptions);
        assert_eq!(changed, vec![Topic::SearchUpdates]);
        assert!(dashboard.barrels().is_empty());
        assert_eq!(dashboard.top_searches()[0].count, 4);
        assert!(
            dashboard
                .status_messages()
                .next()
                .is_some_and(|line| line.contains("barrelUpdates"))
        );
    }

    #[test]
    fn drain_applies_messages_in_arrival_order() {
        let (mut subscriptions, senders) = PushSubscriptions::channel();
        let mut dashboard = LiveDashboard::default();
        for id in ["b1", "b2", "b3"] {
            senders
                .send(
                    Topic::BarrelUpdates,
                    format!(r#"[{{"id":"{id}","time":"t"}}]"#),
                )
                .unwrap();
        }
        dashboard.drain(&mut subscriptions);
        assert_eq!(dashboard.barrels()[0].id, "b3");
        assert_eq!(dashboard.barrels().len(), 1);
    }
}
