use std::time::Duration;

use chrono::NaiveDateTime;
use serde_json::{json, Value};

use crate::config::Config;
use crate::http_client::sanitize_error;

const SLACK_MAX_ITEMS: usize = 25;
const SLACK_MAX_BLOCKS: usize = 45;
const SLACK_MAX_LINE_LEN: usize = 600;
const DISCORD_MAX_TITLE: usize = 256;
const DISCORD_MAX_DESC: usize = 4096;
const DISCORD_MAX_ITEMS: usize = 50;
const SEND_TIMEOUT_SECS: u64 = 5;

/// A subdomain that became reachable during the current sweep.
#[derive(Debug, Clone)]
pub struct NewAlive {
    pub subdomain: String,
    pub status_code: Option<i32>,
    pub probed_at: NaiveDateTime,
}

/// Timestamps shown to humans drop the seconds.
pub fn format_ts(t: &NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M").to_string()
}

/// Webhook URLs are secrets; logs only ever see the final path segment.
pub fn redact_webhook(raw: &str) -> String {
    let last = url::Url::parse(raw)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(|s| s.to_string()))
        })
        .unwrap_or_else(|| raw.rsplit('/').next().unwrap_or("").to_string());
    format!(".../{last}")
}

fn status_str(status_code: Option<i32>) -> String {
    status_code.map(|s| s.to_string()).unwrap_or_else(|| "-".into())
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

fn item_line(item: &NewAlive) -> String {
    format!(
        "*{}* — `{}` — status: `{}`",
        format_ts(&item.probed_at),
        item.subdomain,
        status_str(item.status_code)
    )
}

fn slack_mention_prefix(mention: Option<&str>) -> &'static str {
    match mention {
        Some("here") => "<!here> ",
        Some("channel") => "<!channel> ",
        _ => "",
    }
}

fn discord_mention_content(mention: Option<&str>) -> Option<&'static str> {
    match mention {
        Some("everyone") => Some("@everyone"),
        Some("here") => Some("@here"),
        _ => None,
    }
}

pub fn slack_single_payload(item: &NewAlive, mention: Option<&str>) -> Value {
    let text = truncate_chars(&item_line(item), SLACK_MAX_LINE_LEN);
    json!({
        "text": format!("{}New alive subdomain: {}", slack_mention_prefix(mention), item.subdomain),
        "blocks": [
            {"type": "section", "text": {"type": "mrkdwn", "text": text}},
            {"type": "context", "elements": [{"type": "mrkdwn", "text": "subsentry probe"}]},
        ],
    })
}

pub fn slack_batch_payload(items: &[NewAlive], mention: Option<&str>) -> Value {
    let mut blocks = vec![json!({
        "type": "section",
        "text": {"type": "mrkdwn", "text": format!("*{} new alive subdomains detected*", items.len())},
    })];

    for item in items.iter().take(SLACK_MAX_ITEMS) {
        let text = truncate_chars(&item_line(item), SLACK_MAX_LINE_LEN);
        blocks.push(json!({"type": "section", "text": {"type": "mrkdwn", "text": text}}));
    }

    let remaining = items.len().saturating_sub(SLACK_MAX_ITEMS);
    if remaining > 0 {
        blocks.push(json!({
            "type": "context",
            "elements": [{"type": "mrkdwn", "text": format!("And {remaining} more entries...")}],
        }));
    }
    blocks.truncate(SLACK_MAX_BLOCKS);

    json!({
        "text": format!("{}{} new alive subdomains detected", slack_mention_prefix(mention), items.len()),
        "blocks": blocks,
    })
}

pub fn discord_single_payload(item: &NewAlive, mention: Option<&str>) -> Value {
    let embed = json!({
        "title": "New alive subdomain",
        "description": format!("**{}**\nStatus: `{}`", item.subdomain, status_str(item.status_code)),
        "timestamp": item.probed_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        "footer": {"text": "subsentry"},
    });
    let mut body = json!({"embeds": [embed]});
    if let Some(content) = discord_mention_content(mention) {
        body["content"] = json!(content);
    }
    body
}

pub fn discord_batch_payload(items: &[NewAlive], mention: Option<&str>) -> Value {
    // fill the description line by line, stopping before the embed limit so
    // the trailer always fits; anything not shown is counted in the trailer
    let budget = DISCORD_MAX_DESC - 50;
    let mut description = String::new();
    let mut kept = 0usize;
    for item in items.iter().take(DISCORD_MAX_ITEMS) {
        let line = format!(
            "**{}** — `{}` — {}",
            item.subdomain,
            status_str(item.status_code),
            format_ts(&item.probed_at)
        );
        let sep = usize::from(!description.is_empty());
        if description.chars().count() + sep + line.chars().count() > budget {
            break;
        }
        if sep == 1 {
            description.push('\n');
        }
        description.push_str(&line);
        kept += 1;
    }
    let remaining = items.len() - kept;
    if remaining > 0 {
        description.push_str(&format!("\n\n... and {remaining} more subdomains"));
    }

    let embed = json!({
        "title": truncate_chars(&format!("{} new alive subdomains", items.len()), DISCORD_MAX_TITLE),
        "description": description,
        "footer": {"text": "subsentry"},
    });
    let mut body = json!({"embeds": [embed]});
    if let Some(content) = discord_mention_content(mention) {
        body["content"] = json!(content);
    }
    body
}

/// Delivers batched new-reachable lists to the configured webhook sinks.
/// Send failures are logged, never raised.
pub struct Notifier {
    client: reqwest::Client,
    slack_url: Option<String>,
    discord_url: Option<String>,
    slack_mention: Option<String>,
    discord_mention: Option<String>,
}

impl Notifier {
    pub fn from_config(cfg: &Config) -> Self {
        if let Some(url) = &cfg.slack_webhook_url {
            tracing::info!(platform = "slack", webhook = %redact_webhook(url), "notifier sink enabled");
        }
        if let Some(url) = &cfg.discord_webhook_url {
            tracing::info!(platform = "discord", webhook = %redact_webhook(url), "notifier sink enabled");
        }
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            slack_url: cfg.slack_webhook_url.clone(),
            discord_url: cfg.discord_webhook_url.clone(),
            slack_mention: cfg.slack_mention.clone(),
            discord_mention: cfg.discord_mention.clone(),
        }
    }

    pub async fn notify_new_alives(&self, items: &[NewAlive]) {
        if items.is_empty() {
            return;
        }
        tracing::info!(count = items.len(), "notifying new alive subdomains");

        if let Some(url) = &self.slack_url {
            let payload = if items.len() == 1 {
                slack_single_payload(&items[0], self.slack_mention.as_deref())
            } else {
                slack_batch_payload(items, self.slack_mention.as_deref())
            };
            self.post("slack", url, &payload).await;
        }
        if let Some(url) = &self.discord_url {
            let payload = if items.len() == 1 {
                discord_single_payload(&items[0], self.discord_mention.as_deref())
            } else {
                discord_batch_payload(items, self.discord_mention.as_deref())
            };
            self.post("discord", url, &payload).await;
        }
    }

    async fn post(&self, sink: &str, url: &str, body: &Value) {
        match self.client.post(url).json(body).send().await {
            Ok(resp) if resp.status().as_u16() >= 400 => {
                tracing::error!(sink, status = resp.status().as_u16(), webhook = %redact_webhook(url), "webhook send rejected");
            }
            Ok(_) => {
                tracing::debug!(sink, "webhook sent");
            }
            Err(e) => {
                tracing::error!(sink, error = %sanitize_error(&e.to_string()), "webhook send failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn item(n: usize) -> NewAlive {
        NewAlive {
            subdomain: format!("host{n}.example.com"),
            status_code: Some(200),
            probed_at: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(9, 30, 12).unwrap(),
        }
    }

    #[test]
    fn timestamp_drops_seconds() {
        assert_eq!(format_ts(&item(0).probed_at), "2025-03-01 09:30");
    }

    #[test]
    fn webhook_redacts_to_last_segment() {
        assert_eq!(
            redact_webhook("https://hooks.slack.com/services/T000/B000/secrettoken"),
            ".../secrettoken"
        );
    }

    #[test]
    fn slack_batch_enforces_item_and_block_limits() {
        let items: Vec<NewAlive> = (0..30).map(item).collect();
        let payload = slack_batch_payload(&items, None);
        let blocks = payload["blocks"].as_array().unwrap();
        // header + 25 line items + one "and more" context
        assert_eq!(blocks.len(), 27);
        assert!(blocks.len() <= 45);
        let last = blocks.last().unwrap();
        assert!(last["elements"][0]["text"].as_str().unwrap().contains("5 more"));
        assert!(payload["text"].as_str().unwrap().contains("30 new alive"));
    }

    #[test]
    fn slack_mention_prefixes_text() {
        let items: Vec<NewAlive> = (0..2).map(item).collect();
        let payload = slack_batch_payload(&items, Some("here"));
        assert!(payload["text"].as_str().unwrap().starts_with("<!here> "));
    }

    #[test]
    fn slack_single_is_compact() {
        let payload = slack_single_payload(&item(1), None);
        assert_eq!(payload["blocks"].as_array().unwrap().len(), 2);
        assert!(payload["text"].as_str().unwrap().contains("host1.example.com"));
    }

    #[test]
    fn discord_batch_stays_under_description_limit() {
        let items: Vec<NewAlive> = (0..200).map(item).collect();
        let payload = discord_batch_payload(&items, None);
        let desc = payload["embeds"][0]["description"].as_str().unwrap();
        assert!(desc.chars().count() <= 4096);
        assert!(desc.contains("more subdomains"));
        let title = payload["embeds"][0]["title"].as_str().unwrap();
        assert!(title.chars().count() <= 256);
    }

    #[test]
    fn discord_mention_goes_in_content() {
        let items: Vec<NewAlive> = (0..2).map(item).collect();
        let payload = discord_batch_payload(&items, Some("everyone"));
        assert_eq!(payload["content"].as_str(), Some("@everyone"));
        let none = discord_batch_payload(&items, None);
        assert!(none.get("content").is_none());
    }

    #[test]
    fn discord_single_carries_iso_timestamp() {
        let payload = discord_single_payload(&item(1), None);
        assert_eq!(
            payload["embeds"][0]["timestamp"].as_str(),
            Some("2025-03-01T09:30:12")
        );
    }
}
