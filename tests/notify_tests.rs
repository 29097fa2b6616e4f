use chrono::NaiveDate;
use subsentry::notify::{discord_batch_payload, slack_batch_payload, NewAlive};

fn alive(n: usize) -> NewAlive {
    NewAlive {
        subdomain: format!("svc{n}.example.com"),
        status_code: Some(403),
        probed_at: NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(14, 5, 59)
            .unwrap(),
    }
}

#[test]
fn slack_batch_never_exceeds_block_budget() {
    for n in [1usize, 5, 25, 26, 100] {
        let items: Vec<NewAlive> = (0..n).map(alive).collect();
        let payload = slack_batch_payload(&items, None);
        let blocks = payload["blocks"].as_array().unwrap();
        assert!(blocks.len() <= 45, "{n} items produced {} blocks", blocks.len());
    }
}

#[test]
fn discord_batch_trims_at_full_lines() {
    let items: Vec<NewAlive> = (0..500).map(alive).collect();
    let payload = discord_batch_payload(&items, None);
    let desc = payload["embeds"][0]["description"].as_str().unwrap();
    assert!(desc.chars().count() <= 4096);
    // every shown line is complete, the rest is summarized
    assert!(desc.contains("more subdomains"));
    assert!(!desc.lines().any(|l| l.starts_with("**svc") && !l.contains('`')));
}

#[test]
fn timestamps_are_minute_precision() {
    let items = vec![alive(1), alive(2)];
    let payload = slack_batch_payload(&items, None);
    let line = payload["blocks"][1]["text"]["text"].as_str().unwrap();
    assert!(line.contains("2025-06-01 14:05"));
    assert!(!line.contains("14:05:59"));
}
