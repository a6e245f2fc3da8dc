//! Expiration window selection and message rendering.

use chrono::NaiveDate;

use crate::{extract, inventory::LicenseRecord};

/// Which records are worth a reminder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    /// Maximum days until expiration.
    pub days: i64,
    pub include_expired: bool,
    /// Only remind exactly this many days ahead; replaces the `days` bound.
    pub only_on_day: Option<i64>,
}

impl Window {
    pub fn admits(&self, days_remaining: i64) -> bool {
        if days_remaining < 0 && !self.include_expired {
            return false;
        }
        match self.only_on_day {
            Some(day) => days_remaining == day,
            None => days_remaining <= self.days,
        }
    }
}

/// A license that falls inside the window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpiringItem {
    pub id: Option<String>,
    pub name: String,
    pub expires_on: NaiveDate,
    pub days_remaining: i64,
}

/// Expiring licenses ordered by expiration date (ties keep input order).
///
/// Records without a parseable expiration field are skipped.
pub fn select_expiring(records: &[LicenseRecord], window: &Window, today: NaiveDate) -> Vec<ExpiringItem> {
    let mut items: Vec<ExpiringItem> = records
        .iter()
        .filter_map(|rec| {
            let expires_on = extract::expiration_date(rec)?;
            let days_remaining = (expires_on - today).num_days();
            window.admits(days_remaining).then(|| ExpiringItem {
                id: rec.id(),
                name: extract::display_name(rec),
                expires_on,
                days_remaining,
            })
        })
        .collect();
    items.sort_by_key(|i| i.expires_on);
    items
}

pub fn days_label(days_remaining: i64) -> String {
    match days_remaining {
        d if d < 0 => format!("{} days overdue", -d),
        0 => "expires today".to_string(),
        1 => "1 day remaining".to_string(),
        d => format!("{d} days remaining"),
    }
}

pub fn render_line(item: &ExpiringItem) -> String {
    let date = item.expires_on.format("%Y-%m-%d");
    let label = days_label(item.days_remaining);
    match &item.id {
        Some(id) => format!("- {} (id {id}) - {date} ({label})", item.name),
        None => format!("- {} - {date} ({label})", item.name),
    }
}

/// Telegram's limit on a single message, in UTF-16 code units.
pub const MESSAGE_LIMIT: usize = 4096;

fn message_lines(items: &[ExpiringItem], window_days: i64) -> Vec<String> {
    let mut sorted: Vec<&ExpiringItem> = items.iter().collect();
    sorted.sort_by_key(|i| i.expires_on);

    let mut lines = vec![format!("License expiration reminder (<= {window_days} days):")];
    lines.extend(sorted.into_iter().map(render_line));
    lines
}

/// Header plus one line per item, earliest expiration first.
pub fn render_message(items: &[ExpiringItem], window_days: i64) -> String {
    message_lines(items, window_days).join("\n")
}

/// [`render_message`] cut on line boundaries into messages of at most
/// `limit` units. The header opens the first chunk only; a single line
/// longer than `limit` is split mid-line.
pub fn render_chunks(items: &[ExpiringItem], window_days: i64, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;

    for line in message_lines(items, window_days) {
        for piece in split_long(&line, limit) {
            let len = text_len(&piece);
            let sep = usize::from(!cur.is_empty());
            if cur_len + sep + len > limit {
                out.push(std::mem::take(&mut cur));
                cur_len = 0;
            }
            if !cur.is_empty() {
                cur.push('\n');
                cur_len += 1;
            }
            cur.push_str(&piece);
            cur_len += len;
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

fn text_len(s: &str) -> usize {
    s.encode_utf16().count()
}

fn split_long(line: &str, limit: usize) -> Vec<String> {
    if text_len(line) <= limit {
        return vec![line.to_string()];
    }
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;
    for ch in line.chars() {
        if cur_len + ch.len_utf16() > limit {
            out.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        cur.push(ch);
        cur_len += ch.len_utf16();
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    fn in_days(n: i64) -> String {
        (today() + Duration::days(n)).format("%Y-%m-%d").to_string()
    }

    fn window(days: i64, include_expired: bool, only_on_day: Option<i64>) -> Window {
        Window {
            days,
            include_expired,
            only_on_day,
        }
    }

    #[test]
    fn far_future_is_outside_window() {
        let recs = vec![LicenseRecord::from(json!({
            "id": 7, "name": "Acme Suite", "expiration_date": "2099-01-01"
        }))];
        assert!(select_expiring(&recs, &window(14, false, None), today()).is_empty());
    }

    #[test]
    fn five_days_out_is_included() {
        let recs = vec![LicenseRecord::from(json!({
            "id": 7, "name": "Acme Suite", "expiration_date": in_days(5)
        }))];
        let items = select_expiring(&recs, &window(14, false, None), today());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].days_remaining, 5);
        assert_eq!(items[0].id.as_deref(), Some("7"));
        assert_eq!(days_label(items[0].days_remaining), "5 days remaining");
    }

    #[test]
    fn expired_needs_include_expired() {
        let recs = vec![LicenseRecord::from(json!({
            "name": "Old", "expires": in_days(-3)
        }))];
        assert!(select_expiring(&recs, &window(14, false, None), today()).is_empty());

        let items = select_expiring(&recs, &window(14, true, None), today());
        assert_eq!(items.len(), 1);
        assert_eq!(days_label(items[0].days_remaining), "3 days overdue");
    }

    #[test]
    fn only_on_day_replaces_window_but_not_expired_rule() {
        let recs = vec![
            LicenseRecord::from(json!({"name": "a", "expiration_date": in_days(30)})),
            LicenseRecord::from(json!({"name": "b", "expiration_date": in_days(5)})),
            LicenseRecord::from(json!({"name": "c", "expiration_date": in_days(-2)})),
        ];

        let items = select_expiring(&recs, &window(14, false, Some(30)), today());
        assert_eq!(items.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(), ["a"]);

        assert!(select_expiring(&recs, &window(14, false, Some(-2)), today()).is_empty());
        let items = select_expiring(&recs, &window(14, true, Some(-2)), today());
        assert_eq!(items.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(), ["c"]);
    }

    #[test]
    fn sorted_by_expiration_and_undated_skipped() {
        let recs = vec![
            LicenseRecord::from(json!({"name": "late", "expiration_date": in_days(9)})),
            LicenseRecord::from(json!({"name": "undated"})),
            LicenseRecord::from(json!({"name": "bad", "expiration_date": "never"})),
            LicenseRecord::from(json!({"name": "soon", "expiration_date": in_days(1)})),
            LicenseRecord::from(json!({"name": "today", "end_date": {"date": in_days(0)}})),
        ];
        let w = window(14, false, None);
        let items = select_expiring(&recs, &w, today());
        assert_eq!(
            items.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            ["today", "soon", "late"]
        );
        assert_eq!(items, select_expiring(&recs, &w, today()));
    }

    #[test]
    fn labels_cover_four_cases() {
        assert_eq!(days_label(-1), "1 days overdue");
        assert_eq!(days_label(0), "expires today");
        assert_eq!(days_label(1), "1 day remaining");
        assert_eq!(days_label(12), "12 days remaining");
    }

    #[test]
    fn message_has_header_and_sorted_lines() {
        let d = |n| today() + Duration::days(n);
        let items = vec![
            ExpiringItem {
                id: None,
                name: "Design Tool".into(),
                expires_on: d(3),
                days_remaining: 3,
            },
            ExpiringItem {
                id: Some("12".into()),
                name: "Office".into(),
                expires_on: d(0),
                days_remaining: 0,
            },
        ];
        assert_eq!(
            render_message(&items, 14),
            "License expiration reminder (<= 14 days):\n\
             - Office (id 12) - 2026-03-10 (expires today)\n\
             - Design Tool - 2026-03-13 (3 days remaining)"
        );
    }

    fn item(n: i64, name: &str) -> ExpiringItem {
        ExpiringItem {
            id: Some(n.to_string()),
            name: name.to_string(),
            expires_on: today() + Duration::days(n),
            days_remaining: n,
        }
    }

    #[test]
    fn short_list_is_one_chunk() {
        let items = vec![item(1, "Office"), item(2, "CAD")];
        assert_eq!(
            render_chunks(&items, 14, MESSAGE_LIMIT),
            vec![render_message(&items, 14)]
        );
    }

    #[test]
    fn long_list_splits_on_line_boundaries() {
        let items: Vec<ExpiringItem> = (0..60).map(|n| item(n % 14, &format!("License number {n}"))).collect();
        let chunks = render_chunks(&items, 14, 300);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.encode_utf16().count() <= 300));
        assert!(chunks[0].starts_with("License expiration reminder (<= 14 days):\n"));
        assert!(chunks[1..].iter().all(|c| c.starts_with("- ")));
        // Rejoined, nothing is lost or reordered.
        assert_eq!(chunks.join("\n"), render_message(&items, 14));
    }

    #[test]
    fn oversized_line_is_cut() {
        let items = vec![item(1, &"z".repeat(50))];
        let chunks = render_chunks(&items, 14, 20);
        assert!(chunks.iter().all(|c| c.chars().count() <= 20));
        assert_eq!(chunks.concat().matches('z').count(), 50);
    }
}
