// src/notify/mod.rs
//! Digest rendering and delivery.
//!
//! Delivery is attempted once. Failures are returned to the caller, which
//! logs them; nothing here touches the seen-set.

pub mod discord;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::record::VacancyRecord;

/// Entries shown in one digest before the overflow line.
pub const MAX_DIGEST_LINES: usize = 15;

/// Red used for the "nothing listed" status.
pub const EMPTY_STATUS_COLOR: u32 = 15_158_332;

/// One batched notification of newly detected vacancies for a source.
#[derive(Debug, Clone)]
pub struct Digest {
    pub source_id: String,
    pub source_name: String,
    pub color: u32,
    /// Listing order.
    pub records: Vec<VacancyRecord>,
}

impl Digest {
    pub fn title(&self) -> String {
        let n = self.records.len();
        let noun = if n == 1 { "vacancy" } else { "vacancies" };
        format!("{n} new {noun} — {}", self.source_name)
    }

    /// `• [title — location](url)` per record, capped at [`MAX_DIGEST_LINES`]
    /// with a trailing `...and N more.` line.
    pub fn lines(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .records
            .iter()
            .take(MAX_DIGEST_LINES)
            .map(render_line)
            .collect();
        let rest = self.records.len().saturating_sub(MAX_DIGEST_LINES);
        if rest > 0 {
            out.push(format!("...and {rest} more."));
        }
        out
    }

    pub fn description(&self) -> String {
        self.lines().join("\n")
    }

    pub fn footer(&self) -> String {
        format!("{} Scraper", self.source_name)
    }
}

fn render_line(rec: &VacancyRecord) -> String {
    let label = format!("{} — {}", rec.display_title(), rec.display_location());
    match rec.link_url() {
        Some(url) => format!("• [{label}]({url})"),
        None => format!("• {label}"),
    }
}

/// Daily report of the current listing size, sent regardless of novelty.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub source_id: String,
    pub source_name: String,
    pub color: u32,
    pub listed: usize,
    /// Why the traversal stopped early, if it did.
    pub truncated: Option<String>,
}

impl StatusReport {
    pub fn title(&self) -> String {
        format!("Daily Status — {}", self.source_name)
    }

    pub fn description(&self) -> String {
        let mut text = if self.listed == 0 {
            "No vacancies are currently available.".to_string()
        } else {
            format!("There are currently **{}** vacancies listed.", self.listed)
        };
        if let Some(reason) = &self.truncated {
            text.push_str(&format!(
                "\n⚠️ The listing could not be read to the end ({reason}); the count may be low."
            ));
        }
        text
    }

    pub fn color(&self) -> u32 {
        if self.listed == 0 {
            EMPTY_STATUS_COLOR
        } else {
            self.color
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_digest(&self, digest: &Digest) -> Result<()>;
    async fn send_status(&self, status: &StatusReport) -> Result<()>;
}

/// Writes what would have been sent to the log. Used when no webhook is set.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_digest(&self, digest: &Digest) -> Result<()> {
        info!(source = %digest.source_id, title = %digest.title(), "dry run: digest not sent");
        for line in digest.lines() {
            info!(source = %digest.source_id, "{line}");
        }
        Ok(())
    }

    async fn send_status(&self, status: &StatusReport) -> Result<()> {
        info!(
            source = %status.source_id,
            listed = status.listed,
            "dry run: status not sent: {}",
            status.description()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(n: usize) -> Digest {
        let records = (1..=n)
            .map(|i| {
                let mut r = VacancyRecord::new("gauteng", format!("Post {i}"));
                r.location = Some("Pretoria".into());
                r.detail_url = Some(format!("https://x.test/{i}"));
                r
            })
            .collect();
        Digest {
            source_id: "gauteng".into(),
            source_name: "Gauteng".into(),
            color: 3_066_993,
            records,
        }
    }

    #[test]
    fn eighteen_records_show_fifteen_and_overflow() {
        let lines = digest(18).lines();
        assert_eq!(lines.len(), 16);
        assert_eq!(lines[0], "• [Post 1 — Pretoria](https://x.test/1)");
        assert_eq!(lines[14], "• [Post 15 — Pretoria](https://x.test/15)");
        assert_eq!(lines[15], "...and 3 more.");
    }

    #[test]
    fn title_counts_singular_and_plural() {
        assert_eq!(digest(1).title(), "1 new vacancy — Gauteng");
        assert_eq!(digest(2).title(), "2 new vacancies — Gauteng");
    }

    #[test]
    fn exactly_fifteen_has_no_overflow_line() {
        let lines = digest(15).lines();
        assert_eq!(lines.len(), 15);
        assert!(!lines.iter().any(|l| l.starts_with("...and")));
    }

    #[test]
    fn line_without_url_is_plain() {
        let r = VacancyRecord::new("mpumalanga", "");
        assert_eq!(render_line(&r), "• New Vacancy — Unknown");
    }

    #[test]
    fn status_text_and_color() {
        let mut s = StatusReport {
            source_id: "wc".into(),
            source_name: "Western Cape".into(),
            color: 42,
            listed: 0,
            truncated: None,
        };
        assert_eq!(s.description(), "No vacancies are currently available.");
        assert_eq!(s.color(), EMPTY_STATUS_COLOR);

        s.listed = 7;
        s.truncated = Some("pager click failed".into());
        assert!(s.description().starts_with("There are currently **7** vacancies listed."));
        assert!(s.description().contains("pager click failed"));
        assert_eq!(s.color(), 42);
    }
}
