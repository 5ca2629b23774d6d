// src/record.rs
//! Canonical vacancy record shared by every source, plus identifier derivation.

use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One vacancy, normalized across sources.
///
/// The field set is a superset of what any single portal publishes. Fields a
/// source does not carry stay `None`; they are always present in the
/// serialized form so downstream exports see one stable column set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacancyRecord {
    pub source_id: String,
    pub title: String,
    pub reference_number: Option<String>,
    pub location: Option<String>,
    pub closing_date: Option<String>,
    pub package: Option<String>,
    pub requirements: Option<String>,
    pub duties: Option<String>,
    pub enquiries: Option<String>,
    /// Per-vacancy address. Part of the identifier.
    pub detail_url: Option<String>,
    /// Where the detail was viewed when the portal has no per-vacancy address
    /// (form postbacks land every vacancy on the same URL). Display only.
    #[serde(default)]
    pub view_url: Option<String>,
    pub raw_detail_text: Option<String>,
    pub directorate: Option<String>,
    pub notes: Option<String>,
    // Export columns of the shared schema. No current portal publishes
    // these, so adapters leave them `None` and checkpoints write nulls.
    pub posting_date: Option<String>,
    pub employment_type: Option<String>,
    pub qualification: Option<String>,
    pub province: Option<String>,
    /// Set when the detail view could not be read; the listing data is kept.
    pub extraction_error: Option<String>,
    /// Synthetic record flagging structural change on a source, for human review.
    #[serde(default)]
    pub sentinel: bool,
}

impl VacancyRecord {
    pub fn new(source_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Stable identifier used for novelty detection.
    ///
    /// Priority: reference number, then detail URL, then `title-location`.
    /// If all of those are blank the serialized record is used, so the result
    /// is never empty.
    pub fn identifier(&self) -> String {
        if let Some(r) = non_blank(&self.reference_number) {
            return r.to_string();
        }
        if let Some(u) = non_blank(&self.detail_url) {
            return u.to_string();
        }
        let title = self.title.trim();
        let location = non_blank(&self.location);
        if !title.is_empty() || location.is_some() {
            return format!(
                "{}-{}",
                if title.is_empty() { "Unknown" } else { title },
                location.unwrap_or("Unknown")
            );
        }
        // Last resort: field-order-stable JSON form of the record.
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }

    /// A record whose detail read failed and which has no reference number or
    /// URL only has a positional stand-in for an identity.
    pub fn is_provisional(&self) -> bool {
        self.extraction_error.is_some()
            && non_blank(&self.reference_number).is_none()
            && non_blank(&self.detail_url).is_none()
    }

    pub fn display_title(&self) -> &str {
        let t = self.title.trim();
        if t.is_empty() {
            "New Vacancy"
        } else {
            t
        }
    }

    /// Link for notifications: the vacancy's own address, else where it was viewed.
    pub fn link_url(&self) -> Option<&str> {
        non_blank(&self.detail_url).or_else(|| non_blank(&self.view_url))
    }

    pub fn display_location(&self) -> &str {
        non_blank(&self.location).unwrap_or("Unknown")
    }

    /// Closing date as `YYYY-MM-DD` when it parses as a day-first date,
    /// otherwise the raw text.
    pub fn closing_date_iso(&self) -> Option<String> {
        let raw = non_blank(&self.closing_date)?;
        Some(
            parse_day_first_date(raw)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| raw.to_string()),
        )
    }

    /// Merge detail-view fields into a listing record. Detail values win when
    /// non-empty; listing values are kept otherwise.
    pub fn merge_detail(&mut self, detail: VacancyRecord) {
        fn take(slot: &mut Option<String>, incoming: Option<String>) {
            if let Some(v) = incoming.filter(|v| !v.trim().is_empty()) {
                *slot = Some(v);
            }
        }
        if !detail.title.trim().is_empty() {
            self.title = detail.title;
        }
        take(&mut self.reference_number, detail.reference_number);
        take(&mut self.location, detail.location);
        take(&mut self.closing_date, detail.closing_date);
        take(&mut self.package, detail.package);
        take(&mut self.requirements, detail.requirements);
        take(&mut self.duties, detail.duties);
        take(&mut self.enquiries, detail.enquiries);
        take(&mut self.detail_url, detail.detail_url);
        take(&mut self.view_url, detail.view_url);
        take(&mut self.raw_detail_text, detail.raw_detail_text);
        take(&mut self.directorate, detail.directorate);
        take(&mut self.notes, detail.notes);
        take(&mut self.posting_date, detail.posting_date);
        take(&mut self.employment_type, detail.employment_type);
        take(&mut self.qualification, detail.qualification);
        take(&mut self.province, detail.province);
        take(&mut self.extraction_error, detail.extraction_error);
    }
}

fn non_blank(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Finds the first `D/M/YYYY` date in `s`.
pub fn parse_day_first_date(s: &str) -> Option<NaiveDate> {
    static RE_DATE: OnceCell<Regex> = OnceCell::new();
    let re = RE_DATE.get_or_init(|| {
        Regex::new(r"(\d{1,2})/(\d{1,2})/(\d{4})").expect("date regex")
    });
    let caps = re.captures(s)?;
    let d: u32 = caps[1].parse().ok()?;
    let m: u32 = caps[2].parse().ok()?;
    let y: i32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Normalize scraped cell text: decode entities, collapse whitespace, trim.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// `Some(normalized)` unless the text is blank.
pub fn non_empty(s: &str) -> Option<String> {
    let t = normalize_text(s);
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}
