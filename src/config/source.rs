// src/config/source.rs
//! Static per-source configuration: where the listing lives, how it is laid
//! out, and how it is presented in notifications.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

pub const ENV_SOURCES_PATH: &str = "VACANCY_SOURCES_PATH";
pub const DEFAULT_SOURCES_PATH: &str = "config/sources.toml";

/// Discord's default green, used by all built-in sources.
pub const DEFAULT_COLOR: u32 = 3_066_993;

/// Listing page layout; doubles as the pagination strategy tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Client-rendered table paged by a "next" control.
    AjaxTable(AjaxTableSelectors),
    /// Server-postback grid with popup detail views.
    PostbackGrid(PostbackGridSelectors),
    /// Single page with a status field and no listing.
    StatusPage(StatusPageSelectors),
}

impl Layout {
    pub fn pagination(&self) -> &'static str {
        match self {
            Layout::AjaxTable(_) => "next_button",
            Layout::PostbackGrid(_) => "postback_pager",
            Layout::StatusPage(_) => "none",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AjaxTableSelectors {
    pub table: String,
    pub rows: String,
    pub cells: String,
    /// Rows with fewer cells are layout rows and are skipped.
    pub min_cells: usize,
    pub detail_link: String,
    /// Relative detail links are joined onto this.
    pub link_base: String,
    pub next: String,
    pub disabled_class: String,
    /// (field, selector) pairs read from the detail page.
    pub detail_fields: Vec<(DetailField, String)>,
    /// Tried in order when capturing the whole detail text.
    pub full_text: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostbackGridSelectors {
    pub grid: String,
    pub empty_message: String,
    pub detail_button: String,
    pub open_in_new_tab: String,
    pub restore_target: String,
    /// `{page}` is replaced with the target page number.
    pub pager_link: String,
    pub detail_fields: Vec<(DetailField, String)>,
    pub full_text: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPageSelectors {
    pub status_field: String,
    pub no_vacancies_text: String,
    pub candidate_links: String,
    pub candidate_texts: Vec<String>,
    /// Reference-number prefix for synthetic drift records.
    pub sentinel_prefix: String,
}

/// Record fields a detail page can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailField {
    Title,
    ReferenceNumber,
    Directorate,
    Location,
    Package,
    ClosingDate,
    Enquiries,
    Requirements,
    Duties,
    Notes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub navigation: Duration,
    pub element: Duration,
    pub detail: Duration,
    pub popup: Duration,
    /// Pause after activating pagination before re-reading the listing.
    pub settle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(60),
            element: Duration::from_secs(30),
            detail: Duration::from_secs(60),
            popup: Duration::from_secs(15),
            settle: Duration::from_secs(2),
        }
    }
}

impl Timeouts {
    /// All zero; for scripted runs.
    pub fn immediate() -> Self {
        Self {
            navigation: Duration::ZERO,
            element: Duration::ZERO,
            detail: Duration::ZERO,
            popup: Duration::ZERO,
            settle: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub id: String,
    pub name: String,
    pub color: u32,
    pub province: String,
    pub base_url: String,
    pub layout: Layout,
    pub timeouts: Timeouts,
    pub retry: RetryPolicy,
}

impl SourceConfig {
    pub fn gauteng() -> Self {
        use DetailField::*;
        let fields = [
            (Title, "#body_lblDesc"),
            (ReferenceNumber, "#body_lblRefNo"),
            (Directorate, "#body_lblDirectorate"),
            (Location, "#body_lblCentre"),
            (Package, "#body_lblPackage"),
            (ClosingDate, "#body_lblClosingDate"),
            (Enquiries, "#body_lblEnquiries"),
            (Requirements, "#body_lblRequirements"),
            (Duties, "#body_lblDuties"),
            (Notes, "#body_lblNotes"),
        ];
        Self {
            id: "gauteng".into(),
            name: "Gauteng Health".into(),
            color: DEFAULT_COLOR,
            province: "Gauteng".into(),
            base_url: "https://jobs.gauteng.gov.za/Public/DepartmentJobs.aspx?dept=6".into(),
            layout: Layout::AjaxTable(AjaxTableSelectors {
                table: "table#tblJobs".into(),
                rows: "table#tblJobs tbody tr".into(),
                cells: "td".into(),
                min_cells: 5,
                detail_link: "a[href^='ViewJob.aspx']".into(),
                link_base: "https://jobs.gauteng.gov.za/Public/".into(),
                next: "#tblJobs_next".into(),
                disabled_class: "disabled".into(),
                detail_fields: fields.iter().map(|(f, s)| (*f, s.to_string())).collect(),
                full_text: vec!["form#form1".into(), "body".into()],
            }),
            timeouts: Timeouts::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn western_cape() -> Self {
        use DetailField::*;
        Self {
            id: "western_cape".into(),
            name: "Western Cape Health".into(),
            color: DEFAULT_COLOR,
            province: "Western Cape".into(),
            base_url: "https://www.scubedonline.co.za/recruitment_wcdh/vacancy-posting.aspx"
                .into(),
            layout: Layout::PostbackGrid(PostbackGridSelectors {
                grid: "table#vacancyListingView".into(),
                empty_message: "No vacancies available".into(),
                detail_button: "input[value='Vacancy Details']".into(),
                open_in_new_tab: "document.forms['vacancyPost'].target = '_blank'".into(),
                restore_target: "document.forms['vacancyPost'].target = '_self'".into(),
                pager_link: "tr.GridPager a[href*='Page${page}']".into(),
                detail_fields: vec![
                    (ReferenceNumber, "span[id*='lblReferenceNumber']".into()),
                    (Title, "span[id*='lblPost']".into()),
                    (Location, "span[id*='lblCentre']".into()),
                ],
                full_text: vec!["div#MainContent_pnlVacancyDetails".into(), "form".into()],
            }),
            timeouts: Timeouts::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn mpumalanga() -> Self {
        Self {
            id: "mpumalanga".into(),
            name: "Mpumalanga Health".into(),
            color: DEFAULT_COLOR,
            province: "Mpumalanga".into(),
            base_url: "https://ehr.mpuhealth.gov.za/OnlineApp/Advert.aspx".into(),
            layout: Layout::StatusPage(StatusPageSelectors {
                status_field: "#TextBox1".into(),
                no_vacancies_text: "No Vacancies advertised".into(),
                candidate_links: "a".into(),
                candidate_texts: vec!["View".into(), "Apply".into()],
                sentinel_prefix: "MPU".into(),
            }),
            timeouts: Timeouts::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn builtin() -> Vec<Self> {
        vec![Self::gauteng(), Self::western_cape(), Self::mpumalanga()]
    }

    fn apply(&mut self, o: &SourceOverride) {
        if let Some(v) = &o.name {
            self.name = v.clone();
        }
        if let Some(v) = o.color {
            self.color = v;
        }
        if let Some(v) = &o.base_url {
            self.base_url = v.clone();
        }
        if let Some(v) = o.navigation_timeout_secs {
            self.timeouts.navigation = Duration::from_secs(v);
        }
        if let Some(v) = o.element_timeout_secs {
            self.timeouts.element = Duration::from_secs(v);
        }
        if let Some(v) = o.settle_ms {
            self.timeouts.settle = Duration::from_millis(v);
        }
        if let Some(v) = o.retry_attempts {
            self.retry.max_attempts = v;
        }
        if let Some(v) = o.retry_backoff_ms {
            self.retry.backoff = Duration::from_millis(v);
        }
    }
}

/// Per-source tweaks accepted from the sources file. Layout selectors are not
/// overridable; a portal redesign needs code.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SourceOverride {
    name: Option<String>,
    color: Option<u32>,
    base_url: Option<String>,
    navigation_timeout_secs: Option<u64>,
    element_timeout_secs: Option<u64>,
    settle_ms: Option<u64>,
    retry_attempts: Option<u32>,
    retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SourcesFile {
    #[serde(default)]
    sources: BTreeMap<String, SourceOverride>,
}

fn apply_overrides(mut base: Vec<SourceConfig>, toml_src: &str) -> Result<Vec<SourceConfig>> {
    let file: SourcesFile = toml::from_str(toml_src).context("parsing sources toml")?;
    for (id, o) in &file.sources {
        let cfg = base
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| anyhow!("unknown source in sources file: {id}"))?;
        cfg.apply(o);
    }
    Ok(base)
}

/// Built-in sources with overrides from an explicit file.
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceConfig>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading sources from {}", path.display()))?;
    apply_overrides(SourceConfig::builtin(), &content)
}

/// Load sources using env var + fallbacks:
/// 1) $VACANCY_SOURCES_PATH (must exist)
/// 2) config/sources.toml
/// 3) built-ins
pub fn load_sources_default() -> Result<Vec<SourceConfig>> {
    if let Ok(p) = std::env::var(ENV_SOURCES_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            bail!("{ENV_SOURCES_PATH} points to non-existent path {}", pb.display());
        }
        return load_sources_from(&pb);
    }
    let default_p = PathBuf::from(DEFAULT_SOURCES_PATH);
    if default_p.exists() {
        return load_sources_from(&default_p);
    }
    Ok(SourceConfig::builtin())
}

/// Picks sources by id, preserving the requested order. Empty `ids` selects all.
pub fn select_sources(all: Vec<SourceConfig>, ids: &[String]) -> Result<Vec<SourceConfig>> {
    if ids.is_empty() {
        return Ok(all);
    }
    ids.iter()
        .map(|id| {
            all.iter()
                .find(|c| c.id.eq_ignore_ascii_case(id))
                .cloned()
                .ok_or_else(|| anyhow!("unknown source: {id}"))
        })
        .collect()
}
