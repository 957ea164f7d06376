use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{info, warn};

use crate::api::{ConfluenceApi, Space};
use crate::convert::MarkdownConverter;
use crate::export::{PageStatus, export_page};
use crate::filesystem::{
    ensure_dir, is_single_path_component, normalize_path, sanitize_directory_name,
};

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    /// Space keys to export. Empty means every space.
    pub space_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageResult {
    pub space: String,
    pub title: String,
    pub action: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    pub success: bool,
    pub output_dir: String,
    pub spaces_found: usize,
    pub spaces_selected: usize,
    pub spaces_exported: usize,
    pub spaces_skipped: usize,
    pub pages_found: usize,
    pub pages_exported: usize,
    pub pages_skipped: usize,
    pub attachments_written: usize,
    pub attachments_failed: usize,
    pub attachments_skipped: usize,
    pub errors: Vec<String>,
    pub pages: Vec<PageResult>,
    pub request_count: usize,
}

impl ExportReport {
    fn record_page(&mut self, space: &str, title: &str, action: &str, detail: Option<String>) {
        self.pages.push(PageResult {
            space: space.to_string(),
            title: title.to_string(),
            action: action.to_string(),
            detail,
        });
    }
}

/// Export every selected space into `options.output_dir`.
///
/// Fails only when the space list cannot be fetched, is empty, or nothing is
/// left after filtering. Space, page and attachment failures are logged,
/// recorded in the report, and the run moves on to the next sibling.
pub fn run_export<A, C>(options: &ExportOptions, api: &mut A, converter: &C) -> Result<ExportReport>
where
    A: ConfluenceApi + ?Sized,
    C: MarkdownConverter + ?Sized,
{
    let mut report = ExportReport {
        output_dir: normalize_path(&options.output_dir),
        ..ExportReport::default()
    };

    let spaces = api.list_spaces().context("failed to fetch spaces")?;
    report.spaces_found = spaces.len();
    if spaces.is_empty() {
        bail!("no spaces found");
    }

    let requested = normalize_space_keys(&options.space_keys);
    if !requested.is_empty() {
        info!(keys = %requested.join(", "), "filtering spaces");
    }
    let selected = select_spaces(spaces, &requested);
    report.spaces_selected = selected.len();
    if selected.is_empty() {
        bail!(
            "no spaces matched the requested keys: {}",
            requested.join(", ")
        );
    }

    ensure_dir(&options.output_dir)?;
    info!(
        count = selected.len(),
        output_dir = %options.output_dir.display(),
        "exporting spaces"
    );

    for space in &selected {
        if export_space(space, &options.output_dir, api, converter, &mut report) {
            report.spaces_exported += 1;
        } else {
            report.spaces_skipped += 1;
        }
    }

    report.request_count = api.request_count();
    report.success = report.errors.is_empty();
    info!(
        spaces = report.spaces_exported,
        pages = report.pages_exported,
        attachments = report.attachments_written,
        "done"
    );
    Ok(report)
}

/// Returns false when the space was skipped before any page was processed.
fn export_space<A, C>(
    space: &Space,
    output_dir: &Path,
    api: &mut A,
    converter: &C,
    report: &mut ExportReport,
) -> bool
where
    A: ConfluenceApi + ?Sized,
    C: MarkdownConverter + ?Sized,
{
    let space_name = space.display_name();
    let space_key = space.display_key();
    info!(space = %space_name, key = %space_key, "processing space");

    let Some(space_id) = space.id.as_deref() else {
        warn!(space = %space_name, key = %space_key, "no ID found for space");
        report
            .errors
            .push(format!("{space_key}: space has no ID"));
        return false;
    };

    let space_dir_name = sanitize_directory_name(space_name);
    if !is_single_path_component(&space_dir_name) {
        warn!(space = %space_name, key = %space_key, "space name is not a usable directory name");
        report
            .errors
            .push(format!("{space_key}: unusable directory name {space_name:?}"));
        return false;
    }
    let space_dir = output_dir.join(space_dir_name);
    if let Err(error) = ensure_dir(&space_dir) {
        warn!(space = %space_name, error = %format!("{error:#}"), "cannot create space directory");
        report.errors.push(format!("{space_key}: {error:#}"));
        return false;
    }

    let pages = match api.list_pages(space_id) {
        Ok(pages) => pages,
        Err(error) => {
            warn!(space = %space_name, %error, "failed to fetch pages");
            report.errors.push(format!("{space_key}: {error}"));
            return false;
        }
    };
    info!(space = %space_name, count = pages.len(), "found pages");
    report.pages_found += pages.len();

    for page in &pages {
        let title = page.display_title();
        let Some(page_id) = page.id.as_deref() else {
            warn!(space = %space_name, page = %title, "no ID found for page");
            report.pages_skipped += 1;
            report.errors.push(format!("{space_key}/{title}: page has no ID"));
            report.record_page(space_key, title, "skipped", Some("missing page id".to_string()));
            continue;
        };

        let page_dir_name = sanitize_directory_name(title);
        if !is_single_path_component(&page_dir_name) {
            warn!(space = %space_name, page = %title, "page title is not a usable directory name");
            report.pages_skipped += 1;
            report
                .errors
                .push(format!("{space_key}/{title}: unusable directory name"));
            report.record_page(space_key, title, "skipped", Some("unusable directory name".to_string()));
            continue;
        }
        let page_dir = space_dir.join(page_dir_name);
        if let Err(error) = ensure_dir(&page_dir) {
            warn!(page = %title, error = %format!("{error:#}"), "cannot create page directory");
            report.pages_skipped += 1;
            report.errors.push(format!("{space_key}/{title}: {error:#}"));
            report.record_page(space_key, title, "error", Some(format!("{error:#}")));
            continue;
        }
        info!(page = %title, "processing page");

        let export = export_page(api, converter, page_id, title, &page_dir);
        report.attachments_written += export.attachments.written;
        report.attachments_failed += export.attachments.failed;
        report.attachments_skipped += export.attachments.skipped;
        if export.attachments.failed > 0 {
            report.errors.push(format!(
                "{space_key}/{title}: {} attachment(s) failed",
                export.attachments.failed
            ));
        }
        if let Some(list_error) = &export.attachments.list_error {
            report
                .errors
                .push(format!("{space_key}/{title}: {list_error}"));
        }

        match export.status {
            PageStatus::Written { markdown_path } => {
                report.pages_exported += 1;
                report.record_page(
                    space_key,
                    title,
                    "exported",
                    Some(normalize_path(&markdown_path)),
                );
            }
            PageStatus::Skipped(reason) => {
                report.pages_skipped += 1;
                let detail = reason.detail();
                if reason.is_error() {
                    report.errors.push(format!(
                        "{space_key}/{title}: {}",
                        detail.as_deref().unwrap_or(reason.as_str())
                    ));
                }
                report.record_page(
                    space_key,
                    title,
                    reason.as_str(),
                    detail,
                );
            }
        }
    }

    true
}

/// Trim requested keys, drop blanks and duplicates, keep first-seen order.
pub fn normalize_space_keys(raw: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    raw.iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .filter(|key| seen.insert(key.to_string()))
        .map(ToString::to_string)
        .collect()
}

/// Keep spaces whose key is in `keys`, in server order. Empty `keys` keeps everything.
pub fn select_spaces(spaces: Vec<Space>, keys: &[String]) -> Vec<Space> {
    if keys.is_empty() {
        return spaces;
    }
    spaces
        .into_iter()
        .filter(|space| {
            space
                .key
                .as_deref()
                .is_some_and(|key| keys.iter().any(|wanted| wanted == key))
        })
        .collect()
}
