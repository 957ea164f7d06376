use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::ConfluenceApi;
use crate::convert::{ConversionOutcome, MarkdownConverter};
use crate::filesystem::{
    ATTACHMENTS_DIRNAME, PAGE_FILENAME, ensure_dir, is_single_path_component, write_file,
};
use crate::links::localize_attachment_links;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttachmentStats {
    pub listed: usize,
    pub written: usize,
    pub failed: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    ContentUnavailable(String),
    EmptyBody,
    ConverterUnavailable { program: String },
    ConversionFailed { code: Option<i32>, stderr: String },
    WriteFailed(String),
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentUnavailable(_) => "content_unavailable",
            Self::EmptyBody => "empty_body",
            Self::ConverterUnavailable { .. } => "converter_unavailable",
            Self::ConversionFailed { .. } => "conversion_failed",
            Self::WriteFailed(_) => "write_failed",
        }
    }

    pub fn detail(&self) -> Option<String> {
        match self {
            Self::ContentUnavailable(message) | Self::WriteFailed(message) => {
                Some(message.clone())
            }
            Self::EmptyBody => None,
            Self::ConverterUnavailable { program } => {
                Some(format!("{program} is not installed or not on PATH"))
            }
            Self::ConversionFailed { code, stderr } => Some(match code {
                Some(code) => format!("exit code {code}: {stderr}"),
                None => stderr.clone(),
            }),
        }
    }

    /// Errors are worth surfacing in the run summary; an empty page is not.
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::EmptyBody)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStatus {
    Written { markdown_path: PathBuf },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageExport {
    pub status: PageStatus,
    pub attachments: AttachmentStats,
}

impl PageExport {
    fn skipped(reason: SkipReason, attachments: AttachmentStats) -> Self {
        Self {
            status: PageStatus::Skipped(reason),
            attachments,
        }
    }
}

/// Export one page into `page_dir`, which must already exist.
///
/// Runs content fetch, attachment download, link localization, conversion and
/// the `page.md` write in that order. Nothing here aborts the caller: every
/// failure is logged and folded into the returned [`PageExport`].
pub fn export_page<A, C>(
    api: &mut A,
    converter: &C,
    page_id: &str,
    title: &str,
    page_dir: &Path,
) -> PageExport
where
    A: ConfluenceApi + ?Sized,
    C: MarkdownConverter + ?Sized,
{
    let html = match api.get_page_body(page_id) {
        Ok(Some(html)) if !html.is_empty() => html,
        Ok(_) => {
            info!(page = %title, "no content found for page");
            return PageExport::skipped(SkipReason::EmptyBody, AttachmentStats::default());
        }
        Err(error) => {
            warn!(page = %title, %error, "failed to fetch page content");
            return PageExport::skipped(
                SkipReason::ContentUnavailable(error.to_string()),
                AttachmentStats::default(),
            );
        }
    };

    let attachments = download_attachments(api, page_id, title, page_dir);
    let localized = localize_attachment_links(&html);

    let markdown = match converter.convert(&localized) {
        ConversionOutcome::Converted(markdown) if !markdown.is_empty() => markdown,
        ConversionOutcome::Converted(_) => {
            warn!(page = %title, "converter produced no output");
            return PageExport::skipped(
                SkipReason::ConversionFailed {
                    code: Some(0),
                    stderr: "converter produced no output".to_string(),
                },
                attachments,
            );
        }
        ConversionOutcome::Unavailable { program } => {
            warn!(page = %title, %program, "converter is not installed or not on PATH");
            return PageExport::skipped(SkipReason::ConverterUnavailable { program }, attachments);
        }
        ConversionOutcome::Failed { code, stderr } => {
            warn!(page = %title, ?code, %stderr, "markdown conversion failed");
            return PageExport::skipped(SkipReason::ConversionFailed { code, stderr }, attachments);
        }
    };

    let markdown_path = page_dir.join(PAGE_FILENAME);
    if let Err(error) = write_file(&markdown_path, markdown.as_bytes()) {
        warn!(page = %title, error = %format!("{error:#}"), "failed to save page");
        return PageExport::skipped(SkipReason::WriteFailed(format!("{error:#}")), attachments);
    }
    info!(page = %title, path = %markdown_path.display(), "saved page content");

    PageExport {
        status: PageStatus::Written { markdown_path },
        attachments,
    }
}

fn download_attachments<A>(api: &mut A, page_id: &str, title: &str, page_dir: &Path) -> AttachmentStats
where
    A: ConfluenceApi + ?Sized,
{
    let mut stats = AttachmentStats::default();
    let attachments = match api.list_attachments(page_id) {
        Ok(attachments) => attachments,
        Err(error) => {
            warn!(page = %title, %error, "failed to fetch attachments");
            stats.list_error = Some(error.to_string());
            return stats;
        }
    };
    stats.listed = attachments.len();
    if attachments.is_empty() {
        return stats;
    }

    let attachments_dir = page_dir.join(ATTACHMENTS_DIRNAME);
    if let Err(error) = ensure_dir(&attachments_dir) {
        warn!(page = %title, error = %format!("{error:#}"), "cannot create attachments directory");
        stats.failed = attachments
            .iter()
            .filter(|attachment| attachment.download_target().is_some())
            .count();
        stats.skipped = stats.listed - stats.failed;
        return stats;
    }
    info!(page = %title, count = attachments.len(), "found attachments");

    for attachment in &attachments {
        let Some((file_name, download_link)) = attachment.download_target() else {
            debug!(page = %title, "attachment without file name or download link");
            stats.skipped += 1;
            continue;
        };
        if !is_single_path_component(file_name) {
            warn!(page = %title, file = %file_name, "attachment file name escapes the attachments directory");
            stats.skipped += 1;
            continue;
        }

        let content = match api.download_attachment(download_link) {
            Ok(content) => content,
            Err(error) => {
                warn!(page = %title, file = %file_name, %error, "failed to download attachment");
                stats.failed += 1;
                continue;
            }
        };
        let file_path = attachments_dir.join(file_name);
        match write_file(&file_path, &content) {
            Ok(()) => {
                debug!(file = %file_name, bytes = content.len(), "downloaded attachment");
                stats.written += 1;
            }
            Err(error) => {
                warn!(page = %title, file = %file_name, error = %format!("{error:#}"), "failed to save attachment");
                stats.failed += 1;
            }
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use std::fs;

    use reqwest::StatusCode;
    use tempfile::tempdir;

    use super::*;
    use crate::testing::{FakeConverter, MockApi, attachment};

    #[test]
    fn exports_page_with_attachments_and_localized_links() {
        let temp = tempdir().expect("tempdir");
        let page_dir = temp.path().join("Page");
        fs::create_dir_all(&page_dir).expect("page dir");

        let mut api = MockApi::default();
        api.bodies.insert(
            "10".to_string(),
            r#"<p><img src="https://acme.atlassian.net/wiki/download/attachments/10/chart.png?version=1"></p>"#
                .to_string(),
        );
        api.attachments.insert(
            "10".to_string(),
            vec![attachment("chart.png", "/download/attachments/10/chart.png?version=1")],
        );
        api.downloads.insert(
            "/download/attachments/10/chart.png?version=1".to_string(),
            b"PNG".to_vec(),
        );
        let converter = FakeConverter::echo();

        let export = export_page(&mut api, &converter, "10", "Page", &page_dir);

        assert_eq!(
            export.status,
            PageStatus::Written {
                markdown_path: page_dir.join("page.md")
            }
        );
        assert_eq!(export.attachments.written, 1);
        assert_eq!(
            fs::read(page_dir.join("attachments").join("chart.png")).expect("attachment"),
            b"PNG"
        );
        let markdown = fs::read_to_string(page_dir.join("page.md")).expect("page.md");
        assert!(markdown.contains(r#"<img src="attachments/chart.png">"#));
        assert_eq!(converter.inputs().len(), 1);
    }

    #[test]
    fn empty_body_writes_nothing() {
        let temp = tempdir().expect("tempdir");
        let mut api = MockApi::default();
        api.bodies.insert("11".to_string(), String::new());
        api.attachments.insert(
            "11".to_string(),
            vec![attachment("a.txt", "/download/attachments/11/a.txt")],
        );
        let converter = FakeConverter::echo();

        let export = export_page(&mut api, &converter, "11", "Empty", temp.path());

        assert_eq!(export.status, PageStatus::Skipped(SkipReason::EmptyBody));
        assert!(!temp.path().join("page.md").exists());
        assert!(!temp.path().join("attachments").exists());
        assert!(converter.inputs().is_empty());
    }

    #[test]
    fn content_fetch_failure_is_a_skip() {
        let temp = tempdir().expect("tempdir");
        let mut api = MockApi::default();
        api.failing_bodies
            .insert("12".to_string(), StatusCode::NOT_FOUND);
        let converter = FakeConverter::echo();

        let export = export_page(&mut api, &converter, "12", "Gone", temp.path());

        match export.status {
            PageStatus::Skipped(SkipReason::ContentUnavailable(message)) => {
                assert!(message.contains("404"));
            }
            other => panic!("unexpected status: {other:?}"),
        }
        assert!(!temp.path().join("page.md").exists());
    }

    #[test]
    fn one_failed_download_does_not_stop_the_page() {
        let temp = tempdir().expect("tempdir");
        let mut api = MockApi::default();
        api.bodies
            .insert("13".to_string(), "<p>two files</p>".to_string());
        api.attachments.insert(
            "13".to_string(),
            vec![
                attachment("broken.bin", "/download/attachments/13/broken.bin"),
                attachment("ok.txt", "/download/attachments/13/ok.txt"),
            ],
        );
        api.downloads
            .insert("/download/attachments/13/ok.txt".to_string(), b"ok".to_vec());
        let converter = FakeConverter::echo();

        let export = export_page(&mut api, &converter, "13", "Mixed", temp.path());

        assert!(matches!(export.status, PageStatus::Written { .. }));
        assert_eq!(export.attachments.written, 1);
        assert_eq!(export.attachments.failed, 1);
        assert!(temp.path().join("attachments").join("ok.txt").exists());
        assert!(!temp.path().join("attachments").join("broken.bin").exists());
        assert!(temp.path().join("page.md").exists());
    }

    #[test]
    fn attachment_listing_failure_still_writes_markdown() {
        let temp = tempdir().expect("tempdir");
        let mut api = MockApi::default();
        api.bodies.insert("14".to_string(), "<p>body</p>".to_string());
        api.failing_attachment_lists
            .insert("14".to_string(), StatusCode::FORBIDDEN);
        let converter = FakeConverter::echo();

        let export = export_page(&mut api, &converter, "14", "Locked", temp.path());

        assert!(matches!(export.status, PageStatus::Written { .. }));
        assert!(export.attachments.list_error.is_some());
        assert!(!temp.path().join("attachments").exists());
    }

    #[test]
    fn incomplete_and_escaping_attachments_are_skipped() {
        let temp = tempdir().expect("tempdir");
        let mut api = MockApi::default();
        api.bodies.insert("15".to_string(), "<p>x</p>".to_string());
        let mut nameless = attachment("", "/download/attachments/15/x");
        nameless.title = None;
        api.attachments.insert(
            "15".to_string(),
            vec![
                nameless,
                attachment("../escape.txt", "/download/attachments/15/escape.txt"),
                attachment("no-link.txt", ""),
            ],
        );
        let converter = FakeConverter::echo();

        let export = export_page(&mut api, &converter, "15", "Odd", temp.path());

        assert_eq!(export.attachments.listed, 3);
        assert_eq!(export.attachments.skipped, 3);
        assert_eq!(export.attachments.written, 0);
        assert!(temp.path().join("attachments").is_dir());
        assert!(!temp.path().join("escape.txt").exists());
        assert_eq!(api.download_requests(), 0);
    }

    #[test]
    fn attachment_names_are_not_sanitized() {
        let temp = tempdir().expect("tempdir");
        let mut api = MockApi::default();
        api.bodies.insert("16".to_string(), "<p>x</p>".to_string());
        api.attachments.insert(
            "16".to_string(),
            vec![attachment("Q3 report: final.txt", "/download/attachments/16/q3.txt")],
        );
        api.downloads
            .insert("/download/attachments/16/q3.txt".to_string(), b"q3".to_vec());
        let converter = FakeConverter::echo();

        let export = export_page(&mut api, &converter, "16", "Report", temp.path());

        assert_eq!(export.attachments.written, 1);
        assert!(
            temp.path()
                .join("attachments")
                .join("Q3 report: final.txt")
                .exists()
        );
    }

    #[test]
    fn conversion_failure_leaves_no_markdown() {
        for converter in [FakeConverter::unavailable(), FakeConverter::failing(), FakeConverter::silent()] {
            let temp = tempdir().expect("tempdir");
            fs::write(temp.path().join("page.md"), "previous export").expect("seed");
            let mut api = MockApi::default();
            api.bodies.insert("17".to_string(), "<p>x</p>".to_string());

            let export = export_page(&mut api, &converter, "17", "Draft", temp.path());

            assert!(matches!(export.status, PageStatus::Skipped(ref reason) if reason.is_error()));
            assert_eq!(
                fs::read_to_string(temp.path().join("page.md")).expect("page.md"),
                "previous export"
            );
        }
    }

    #[test]
    fn rerun_overwrites_existing_outputs() {
        let temp = tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("attachments")).expect("attachments");
        fs::write(temp.path().join("page.md"), "stale").expect("seed page");
        fs::write(temp.path().join("attachments").join("a.txt"), "stale").expect("seed file");

        let mut api = MockApi::default();
        api.bodies.insert("18".to_string(), "<p>fresh</p>".to_string());
        api.attachments.insert(
            "18".to_string(),
            vec![attachment("a.txt", "/download/attachments/18/a.txt")],
        );
        api.downloads
            .insert("/download/attachments/18/a.txt".to_string(), b"fresh".to_vec());
        let converter = FakeConverter::echo();

        export_page(&mut api, &converter, "18", "Again", temp.path());

        assert_eq!(
            fs::read_to_string(temp.path().join("page.md")).expect("page.md"),
            "<p>fresh</p>"
        );
        assert_eq!(
            fs::read_to_string(temp.path().join("attachments").join("a.txt")).expect("a.txt"),
            "fresh"
        );
    }
}
