//! In-memory doubles for the API and converter seams.

use std::cell::RefCell;
use std::collections::BTreeMap;

use reqwest::StatusCode;

use crate::api::{Attachment, AttachmentLinks, ConfluenceApi, Page, Space};
use crate::convert::{ConversionOutcome, MarkdownConverter};
use crate::error::ApiError;

#[derive(Default)]
pub struct MockApi {
    pub spaces: Vec<Space>,
    pub spaces_failure: Option<StatusCode>,
    pub pages: BTreeMap<String, Vec<Page>>,
    pub failing_page_lists: BTreeMap<String, StatusCode>,
    pub bodies: BTreeMap<String, String>,
    pub failing_bodies: BTreeMap<String, StatusCode>,
    pub attachments: BTreeMap<String, Vec<Attachment>>,
    pub failing_attachment_lists: BTreeMap<String, StatusCode>,
    pub downloads: BTreeMap<String, Vec<u8>>,
    pub requests: Vec<String>,
}

impl MockApi {
    pub fn download_requests(&self) -> usize {
        self.requests
            .iter()
            .filter(|request| request.starts_with("download "))
            .count()
    }

    fn http_error(url: String, status: StatusCode) -> ApiError {
        ApiError::Http {
            url,
            status,
            body: None,
        }
    }
}

impl ConfluenceApi for MockApi {
    fn list_spaces(&mut self) -> Result<Vec<Space>, ApiError> {
        self.requests.push("spaces".to_string());
        match self.spaces_failure {
            Some(status) => Err(Self::http_error("/spaces".to_string(), status)),
            None => Ok(self.spaces.clone()),
        }
    }

    fn list_pages(&mut self, space_id: &str) -> Result<Vec<Page>, ApiError> {
        self.requests.push(format!("pages {space_id}"));
        if let Some(status) = self.failing_page_lists.get(space_id) {
            return Err(Self::http_error(format!("/spaces/{space_id}/pages"), *status));
        }
        Ok(self.pages.get(space_id).cloned().unwrap_or_default())
    }

    fn get_page_body(&mut self, page_id: &str) -> Result<Option<String>, ApiError> {
        self.requests.push(format!("body {page_id}"));
        if let Some(status) = self.failing_bodies.get(page_id) {
            return Err(Self::http_error(format!("/pages/{page_id}"), *status));
        }
        Ok(self.bodies.get(page_id).cloned())
    }

    fn list_attachments(&mut self, page_id: &str) -> Result<Vec<Attachment>, ApiError> {
        self.requests.push(format!("attachments {page_id}"));
        if let Some(status) = self.failing_attachment_lists.get(page_id) {
            return Err(Self::http_error(
                format!("/pages/{page_id}/attachments"),
                *status,
            ));
        }
        Ok(self.attachments.get(page_id).cloned().unwrap_or_default())
    }

    fn download_attachment(&mut self, download_link: &str) -> Result<Vec<u8>, ApiError> {
        self.requests.push(format!("download {download_link}"));
        self.downloads
            .get(download_link)
            .cloned()
            .ok_or_else(|| Self::http_error(download_link.to_string(), StatusCode::NOT_FOUND))
    }

    fn request_count(&self) -> usize {
        self.requests.len()
    }
}

pub fn space(id: &str, key: &str, name: &str) -> Space {
    Space {
        id: Some(id.to_string()),
        key: Some(key.to_string()),
        name: Some(name.to_string()),
    }
}

pub fn page(id: &str, title: &str) -> Page {
    Page {
        id: Some(id.to_string()),
        title: Some(title.to_string()),
    }
}

pub fn attachment(title: &str, download: &str) -> Attachment {
    Attachment {
        title: Some(title.to_string()),
        links: AttachmentLinks {
            download: Some(download.to_string()),
        },
    }
}

#[derive(Debug, Clone, Copy)]
enum FakeMode {
    Echo,
    Unavailable,
    Failing,
    Silent,
}

/// Converter double; `echo` returns the (already localized) HTML as the Markdown.
pub struct FakeConverter {
    mode: FakeMode,
    inputs: RefCell<Vec<String>>,
}

impl FakeConverter {
    fn with_mode(mode: FakeMode) -> Self {
        Self {
            mode,
            inputs: RefCell::new(Vec::new()),
        }
    }

    pub fn echo() -> Self {
        Self::with_mode(FakeMode::Echo)
    }

    pub fn unavailable() -> Self {
        Self::with_mode(FakeMode::Unavailable)
    }

    pub fn failing() -> Self {
        Self::with_mode(FakeMode::Failing)
    }

    pub fn silent() -> Self {
        Self::with_mode(FakeMode::Silent)
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.borrow().clone()
    }
}

impl MarkdownConverter for FakeConverter {
    fn convert(&self, html: &str) -> ConversionOutcome {
        self.inputs.borrow_mut().push(html.to_string());
        match self.mode {
            FakeMode::Echo => ConversionOutcome::Converted(html.to_string()),
            FakeMode::Unavailable => ConversionOutcome::Unavailable {
                program: "pandoc".to_string(),
            },
            FakeMode::Failing => ConversionOutcome::Failed {
                code: Some(64),
                stderr: "pandoc: unknown reader".to_string(),
            },
            FakeMode::Silent => ConversionOutcome::Converted(String::new()),
        }
    }
}
