use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ApiError;

pub const UNTITLED_SPACE: &str = "Untitled_Space";
pub const UNTITLED_PAGE: &str = "Untitled Page";
pub const NO_KEY: &str = "NO_KEY";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Space {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Space {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNTITLED_SPACE)
    }

    pub fn display_key(&self) -> &str {
        self.key.as_deref().unwrap_or(NO_KEY)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Page {
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

impl Page {
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(UNTITLED_PAGE)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "_links")]
    pub links: AttachmentLinks,
}

impl Attachment {
    /// Local file name and download link, when both are present and non-empty.
    pub fn download_target(&self) -> Option<(&str, &str)> {
        let title = self.title.as_deref().filter(|value| !value.is_empty())?;
        let link = self
            .links
            .download
            .as_deref()
            .filter(|value| !value.is_empty())?;
        Some((title, link))
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct AttachmentLinks {
    #[serde(default)]
    pub download: Option<String>,
}

/// `GET /pages/{id}` response, reduced to the storage-format body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageContent {
    #[serde(default)]
    pub body: PageBody,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageBody {
    #[serde(default)]
    pub storage: Option<StorageBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageBody {
    #[serde(default)]
    pub value: Option<String>,
}

impl PageContent {
    pub fn into_storage_html(self) -> Option<String> {
        self.body.storage.and_then(|storage| storage.value)
    }
}

/// Read-only surface of the Confluence v2 API that the export pipeline depends on.
pub trait ConfluenceApi {
    fn list_spaces(&mut self) -> Result<Vec<Space>, ApiError>;
    fn list_pages(&mut self, space_id: &str) -> Result<Vec<Page>, ApiError>;
    /// Storage-format HTML of the current version of a page. `None` when the body is absent.
    fn get_page_body(&mut self, page_id: &str) -> Result<Option<String>, ApiError>;
    fn list_attachments(&mut self, page_id: &str) -> Result<Vec<Attachment>, ApiError>;
    fn download_attachment(&mut self, download_link: &str) -> Result<Vec<u8>, ApiError>;
    fn request_count(&self) -> usize;
}

fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}
