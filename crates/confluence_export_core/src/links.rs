use lol_html::errors::RewritingError;
use lol_html::{RewriteStrSettings, element, rewrite_str};
use tracing::warn;

use crate::filesystem::ATTACHMENTS_DIRNAME;

/// Path fragment that identifies a Confluence attachment download link.
pub const ATTACHMENT_MARKER: &str = "/download/attachments/";

/// Point `img[src]` and `a[href]` attachment links at the page-local `attachments/` directory.
///
/// Only the matching attribute values change; every other byte of the document
/// is emitted as it was received. If the document cannot be rewritten at all,
/// it is returned unchanged.
pub fn localize_attachment_links(html: &str) -> String {
    match rewrite_attachment_links(html) {
        Ok(output) => output,
        Err(error) => {
            warn!(%error, "failed to rewrite attachment links; keeping input unchanged");
            html.to_string()
        }
    }
}

fn rewrite_attachment_links(html: &str) -> Result<String, RewritingError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("img[src]", |el| {
                    if let Some(local) = el.get_attribute("src").as_deref().and_then(local_link) {
                        el.set_attribute("src", &local)?;
                    }
                    Ok(())
                }),
                element!("a[href]", |el| {
                    if let Some(local) = el.get_attribute("href").as_deref().and_then(local_link) {
                        el.set_attribute("href", &local)?;
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::new()
        },
    )
}

/// Local replacement for a link containing the attachment marker anywhere in it.
pub fn local_link(link: &str) -> Option<String> {
    if !link.contains(ATTACHMENT_MARKER) {
        return None;
    }
    Some(format!("{ATTACHMENTS_DIRNAME}/{}", link_basename(link)))
}

/// Final path segment of a link, with the query string removed.
pub fn link_basename(link: &str) -> &str {
    let without_query = link.split('?').next().unwrap_or(link);
    without_query.rsplit('/').next().unwrap_or(without_query)
}
