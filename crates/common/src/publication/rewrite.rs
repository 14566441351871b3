use std::collections::HashMap;

use uuid::Uuid;

use super::document::{Document, DocumentError, Node};
use crate::resource::{decode_path, ResourceDescriptor};

/// Prefix attachment URLs carry when they point at metadata rather than content.
pub const METADATA_PREFIX: &str = "metadata/";

/// Decoded source URL to target URL, for one publication.
pub type RewriteMapping = HashMap<String, String>;

/// Point a conversation at its new location and remap its attachments.
///
/// `id` becomes the target's decoded URL and `folderId` its parent folder.
/// Attachment URLs found in the message list, the playback stack and the
/// replay stack are replaced when their decoded form is in `mapping`.
pub fn rewrite_conversation(
    body: &[u8],
    target: &ResourceDescriptor,
    mapping: &RewriteMapping,
) -> Result<Vec<u8>, DocumentError> {
    let mut document = Document::parse(body)?;
    let mut root = document.root();

    let id = target.decoded_url();
    let folder_id = target.parent_folder_url().unwrap_or_else(|| id.clone());
    root.set_str("id", id);
    root.set_str("folderId", folder_id);

    if mapping.is_empty() {
        return document.to_vec();
    }

    rewrite_messages(&mut root, "messages", mapping);
    if let Some(mut playback) = root.object("playback") {
        rewrite_messages(&mut playback, "messagesStack", mapping);
    }
    if let Some(mut replay) = root.object("replay") {
        rewrite_messages(&mut replay, "replayUserMessagesStack", mapping);
    }

    document.to_vec()
}

fn rewrite_messages(node: &mut Node<'_>, field: &str, mapping: &RewriteMapping) {
    for mut message in node.objects(field) {
        let Some(mut content) = message.object("custom_content") else {
            continue;
        };
        for mut attachment in content.objects("attachments") {
            let replacement = attachment
                .get_str("url")
                .and_then(|url| remap_attachment(url, mapping));
            if let Some(replacement) = replacement {
                attachment.set_str("url", replacement);
            }
        }
    }
}

fn remap_attachment(url: &str, mapping: &RewriteMapping) -> Option<String> {
    let (prefix, path) = match url.strip_prefix(METADATA_PREFIX) {
        Some(path) => (METADATA_PREFIX, path),
        None => ("", url),
    };
    mapping
        .get(&decode_path(path))
        .map(|target| format!("{}{}", prefix, target))
}

/// Point an application at its new location.
///
/// `name` becomes the target URL and `reference` a fresh identifier unless
/// `preserve_reference` is set. `icon_url` is remapped through `mapping`.
pub fn rewrite_application(
    body: &[u8],
    target: &ResourceDescriptor,
    mapping: &RewriteMapping,
    preserve_reference: bool,
) -> Result<Vec<u8>, DocumentError> {
    let mut document = Document::parse(body)?;
    let mut root = document.root();

    root.set_str("name", target.url());
    if !preserve_reference {
        root.set_str("reference", Uuid::new_v4().to_string());
    }

    let icon = root
        .get_str("icon_url")
        .and_then(|icon| mapping.get(&decode_path(icon)))
        .cloned();
    if let Some(icon) = icon {
        root.set_str("icon_url", icon);
    }

    document.to_vec()
}
