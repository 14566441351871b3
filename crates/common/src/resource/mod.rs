//! Typed references to stored resources.
//!
//! A resource URL has the shape `<typeGroup>/<bucketId>/<segments...>`, with
//! a trailing `/` marking a folder. [`ResourceDescriptor`] is the parsed,
//! validated form; it can render itself back as the percent-encoded URL used
//! on the wire or as the decoded URL used for every internal comparison.

mod descriptor;
mod path;

use serde::{Deserialize, Serialize};

pub use descriptor::{DescriptorError, ResourceDescriptor};
pub use path::{decode_path, encode_segment};

/// Kind of stored resource, one per URL type group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    File,
    Conversation,
    Prompt,
    Application,
}

impl ResourceType {
    pub const ALL: [ResourceType; 4] = [
        ResourceType::File,
        ResourceType::Conversation,
        ResourceType::Prompt,
        ResourceType::Application,
    ];

    /// URL type group, the first segment of every resource URL.
    pub fn group(&self) -> &'static str {
        match self {
            ResourceType::File => "files",
            ResourceType::Conversation => "conversations",
            ResourceType::Prompt => "prompts",
            ResourceType::Application => "applications",
        }
    }

    pub fn from_group(group: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.group() == group)
    }

    /// Structured resources are JSON documents rather than opaque bytes.
    pub fn is_structured(&self) -> bool {
        !matches!(self, ResourceType::File)
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.group())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_round_trip() {
        for resource_type in ResourceType::ALL {
            assert_eq!(ResourceType::from_group(resource_type.group()), Some(resource_type));
        }
        assert_eq!(ResourceType::from_group("settings"), None);
        assert!(!ResourceType::File.is_structured());
        assert!(ResourceType::Application.is_structured());
    }
}
