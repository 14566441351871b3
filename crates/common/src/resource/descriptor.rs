use std::fmt;

use super::path::{decode_segment, encode_segment, validate_segment, SegmentError};
use super::ResourceType;
use crate::identity::is_valid_bucket_id;

const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("Unsupported resource type: {0}")]
    UnsupportedType(String),
    #[error("Url has invalid bucket: {0}")]
    InvalidBucket(String),
    #[error("Url has empty path segment: {0}")]
    EmptySegment(String),
    #[error("Url has malformed percent-encoding: {0}")]
    MalformedEncoding(String),
    #[error("Path segment must not end with a dot: {0}")]
    TrailingDot(String),
    #[error("Path segment contains an illegal character: {0}")]
    IllegalCharacter(String),
}

impl DescriptorError {
    fn from_segment(error: SegmentError, url: &str) -> Self {
        let url = url.to_string();
        match error {
            SegmentError::Empty => DescriptorError::EmptySegment(url),
            SegmentError::MalformedEncoding => DescriptorError::MalformedEncoding(url),
            SegmentError::TrailingDot => DescriptorError::TrailingDot(url),
            SegmentError::IllegalCharacter => DescriptorError::IllegalCharacter(url),
        }
    }
}

/// A parsed and validated resource URL.
///
/// Segments are held decoded. The encoded URL is always rendered from them,
/// so [`url`](Self::url) and [`decoded_url`](Self::decoded_url) name the same
/// path no matter how the caller escaped it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceDescriptor {
    resource_type: ResourceType,
    bucket: String,
    parent_path: Vec<String>,
    /// `None` only for the bucket root folder
    name: Option<String>,
    is_folder: bool,
}

impl ResourceDescriptor {
    /// Parse `<typeGroup>/<bucket>/<percent-encoded segments>[/]`.
    ///
    /// A URL that stops at the bucket denotes the bucket root folder.
    pub fn parse(url: &str) -> Result<Self, DescriptorError> {
        let url = url.strip_prefix(SEPARATOR).unwrap_or(url);
        let (group, rest) = url.split_once(SEPARATOR).unwrap_or((url, ""));
        let resource_type = ResourceType::from_group(group)
            .ok_or_else(|| DescriptorError::UnsupportedType(group.to_string()))?;
        let (bucket, path) = rest.split_once(SEPARATOR).unwrap_or((rest, ""));
        Self::from_parts(resource_type, bucket, path)
            .map_err(|e| Self::with_full_url(e, url))
    }

    /// Build from an already split type and bucket plus the encoded path below it.
    pub fn from_parts(
        resource_type: ResourceType,
        bucket: &str,
        path: &str,
    ) -> Result<Self, DescriptorError> {
        if !is_valid_bucket_id(bucket) {
            return Err(DescriptorError::InvalidBucket(format!(
                "{}/{}/{}",
                resource_type.group(),
                bucket,
                path
            )));
        }

        let is_folder = path.is_empty() || path.ends_with(SEPARATOR);
        let trimmed = path.strip_suffix(SEPARATOR).unwrap_or(path);

        let mut segments = Vec::new();
        if !trimmed.is_empty() {
            for raw in trimmed.split(SEPARATOR) {
                let segment = decode_segment(raw).map_err(|e| DescriptorError::from_segment(e, path))?;
                segments.push(segment);
            }
        }
        let name = segments.pop();

        Ok(Self {
            resource_type,
            bucket: bucket.to_string(),
            parent_path: segments,
            name,
            is_folder,
        })
    }

    /// The root folder of a bucket.
    pub fn bucket_root(resource_type: ResourceType, bucket: &str) -> Result<Self, DescriptorError> {
        Self::from_parts(resource_type, bucket, "")
    }

    // errors raised while parsing a sub-path name the whole URL
    fn with_full_url(error: DescriptorError, url: &str) -> DescriptorError {
        let url = url.to_string();
        match error {
            DescriptorError::InvalidBucket(_) => DescriptorError::InvalidBucket(url),
            DescriptorError::EmptySegment(_) => DescriptorError::EmptySegment(url),
            DescriptorError::MalformedEncoding(_) => DescriptorError::MalformedEncoding(url),
            DescriptorError::TrailingDot(_) => DescriptorError::TrailingDot(url),
            DescriptorError::IllegalCharacter(_) => DescriptorError::IllegalCharacter(url),
            other => other,
        }
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent_path(&self) -> &[String] {
        &self.parent_path
    }

    /// Decoded parent path joined by `/`, `None` at the top level.
    pub fn parent_path_string(&self) -> Option<String> {
        if self.parent_path.is_empty() {
            None
        } else {
            Some(self.parent_path.join("/"))
        }
    }

    pub fn is_folder(&self) -> bool {
        self.is_folder
    }

    pub fn is_root(&self) -> bool {
        self.name.is_none()
    }

    fn segments(&self) -> impl Iterator<Item = &str> {
        self.parent_path
            .iter()
            .map(String::as_str)
            .chain(self.name.as_deref())
    }

    fn render<'a>(&'a self, segment: impl Fn(&'a str) -> String) -> String {
        let mut url = format!("{}/{}/", self.resource_type.group(), self.bucket);
        let path: Vec<String> = self.segments().map(segment).collect();
        url.push_str(&path.join("/"));
        if self.is_folder && !self.is_root() {
            url.push(SEPARATOR);
        }
        url
    }

    /// Percent-encoded URL, safe to hand back to callers.
    pub fn url(&self) -> String {
        self.render(|s| encode_segment(s).into_owned())
    }

    /// Decoded URL, used for every comparison and map lookup.
    pub fn decoded_url(&self) -> String {
        self.render(str::to_string)
    }

    /// Decoded `<bucket>/<segments...>` without the type group.
    pub fn bucket_path(&self) -> String {
        let url = self.decoded_url();
        url.split_once(SEPARATOR)
            .map(|(_, rest)| rest.to_string())
            .unwrap_or(url)
    }

    /// The folder directly containing this resource; `None` for a bucket root.
    pub fn parent(&self) -> Option<Self> {
        self.name.as_ref()?;
        let mut parent_path = self.parent_path.clone();
        let name = parent_path.pop();
        Some(Self {
            resource_type: self.resource_type,
            bucket: self.bucket.clone(),
            parent_path,
            name,
            is_folder: true,
        })
    }

    /// Decoded URL of the containing folder without its trailing separator.
    ///
    /// For a top-level resource this is `<typeGroup>/<bucket>`.
    pub fn parent_folder_url(&self) -> Option<String> {
        self.parent().map(|parent| {
            let url = parent.decoded_url();
            url.trim_end_matches(SEPARATOR).to_string()
        })
    }

    /// A direct child of this folder.
    pub fn child(&self, name: &str, is_folder: bool) -> Result<Self, DescriptorError> {
        validate_segment(name).map_err(|e| DescriptorError::from_segment(e, name))?;
        let mut parent_path = self.parent_path.clone();
        parent_path.extend(self.name.clone());
        Ok(Self {
            resource_type: self.resource_type,
            bucket: self.bucket.clone(),
            parent_path,
            name: Some(name.to_string()),
            is_folder,
        })
    }

    /// An item below this folder given as a decoded, `/`-separated relative path.
    pub fn descendant(&self, relative: &str) -> Result<Self, DescriptorError> {
        let mut descriptor = self.clone();
        for segment in relative.split(SEPARATOR) {
            descriptor = descriptor.child(segment, true)?;
        }
        descriptor.is_folder = false;
        Ok(descriptor)
    }

    /// Whether this resource is `folder` itself or lies anywhere below it.
    pub fn is_within(&self, folder: &ResourceDescriptor) -> bool {
        folder.is_folder && self.decoded_url().starts_with(&folder.decoded_url())
    }

    /// Key of this resource inside the blob store.
    pub fn storage_key(&self) -> String {
        self.decoded_url()
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}
