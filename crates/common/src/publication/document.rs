use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Invalid JSON document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Document must be a JSON object")]
    NotAnObject,
}

/// An owned JSON object document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    root: Map<String, Value>,
}

impl Document {
    pub fn parse(body: &[u8]) -> Result<Self, DocumentError> {
        match serde_json::from_slice(body)? {
            Value::Object(root) => Ok(Self { root }),
            _ => Err(DocumentError::NotAnObject),
        }
    }

    pub fn root(&mut self) -> Node<'_> {
        Node(&mut self.root)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.root.get(field).and_then(Value::as_str)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(serde_json::to_vec(&self.root)?)
    }
}

/// Mutable view of one object inside a [`Document`].
///
/// Accessors return `None` or nothing when a field is absent or has another
/// type, so callers can walk optional sections without checking shapes.
#[derive(Debug)]
pub struct Node<'a>(&'a mut Map<String, Value>);

impl<'a> Node<'a> {
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn set_str(&mut self, field: &str, value: impl Into<String>) {
        self.0.insert(field.to_string(), Value::String(value.into()));
    }

    /// The object stored at `field`.
    pub fn object(&mut self, field: &str) -> Option<Node<'_>> {
        self.0.get_mut(field).and_then(Value::as_object_mut).map(Node)
    }

    /// Every object element of the array stored at `field`.
    pub fn objects(&mut self, field: &str) -> impl Iterator<Item = Node<'_>> + '_ {
        self.0
            .get_mut(field)
            .and_then(Value::as_array_mut)
            .into_iter()
            .flatten()
            .filter_map(Value::as_object_mut)
            .map(Node)
    }
}
