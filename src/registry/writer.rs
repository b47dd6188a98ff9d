//! Writer records: configured output destinations

use crate::core::destination::{Destination, RotationThreshold, WriterSpec};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Registry-assigned writer identity, stable across promotion and demotion
pub type WriterId = u64;

/// Who configured a writer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum WriterOwner {
    /// Owned by an explicit writer configuration
    Explicit(String),
    /// Created on demand because a rule referenced an unknown destination
    Implicit,
}

impl WriterOwner {
    pub fn id(&self) -> Option<&str> {
        match self {
            WriterOwner::Explicit(id) => Some(id),
            WriterOwner::Implicit => None,
        }
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self, WriterOwner::Implicit)
    }
}

impl fmt::Display for WriterOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterOwner::Explicit(id) => write!(f, "{}", id),
            WriterOwner::Implicit => write!(f, "<implicit>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Writer {
    pub id: WriterId,
    pub owner: WriterOwner,
    /// Absolute destination, `None` for standard output
    pub path: Option<PathBuf>,
    pub max_files: usize,
    pub rotation: RotationThreshold,
}

impl Writer {
    pub fn destination(&self) -> Destination {
        match &self.path {
            Some(path) => Destination::File(path.clone()),
            None => Destination::Console,
        }
    }

    pub fn spec(&self) -> WriterSpec {
        WriterSpec {
            destination: self.destination(),
            max_files: self.max_files,
            rotation: self.rotation.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_writer_spec() {
        let writer = Writer {
            id: 1,
            owner: WriterOwner::Implicit,
            path: None,
            max_files: 5,
            rotation: RotationThreshold::parse("'.'yyyy-MM-dd"),
        };

        let spec = writer.spec();
        assert_eq!(spec.destination, Destination::Console);
        assert_eq!(spec.max_files, 5);
        assert!(writer.owner.is_implicit());
        assert_eq!(writer.owner.to_string(), "<implicit>");
    }
}
