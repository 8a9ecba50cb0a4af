//! Active study material for a session.

use crate::error::{RagError, RagResult};

/// The material a student is working on.
///
/// Advisory only: it decides whether `ask` runs at all, not which records
/// are searched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialSelection(Option<String>);

impl MaterialSelection {
    pub fn new() -> Self {
        Self(None)
    }

    pub fn with_material(name: impl Into<String>) -> Self {
        let mut selection = Self::new();
        selection.set(name);
        selection
    }

    /// Select a material; a blank name clears the selection.
    pub fn set(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.0 = if name.trim().is_empty() {
            None
        } else {
            Some(name.trim().to_string())
        };
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }

    pub fn active(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// The active material, or `NoActiveMaterial`.
    pub fn require(&self) -> RagResult<&str> {
        self.active().ok_or(RagError::NoActiveMaterial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_lifecycle() {
        let mut selection = MaterialSelection::new();
        assert!(matches!(selection.require(), Err(RagError::NoActiveMaterial)));

        selection.set("arkusz_2023.pdf");
        assert_eq!(selection.require().unwrap(), "arkusz_2023.pdf");

        selection.clear();
        assert_eq!(selection.active(), None);
    }

    #[test]
    fn test_blank_name_clears() {
        let mut selection = MaterialSelection::with_material("a.pdf");
        selection.set("   ");
        assert_eq!(selection.active(), None);
    }
}
