//! Requirement strings.
//!
//! A requirement containing `(`, `||` or `&&` is a formula for the
//! expression evaluator. Anything else is a simple reference: `id` means
//! "is selected" and `!id` means "is not selected".

/// A classified requirement string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequirementRef<'a> {
    /// The named item must be selected.
    Selected(&'a str),
    /// The named item must not be selected.
    NotSelected(&'a str),
    /// A full expression.
    Formula(&'a str),
}

impl<'a> RequirementRef<'a> {
    /// Classifies a raw requirement string.
    #[must_use]
    pub fn parse(raw: &'a str) -> Self {
        if raw.contains('(') || raw.contains("||") || raw.contains("&&") {
            return Self::Formula(raw);
        }
        let trimmed = raw.trim();
        match trimmed.strip_prefix('!') {
            Some(rest) => Self::NotSelected(rest.trim()),
            None => Self::Selected(trimmed),
        }
    }

    /// The item id a simple reference points at.
    #[must_use]
    pub fn item_id(&self) -> Option<&'a str> {
        match *self {
            Self::Selected(id) | Self::NotSelected(id) => Some(id),
            Self::Formula(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_reference() {
        assert_eq!(RequirementRef::parse(" sword "), RequirementRef::Selected("sword"));
        assert_eq!(RequirementRef::parse("! sword"), RequirementRef::NotSelected("sword"));
    }

    #[test]
    fn test_formula_detection() {
        assert!(matches!(RequirementRef::parse("qty('a') > 1"), RequirementRef::Formula(_)));
        assert!(matches!(RequirementRef::parse("a || b"), RequirementRef::Formula(_)));
        assert!(matches!(RequirementRef::parse("a && b"), RequirementRef::Formula(_)));
        assert_eq!(RequirementRef::parse("a || b").item_id(), None);
    }
}
