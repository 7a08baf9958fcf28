use std::fmt::{self, Display};

///
/// IndexModel
/// Runtime descriptor for one secondary index namespace.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IndexModel {
    /// Namespace prefix of every key in this index.
    pub name: &'static str,
    pub fields: &'static [&'static str],
}

impl IndexModel {
    #[must_use]
    pub const fn new(name: &'static str, fields: &'static [&'static str]) -> Self {
        Self { name, fields }
    }

    #[must_use]
    pub const fn arity(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| *f == field)
    }
}

impl Display for IndexModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.fields.join(", "))
    }
}

///
/// TESTS
///
