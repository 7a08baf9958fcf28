use crate::model::index::IndexModel;

///
/// EntityModel
/// Static runtime descriptor for one entity kind.
///

#[derive(Debug)]
pub struct EntityModel {
    /// Stable external name; also the namespace of primary records.
    pub entity_name: &'static str,
    /// Field carrying the natural identifier.
    pub primary_key: &'static str,
    /// Secondary index definitions (field order is significant).
    pub indexes: &'static [IndexModel],
}

impl EntityModel {
    #[must_use]
    pub fn index(&self, namespace: &str) -> Option<&'static IndexModel> {
        self.indexes.iter().find(|index| index.name == namespace)
    }
}
