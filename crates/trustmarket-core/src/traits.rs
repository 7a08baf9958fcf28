use crate::{
    error::InternalError,
    model::{entity::EntityModel, index::IndexModel},
    sanitize::Sanitizer,
};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Debug;

///
/// EntityKind
///
/// Everything the generic repository needs to know about one stored kind:
/// its static descriptor, how to read its natural key, and how to project
/// indexed fields as strings.
///

pub trait EntityKind: Clone + Debug + PartialEq + Serialize + DeserializeOwned {
    const MODEL: &'static EntityModel;

    /// Natural identifier of this value.
    fn primary_key(&self) -> &str;

    /// String view of a named field, for index key derivation.
    /// Returns `None` for unknown or non-indexable fields.
    fn field_value(&self, field: &str) -> Option<&str>;

    /// Recover the natural identifier from decoded index fields.
    ///
    /// The default reads the primary-key field out of the index tuple; kinds
    /// whose identifier is derived (not stored in the tuple) override this.
    fn primary_key_from_index(index: &IndexModel, fields: &[String]) -> Option<String> {
        index
            .position(Self::MODEL.primary_key)
            .and_then(|pos| fields.get(pos).cloned())
    }

    /// Validate field contents before any store access.
    fn sanitize(&self, sanitizer: &Sanitizer) -> Result<(), InternalError>;
}
