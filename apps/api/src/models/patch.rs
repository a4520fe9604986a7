use serde::{Deserialize, Deserializer};

/// Tri-state field for PATCH bodies.
///
/// - `Unset`: the key was absent, leave the stored value alone.
/// - `Clear`: the key was `null` (or carried a blank value), remove the stored value.
/// - `Value`: replace the stored value wholesale.
///
/// Fields of this type must carry `#[serde(default)]` so that an absent key
/// maps to `Unset`; serde only calls `deserialize` for keys that are present.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Patch<T> {
    #[default]
    Unset,
    Clear,
    Value(T),
}

impl<T> Patch<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Patch::Unset)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Patch::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Turns `Value(v)` into `Clear` when `is_blank(&v)` holds.
    pub fn clear_if(self, is_blank: impl FnOnce(&T) -> bool) -> Self {
        match self {
            Patch::Value(v) if is_blank(&v) => Patch::Clear,
            other => other,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Patch<U> {
        match self {
            Patch::Unset => Patch::Unset,
            Patch::Clear => Patch::Clear,
            Patch::Value(v) => Patch::Value(f(v)),
        }
    }
}

impl<T: Blank> Patch<T> {
    /// Applies the type's emptiness predicate: a present-but-blank value clears.
    pub fn normalized(self) -> Self {
        self.clear_if(Blank::is_blank)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Patch::Value(v),
            None => Patch::Clear,
        })
    }
}

/// Emptiness predicate deciding clear-vs-set during partial update.
pub trait Blank {
    fn is_blank(&self) -> bool;
}

impl<T> Blank for Vec<T> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}
