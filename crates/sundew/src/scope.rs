use crate::value::{Object, Value};

thread_local! {
    static GLOBALS: Object = Object::new();
}

/// Root object used when a binding session is started without one.
/// One per thread, shared by every session on it.
pub fn globals() -> Object {
    GLOBALS.with(Object::clone)
}

/// Evaluation context attached to a bound element.
///
/// A scope is a plain object. Child scopes created with [`Scope::extend`]
/// copy the parent's entries, so later writes to either side are not seen
/// by the other; aggregate values inside remain shared handles.
#[derive(Clone, Debug, Default)]
pub struct Scope(Object);

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_object(object: Object) -> Self {
        Self(object)
    }

    pub fn object(&self) -> &Object {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key, value);
    }

    /// A new scope holding a copy of this one's entries plus `entries`.
    pub fn extend<K: Into<String>>(&self, entries: impl IntoIterator<Item = (K, Value)>) -> Scope {
        let object = Object::from_entries(self.0.snapshot());
        for (key, value) in entries {
            object.insert(key, value);
        }
        Scope(object)
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        self.0.ptr_eq(&other.0)
    }
}
