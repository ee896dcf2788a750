//! Small `Object` convenience helpers shared by the builtins.

use rsquickjs::{FromJs, Object, Result};

pub trait ObjectExt<'js> {
    /// Read a property that may legitimately be absent (an options bag
    /// field), as opposed to an access error.
    fn get_optional<K: AsRef<str>, T: FromJs<'js>>(&self, key: K) -> Result<Option<T>>;
}

impl<'js> ObjectExt<'js> for Object<'js> {
    fn get_optional<K: AsRef<str>, T: FromJs<'js>>(&self, key: K) -> Result<Option<T>> {
        if self.contains_key(key.as_ref())? {
            Ok(Some(self.get(key.as_ref())?))
        } else {
            Ok(None)
        }
    }
}
