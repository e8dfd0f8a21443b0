use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::reflect::{Reflect, Shape};
use crate::value::{Opaque, Value};

/// Interface value: holds any reflectable value, or nothing at all.
///
/// A nil `Dynamic` has no type information. Converting one as the root is an
/// `InvalidValue` error; below the root it becomes `Value::Nil`. A non-nil
/// `Dynamic` is transparent: the held value is converted in its place.
#[derive(Default)]
pub struct Dynamic(Option<Box<dyn Reflect>>);

impl Dynamic {
    pub fn nil() -> Self {
        Self(None)
    }

    pub fn new<T: Reflect + 'static>(value: T) -> Self {
        Self(Some(Box::new(value)))
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_none()
    }

    pub fn get(&self) -> Option<&dyn Reflect> {
        self.0.as_deref()
    }
}

impl Reflect for Dynamic {
    fn shape(&self) -> Shape<'_> {
        Shape::Interface(self.get())
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(inner) => write!(f, "Dynamic({})", inner.shape().kind()),
            None => f.write_str("Dynamic(nil)"),
        }
    }
}

/// Nullable shared reference the converter never looks into (a channel
/// end, a callback, a resource). Converts to `Value::Opaque`, sharing the
/// allocation with the input.
pub struct Handle<T>(Option<Arc<T>>);

impl<T: Any + Send + Sync> Handle<T> {
    pub fn new(value: T) -> Self {
        Self(Some(Arc::new(value)))
    }

    pub fn from_arc(value: Arc<T>) -> Self {
        Self(Some(value))
    }

    pub fn nil() -> Self {
        Self(None)
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_none()
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_deref()
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(_) => write!(f, "Handle<{}>", type_name::<T>()),
            None => write!(f, "Handle<{}>(nil)", type_name::<T>()),
        }
    }
}

impl<T: Any + Send + Sync> Reflect for Handle<T> {
    fn shape(&self) -> Shape<'_> {
        let opaque = match &self.0 {
            Some(handle) => Opaque::new(Arc::clone(handle)),
            None => Opaque::nil(type_name::<T>()),
        };
        Shape::Leaf(Value::Opaque(opaque))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn nil_dynamic_is_empty_reference() {
        let value = Dynamic::nil();
        assert!(value.is_nil());
        assert!(value.shape().is_empty_reference());
        assert_eq!(format!("{value:?}"), "Dynamic(nil)");
    }

    #[test]
    fn dynamic_exposes_inner_shape() {
        let value = Dynamic::new(vec![1i32, 2]);
        assert!(!value.shape().is_empty_reference());
        assert_eq!(value.get().map(|v| v.shape().kind()), Some("seq"));
        assert_eq!(format!("{value:?}"), "Dynamic(seq)");
    }

    #[test]
    fn handle_shares_allocation() {
        let (tx, _rx) = mpsc::channel::<i32>();
        let handle = Handle::new(tx);
        let Shape::Leaf(Value::Opaque(first)) = handle.shape() else {
            panic!("expected opaque leaf");
        };
        let Shape::Leaf(Value::Opaque(second)) = handle.clone().shape() else {
            panic!("expected opaque leaf");
        };
        assert_eq!(first, second);
        assert!(!first.is_nil());
    }

    #[test]
    fn nil_handle_is_empty_reference() {
        let handle: Handle<mpsc::Sender<i32>> = Handle::nil();
        assert!(handle.shape().is_empty_reference());
        assert!(handle.get().is_none());
    }
}
