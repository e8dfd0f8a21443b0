use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::ser::{Error as _, SerializeMap};
use serde::{Serialize, Serializer};

/// Shape-erased value.
///
/// Built only from generic containers and primitive leaves:
/// - Records and maps → `Map` (records get `String` keys)
/// - Arrays, slices, vectors → `Seq`
/// - Nullable single-owner references → `Pointer` (nil kept as nil)
/// - Everything else → a leaf, passed through unchanged
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Nil interface.
    Nil,
    Unit,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    F32(f32),
    F64(f64),
    Char(char),
    String(String),
    /// Opaque reference (channel, callback, resource handle). Never inspected.
    Opaque(Opaque),
    Pointer(Pointer),
    Seq(Vec<Value>),
    Map(Map),
}

impl Value {
    /// Short kind name, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::I128(_) => "i128",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::U128(_) => "u128",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Opaque(_) => "opaque",
            Value::Pointer(_) => "pointer",
            Value::Seq(_) => "seq",
            Value::Map(_) => "map",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Signed integers up to 64 bits, widened.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I8(v) => Some(i64::from(*v)),
            Value::I16(v) => Some(i64::from(*v)),
            Value::I32(v) => Some(i64::from(*v)),
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Unsigned integers up to 64 bits, widened.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(v) => Some(u64::from(*v)),
            Value::U16(v) => Some(u64::from(*v)),
            Value::U32(v) => Some(u64::from(*v)),
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(v) => Some(f64::from(*v)),
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Seq(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&Pointer> {
        match self {
            Value::Pointer(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&Opaque> {
        match self {
            Value::Opaque(v) => Some(v),
            _ => None,
        }
    }

    /// Look up a string key on a map value (the shape records erase into).
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?.field(key)
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from!(
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    f32 => F32,
    f64 => F64,
    char => Char,
    String => String,
    Opaque => Opaque,
    Pointer => Pointer,
    Vec<Value> => Seq,
    Map => Map,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

// ---------------------------------------------------------------------------
// Map
// ---------------------------------------------------------------------------

/// Generic mapping. Entries keep insertion order, but equality ignores it.
///
/// Keys are leaf values of the source key type (`String` for records).
#[derive(Debug, Clone, Default)]
pub struct Map {
    entries: Vec<(Value, Value)>,
}

impl Map {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert an entry. An existing key keeps its position and gets the new
    /// value; the previous value is returned.
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(std::mem::replace(&mut entry.1, value))
        } else {
            self.entries.push((key, value));
            None
        }
    }

    /// Append without the duplicate check. Callers guarantee `key` is new.
    pub(crate) fn push_unique(&mut self, key: Value, value: Value) {
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Look up a `String` key.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == Some(name))
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        // Keys are unique, so a shared-order prefix pairs up positionally and
        // only the reordered tail needs a lookup.
        let shared = self
            .entries
            .iter()
            .zip(&other.entries)
            .take_while(|(a, b)| a.0 == b.0)
            .count();
        let (head, tail) = self.entries.split_at(shared);
        let (other_head, other_tail) = other.entries.split_at(shared);

        head.iter().zip(other_head).all(|(a, b)| a.1 == b.1)
            && tail.iter().all(|(k, v)| {
                other_tail
                    .iter()
                    .find(|(o, _)| o == k)
                    .is_some_and(|(_, o)| o == v)
            })
    }
}

impl<K, V> FromIterator<(K, V)> for Map
where
    K: Into<Value>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Map::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for Map {
    type Item = (Value, Value);
    type IntoIter = std::vec::IntoIter<(Value, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// ---------------------------------------------------------------------------
// Pointer
// ---------------------------------------------------------------------------

/// Nullable single-owner reference. A nil pointer still remembers the type
/// it would point to.
#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    pointee: &'static str,
    target: Option<Box<Value>>,
}

impl Pointer {
    pub fn nil(pointee: &'static str) -> Self {
        Self {
            pointee,
            target: None,
        }
    }

    pub fn new(pointee: &'static str, target: Value) -> Self {
        Self {
            pointee,
            target: Some(Box::new(target)),
        }
    }

    /// Type name of the pointed-to value.
    pub fn pointee(&self) -> &'static str {
        self.pointee
    }

    pub fn is_nil(&self) -> bool {
        self.target.is_none()
    }

    pub fn target(&self) -> Option<&Value> {
        self.target.as_deref()
    }
}

// ---------------------------------------------------------------------------
// Opaque
// ---------------------------------------------------------------------------

/// Shared handle to a value the converter never looks into.
///
/// Equality is identity: two opaques are equal when they share the same
/// allocation (or are both nil of the same type).
#[derive(Clone)]
pub struct Opaque {
    type_name: &'static str,
    handle: Option<Arc<dyn Any + Send + Sync>>,
}

impl Opaque {
    pub fn nil(type_name: &'static str) -> Self {
        Self {
            type_name,
            handle: None,
        }
    }

    pub fn new<T: Any + Send + Sync>(handle: Arc<T>) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            handle: Some(handle),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is_nil(&self) -> bool {
        self.handle.is_none()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.handle.clone()?.downcast::<T>().ok()
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name
            && match (&self.handle, &other.handle) {
                (None, None) => true,
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                _ => false,
            }
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "Opaque({}, nil)", self.type_name)
        } else {
            write!(f, "Opaque({})", self.type_name)
        }
    }
}

// ---------------------------------------------------------------------------
// Serialize
// ---------------------------------------------------------------------------

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Nil => serializer.serialize_none(),
            Value::Unit => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::I8(v) => serializer.serialize_i8(*v),
            Value::I16(v) => serializer.serialize_i16(*v),
            Value::I32(v) => serializer.serialize_i32(*v),
            Value::I64(v) => serializer.serialize_i64(*v),
            Value::I128(v) => serializer.serialize_i128(*v),
            Value::U8(v) => serializer.serialize_u8(*v),
            Value::U16(v) => serializer.serialize_u16(*v),
            Value::U32(v) => serializer.serialize_u32(*v),
            Value::U64(v) => serializer.serialize_u64(*v),
            Value::U128(v) => serializer.serialize_u128(*v),
            Value::F32(v) => serializer.serialize_f32(*v),
            Value::F64(v) => serializer.serialize_f64(*v),
            Value::Char(v) => serializer.serialize_char(*v),
            Value::String(v) => serializer.serialize_str(v),
            Value::Opaque(v) if v.is_nil() => serializer.serialize_none(),
            Value::Opaque(v) => Err(S::Error::custom(format!(
                "unsupported type: {}",
                v.type_name()
            ))),
            Value::Pointer(p) => match p.target() {
                Some(target) => serializer.serialize_some(target),
                None => serializer.serialize_none(),
            },
            Value::Seq(seq) => serializer.collect_seq(seq),
            Value::Map(map) => {
                let mut state = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    state.serialize_entry(k, v)?;
                }
                state.end()
            }
        }
    }
}
