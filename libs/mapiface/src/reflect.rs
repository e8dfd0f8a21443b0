use std::any::type_name;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::BuildHasher;
use std::rc::Rc;
use std::sync::Arc;

use crate::tag::{self, FieldTag};
use crate::value::Value;

/// Runtime view of a value's structure.
///
/// Implemented for primitives, strings, std containers and pointers,
/// `Value`, `serde_json::Value`, [`Dynamic`](crate::Dynamic) and
/// [`Handle`](crate::Handle). Records get it from `#[derive(Reflect)]`.
pub trait Reflect {
    fn shape(&self) -> Shape<'_>;
}

/// Kind of a node, with borrowed access to its children.
pub enum Shape<'a> {
    /// No type information. Always an error.
    Invalid,
    /// Primitive or opaque leaf, passed through as is.
    Leaf(Value),
    /// Interface value: `None` is an untyped nil.
    Interface(Option<&'a dyn Reflect>),
    Pointer(PointerRef<'a>),
    Seq(SeqRef<'a>),
    Map(MapRef<'a>),
    Record(RecordRef<'a>),
}

impl Shape<'_> {
    /// Nil pointer, sequence, map, interface or opaque handle.
    ///
    /// Zero-valued primitives are never empty references.
    pub fn is_empty_reference(&self) -> bool {
        match self {
            Shape::Interface(None) => true,
            Shape::Interface(Some(inner)) => match inner.shape() {
                nested @ Shape::Interface(_) => nested.is_empty_reference(),
                _ => false,
            },
            Shape::Pointer(ptr) => ptr.is_nil(),
            Shape::Seq(seq) => seq.is_nil(),
            Shape::Map(map) => map.is_nil(),
            Shape::Leaf(Value::Opaque(opaque)) => opaque.is_nil(),
            Shape::Leaf(_) | Shape::Record(_) | Shape::Invalid => false,
        }
    }

    /// Collapse an interface holding another interface into the innermost
    /// one. An interface never wraps an interface, so a nil anywhere in the
    /// chain is an untyped nil.
    pub fn resolve(self) -> Self {
        let mut shape = self;
        while let Shape::Interface(Some(inner)) = shape {
            match inner.shape() {
                nested @ Shape::Interface(_) => shape = nested,
                _ => break,
            }
        }
        shape
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Invalid => "invalid",
            Shape::Leaf(_) => "leaf",
            Shape::Interface(_) => "interface",
            Shape::Pointer(_) => "pointer",
            Shape::Seq(_) => "seq",
            Shape::Map(_) => "map",
            Shape::Record(_) => "record",
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Node views
// ═══════════════════════════════════════════════════════════════

/// Nullable single-owner reference.
pub struct PointerRef<'a> {
    pointee: &'static str,
    target: Option<&'a dyn Reflect>,
}

impl<'a> PointerRef<'a> {
    pub fn new<T: Reflect>(target: Option<&'a T>) -> Self {
        Self {
            pointee: type_name::<T>(),
            target: target.map(|t| t as &dyn Reflect),
        }
    }

    /// Pointer with an explicit pointee type name.
    pub fn raw(pointee: &'static str, target: Option<&'a dyn Reflect>) -> Self {
        Self { pointee, target }
    }

    pub fn pointee(&self) -> &'static str {
        self.pointee
    }

    pub fn target(&self) -> Option<&'a dyn Reflect> {
        self.target
    }

    pub fn is_nil(&self) -> bool {
        self.target.is_none()
    }
}

/// Ordered sequence (array, slice, vector). `None` elements mean a nil
/// sequence, as opposed to an empty one.
pub struct SeqRef<'a> {
    elements: Option<Vec<&'a dyn Reflect>>,
    capacity: usize,
}

impl<'a> SeqRef<'a> {
    pub fn new(elements: Vec<&'a dyn Reflect>) -> Self {
        let capacity = elements.len();
        Self {
            elements: Some(elements),
            capacity,
        }
    }

    pub fn nil() -> Self {
        Self {
            elements: None,
            capacity: 0,
        }
    }

    /// Report a backing capacity. Never below the length.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(self.len());
        self
    }

    pub fn is_nil(&self) -> bool {
        self.elements.is_none()
    }

    pub fn len(&self) -> usize {
        self.elements.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn elements(&self) -> &[&'a dyn Reflect] {
        self.elements.as_deref().unwrap_or_default()
    }

    pub(crate) fn into_elements(self) -> Option<Vec<&'a dyn Reflect>> {
        self.elements
    }
}

/// Keyed map. Keys are leaf values and must be unique.
pub struct MapRef<'a> {
    entries: Option<Vec<(Value, &'a dyn Reflect)>>,
}

impl<'a> MapRef<'a> {
    pub fn new(entries: Vec<(Value, &'a dyn Reflect)>) -> Self {
        Self {
            entries: Some(entries),
        }
    }

    pub fn nil() -> Self {
        Self { entries: None }
    }

    pub fn is_nil(&self) -> bool {
        self.entries.is_none()
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn into_entries(self) -> Option<Vec<(Value, &'a dyn Reflect)>> {
        self.entries
    }
}

/// Record with named fields, described by a static descriptor table.
pub struct RecordRef<'a> {
    type_name: &'static str,
    fields: &'static [Field],
    values: Vec<&'a dyn Reflect>,
}

impl<'a> RecordRef<'a> {
    /// `values` follows the order of `fields`.
    pub fn new(type_name: &'static str, fields: &'static [Field], values: Vec<&'a dyn Reflect>) -> Self {
        debug_assert_eq!(fields.len(), values.len(), "field table mismatch for {type_name}");
        Self {
            type_name,
            fields,
            values,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static Field, &'a dyn Reflect)> + '_ {
        self.fields.iter().zip(self.values.iter().copied())
    }
}

/// Static description of one record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Declared name.
    pub name: &'static str,
    /// Visible outside the defining module (`pub`).
    pub exported: bool,
    /// `(tag key, tag value)` pairs, in declaration order.
    pub tags: &'static [(&'static str, &'static str)],
}

impl Field {
    pub const fn new(
        name: &'static str,
        exported: bool,
        tags: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self {
            name,
            exported,
            tags,
        }
    }

    /// Raw tag value registered under `tag_key`.
    pub fn lookup(&self, tag_key: &str) -> Option<&'static str> {
        tag::lookup(self.tags, tag_key)
    }

    /// Output key and omit-if-empty flag under `tag_key`.
    pub fn tag(&self, tag_key: &str) -> FieldTag<'static> {
        match self.lookup(tag_key) {
            Some(raw) => FieldTag::parse(raw),
            None => FieldTag::untagged(self.name),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Map keys
// ═══════════════════════════════════════════════════════════════

/// Types usable as map keys. Keys stay leaves of their own type.
pub trait MapKey {
    fn to_key(&self) -> Value;
}

impl<T: MapKey + ?Sized> MapKey for &T {
    fn to_key(&self) -> Value {
        (**self).to_key()
    }
}

impl MapKey for str {
    fn to_key(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl MapKey for String {
    fn to_key(&self) -> Value {
        Value::String(self.clone())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Leaves
// ═══════════════════════════════════════════════════════════════

macro_rules! impl_leaf {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn shape(&self) -> Shape<'_> {
                    Shape::Leaf(Value::from(*self))
                }
            }

            impl MapKey for $ty {
                fn to_key(&self) -> Value {
                    Value::from(*self)
                }
            }
        )*
    };
}

impl_leaf!(bool, i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, char);

// Platform-sized integers are widened to 64 bits.
impl Reflect for isize {
    fn shape(&self) -> Shape<'_> {
        Shape::Leaf(Value::I64(*self as i64))
    }
}

impl MapKey for isize {
    fn to_key(&self) -> Value {
        Value::I64(*self as i64)
    }
}

impl Reflect for usize {
    fn shape(&self) -> Shape<'_> {
        Shape::Leaf(Value::U64(*self as u64))
    }
}

impl MapKey for usize {
    fn to_key(&self) -> Value {
        Value::U64(*self as u64)
    }
}

impl Reflect for f32 {
    fn shape(&self) -> Shape<'_> {
        Shape::Leaf(Value::F32(*self))
    }
}

impl Reflect for f64 {
    fn shape(&self) -> Shape<'_> {
        Shape::Leaf(Value::F64(*self))
    }
}

impl Reflect for () {
    fn shape(&self) -> Shape<'_> {
        Shape::Leaf(Value::Unit)
    }
}

impl Reflect for str {
    fn shape(&self) -> Shape<'_> {
        Shape::Leaf(Value::String(self.to_string()))
    }
}

impl Reflect for String {
    fn shape(&self) -> Shape<'_> {
        Shape::Leaf(Value::String(self.clone()))
    }
}

/// Borrows are transparent: `&T` has the shape of `T`.
impl<T: Reflect + ?Sized> Reflect for &T {
    fn shape(&self) -> Shape<'_> {
        (**self).shape()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Pointers
// ═══════════════════════════════════════════════════════════════

/// `None` is a nil pointer.
impl<T: Reflect> Reflect for Option<T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Pointer(PointerRef::new(self.as_ref()))
    }
}

impl<T: Reflect> Reflect for Box<T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Pointer(PointerRef::new(Some(&**self)))
    }
}

impl<T: Reflect> Reflect for Rc<T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Pointer(PointerRef::new(Some(&**self)))
    }
}

impl<T: Reflect> Reflect for Arc<T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Pointer(PointerRef::new(Some(&**self)))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Sequences
// ═══════════════════════════════════════════════════════════════

fn elements<'a, T: Reflect + 'a>(items: impl Iterator<Item = &'a T>) -> Vec<&'a dyn Reflect> {
    items.map(|item| item as &dyn Reflect).collect()
}

impl<T: Reflect> Reflect for Vec<T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Seq(SeqRef::new(elements(self.iter())).with_capacity(self.capacity()))
    }
}

impl<T: Reflect> Reflect for VecDeque<T> {
    fn shape(&self) -> Shape<'_> {
        Shape::Seq(SeqRef::new(elements(self.iter())).with_capacity(self.capacity()))
    }
}

impl<T: Reflect, const N: usize> Reflect for [T; N] {
    fn shape(&self) -> Shape<'_> {
        Shape::Seq(SeqRef::new(elements(self.iter())))
    }
}

impl<T: Reflect> Reflect for [T] {
    fn shape(&self) -> Shape<'_> {
        Shape::Seq(SeqRef::new(elements(self.iter())))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Maps
// ═══════════════════════════════════════════════════════════════

impl<K: MapKey, V: Reflect, S: BuildHasher> Reflect for HashMap<K, V, S> {
    fn shape(&self) -> Shape<'_> {
        Shape::Map(MapRef::new(
            self.iter()
                .map(|(k, v)| (k.to_key(), v as &dyn Reflect))
                .collect(),
        ))
    }
}

impl<K: MapKey, V: Reflect> Reflect for BTreeMap<K, V> {
    fn shape(&self) -> Shape<'_> {
        Shape::Map(MapRef::new(
            self.iter()
                .map(|(k, v)| (k.to_key(), v as &dyn Reflect))
                .collect(),
        ))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Already-generic trees
// ═══════════════════════════════════════════════════════════════

/// Erased values reflect as themselves, so converting one again yields an
/// equal value.
impl Reflect for Value {
    fn shape(&self) -> Shape<'_> {
        match self {
            Value::Nil => Shape::Interface(None),
            Value::Pointer(ptr) => Shape::Pointer(PointerRef::raw(
                ptr.pointee(),
                ptr.target().map(|t| t as &dyn Reflect),
            )),
            Value::Seq(seq) => {
                Shape::Seq(SeqRef::new(elements(seq.iter())).with_capacity(seq.capacity()))
            }
            Value::Map(map) => Shape::Map(MapRef::new(
                map.iter()
                    .map(|(k, v)| (k.clone(), v as &dyn Reflect))
                    .collect(),
            )),
            leaf => Shape::Leaf(leaf.clone()),
        }
    }
}

/// `null` is a nil interface; numbers keep the narrowest of i64/u64/f64.
impl Reflect for serde_json::Value {
    fn shape(&self) -> Shape<'_> {
        match self {
            serde_json::Value::Null => Shape::Interface(None),
            serde_json::Value::Bool(v) => Shape::Leaf(Value::Bool(*v)),
            serde_json::Value::Number(n) => Shape::Leaf(number_to_value(n)),
            serde_json::Value::String(v) => Shape::Leaf(Value::String(v.clone())),
            serde_json::Value::Array(items) => {
                Shape::Seq(SeqRef::new(elements(items.iter())).with_capacity(items.capacity()))
            }
            serde_json::Value::Object(map) => Shape::Map(MapRef::new(
                map.iter()
                    .map(|(k, v)| (Value::String(k.clone()), v as &dyn Reflect))
                    .collect(),
            )),
        }
    }
}

fn number_to_value(n: &serde_json::Number) -> Value {
    if let Some(v) = n.as_i64() {
        Value::I64(v)
    } else if let Some(v) = n.as_u64() {
        Value::U64(v)
    } else {
        Value::F64(n.as_f64().unwrap_or(f64::NAN))
    }
}
