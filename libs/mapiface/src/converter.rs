use crate::config::Options;
use crate::error::Error;
use crate::reflect::{MapRef, PointerRef, RecordRef, Reflect, SeqRef, Shape};
use crate::value::{Map, Pointer, Value};

/// Stack left free before `visit` moves to a fresh segment.
const RED_ZONE: usize = 64 * 1024;

/// Size of each stack segment allocated on demand.
const STACK_SEGMENT: usize = 1024 * 1024;

/// Shape-erasing converter.
///
/// Walks a value depth-first and rebuilds it from generic containers:
/// records and maps become `Map`, sequences become `Seq`, pointers are kept
/// (nil stays nil), leaves pass through. Options are resolved once, so one
/// converter can serve any number of calls, from any thread.
#[derive(Debug, Clone)]
pub struct Converter {
    options: Options,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl Converter {
    pub fn new(options: Options) -> Self {
        Self {
            options: options.resolved(),
        }
    }

    /// Resolved options in effect.
    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn convert(&self, value: &dyn Reflect) -> Result<Value, Error> {
        match value.shape().resolve() {
            Shape::Interface(None) => {
                tracing::debug!("root value is an untyped nil");
                Err(Error::InvalidValue)
            }
            shape => self.visit(shape, 0),
        }
    }

    fn visit(&self, shape: Shape<'_>, depth: usize) -> Result<Value, Error> {
        let max_depth = self.options.max_depth;
        if depth > max_depth {
            return Err(max_depth_exceeded(depth, max_depth));
        }

        // Valid input up to `max_depth` must not overflow a small thread stack.
        stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, || self.visit_shape(shape, depth))
    }

    #[inline(never)]
    fn visit_shape(&self, shape: Shape<'_>, depth: usize) -> Result<Value, Error> {
        match shape {
            Shape::Invalid => Err(invalid_value(depth)),
            Shape::Leaf(value) => Ok(value),
            Shape::Interface(None) => Ok(Value::Nil),
            // Interfaces are transparent and add no nesting level.
            Shape::Interface(Some(inner)) => self.visit(inner.shape(), depth),
            Shape::Pointer(ptr) => self.visit_pointer(ptr, depth),
            Shape::Seq(seq) => self.visit_seq(seq, depth),
            Shape::Map(map) => self.visit_map(map, depth),
            Shape::Record(record) => self.visit_record(record, depth),
        }
    }

    #[inline(never)]
    fn visit_pointer(&self, ptr: PointerRef<'_>, depth: usize) -> Result<Value, Error> {
        let pointer = match ptr.target() {
            Some(target) => Pointer::new(ptr.pointee(), self.visit(target.shape(), depth + 1)?),
            None => Pointer::nil(ptr.pointee()),
        };
        Ok(Value::Pointer(pointer))
    }

    #[inline(never)]
    fn visit_seq(&self, seq: SeqRef<'_>, depth: usize) -> Result<Value, Error> {
        let capacity = seq.capacity();
        let Some(elements) = seq.into_elements() else {
            return Ok(self.nil_container(|| Value::Seq(Vec::new())));
        };

        let mut out = Vec::with_capacity(capacity);
        for element in elements {
            out.push(self.visit(element.shape(), depth + 1)?);
        }
        Ok(Value::Seq(out))
    }

    #[inline(never)]
    fn visit_map(&self, map: MapRef<'_>, depth: usize) -> Result<Value, Error> {
        let Some(entries) = map.into_entries() else {
            return Ok(self.nil_container(|| Value::Map(Map::new())));
        };

        let mut out = Map::with_capacity(entries.len());
        for (key, value) in entries {
            let value = self.visit(value.shape(), depth + 1)?;
            out.push_unique(key, value);
        }
        Ok(Value::Map(out))
    }

    #[inline(never)]
    fn visit_record(&self, record: RecordRef<'_>, depth: usize) -> Result<Value, Error> {
        let mut out = Map::with_capacity(record.len());
        for (field, value) in record.fields() {
            if !field.exported {
                tracing::trace!(record = record.type_name(), field = field.name, "skip unexported field");
                continue;
            }

            let tag = field.tag(&self.options.tag_key);
            let shape = value.shape();
            if tag.omit_empty && shape.is_empty_reference() {
                tracing::trace!(record = record.type_name(), field = field.name, "omit empty field");
                continue;
            }

            let value = self.visit(shape, depth + 1)?;
            // Duplicate keys: last write wins.
            out.insert(tag.name, value);
        }
        Ok(Value::Map(out))
    }

    fn nil_container(&self, empty: impl FnOnce() -> Value) -> Value {
        if self.options.preserve_nil_containers {
            Value::Nil
        } else {
            empty()
        }
    }
}

#[cold]
#[inline(never)]
fn max_depth_exceeded(depth: usize, max_depth: usize) -> Error {
    tracing::debug!(depth, max_depth, "max depth exceeded");
    Error::MaxDepth(max_depth)
}

#[cold]
#[inline(never)]
fn invalid_value(depth: usize) -> Error {
    tracing::debug!(depth, "invalid value");
    Error::InvalidValue
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;
    use crate::dynamic::Dynamic;
    use crate::reflect::Field;

    /// Hand-written equivalent of a derived record.
    struct Account {
        id: i64,
        name: String,
        nickname: Option<String>,
        secret: String,
    }

    impl Reflect for Account {
        fn shape(&self) -> Shape<'_> {
            const FIELDS: &[Field] = &[
                Field::new("id", true, &[]),
                Field::new("name", true, &[("json", "login"), ("yaml", "user")]),
                Field::new("nickname", true, &[("json", "nick,omitempty")]),
                Field::new("secret", false, &[("json", "secret")]),
            ];
            Shape::Record(RecordRef::new(
                "Account",
                FIELDS,
                vec![
                    &self.id as &dyn Reflect,
                    &self.name,
                    &self.nickname,
                    &self.secret,
                ],
            ))
        }
    }

    fn account() -> Account {
        Account {
            id: 7,
            name: "ann".to_string(),
            nickname: None,
            secret: "hunter2".to_string(),
        }
    }

    struct NilList;

    impl Reflect for NilList {
        fn shape(&self) -> Shape<'_> {
            Shape::Seq(SeqRef::nil())
        }
    }

    struct NilTable;

    impl Reflect for NilTable {
        fn shape(&self) -> Shape<'_> {
            Shape::Map(MapRef::nil())
        }
    }

    struct Broken;

    impl Reflect for Broken {
        fn shape(&self) -> Shape<'_> {
            Shape::Invalid
        }
    }

    fn nested(levels: usize) -> Value {
        (0..levels).fold(Value::I64(1), |inner, _| Value::Seq(vec![inner]))
    }

    #[test]
    fn record_uses_tags_and_skips_private() {
        let out = Converter::default().convert(&account()).unwrap();
        let map = out.as_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(out.get("id"), Some(&Value::I64(7)));
        assert_eq!(out.get("login"), Some(&Value::from("ann")));
        assert!(out.get("name").is_none());
        assert!(out.get("nick").is_none());
        assert!(out.get("secret").is_none());
    }

    #[test]
    fn record_keeps_declaration_order() {
        let mut value = account();
        value.nickname = Some("a".to_string());
        let out = Converter::default().convert(&value).unwrap();
        let keys: Vec<_> = out.as_map().unwrap().keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, ["id", "login", "nick"]);
        assert_eq!(
            out.get("nick"),
            Some(&Value::Pointer(Pointer::new(
                std::any::type_name::<String>(),
                Value::from("a")
            )))
        );
    }

    #[test]
    fn record_with_other_tag_key() {
        let converter = Converter::new(Options::new().with_tag_key("yaml"));
        let out = converter.convert(&account()).unwrap();
        assert_eq!(out.get("user"), Some(&Value::from("ann")));
        // No yaml tag: declared name, and no omission.
        assert_eq!(
            out.get("nickname"),
            Some(&Value::Pointer(Pointer::nil(std::any::type_name::<String>())))
        );
    }

    #[test]
    fn root_nil_is_invalid() {
        let err = Converter::default().convert(&Value::Nil).unwrap_err();
        assert_eq!(err, Error::InvalidValue);
    }

    #[test]
    fn invalid_below_root_propagates() {
        let value = vec![Box::new(Broken)];
        let err = Converter::default().convert(&value).unwrap_err();
        assert_eq!(err, Error::InvalidValue);
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(5)]
    fn depth_bound(#[case] max_depth: usize) {
        let converter = Converter::new(Options::new().with_max_depth(max_depth));

        let exact = nested(max_depth);
        assert_eq!(converter.convert(&exact).unwrap(), exact);

        let err = converter.convert(&nested(max_depth + 1)).unwrap_err();
        assert_eq!(err, Error::MaxDepth(max_depth));
    }

    #[test]
    fn default_depth_is_1024() {
        let converter = Converter::default();
        assert!(converter.convert(&nested(1024)).is_ok());
        assert_eq!(
            converter.convert(&nested(1025)).unwrap_err(),
            Error::MaxDepth(1024)
        );
    }

    #[test]
    fn nested_nil_interface_root_is_invalid() {
        let converter = Converter::default();
        let roots = [
            Dynamic::new(Dynamic::nil()),
            Dynamic::new(Value::Nil),
            Dynamic::new(Dynamic::new(serde_json::Value::Null)),
        ];
        for root in &roots {
            assert_eq!(converter.convert(root).unwrap_err(), Error::InvalidValue);
        }
        assert_eq!(
            converter.convert(&Dynamic::new(Dynamic::new(3i32))).unwrap(),
            Value::I32(3)
        );
    }

    #[test]
    fn nil_containers_become_empty() {
        let converter = Converter::default();
        let seq = converter.convert(&NilList).unwrap();
        assert_eq!(seq, Value::Seq(Vec::new()));
        assert_eq!(seq.as_seq().unwrap().capacity(), 0);
        assert_eq!(converter.convert(&NilTable).unwrap(), Value::Map(Map::new()));
    }

    #[test]
    fn nil_containers_preserved_on_request() {
        let converter = Converter::new(Options::new().with_preserve_nil_containers(true));
        assert_eq!(converter.convert(&NilList).unwrap(), Value::Nil);
        assert_eq!(converter.convert(&NilTable).unwrap(), Value::Nil);
        assert_eq!(converter.convert(&Vec::<i32>::new()).unwrap(), Value::Seq(Vec::new()));
    }

    #[test]
    fn map_keeps_key_type() {
        let mut input = HashMap::new();
        input.insert(1i32, vec!["a"]);
        input.insert(2i32, vec![]);
        let out = Converter::default().convert(&input).unwrap();
        let map = out.as_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&Value::I32(1)), Some(&Value::Seq(vec![Value::from("a")])));
        assert_eq!(map.get(&Value::I32(2)), Some(&Value::Seq(vec![])));
    }

    #[test]
    fn seq_keeps_capacity() {
        let mut input = Vec::with_capacity(16);
        input.extend(["x", "y"]);
        let out = Converter::default().convert(&input).unwrap();
        let seq = out.as_seq().unwrap();
        assert_eq!(seq.len(), 2);
        assert!(seq.capacity() >= input.capacity());
    }

    #[test]
    fn first_failure_aborts_map() {
        let mut input: HashMap<&str, Value> = HashMap::new();
        input.insert("ok", Value::I64(1));
        input.insert("deep", nested(3));
        let converter = Converter::new(Options::new().with_max_depth(2));
        assert_eq!(converter.convert(&input).unwrap_err(), Error::MaxDepth(2));
    }

    #[test]
    fn converter_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Converter>();
        assert_send_sync::<Options>();
    }
}
