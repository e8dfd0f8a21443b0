//! Shape erasure for typed value trees.
//!
//! Converts records, maps, sequences and pointers into a tree made only of
//! generic maps, sequences and primitive leaves, ready to hand to any serde
//! format or to inspect dynamically.
//!
//! ```ignore
//! use mapiface::{Dynamic, Reflect};
//!
//! #[derive(Reflect)]
//! struct User {
//!     #[tag(json = "UserID")]
//!     pub user_id: i64,
//!     #[tag(json = "name")]
//!     pub name: String,
//!     #[tag(json = "empty,omitempty")]
//!     pub empty: Dynamic,
//!     secret: String,
//! }
//!
//! let value = mapiface::convert(&user)?;
//! assert_eq!(value.get("name"), Some(&"x".into()));
//! ```

pub mod config;
pub mod converter;
pub mod dynamic;
pub mod error;
pub mod reflect;
pub mod tag;
pub mod value;

pub use config::Options;
pub use converter::Converter;
pub use dynamic::{Dynamic, Handle};
pub use error::Error;
pub use reflect::{Field, MapKey, MapRef, PointerRef, RecordRef, Reflect, SeqRef, Shape};
pub use value::{Map, Opaque, Pointer, Value};

pub use mapiface_derive::Reflect;

/// Convert `value` with default options.
pub fn convert(value: &dyn Reflect) -> Result<Value, Error> {
    convert_with_options(value, Options::default())
}

/// Convert `value`. Unset options fall back to their defaults.
pub fn convert_with_options(value: &dyn Reflect, options: Options) -> Result<Value, Error> {
    Converter::new(options).convert(value)
}
