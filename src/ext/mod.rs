/// Extension traits for types the engine works with but does not own.
///
/// Each extension trait lives in its own file named after the type it
/// extends:
/// - `value.rs` - Extensions for `serde_json::Value`, the template value domain
pub mod value;

pub use value::{format_number, number_value, ValueExt};
