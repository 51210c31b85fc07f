//! Paserati runtime core.
//!
//! The value representation, object model, collections, promise state
//! machine, and realm/intrinsic machinery that sit between the bytecode
//! interpreter and the builtin surface. The interpreter itself is an
//! external collaborator; [`context::NativeContext`] is the interface it
//! exposes to native code.

pub mod array_buffer;
pub mod bigint;
pub mod builtin_builder;
pub mod context;
pub mod convert;
pub mod error;
pub mod gc;
pub mod map_data;
pub mod microtask;
pub mod object;
pub mod promise;
pub mod realm;
pub mod regexp;
pub mod shared_buffer;
pub mod string;
pub mod symbol;
pub mod symbol_registry;
pub mod typed_array;
pub mod value;
pub mod weak;

pub use context::{AsyncHost, NativeContext, SettlementJob};
pub use error::{VmError, VmResult};
pub use gc::{GcRef, WeakRef};
pub use realm::{Realm, RealmId, RealmRegistry};
pub use string::JsString;
pub use value::Value;
