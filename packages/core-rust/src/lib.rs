//! `funcgate` Core -- structured errors, parameter maps, correlation ids, and
//! validation schemas shared by the gateway and the invocation client.

pub mod error;
pub mod id;
pub mod params;
pub mod validate;

pub use error::{codes, ApplicationError};
pub use id::short_id;
pub use params::Parameters;
pub use validate::{FieldType, ObjectSchema, Validator};
