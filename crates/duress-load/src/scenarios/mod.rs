//! Concrete scenario conditions

pub mod no_load;
pub mod request_load;

pub use no_load::NoLoad;
pub use request_load::{DEFAULT_PAYLOAD, RequestKind, RequestLoad, RequestLoadConfig};
