mod context;
pub use context::*;

mod device;
pub use device::*;

pub mod certs;
