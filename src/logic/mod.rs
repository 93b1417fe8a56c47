pub mod branch_ops;
pub mod lifecycle;
pub mod registry;
pub mod remote_ops;
pub mod resolve;

pub use lifecycle::*;
pub use registry::*;
pub use remote_ops::*;
pub use resolve::*;
