pub mod common;
pub mod database;
pub mod descriptor;
pub mod user_context;

pub use common::*;
pub use database::*;
pub use descriptor::*;
pub use user_context::*;
