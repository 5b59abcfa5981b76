pub mod adapter;
pub mod gateway;
pub mod permission;
pub mod postgres;
pub mod sqlite;
pub mod template;
pub mod types;

pub use adapter::{Dialect, DialectAdapter, connect};
pub use gateway::{ExecutionGateway, classify_statement};
pub use permission::{PermissionMode, PermissionStore};
pub use types::*;
