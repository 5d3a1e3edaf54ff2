pub mod permission;
pub mod store;
