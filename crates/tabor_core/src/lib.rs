pub mod core_api;
pub mod discovery;
pub mod layout;
pub mod property;
pub mod reader;
pub mod scan;
