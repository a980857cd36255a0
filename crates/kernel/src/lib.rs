//! Kernel shared by the bookstore API and gateway: layered settings,
//! the [`Module`] contract and the [`ModuleRegistry`] that drives it.

pub mod module;
pub mod registry;
pub mod settings;

pub use bookstore_db::{DbPool, Migration};
pub use module::{InitCtx, Module};
pub use registry::ModuleRegistry;
