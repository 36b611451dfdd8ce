//! Shared state: Data entries written only through Modifiers, and the
//! subscriber table that routes their changes to components.

pub mod data;
pub mod modifier;
pub mod store;

pub use data::{DataDefinition, DataEntry};
pub use modifier::{ModifierCtx, ModifierDefinition, ModifierFn};
pub use store::{GlobalStore, LookupError};
