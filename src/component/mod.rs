//! Component orchestration: instances bound to elements, their lifecycle
//! entry points, event binding and the [`Ctx`] handed to user code.

pub mod context;
pub mod events;
pub mod instance;
pub(crate) mod lifecycle;

pub use context::{BoundMethod, Ctx};
pub use instance::{ComponentInstance, EventBinding};
