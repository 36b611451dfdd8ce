//! # sepcon
//!
//! A component state-propagation and lifecycle engine for UIs that render to
//! HTML strings.
//!
//! Components declare local, external, referenced and global props. sepcon
//! detects changes to any of them, propagates them through the component
//! tree (references down, descendant notifications up, global data fanned
//! out behind a debounce window) and runs named lifecycle sequences that
//! decide when a component re-renders. Markup is opaque: it is reconciled
//! only at component boundaries.
//!
//! ## Core Systems
//!
//! - **[`scope`]**: Public surface: definitions, tags, driving and inspection
//! - **[`definition`]**: Component definitions and their `extend` chains
//! - **[`state`]**: Per-instance prop and method tables by partition
//! - **[`change`]**: Property-level change sets
//! - **[`sequence`]**: Lifecycle pipelines, phases and the job scheduler
//! - **[`component`]**: Instances bound to elements, event binding, [`Ctx`]
//! - **[`global`]**: Shared Data entries and the Modifiers that write them
//! - **[`registry`]**: The tree of component instances
//! - **[`dom`]**: In-memory document with selector queries and listeners
//! - **[`value`]**: Dotted paths and deep merging over `serde_json` values
//! - **[`logs`]**: Structured diagnostics emitted through `tracing`

// Foundation
pub mod config;
pub mod error;
pub mod logs;
pub mod value;

// Document
pub mod dom;

// State
pub mod change;
pub mod definition;
pub mod global;
pub mod state;

// Engine
pub mod component;
pub mod registry;
pub mod sequence;

// Surface
pub mod scope;
pub mod tag;

// Testing
pub mod testing;

pub use component::Ctx;
pub use config::ScopeConfig;
pub use definition::{ComponentDefinition, Hook, Layer};
pub use error::{Diagnostic, ScopeError};
pub use global::{DataDefinition, ModifierCtx, ModifierDefinition};
pub use scope::{create_scope, ComponentHandle, DataHandle, ModifierHandle, Scope};
pub use sequence::{SequenceName, SequenceOutcome, SequenceStatus};
pub use tag::Tag;
