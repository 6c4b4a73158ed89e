//! Compositor Kernel Library
//!
//! Content type composition: which types may be composed together, how
//! composed schemas are validated, and how type definitions are saved,
//! moved and copied. The `compositor` binary is a command-line front end
//! over the in-memory store.

pub mod composition;
pub mod config;
pub mod editor;
pub mod error;
pub mod localization;
pub mod mapping;
pub mod models;
pub mod store;
pub mod validation;

pub use editor::{CompositionChoice, ContentTypeEditor};
pub use error::{KernelError, KernelResult};
pub use store::{ContentTypeStore, InMemoryTypeStore, MoveOutcome, TypeStores};
