//! Multi-step listing workflows
//!
//! Both workflows sit on top of [`crate::sync::VersionReconciler`]: every
//! remote mutation is followed by a pull so local state reflects what the
//! store actually accepted.

mod import;
mod submission;

pub use import::*;
pub use submission::*;
