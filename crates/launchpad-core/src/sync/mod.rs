//! Listing synchronization
//!
//! [`VersionReconciler`] is the read-compare-write cycle for one app:
//!
//! 1. fetch the remote version snapshot
//! 2. fingerprint it ([`snapshot_fingerprint`])
//! 3. stop if it matches the stored fingerprint
//! 4. otherwise upsert the version, replace its localizations and mirror the
//!    build selection in one unit of work

pub mod fingerprint;
mod reconciler;

pub use fingerprint::{localization_hash, snapshot_fingerprint};
pub use reconciler::VersionReconciler;
pub(crate) use reconciler::merge_builds;
