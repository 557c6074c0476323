//! Remote store access for Launchpad
//!
//! This crate owns everything that talks to the store-management API:
//!
//! - **Tokens**: [`apple::TokenIssuer`] signs ES256 bearer tokens from a
//!   tenant's API key and caches them until shortly before expiry.
//! - **Client**: [`apple::AppStoreConnect`] implements [`RemoteStore`] over the
//!   App Store Connect HTTP API (apps, versions, localizations, builds, review
//!   submissions).
//! - **Errors**: remote failures are normalized into [`StoreError`] here; no
//!   transport error shape crosses this crate's boundary.
//!
//! ## Usage
//!
//! ```ignore
//! use launchpad_stores::{RemoteStore, apple::{AppStoreConnect, ConnectConfig, TokenIssuer}};
//!
//! let issuer = TokenIssuer::new("appstoreconnect-v1");
//! let store = AppStoreConnect::new(ConnectConfig::default())?;
//!
//! let token = issuer.token("tenant-1", &credential)?;
//! let snapshot = store.get_version_status(&token, "1234567890").await?;
//! ```

pub mod error;
pub mod traits;
pub mod types;

pub mod apple;

pub use apple::{validate_version_string, BearerToken, TokenIssuer};
pub use error::StoreError;
pub use traits::RemoteStore;
pub use types::*;
