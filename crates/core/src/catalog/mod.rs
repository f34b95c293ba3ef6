//! Marketplace catalog integration.
//!
//! The data model ([`CandidateRelease`], [`FormatEntry`]) is catalog-agnostic;
//! [`DiscogsClient`] is the concrete implementation, converting the Discogs
//! wire shapes at the boundary and spacing requests with a shared
//! minimum-interval watermark.

mod discogs;
mod types;

pub use discogs::{CollectionEntry, DiscogsClient, DiscogsConfig, DiscogsIdentity};
pub use types::{CandidateRelease, CatalogClient, CatalogError, FormatEntry};
