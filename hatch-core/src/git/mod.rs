//! Git operations for egg-hatcher
//!
//! This module owns the upstream mirror, ref listing, and workspace checkouts.

mod checkout;
mod mirror;
mod refs;
mod upstream;

#[cfg(test)]
pub(crate) mod fixture;

pub use checkout::checkout_detached;
pub use mirror::{AdvertisedRef, FetchOutcome, Mirror, RemoteOutcome, ORIGIN, TEMP_PREFIX};
pub use refs::{
    classify, strip_tag_prefixes, BranchEntry, RefKind, RefResolver, RemoteRef, TagEntry,
};
pub use upstream::UpstreamRepo;
