//! Persistence for committed video records.
//!
//! This crate provides:
//! - [`VideoRepository`] and [`SubscriptionRepository`] interfaces
//! - [`RecordStore`], in memory or persisted to a JSON file with atomic replace
//! - Store operation metrics

pub mod error;
pub mod metrics;
pub mod repository;
pub mod state;
pub mod store;

pub use error::{RecordError, RecordResult};
pub use repository::{LikeOutcome, SubscriptionRepository, VideoRepository};
pub use state::StoreState;
pub use store::RecordStore;
