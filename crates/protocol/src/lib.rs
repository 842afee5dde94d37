//! Wire types for the relay.
//!
//! This crate contains the serde-serializable shapes exchanged with the two
//! external systems the relay talks to:
//!
//! * the source chat page, queried through DevTools `Runtime.evaluate` calls
//!   whose JSON results deserialize into [`ChatRef`] and [`SourceMessage`]
//! * the target REST bridge, which accepts [`SendMessageRequest`] bodies and
//!   answers with [`SendMessageResponse`]
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * 1:1 with the wire: Field names match what the page and the bridge emit
//! * Stable: Changes only when one of the external contracts changes
//!
//! Orchestration built on top of these types lives in `wsr-core`.

pub mod bridge;
pub mod data_url;
pub mod source;

pub use bridge::*;
pub use data_url::*;
pub use source::*;
