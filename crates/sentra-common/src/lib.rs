//! Shared domain types for the Sentra alerting engine.
//!
//! Everything that crosses a crate boundary lives here: the severity and
//! condition/channel type enums, the `Rule`/`Alert`/`Suppression`/
//! `EscalationPolicy` records, notification history rows, metric samples,
//! and Snowflake ID generation.

pub mod id;
pub mod types;
