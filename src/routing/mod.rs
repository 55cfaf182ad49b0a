//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, raw path)
//!     → decode.rs (strict per-segment percent-decoding)
//!     → router.rs (bucket lookup: method, GET for HEAD, ANY)
//!     → matcher.rs (structural match, parameter capture)
//!     → Return: MatchResult, no-match, or RouteError
//!
//! Route Compilation (at startup):
//!     (method, template, handlers)[]
//!     → Compile templates
//!     → Sort each bucket by specificity (stable)
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in the hot path
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by specificity, then registration)

pub mod decode;
pub mod matcher;
pub mod method;
pub mod params;
pub mod router;

pub use decode::DecodeError;
pub use matcher::{PatternError, PatternOptions, Rank, RoutePattern, Specificity};
pub use method::{Method, UnsupportedMethod};
pub use params::Params;
pub use router::{MatchResult, Route, RouteError, Router, RouterBuilder};
