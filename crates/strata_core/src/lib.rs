//! Core utilities for strata.
//!
//! - `span`: byte spans and line/column mapping for error locations
//! - `diagnostics`: diagnostic collection used by the parser

pub mod diagnostics;
pub mod span;

pub use diagnostics::{Diagnostic, DiagnosticBag, DiagnosticSeverity, SyntaxError};
pub use span::{LineIndex, Location, Span};
