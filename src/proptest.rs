//! Property-based tests for the scoring engine using proptest.
//!
//! These tests check the invariants every report must satisfy, whatever the
//! input:
//!
//! - Scores stay within [0, 100] in both scan modes
//! - Resolved matches never overlap and are sorted by start
//! - Stripping evidence markers reconstructs the input exactly
//! - Scanning is deterministic
