//! # Error Types
//!
//! All fallible operations in the crate return [`ScoreError`].
//!
//! Errors carry enough context (the container being checked, or the barline
//! position in milliseconds) to locate the problem in the score being built.
//!
//! ## Error Types
//! - `InvariantViolation` - a track, bar or block failed its structural checks
//! - `InvalidBarlinePlacement` - barlines that cannot cut the block into bars
//! - `ArgumentRange` - a channel, voice count or duration outside its domain
//! - `PlanError` - an invalid YAML score plan
//! - `Serialization` - bars that could not be written as YAML
//!
//! ## Usage
//! ```rust
//! use scoreblock::{build_bars, ScoreError};
//!
//! let plan = "clefs: [treble]\nblocks: []\n";
//! match build_bars(plan) {
//!     Ok(bars) => println!("{} bars", bars.len()),
//!     Err(ScoreError::InvalidBarlinePlacement { position_ms, message }) => {
//!         eprintln!("Barline at {}ms: {}", position_ms, message);
//!     }
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoreError {
    /// A container's events fail their position, duration, ordering or shape
    /// invariants.
    ///
    /// This always indicates a programming error in the caller or in the
    /// crate itself; the data structure is no longer usable.
    ///
    /// # Example
    /// ```
    /// # use scoreblock::ScoreError;
    /// let err = ScoreError::InvariantViolation {
    ///     context: "track 0".to_string(),
    ///     message: "consecutive rests at index 2".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Invariant violation in track 0: consecutive rests at index 2");
    /// ```
    #[error("Invariant violation in {context}: {message}")]
    InvariantViolation { context: String, message: String },

    /// Barlines that cannot be used to cut a block into bars.
    ///
    /// Occurs when barlines are not strictly ascending, when the final barline
    /// does not match the end of the block, or when a split would place a
    /// continuation into a voice that already holds later events.
    ///
    /// # Example
    /// ```
    /// # use scoreblock::ScoreError;
    /// let err = ScoreError::InvalidBarlinePlacement {
    ///     position_ms: 1200,
    ///     message: "final barline must equal the block duration (1500ms)".to_string(),
    /// };
    /// assert_eq!(
    ///     err.to_string(),
    ///     "Invalid barline at 1200ms: final barline must equal the block duration (1500ms)"
    /// );
    /// ```
    #[error("Invalid barline at {position_ms}ms: {message}")]
    InvalidBarlinePlacement { position_ms: u32, message: String },

    /// Argument outside its domain, rejected before any mutation.
    ///
    /// # Example
    /// ```
    /// # use scoreblock::ScoreError;
    /// let err = ScoreError::ArgumentRange("input voice channel 4 is outside 0..=3".to_string());
    /// assert_eq!(err.to_string(), "Argument out of range: input voice channel 4 is outside 0..=3");
    /// ```
    #[error("Argument out of range: {0}")]
    ArgumentRange(String),

    /// Invalid score plan.
    #[error("Invalid plan: {0}")]
    PlanError(String),

    /// Bars could not be written out.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ScoreError {
    pub(crate) fn invariant(context: impl Into<String>, message: impl Into<String>) -> Self {
        ScoreError::InvariantViolation {
            context: context.into(),
            message: message.into(),
        }
    }

    pub(crate) fn barline(position_ms: u32, message: impl Into<String>) -> Self {
        ScoreError::InvalidBarlinePlacement {
            position_ms,
            message: message.into(),
        }
    }
}
