//! Error handling foundation for tollgate.
//!
//! This module provides only the `Result` type alias using rootcause.
//! Domain-specific error types live next to the code that raises them,
//! and are wrapped in a `Report` as they propagate to callers.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_type_works() {
        let ok: Result<i32> = Ok(42);
        assert_eq!(ok.expect("should be ok"), 42);
    }
}
