//! Crash isolation for independent UI regions.
//!
//! A panic inside one region's render or event handler should degrade
//! that region to a fallback value instead of taking the whole process
//! down.

use std::panic::{AssertUnwindSafe, catch_unwind};

/// Run `f`, substituting `fallback()` if it panics. The panic is
/// logged with the region name so the failure stays diagnosable.
pub fn catch_boundary<T>(region: &str, f: impl FnOnce() -> T, fallback: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(region, %message, "region panicked, using fallback");
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panicking_region_degrades_to_fallback() {
        let value = catch_boundary("results", || panic!("render failed"), || 42);
        assert_eq!(value, 42);
    }

    #[test]
    fn healthy_region_passes_through() {
        let value = catch_boundary("results", || 7, || 42);
        assert_eq!(value, 7);
    }
}
