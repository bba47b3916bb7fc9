//! Type definitions for sampled verification.

use serde::Serialize;
use std::fmt;

/// Outcome of a sampled verification run.
///
/// Rates are computed over the *requested* sample count, so an early stop
/// for lack of data lowers the match rate rather than shrinking the
/// denominator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyReport {
    /// Samples asked for.
    pub requested: u64,
    /// Samples actually drawn.
    pub sampled: u64,
    /// Samples whose recomputed record matched the stored row.
    pub matched: u64,
    /// `requested - matched`.
    pub mismatched: u64,
    /// Match percentage over `requested`.
    pub match_rate: f64,
    /// Mismatch percentage over `requested`.
    pub mismatch_rate: f64,
    /// The destination ran out of rows before all samples were drawn.
    pub exhausted: bool,
}

impl VerifyReport {
    /// Build a report; a zero request reports zero rates.
    pub fn new(requested: u64, sampled: u64, matched: u64, exhausted: bool) -> Self {
        let mismatched = requested.saturating_sub(matched);
        let rate = |n: u64| {
            if requested == 0 {
                0.0
            } else {
                n as f64 * 100.0 / requested as f64
            }
        };
        Self {
            requested,
            sampled,
            matched,
            mismatched,
            match_rate: rate(matched),
            mismatch_rate: rate(mismatched),
            exhausted,
        }
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Sampled rows:  {}", self.requested)?;
        writeln!(f, "Matched:       {}", self.matched)?;
        writeln!(f, "Mismatched:    {}", self.mismatched)?;
        writeln!(f, "Match rate:    {:.2}", self.match_rate)?;
        write!(f, "Mismatch rate: {:.2}", self.mismatch_rate)?;
        if self.exhausted {
            write!(
                f,
                "\nNot enough data: only {} of {} samples drawn",
                self.sampled, self.requested
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates() {
        let report = VerifyReport::new(4, 4, 3, false);
        assert_eq!(report.mismatched, 1);
        assert_eq!(report.match_rate, 75.0);
        assert_eq!(report.mismatch_rate, 25.0);
        assert!(report.to_string().contains("Match rate:    75.00"));
        assert!(!report.to_string().contains("Not enough data"));
    }

    #[test]
    fn test_zero_samples_does_not_divide() {
        let report = VerifyReport::new(0, 0, 0, false);
        assert_eq!(report.mismatched, 0);
        assert_eq!(report.match_rate, 0.0);
        assert_eq!(report.mismatch_rate, 0.0);
        let text = report.to_string();
        assert!(text.contains("Sampled rows:  0"));
        assert!(text.contains("Mismatch rate: 0.00"));
    }

    #[test]
    fn test_exhausted_rates_use_requested_count() {
        let report = VerifyReport::new(10, 2, 2, true);
        assert_eq!(report.mismatched, 8);
        assert_eq!(report.match_rate, 20.0);
        assert!(report.to_string().contains("only 2 of 10"));
    }
}
