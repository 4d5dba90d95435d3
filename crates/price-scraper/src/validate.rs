//! Sanity gate for scraped prices.

/// Upper bound for any plausible listing price.
pub const MAX_PRICE: f64 = 1_000_000.0;
/// Lowest accepted ratio against a baseline price.
pub const MIN_BASELINE_RATIO: f64 = 0.1;
/// Highest accepted ratio against a baseline price.
pub const MAX_BASELINE_RATIO: f64 = 10.0;

/// Check a scraped price, optionally against a known reference price.
///
/// Rejects non-positive, non-finite and absurdly large prices. With a
/// baseline, prices outside `[0.1, 10]` times the baseline are flagged as
/// suspicious and rejected.
pub fn validate_price(price: f64, baseline: Option<f64>) -> bool {
    if !price.is_finite() || price <= 0.0 || price > MAX_PRICE {
        return false;
    }

    let Some(baseline) = baseline.filter(|b| b.is_finite() && *b > 0.0) else {
        return true;
    };

    let ratio = price / baseline;
    if !(MIN_BASELINE_RATIO..=MAX_BASELINE_RATIO).contains(&ratio) {
        tracing::warn!(price, baseline, ratio, "suspicious price against baseline");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_ratios() {
        assert!(!validate_price(5.0, Some(100.0)));
        assert!(validate_price(95.0, Some(100.0)));
        assert!(!validate_price(1050.0, Some(100.0)));
        assert!(validate_price(10.0, Some(100.0)));
        assert!(validate_price(1000.0, Some(100.0)));
    }

    #[test]
    fn test_absolute_bounds() {
        assert!(!validate_price(-1.0, None));
        assert!(!validate_price(0.0, None));
        assert!(!validate_price(2_000_000.0, None));
        assert!(!validate_price(f64::NAN, None));
        assert!(validate_price(1_000_000.0, None));
        assert!(validate_price(0.5, None));
    }

    #[test]
    fn test_unusable_baseline_is_ignored() {
        assert!(validate_price(50.0, Some(0.0)));
        assert!(validate_price(50.0, Some(f64::NAN)));
    }
}
