//! CVAE (cotisation sur la valeur ajoutée des entreprises) estimate.
//!
//! The rate is a piecewise-linear function of revenue; the tax is applied to the
//! value added, then reduced, floored and surcharged in that order.

const MIN_CVAE: f64 = 125.;
const REBATE: f64 = 500.;
const REBATE_CEILING: f64 = 2e6;
const ADDITIONAL_TAX_RATE: f64 = 0.0346;
const MANAGEMENT_FEE_RATE: f64 = 0.01;

/// Applicable rate, in percent of value added, for an annual revenue `ca`.
pub fn compute_ratio(ca: f64) -> f64 {
    if ca < 500e3 {
        0.
    } else if ca < 3e6 {
        0.75 * (ca - 500e3) / 2.5e6
    } else if ca < 10e6 {
        0.25 + 0.45 * (ca - 3e6) / 7e6
    } else if ca < 50e6 {
        0.7 + 0.05 * (ca - 10e6) / 40e6
    } else {
        0.75
    }
}

/// Total amount due for revenue `ca` and value added `va`.
///
/// The rebate is subtracted before the floor is applied, and the surcharge and
/// management fee are computed on the floored amount.
pub fn compute_tax(ca: f64, va: f64) -> f64 {
    let mut cvae = compute_ratio(ca) * va / 100.;
    if ca < REBATE_CEILING {
        cvae -= REBATE;
    }
    if cvae < MIN_CVAE {
        cvae = MIN_CVAE;
    }
    let additional_tax = ADDITIONAL_TAX_RATE * cvae;
    let management_fee = MANAGEMENT_FEE_RATE * (cvae + additional_tax);
    cvae + additional_tax + management_fee
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn surcharged(base: f64) -> f64 {
        let additional = base * 0.0346;
        base + additional + 0.01 * (base + additional)
    }

    #[test]
    fn ratio_is_zero_below_threshold() {
        for ca in [0., 1., 250_000., 499_999.] {
            assert_eq!(compute_ratio(ca), 0.);
        }
    }

    #[test]
    fn ratio_caps_at_top_bracket() {
        for ca in [50e6, 75e6, 1e9] {
            assert_eq!(compute_ratio(ca), 0.75);
        }
    }

    #[test]
    fn ratio_is_continuous_at_breakpoints() {
        assert_eq!(compute_ratio(500_000.), 0.);
        assert!((compute_ratio(3e6) - 0.25).abs() < EPS);
        assert!((compute_ratio(3e6 - 1e-3) - 0.25).abs() < 1e-6);
        assert!((compute_ratio(10e6) - 0.70).abs() < EPS);
        assert!((compute_ratio(10e6 - 1e-3) - 0.70).abs() < 1e-6);
        assert!((compute_ratio(50e6) - 0.75).abs() < EPS);
        assert!((compute_ratio(50e6 - 1e-3) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn ratio_is_non_decreasing() {
        let points = [
            0., 499_999., 500_000., 1e6, 2e6, 2_999_999., 3e6, 5e6, 9_999_999., 10e6, 30e6,
            49_999_999., 50e6, 60e6,
        ];
        for pair in points.windows(2) {
            assert!(compute_ratio(pair[0]) <= compute_ratio(pair[1]), "{pair:?}");
        }
    }

    #[test]
    fn tax_without_activity_is_the_surcharged_minimum() {
        let tax = compute_tax(0., 0.);
        assert!((tax - 130.61825).abs() < EPS, "{tax}");
        assert!((tax - surcharged(125.)).abs() < EPS);
    }

    #[test]
    fn rebate_applies_strictly_below_two_millions() {
        let va = 1e6;

        // 0.45 * 1e6 / 100 = 4500, no rebate at the boundary
        let at_boundary = compute_tax(2e6, va);
        assert!((at_boundary - surcharged(4500.)).abs() < EPS);

        let below = compute_tax(1_999_999., va);
        let base = 0.75 * (1_999_999. - 500e3) / 2.5e6 * va / 100. - 500.;
        assert!((below - surcharged(base)).abs() < EPS);
        assert!(at_boundary - below > 0.);
    }

    #[test]
    fn floor_is_applied_after_rebate() {
        // 0.15 * 300_000 / 100 = 450, minus 500 is negative, floored to 125
        assert!((compute_tax(1e6, 300_000.) - surcharged(125.)).abs() < EPS);
        // 0.15 * 500_000 / 100 = 750, minus 500 = 250
        assert!((compute_tax(1e6, 500_000.) - surcharged(250.)).abs() < EPS);
    }
}
