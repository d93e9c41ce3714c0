/// Round to a fixed number of decimal places for display.
///
/// Non-finite values pass through untouched.
pub fn round_to(v: f64, decimals: u32) -> f64 {
    if !v.is_finite() {
        return v;
    }
    let scale = 10f64.powi(decimals as i32);
    let rounded = (v * scale).round() / scale;
    // Avoid "-0" in rendered results
    if rounded == 0.0 { 0.0 } else { rounded }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn rounding_stays_within_half_ulp_of_scale(v in -1.0e6_f64..1.0e6_f64) {
            let r = round_to(v, 2);
            prop_assert!((r - v).abs() <= 0.005 + 1e-9);
        }
    }
}
