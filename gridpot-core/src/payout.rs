//! Payout policy resolver.
//!
//! Pure mapping from (payout structure, period list) to the integer
//! percentage of the pot each period pays. Callers multiply by the pool
//! total and round to dollars.

use crate::types::PayoutStructure;

/// Integer percentage per period index, in period order.
///
/// `standard` splits evenly with the last period absorbing the
/// integer-division remainder so the total is exactly 100. `reverse` keeps
/// its fixed 4-weight table; for sports with fewer periods the weights do
/// not sum to 100 (see the tests), which is a product-level gap carried
/// as-is rather than corrected here.
pub fn percentages_for(structure: PayoutStructure, periods: &[&str]) -> Vec<i64> {
    let n = periods.len();
    if n == 0 {
        return Vec::new();
    }

    match structure {
        PayoutStructure::Standard => {
            let even = 100 / n as i64;
            let mut pcts = vec![even; n];
            pcts[n - 1] = 100 - even * (n as i64 - 1);
            pcts
        }
        PayoutStructure::HeavyFinal => {
            let mut pcts = vec![10; n];
            pcts[n - 1] = 100 - 10 * (n as i64 - 1);
            pcts
        }
        PayoutStructure::HalftimeFinal => {
            let mut pcts = vec![0; n];
            let halftime = (n / 2).saturating_sub(1);
            pcts[halftime] = 25;
            pcts[n - 1] = 75;
            pcts
        }
        PayoutStructure::Reverse => {
            const WEIGHTS: [i64; 4] = [40, 30, 20, 10];
            (0..n)
                .map(|i| {
                    if i < WEIGHTS.len() {
                        WEIGHTS[i]
                    } else {
                        100 / n as i64
                    }
                })
                .collect()
        }
    }
}

/// Dollar payout for one period: round(pool_total * pct / 100).
pub fn payout_amount(pool_total: i64, pct: i64) -> i64 {
    ((pool_total * pct) as f64 / 100.0).round() as i64
}

/// Suggested tip on a payout: round(payout * tip_pct / 100).
pub fn tip_amount(payout: i64, tip_pct: u8) -> i64 {
    ((payout * tip_pct as i64) as f64 / 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUARTERS: [&str; 4] = ["Q1", "Q2", "Q3", "Q4"];
    const PERIODS: [&str; 3] = ["P1", "P2", "P3"];
    const HALVES: [&str; 2] = ["H1", "H2"];

    #[test]
    fn test_standard_even_split() {
        assert_eq!(
            percentages_for(PayoutStructure::Standard, &QUARTERS),
            vec![25, 25, 25, 25]
        );
    }

    #[test]
    fn test_standard_last_period_absorbs_remainder() {
        let pcts = percentages_for(PayoutStructure::Standard, &PERIODS);
        assert_eq!(pcts, vec![33, 33, 34]);
        assert_eq!(pcts.iter().sum::<i64>(), 100);
    }

    #[test]
    fn test_heavy_final() {
        assert_eq!(
            percentages_for(PayoutStructure::HeavyFinal, &QUARTERS),
            vec![10, 10, 10, 70]
        );
    }

    #[test]
    fn test_halftime_final() {
        assert_eq!(
            percentages_for(PayoutStructure::HalftimeFinal, &QUARTERS),
            vec![0, 25, 0, 75]
        );
    }

    #[test]
    fn test_reverse_four_periods() {
        assert_eq!(
            percentages_for(PayoutStructure::Reverse, &QUARTERS),
            vec![40, 30, 20, 10]
        );
    }

    #[test]
    fn test_reverse_short_sport_keeps_fixed_table() {
        // Known gap: the fixed table only sums to 100 for 4 periods.
        let pcts = percentages_for(PayoutStructure::Reverse, &HALVES);
        assert_eq!(pcts, vec![40, 30]);
        assert_eq!(pcts.iter().sum::<i64>(), 70);
    }

    #[test]
    fn test_reverse_long_sport_falls_back_to_even_split() {
        let periods = ["1", "2", "3", "4", "5"];
        let pcts = percentages_for(PayoutStructure::Reverse, &periods);
        assert_eq!(pcts, vec![40, 30, 20, 10, 20]);
    }

    #[test]
    fn test_payout_rounding() {
        // $5 denomination pool: total 500; 33% -> 165
        assert_eq!(payout_amount(500, 33), 165);
        // 25% of 250 -> 62.5 rounds to 63
        assert_eq!(payout_amount(250, 25), 63);
    }

    #[test]
    fn test_tip_rounding() {
        assert_eq!(tip_amount(165, 10), 17);
        assert_eq!(tip_amount(0, 10), 0);
    }
}
