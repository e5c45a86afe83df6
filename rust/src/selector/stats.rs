//! Distribution comparison statistics.

use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::error::{PhyboError, Result};

/// Average ranks (1-based) of `values`, ties sharing the mean rank.
///
/// Also returns the tie correction term `sum(t^3 - t)` over tie groups.
fn average_ranks(values: &[f64]) -> (Vec<f64>, f64) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut ties = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end share ranks start+1..=end
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        let t = (end - start) as f64;
        ties += t * t * t - t;
        start = end;
    }
    (ranks, ties)
}

/// Tie-corrected Kruskal-Wallis H statistic.
///
/// Returns `None` when the test is undefined: fewer than two non-empty groups,
/// or every value identical.
pub fn kruskal_wallis_h(groups: &[&[f64]]) -> Option<f64> {
    let groups: Vec<&[f64]> = groups.iter().copied().filter(|g| !g.is_empty()).collect();
    if groups.len() < 2 {
        return None;
    }

    let pooled: Vec<f64> = groups.iter().flat_map(|g| g.iter().copied()).collect();
    let n = pooled.len() as f64;
    let (ranks, ties) = average_ranks(&pooled);

    let correction = 1.0 - ties / (n * n * n - n);
    if correction <= 0.0 {
        return None;
    }

    let mut offset = 0;
    let mut sum = 0.0;
    for group in &groups {
        let rank_sum: f64 = ranks[offset..offset + group.len()].iter().sum();
        sum += rank_sum * rank_sum / group.len() as f64;
        offset += group.len();
    }

    let h = 12.0 / (n * (n + 1.0)) * sum - 3.0 * (n + 1.0);
    Some((h / correction).max(0.0))
}

/// p-value of the Kruskal-Wallis test; 1.0 for degenerate input.
pub fn kruskal_wallis(groups: &[&[f64]]) -> Result<f64> {
    let h = match kruskal_wallis_h(groups) {
        Some(h) => h,
        None => return Ok(1.0),
    };
    let df = groups.iter().filter(|g| !g.is_empty()).count() - 1;
    let chi2 = ChiSquared::new(df as f64)
        .map_err(|err| PhyboError::algorithm(format!("chi-squared with {} degrees of freedom: {}", df, err)))?;
    Ok((1.0 - chi2.cdf(h)).clamp(0.0, 1.0))
}

pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Negative absolute difference of the means; 0.0 when either side is empty.
pub fn mean_difference(a: &[f64], b: &[f64]) -> f64 {
    match (mean(a), mean(b)) {
        (Some(x), Some(y)) => -(x - y).abs(),
        _ => 0.0,
    }
}
