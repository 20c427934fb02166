//! Statistical building blocks shared by the detectors

use crate::utils::{cmp_f64, sort_f64};
use ndarray::{Array2, ArrayView1, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Two-sample Kolmogorov-Smirnov test.
///
/// Returns `(statistic, p_value)` or `None` when either sample is empty.
/// The p-value uses the asymptotic Kolmogorov distribution with the
/// Stephens small-sample correction.
pub fn ks_2samp(a: &[f64], b: &[f64]) -> Option<(f64, f64)> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let mut a_sorted = a.to_vec();
    let mut b_sorted = b.to_vec();
    sort_f64(&mut a_sorted);
    sort_f64(&mut b_sorted);

    let statistic = ks_statistic_sorted(&a_sorted, &b_sorted);

    let n = a.len() as f64;
    let m = b.len() as f64;
    let en = (n * m / (n + m)).sqrt();
    let lambda = (en + 0.12 + 0.11 / en) * statistic;

    Some((statistic, kolmogorov_sf(lambda)))
}

/// Maximum ECDF distance between two sorted samples
fn ks_statistic_sorted(a: &[f64], b: &[f64]) -> f64 {
    let (n, m) = (a.len(), b.len());
    let (mut i, mut j) = (0usize, 0usize);
    let mut d: f64 = 0.0;

    while i < n && j < m {
        let x = if a[i] <= b[j] { a[i] } else { b[j] };
        while i < n && a[i] <= x {
            i += 1;
        }
        while j < m && b[j] <= x {
            j += 1;
        }
        let diff = (i as f64 / n as f64 - j as f64 / m as f64).abs();
        d = d.max(diff);
    }

    d
}

/// Survival function of the Kolmogorov distribution, `P(K > lambda)`
pub fn kolmogorov_sf(lambda: f64) -> f64 {
    if !lambda.is_finite() || lambda <= 0.0 {
        return 1.0;
    }
    // Below this the series is 1 to double precision
    if lambda < 0.2 {
        return 1.0;
    }

    let a2 = -2.0 * lambda * lambda;
    let mut sum = 0.0;
    let mut sign = 1.0;
    let mut prev_term = 0.0;

    for j in 1..=100 {
        let jf = j as f64;
        let term = sign * 2.0 * (a2 * jf * jf).exp();
        sum += term;
        if term.abs() <= 1e-10 * prev_term || term.abs() <= 1e-12 * sum.abs() {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        prev_term = term.abs();
    }

    sum.clamp(0.0, 1.0)
}

/// Equal-width histogram edges over the data range.
///
/// A constant sample spans `[v - 0.5, v + 0.5]`. Returns `n_bins + 1`
/// edges, or `None` for an empty sample.
pub fn histogram_bin_edges(data: &[f64], n_bins: usize) -> Option<Vec<f64>> {
    if data.is_empty() || n_bins == 0 {
        return None;
    }

    let min = data.iter().copied().fold(f64::INFINITY, f64::min);
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (lo, hi) = if max > min { (min, max) } else { (min - 0.5, max + 0.5) };

    let width = (hi - lo) / n_bins as f64;
    let mut edges: Vec<f64> = (0..n_bins).map(|i| lo + i as f64 * width).collect();
    edges.push(hi);
    Some(edges)
}

/// Count values per bin. Bins are half-open except the last, which is
/// closed; values outside the edges are not counted.
pub fn histogram(data: &[f64], edges: &[f64]) -> Vec<usize> {
    let n_bins = edges.len().saturating_sub(1);
    let mut counts = vec![0usize; n_bins];
    if n_bins == 0 {
        return counts;
    }

    let lo = edges[0];
    let hi = edges[n_bins];

    for &v in data {
        if !(v >= lo && v <= hi) {
            continue;
        }
        let bin = if v == hi {
            n_bins - 1
        } else {
            edges.partition_point(|&e| e <= v).saturating_sub(1).min(n_bins - 1)
        };
        counts[bin] += 1;
    }

    counts
}

/// Mean of the RBF kernel `exp(-|x - y|^2 / (2 l^2))` over all row pairs
pub fn rbf_kernel_mean(a: &Array2<f64>, b: &Array2<f64>, length_scale: f64) -> f64 {
    let (na, nb) = (a.nrows(), b.nrows());
    if na == 0 || nb == 0 {
        return 0.0;
    }
    let gamma = 1.0 / (2.0 * length_scale * length_scale);

    let total: f64 = (0..na)
        .into_par_iter()
        .map(|i| {
            let xi = a.row(i);
            b.rows()
                .into_iter()
                .map(|yj| (-gamma * squared_distance(xi, yj)).exp())
                .sum::<f64>()
        })
        .sum();

    total / (na as f64 * nb as f64)
}

fn squared_distance(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
    x.iter().zip(y.iter()).map(|(a, b)| (a - b) * (a - b)).sum()
}

/// Area under the ROC curve via the Mann-Whitney U statistic.
///
/// Labels are 0/1; ties in scores share their average rank. Returns `None`
/// when one class is absent.
pub fn roc_auc(labels: &[f64], scores: &[f64]) -> Option<f64> {
    if labels.len() != scores.len() {
        return None;
    }

    let n_pos = labels.iter().filter(|&&y| y > 0.5).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&i, &j| cmp_f64(&scores[i], &scores[j]));

    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based; the tie group i..=j shares the average rank
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if labels[idx] > 0.5 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos_f = n_pos as f64;
    let u = rank_sum_pos - n_pos_f * (n_pos_f + 1.0) / 2.0;
    Some(u / (n_pos_f * n_neg as f64))
}

/// Seeded row subsample without replacement, keeping original row order
pub fn subsample_rows(x: &Array2<f64>, max_rows: usize, seed: u64) -> Array2<f64> {
    if x.nrows() <= max_rows {
        return x.clone();
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut indices = rand::seq::index::sample(&mut rng, x.nrows(), max_rows).into_vec();
    indices.sort_unstable();
    x.select(Axis(0), &indices)
}
