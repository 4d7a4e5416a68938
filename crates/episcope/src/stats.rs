//! Spearman rank correlation with a two-sided p-value.
//!
//! The coefficient is the Pearson correlation of the average ranks (ties get
//! the mean of the rank run). Significance uses the t-statistic
//! `t = |rho| * sqrt(df / (1 - rho^2))` with `df = n - 2`, evaluated against
//! the Student t CDF via the regularized incomplete beta function.

/// Computes Spearman's rho and its two-sided p-value for two paired series.
///
/// Degenerate inputs (fewer than 2 pairs, mismatched lengths, or zero rank
/// variance) yield `(NaN, 1.0)`. For exactly 2 pairs the t test has zero
/// degrees of freedom and the p-value is 1.0, which is also the smallest
/// attainable exact p for n = 2. A perfect monotonic relation with df >= 1
/// yields p = 0.0; callers encoding p visually must treat p <= 0 explicitly.
pub fn spearman(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    let n = xs.len();
    if n != ys.len() || n < 2 {
        return (f64::NAN, 1.0);
    }

    let rho = pearson(&average_ranks(xs), &average_ranks(ys));
    if !rho.is_finite() {
        return (f64::NAN, 1.0);
    }

    let df = n - 2;
    if df == 0 {
        return (rho, 1.0);
    }

    let denom = 1.0 - rho * rho;
    let p = if denom <= f64::EPSILON {
        0.0
    } else {
        let t = rho.abs() * (df as f64 / denom).sqrt();
        (2.0 * (1.0 - t_distribution_cdf(t, df))).clamp(0.0, 1.0)
    };

    (rho, p)
}

/// Ranks 1..n with ties assigned the average rank of their run.
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; values.len()];
    let mut pos = 0;
    while pos < order.len() {
        // Find the run of equal values starting at pos
        let mut end = pos + 1;
        while end < order.len() && values[order[end]] == values[order[pos]] {
            end += 1;
        }
        let mean_rank = (pos + 1 + end) as f64 / 2.0;
        for &idx in &order[pos..end] {
            ranks[idx] = mean_rank;
        }
        pos = end;
    }
    ranks
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        f64::NAN
    } else {
        (cov / denom).clamp(-1.0, 1.0)
    }
}

fn t_distribution_cdf(t: f64, df: usize) -> f64 {
    // Normal approximation is sufficient beyond ~100 degrees of freedom
    if df > 100 {
        return normal_cdf(t);
    }

    let dff = df as f64;
    let x = dff / (dff + t * t);
    let ibeta = incomplete_beta(dff / 2.0, 0.5, x);

    if t >= 0.0 {
        1.0 - ibeta / 2.0
    } else {
        ibeta / 2.0
    }
}

fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Abramowitz & Stegun 7.1.26 approximation, ~1e-7 absolute error.
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

/// Regularized incomplete beta function I_x(a, b).
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    // Prefactor computed in log space to stay finite for large a, b
    let ln_bt = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let bt = ln_bt.exp();

    // Continued fraction converges fastest on the side below the mean
    if x < (a + 1.0) / (a + b + 2.0) {
        (bt * betacf(a, b, x) / a).clamp(0.0, 1.0)
    } else {
        (1.0 - bt * betacf(b, a, 1.0 - x) / b).clamp(0.0, 1.0)
    }
}

/// Lentz's continued fraction for the incomplete beta function.
fn betacf(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 1e-12;
    const TINY: f64 = 1e-30;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        // Even step
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        // Odd step
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;

        if (del - 1.0).abs() < EPS {
            break;
        }
    }

    h
}

/// Lanczos approximation of ln(Gamma(x)) for x > 0.
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 6] = [
        76.18009172947146,
        -86.50532032941677,
        24.01409824083091,
        -1.231739572450155,
        0.1208650973866179e-2,
        -0.5395239384953e-5,
    ];

    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut ser = 1.000000000190015;
    for (i, &coeff) in COEFFS.iter().enumerate() {
        ser += coeff / (x + 1.0 + i as f64);
    }
    -tmp + (2.5066282746310005 * ser / x).ln()
}
