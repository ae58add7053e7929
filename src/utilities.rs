//! Numerical helpers shared by the group search, temperature selection and
//! scattering angular distributions.

/// Locate the interval of an ascending grid that contains `x_new`.
///
/// Returns the largest `i` with `x[i] <= x_new`, clamped to `[0, x.len() - 2]`
/// so that `(x[i], x[i + 1])` is always a valid interval. Grids with fewer
/// than two points return 0.
pub fn find_interval(x: &[f64], x_new: f64) -> usize {
    if x.len() < 2 || x_new <= x[0] {
        return 0;
    }
    if x_new >= x[x.len() - 1] {
        return x.len() - 2;
    }

    let mut low = 0usize;
    let mut high = x.len() - 1; // invariant: x[low] <= x_new < x[high]
    while high - low > 1 {
        let mid = (low + high) >> 1;
        if x[mid] <= x_new {
            low = mid;
        } else {
            high = mid;
        }
    }
    low
}

/// Evaluate a normalized Legendre expansion at `mu`:
/// `sum_l (2l + 1) / 2 * a_l * P_l(mu)`.
///
/// Uses the Bonnet recurrence so any order is handled without tables.
pub fn legendre_series(coeffs: &[f64], mu: f64) -> f64 {
    let mut value = 0.0;
    let mut p_prev = 1.0; // P_{l-1}
    let mut p_curr = mu; // P_l
    for (l, &a) in coeffs.iter().enumerate() {
        let p_l = match l {
            0 => 1.0,
            1 => mu,
            _ => {
                let lf = l as f64;
                let p_next = ((2.0 * lf - 1.0) * mu * p_curr - (lf - 1.0) * p_prev) / lf;
                p_prev = p_curr;
                p_curr = p_next;
                p_next
            }
        };
        value += 0.5 * (2 * l + 1) as f64 * a * p_l;
    }
    value
}

/// Scale `values` so they sum to one. Returns the original sum; an all-zero
/// slice is left untouched.
pub fn normalize_in_place(values: &mut [f64]) -> f64 {
    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
    sum
}
