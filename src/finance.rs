// src/finance.rs
//
// Pure financial math: DSCR, NPV, and the periodic IRR solve used for the
// terminal fund return. No state, no I/O.

/// Debt service coverage ratio.
///
/// Zero debt service means income covers debt infinitely well; +inf is a
/// legitimate signal here, not an error.
pub fn dscr(noi: f64, debt_service: f64) -> f64 {
    if debt_service == 0.0 {
        f64::INFINITY
    } else {
        noi / debt_service
    }
}

/// Net present value of evenly spaced flows at a periodic rate.
pub fn npv(rate: f64, flows: &[f64]) -> f64 {
    let base = 1.0 + rate;
    flows
        .iter()
        .enumerate()
        .map(|(t, cf)| cf / base.powi(t as i32))
        .sum()
}

fn npv_derivative(rate: f64, flows: &[f64]) -> f64 {
    let base = 1.0 + rate;
    flows
        .iter()
        .enumerate()
        .skip(1)
        .map(|(t, cf)| -(t as f64) * cf / base.powi(t as i32 + 1))
        .sum()
}

/// Solve for the periodic rate making `npv` zero.
///
/// Newton iteration from a fixed starting guess, falling back to a bracketed
/// bisection scan when Newton diverges or leaves the valid domain. Returns
/// `None` when no root can be found (all-positive or all-negative series,
/// or no sign change in the scanned bracket).
pub fn periodic_irr(flows: &[f64]) -> Option<f64> {
    if flows.len() < 2 {
        return None;
    }
    let has_pos = flows.iter().any(|cf| *cf > 0.0);
    let has_neg = flows.iter().any(|cf| *cf < 0.0);
    if !has_pos || !has_neg {
        return None;
    }

    let scale: f64 = flows.iter().map(|cf| cf.abs()).sum::<f64>().max(1.0);
    let tol = 1e-9 * scale;

    // Newton first: fast and almost always sufficient for fund-shaped series.
    let mut rate = 0.1_f64;
    for _ in 0..80 {
        let f = npv(rate, flows);
        if f.abs() < tol {
            return Some(rate);
        }
        let d = npv_derivative(rate, flows);
        if !d.is_finite() || d.abs() < 1e-12 {
            break;
        }
        let next = rate - f / d;
        if !next.is_finite() || next <= -0.9999 || next > 1e6 {
            break;
        }
        if (next - rate).abs() < 1e-13 {
            return Some(next);
        }
        rate = next;
    }

    bisect_irr(flows, tol)
}

/// Bracketed fallback: scan (-0.9999, 10] for a sign change, then bisect.
fn bisect_irr(flows: &[f64], tol: f64) -> Option<f64> {
    const SCAN_STEPS: usize = 400;
    let lo_bound = -0.9999_f64;
    let hi_bound = 10.0_f64;

    let mut lo = lo_bound;
    let mut f_lo = npv(lo, flows);
    let step = (hi_bound - lo_bound) / SCAN_STEPS as f64;

    let mut bracket = None;
    for i in 1..=SCAN_STEPS {
        let hi = lo_bound + step * i as f64;
        let f_hi = npv(hi, flows);
        if f_lo == 0.0 {
            return Some(lo);
        }
        if f_lo.signum() != f_hi.signum() && f_lo.is_finite() && f_hi.is_finite() {
            bracket = Some((lo, hi, f_lo));
            break;
        }
        lo = hi;
        f_lo = f_hi;
    }

    let (mut lo, mut hi, mut f_lo) = bracket?;
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        let f_mid = npv(mid, flows);
        if f_mid.abs() < tol || (hi - lo) < 1e-13 {
            return Some(mid);
        }
        if f_lo.signum() != f_mid.signum() {
            hi = mid;
        } else {
            lo = mid;
            f_lo = f_mid;
        }
    }
    Some(0.5 * (lo + hi))
}

/// Annualize a monthly rate: (1 + r)^12 - 1.
pub fn annualize_periodic(rate: f64) -> f64 {
    (1.0 + rate).powi(12) - 1.0
}

/// Terminal fund return over a sparse signed cash-flow series.
///
/// Solves the periodic rate, annualizes it, floors at -100%. Solver
/// non-convergence degrades to 0.0 so a terminal step can never fail.
pub fn annualized_irr(flows: &[f64]) -> f64 {
    match periodic_irr(flows) {
        Some(rate) => annualize_periodic(rate).max(-1.0),
        None => 0.0,
    }
}
