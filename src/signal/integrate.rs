//! Numerical quadrature over closed intervals

/// Simpson's 3/8 rule on a single panel `[a, b]`
pub fn simpson_3_8<F>(f: F, a: f64, b: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    (b - a) / 8.0
        * (f(a) + 3.0 * f((2.0 * a + b) / 3.0) + 3.0 * f((a + 2.0 * b) / 3.0) + f(b))
}

/// Composite trapezoid rule with `n` panels.
///
/// `n == 0` is treated as a single panel.
pub fn trapezoid<F>(f: F, a: f64, b: f64, n: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    let n = n.max(1);
    let h = (b - a) / n as f64;
    let inner: f64 = (1..n).map(|k| f(a + k as f64 * h)).sum();
    h * (f(a) / 2.0 + inner + f(b) / 2.0)
}

/// Composite Simpson's 3/8 rule over `panels` equal sub-intervals
pub fn composite_simpson_3_8<F>(f: F, a: f64, b: f64, panels: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    let panels = panels.max(1);
    let h = (b - a) / panels as f64;
    (0..panels)
        .map(|k| {
            let lo = a + k as f64 * h;
            let hi = if k + 1 == panels { b } else { lo + h };
            simpson_3_8(&f, lo, hi)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simpson_3_8_exact_for_cubics() {
        let f = |x: f64| x * x * x - 2.0 * x + 1.0;
        // ∫_0^2 = 4 - 4 + 2
        assert!((simpson_3_8(f, 0.0, 2.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_trapezoid_converges() {
        let approx = trapezoid(f64::sin, 0.0, std::f64::consts::PI, 1000);
        assert!((approx - 2.0).abs() < 1e-5);
        assert_eq!(trapezoid(|_| 3.0, 1.0, 2.0, 0), 3.0);
    }

    #[test]
    fn test_composite_simpson() {
        let approx = composite_simpson_3_8(f64::sin, 0.0, std::f64::consts::PI, 50);
        assert!((approx - 2.0).abs() < 1e-8);
    }
}
