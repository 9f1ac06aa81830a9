//! Slater/LDA exchange potential.

/// Pointwise Slater exchange `-(3 n / pi)^(1/3)`.
///
/// Zero or negative densities clamp to zero exchange rather than
/// producing NaN from the fractional power.
pub fn slater_potential(density: f64) -> f64 {
    if density <= 0.0 {
        return 0.0;
    }
    -(3.0 * density / std::f64::consts::PI).powf(1.0 / 3.0)
}

/// Exchange potential over the whole density field, as the diagonal of the
/// exchange operator.
pub fn exchange_potential(density: &[f64]) -> Vec<f64> {
    density.iter().map(|&n| slater_potential(n)).collect()
}
