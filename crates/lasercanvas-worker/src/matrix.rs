use std::fmt;
use std::ops::Mul;

use serde::{Deserialize, Serialize};

/// Ray-transfer (ABCD) matrix `[[a, b], [c, d]]`.
///
/// Serialized as nested row arrays.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 2]; 2]", into = "[[f64; 2]; 2]")]
pub struct Matrix2x2 {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Matrix2x2 {
    pub const IDENTITY: Matrix2x2 = Matrix2x2::new(1.0, 0.0, 0.0, 1.0);

    pub const fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }

    /// Thin element with optical power `c` (a lens or a curved mirror).
    pub const fn thin(c: f64) -> Self {
        Self::new(1.0, 0.0, c, 1.0)
    }

    /// Free-space propagation over `distance`.
    pub const fn propagation(distance: f64) -> Self {
        Self::new(1.0, distance, 0.0, 1.0)
    }

    pub fn trace(&self) -> f64 {
        self.a + self.d
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }
}

impl Default for Matrix2x2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Matrix2x2 {
    type Output = Matrix2x2;

    fn mul(self, rhs: Matrix2x2) -> Matrix2x2 {
        Matrix2x2::new(
            self.a * rhs.a + self.b * rhs.c,
            self.a * rhs.b + self.b * rhs.d,
            self.c * rhs.a + self.d * rhs.c,
            self.c * rhs.b + self.d * rhs.d,
        )
    }
}

impl From<[[f64; 2]; 2]> for Matrix2x2 {
    fn from([[a, b], [c, d]]: [[f64; 2]; 2]) -> Self {
        Self::new(a, b, c, d)
    }
}

impl From<Matrix2x2> for [[f64; 2]; 2] {
    fn from(m: Matrix2x2) -> Self {
        [[m.a, m.b], [m.c, m.d]]
    }
}

impl fmt::Display for Matrix2x2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = f.precision().unwrap_or(4);
        write!(
            f,
            "[[{:.p$}, {:.p$}], [{:.p$}, {:.p$}]]",
            self.a,
            self.b,
            self.c,
            self.d,
            p = precision
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplication_composes_left_to_right() {
        let lens = Matrix2x2::thin(-0.01);
        let space = Matrix2x2::propagation(100.0);
        let system = space * lens;
        assert_eq!(system, Matrix2x2::new(0.0, 100.0, -0.01, 1.0));
        assert_eq!(Matrix2x2::IDENTITY * lens, lens);
        assert_eq!(system.determinant(), 1.0);
        assert_eq!(system.trace(), 1.0);
        assert_eq!(Matrix2x2::IDENTITY.trace(), 2.0);
    }

    #[test]
    fn display_uses_fixed_precision() {
        let m = Matrix2x2::thin(-0.02);
        assert_eq!(m.to_string(), "[[1.0000, 0.0000], [-0.0200, 1.0000]]");
        assert_eq!(format!("{m:.1}"), "[[1.0, 0.0], [-0.0, 1.0]]");
    }
}
