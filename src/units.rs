//! This module defines the physical quantities used in layout metrics and their conversions.
//!
//! Geometry is handled in plain `f64` metres; these types are used where quantities are summed,
//! compared or reported (capacities, lengths, areas and earthwork volumes).
use serde::{Deserialize, Serialize};

/// Represents a dimensionless quantity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    PartialOrd,
    Default,
    Serialize,
    Deserialize,
    derive_more::Add,
    derive_more::Sub,
)]
pub struct Dimensionless(pub f64);

impl Dimensionless {
    /// Create a new dimensionless value
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// The underlying value
    pub fn value(self) -> f64 {
        self.0
    }
}

macro_rules! unit_struct {
    ($name:ident, $suffix:literal) => {
        /// Represents a type of quantity.
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            PartialOrd,
            Default,
            Serialize,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
        )]
        pub struct $name(pub f64);

        impl $name {
            /// Creates a new instance of the unit type from a f64 value.
            pub fn new(value: f64) -> Self {
                Self(value)
            }

            /// Returns the value of the unit type as a f64.
            pub fn value(self) -> f64 {
                self.0
            }

            /// Whether the underlying value is finite
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            /// The absolute value of the quantity
            pub fn abs(self) -> Self {
                Self(self.0.abs())
            }
        }

        impl std::ops::AddAssign for $name {
            fn add_assign(&mut self, rhs: $name) {
                self.0 += rhs.0;
            }
        }

        impl std::ops::Neg for $name {
            type Output = $name;
            fn neg(self) -> $name {
                $name(-self.0)
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = $name>>(iter: I) -> $name {
                $name(iter.map(|x| x.0).sum())
            }
        }

        impl std::ops::Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Div<$name> for $name {
            type Output = Dimensionless;
            fn div(self, rhs: $name) -> Dimensionless {
                Dimensionless(self.0 / rhs.0)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.2} {}", self.0, $suffix)
            }
        }
    };
}

macro_rules! impl_mul {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Mul<$Rhs> for $Lhs {
            type Output = $Out;
            fn mul(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 * rhs.0)
            }
        }
    };
}

// Base quantities
unit_struct!(Meters, "m");
unit_struct!(Kilowatts, "kW");

// Derived quantities
unit_struct!(SquareMeters, "m²");
unit_struct!(CubicMeters, "m³");

// Multiplication rules
impl_mul!(Meters, Meters, SquareMeters);
impl_mul!(SquareMeters, Meters, CubicMeters);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_from_area_and_depth() {
        let area = Meters::new(4.0) * Meters::new(2.5);
        assert_eq!(area, SquareMeters::new(10.0));
        assert_eq!(area * Meters::new(0.5), CubicMeters::new(5.0));
    }

    #[test]
    fn test_sum_and_ratio() {
        let total: Kilowatts = [100.0, 250.0, 150.0].into_iter().map(Kilowatts).sum();
        assert_eq!(total, Kilowatts(500.0));
        assert_eq!(total / Kilowatts(1000.0), Dimensionless(0.5));
    }

    #[test]
    fn test_display() {
        assert_eq!(CubicMeters(12.345).to_string(), "12.35 m³");
    }
}
