use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

//--------------------------------------      Points       -----------------------------------------------------------
/// A loyalty point amount, stored as hundredths of a point.
///
/// The accrual service and the public API exchange point amounts as decimal numbers (e.g. `729.98`), so `Points`
/// serializes to and from a JSON number, but all arithmetic and storage happen on the integer representation.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(from = "f64", into = "f64")]
pub struct Points(i64);

impl Add for Points {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Points {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for Points {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Neg for Points {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<i64> for Points {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from_hundredths(self.value() * rhs)
    }
}

impl Sum for Points {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a point amount: {0}")]
pub struct PointsConversionError(String);

impl From<f64> for Points {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            Self((value * 100.0).round() as i64)
        } else {
            Self(0)
        }
    }
}

impl From<Points> for f64 {
    fn from(value: Points) -> Self {
        value.0 as f64 / 100.0
    }
}

impl PartialEq for Points {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Points {}

impl TryFrom<u64> for Points {
    type Error = PointsConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(PointsConversionError(format!("Value {} is too large to convert to Points", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Points {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pts = self.0 as f64 / 100.0;
        write!(f, "{pts:0.2} pts")
    }
}

impl Points {
    pub const ZERO: Points = Points(0);

    /// The raw integer value, in hundredths of a point.
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_hundredths(hundredths: i64) -> Self {
        Self(hundredths)
    }

    pub fn from_whole(points: i64) -> Self {
        Self(points * 100)
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic_on_hundredths() {
        let a = Points::from_whole(50);
        let b = Points::from_hundredths(2_998);
        assert_eq!((a + b).value(), 7_998);
        assert_eq!((a - b).value(), 2_002);
        assert_eq!((-b).value(), -2_998);
        assert!((b - a).is_negative());
    }

    #[test]
    fn serializes_as_decimal_number() {
        let amount = Points::from_hundredths(72_998);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "729.98");
        let back: Points = serde_json::from_str("729.98").unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn deserializes_whole_numbers() {
        let amount: Points = serde_json::from_str("50").unwrap();
        assert_eq!(amount, Points::from_whole(50));
    }

    #[test]
    fn sums_to_zero_on_empty_iterator() {
        let total: Points = std::iter::empty::<Points>().sum();
        assert_eq!(total, Points::ZERO);
    }
}
