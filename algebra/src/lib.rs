/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

#![deny(missing_docs)]

//! Field capabilities for elementwise array arithmetic.
//!
//! A [`Field`] is not a value type; it is a *capability object* that
//! knows how to combine values of some type `T`. Array engines hold
//! a field by reference and call into it whenever two elements need
//! to be added, multiplied or divided, so the same element type can
//! be given different arithmetic (floating point, modular, checked)
//! without wrapping every element.
//!
//! # Quick Start
//!
//! ```rust
//! use algebra::Field;
//! use algebra::RealField;
//!
//! let field = RealField::<f64>::new();
//! assert_eq!(field.add(&1.0, &2.0).unwrap(), 3.0);
//! assert_eq!(field.multiply_by_scalar(&2.0, 1.5).unwrap(), 3.0);
//! assert!(field.divide(&1.0, &0.0).is_err());
//! ```
//!
//! # Core Concepts
//!
//! - **Additive group**: `add` is associative and commutative, with
//!   identity `zero()` and inverse `negate`.
//!
//! - **Multiplicative group**: `multiply` is associative and
//!   commutative on the non-zero elements, with identity `one()`;
//!   `divide(a, b)` is `a * b⁻¹` and fails for `b = 0`.
//!
//! - **Distributivity**: `a * (b + c) == a * b + a * c`.
//!
//! - **Scalar action**: `multiply_by_scalar(a, k)` scales an element
//!   by a real number. For fields that are not vector spaces over the
//!   reals (e.g. [`PrimeField`]) only integral scalars are accepted.
//!
//! Every operation is fallible. Failures are reported as
//! [`FieldError`] and are meant to be propagated unchanged by callers
//! rather than recovered from.
//!
//! # Provided Fields
//!
//! - [`RealField<T>`]: IEEE floating point (`f32`, `f64`) with checked
//!   division and non-finite detection.
//! - [`PrimeField`]: integers modulo a prime, `Z/pZ`.

mod primitives;

pub use primitives::PrimeField;
pub use primitives::RealField;

/// The type of error for field operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum FieldError {
    /// The divisor was the additive identity.
    #[error("division by zero")]
    DivisionByZero,

    /// The value has no multiplicative inverse in this field.
    #[error("{value} has no multiplicative inverse")]
    NotInvertible {
        /// The offending value, rendered for diagnostics.
        value: String,
    },

    /// The operation produced an infinite or NaN result.
    #[error("{op} produced a non-finite result")]
    NonFinite {
        /// The operation that overflowed.
        op: &'static str,
    },

    /// The real scalar cannot be mapped into the field.
    #[error("scalar {scalar} is not representable in this field")]
    ScalarNotRepresentable {
        /// The scalar that was rejected.
        scalar: f64,
    },

    /// The modulus given to a modular field is not prime.
    #[error("modulus {modulus} is not prime")]
    NotPrime {
        /// The rejected modulus.
        modulus: u64,
    },
}

/// A **field** over values of type `T`.
///
/// Laws (not enforced by type system), for all non-failing calls:
///
/// - **Associative**: `(a + b) + c == a + (b + c)`, `(a * b) * c ==
///   a * (b * c)`
/// - **Commutative**: `a + b == b + a`, `a * b == b * a`
/// - **Identity**: `a + zero() == a`, `a * one() == a`
/// - **Inverse**: `a - a == zero()`, `a / a == one()` for `a != zero()`
/// - **Distributive**: `a * (b + c) == a * b + a * c`
///
/// Implementations must be shareable across threads: array engines
/// evaluate elements concurrently and all of them read the same
/// field.
///
/// # Example
///
/// ```rust
/// use algebra::Field;
/// use algebra::FieldError;
///
/// /// Rationals with a fixed denominator of one, i.e. plain `i64`
/// /// arithmetic with exact division only.
/// struct Exact;
///
/// impl Field<i64> for Exact {
///     fn zero(&self) -> i64 {
///         0
///     }
///     fn one(&self) -> i64 {
///         1
///     }
///     fn add(&self, a: &i64, b: &i64) -> Result<i64, FieldError> {
///         Ok(a + b)
///     }
///     fn negate(&self, a: &i64) -> Result<i64, FieldError> {
///         Ok(-a)
///     }
///     fn multiply(&self, a: &i64, b: &i64) -> Result<i64, FieldError> {
///         Ok(a * b)
///     }
///     fn divide(&self, a: &i64, b: &i64) -> Result<i64, FieldError> {
///         match b {
///             0 => Err(FieldError::DivisionByZero),
///             b if a % b != 0 => Err(FieldError::NotInvertible {
///                 value: b.to_string(),
///             }),
///             b => Ok(a / b),
///         }
///     }
///     fn multiply_by_scalar(&self, a: &i64, k: f64) -> Result<i64, FieldError> {
///         Ok(a * k as i64)
///     }
/// }
///
/// assert_eq!(Exact.subtract(&5, &7).unwrap(), -2);
/// assert_eq!(Exact.divide(&6, &3).unwrap(), 2);
/// ```
pub trait Field<T>: Send + Sync + 'static {
    /// The additive identity.
    fn zero(&self) -> T;

    /// The multiplicative identity.
    fn one(&self) -> T;

    /// `a + b`.
    fn add(&self, a: &T, b: &T) -> Result<T, FieldError>;

    /// `-a`.
    fn negate(&self, a: &T) -> Result<T, FieldError>;

    /// `a - b`; defaults to `a + (-b)`.
    fn subtract(&self, a: &T, b: &T) -> Result<T, FieldError> {
        self.add(a, &self.negate(b)?)
    }

    /// `a * b`.
    fn multiply(&self, a: &T, b: &T) -> Result<T, FieldError>;

    /// `a / b`; fails with [`FieldError::DivisionByZero`] when `b` is
    /// the additive identity.
    fn divide(&self, a: &T, b: &T) -> Result<T, FieldError>;

    /// `a * k` for a real scalar `k`.
    fn multiply_by_scalar(&self, a: &T, k: f64) -> Result<T, FieldError>;

    /// Fold an iterator with `add`, starting from `zero()`.
    fn sum<I>(&self, iter: I) -> Result<T, FieldError>
    where
        I: IntoIterator<Item = T>,
        Self: Sized,
    {
        iter.into_iter()
            .try_fold(self.zero(), |acc, x| self.add(&acc, &x))
    }

    /// Fold an iterator with `multiply`, starting from `one()`.
    fn product<I>(&self, iter: I) -> Result<T, FieldError>
    where
        I: IntoIterator<Item = T>,
        Self: Sized,
    {
        iter.into_iter()
            .try_fold(self.one(), |acc, x| self.multiply(&acc, &x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Booleans under XOR / AND: the two-element field GF(2), written
    /// out by hand so the provided methods are tested independently
    /// of the shipped fields.
    struct Gf2;

    impl Field<bool> for Gf2 {
        fn zero(&self) -> bool {
            false
        }
        fn one(&self) -> bool {
            true
        }
        fn add(&self, a: &bool, b: &bool) -> Result<bool, FieldError> {
            Ok(a ^ b)
        }
        fn negate(&self, a: &bool) -> Result<bool, FieldError> {
            Ok(*a)
        }
        fn multiply(&self, a: &bool, b: &bool) -> Result<bool, FieldError> {
            Ok(a & b)
        }
        fn divide(&self, a: &bool, b: &bool) -> Result<bool, FieldError> {
            if *b { Ok(*a) } else { Err(FieldError::DivisionByZero) }
        }
        fn multiply_by_scalar(&self, a: &bool, k: f64) -> Result<bool, FieldError> {
            if k.fract() != 0.0 {
                return Err(FieldError::ScalarNotRepresentable { scalar: k });
            }
            Ok(*a && (k as i64) % 2 != 0)
        }
    }

    #[test]
    fn subtract_defaults_to_add_negate() {
        assert!(!Gf2.subtract(&true, &true).unwrap());
        assert!(Gf2.subtract(&true, &false).unwrap());
    }

    #[test]
    fn sum_and_product_fold_from_identities() {
        assert!(Gf2.sum(vec![true, true, true]).unwrap());
        assert!(!Gf2.sum(Vec::new()).unwrap());
        assert!(Gf2.product(Vec::new()).unwrap());
        assert!(!Gf2.product(vec![true, false]).unwrap());
    }

    #[test]
    fn divide_by_zero_is_an_error() {
        assert_eq!(Gf2.divide(&true, &false), Err(FieldError::DivisionByZero));
    }

    #[test]
    fn errors_render() {
        assert_eq!(FieldError::DivisionByZero.to_string(), "division by zero");
        assert_eq!(
            FieldError::NonFinite { op: "multiply" }.to_string(),
            "multiply produced a non-finite result"
        );
    }
}
