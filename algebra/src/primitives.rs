/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Concrete fields: RealField, PrimeField.

use std::marker::PhantomData;

use num_traits::Float;
use serde::Deserialize;
use serde::Serialize;

use super::Field;
use super::FieldError;

// RealField<T>: IEEE floating point

/// Floating point arithmetic over `T` (`f32` or `f64`).
///
/// - `divide` by `0.0` (either sign) fails with
///   [`FieldError::DivisionByZero`] instead of producing an infinity.
/// - Any other operation whose result is infinite or NaN from finite
///   inputs fails with [`FieldError::NonFinite`].
///
/// # Example
/// ```
/// use algebra::Field;
/// use algebra::RealField;
///
/// let f = RealField::<f32>::new();
/// assert_eq!(f.multiply(&2.0, &3.0).unwrap(), 6.0);
/// ```
#[derive(Debug, Serialize, Deserialize)]
pub struct RealField<T> {
    #[serde(skip)]
    _marker: PhantomData<fn() -> T>,
}

impl<T> RealField<T> {
    /// Create the field.
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for RealField<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for RealField<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> Copy for RealField<T> {}

fn finite<T: Float>(op: &'static str, inputs: &[T], value: T) -> Result<T, FieldError> {
    if !value.is_finite() && inputs.iter().all(|x| x.is_finite()) {
        return Err(FieldError::NonFinite { op });
    }
    Ok(value)
}

impl<T: Float + Send + Sync + 'static> Field<T> for RealField<T> {
    fn zero(&self) -> T {
        T::zero()
    }

    fn one(&self) -> T {
        T::one()
    }

    fn add(&self, a: &T, b: &T) -> Result<T, FieldError> {
        finite("add", &[*a, *b], *a + *b)
    }

    fn negate(&self, a: &T) -> Result<T, FieldError> {
        Ok(-*a)
    }

    fn subtract(&self, a: &T, b: &T) -> Result<T, FieldError> {
        finite("subtract", &[*a, *b], *a - *b)
    }

    fn multiply(&self, a: &T, b: &T) -> Result<T, FieldError> {
        finite("multiply", &[*a, *b], *a * *b)
    }

    fn divide(&self, a: &T, b: &T) -> Result<T, FieldError> {
        if b.is_zero() {
            return Err(FieldError::DivisionByZero);
        }
        finite("divide", &[*a, *b], *a / *b)
    }

    fn multiply_by_scalar(&self, a: &T, k: f64) -> Result<T, FieldError> {
        let k = T::from(k).ok_or(FieldError::ScalarNotRepresentable { scalar: k })?;
        finite("multiply_by_scalar", &[*a, k], *a * k)
    }
}

// PrimeField: integers modulo p

/// Arithmetic in `Z/pZ` for a prime `p`. Elements are `u64` values in
/// `0..p`; inputs outside that range are reduced first.
///
/// Scalars must be integral (negative scalars are taken modulo `p`);
/// anything else fails with [`FieldError::ScalarNotRepresentable`].
///
/// # Example
/// ```
/// use algebra::Field;
/// use algebra::PrimeField;
///
/// let f = PrimeField::new(7).unwrap();
/// assert_eq!(f.add(&5, &4).unwrap(), 2);
/// assert_eq!(f.divide(&1, &3).unwrap(), 5); // 3 * 5 = 15 = 1 (mod 7)
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct PrimeField {
    modulus: u64,
}

impl TryFrom<u64> for PrimeField {
    type Error = FieldError;

    fn try_from(modulus: u64) -> Result<Self, Self::Error> {
        PrimeField::new(modulus)
    }
}

impl From<PrimeField> for u64 {
    fn from(field: PrimeField) -> Self {
        field.modulus
    }
}

impl PrimeField {
    /// Create the field of integers modulo `modulus`, which must be
    /// prime.
    pub fn new(modulus: u64) -> Result<Self, FieldError> {
        if !is_prime(modulus) {
            return Err(FieldError::NotPrime { modulus });
        }
        Ok(Self { modulus })
    }

    /// The modulus `p`.
    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    fn reduce(&self, a: u64) -> u64 {
        a % self.modulus
    }

    fn mul_mod(&self, a: u64, b: u64) -> u64 {
        mul_mod(a, b, self.modulus)
    }

    /// Multiplicative inverse by Fermat's little theorem: `a^(p-2)`.
    fn inverse(&self, a: u64) -> Result<u64, FieldError> {
        let a = self.reduce(a);
        if a == 0 {
            return Err(FieldError::DivisionByZero);
        }
        Ok(pow_mod(a, self.modulus - 2, self.modulus))
    }
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut acc = 1 % m;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    acc
}

/// Deterministic Miller-Rabin. The first twelve primes as witnesses
/// decide every `u64`.
fn is_prime(n: u64) -> bool {
    const WITNESSES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];
    if n < 2 {
        return false;
    }
    for &p in &WITNESSES {
        if n % p == 0 {
            return n == p;
        }
    }
    let shift = (n - 1).trailing_zeros();
    let d = (n - 1) >> shift;
    'witness: for &a in &WITNESSES {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..shift {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

impl Field<u64> for PrimeField {
    fn zero(&self) -> u64 {
        0
    }

    fn one(&self) -> u64 {
        1 % self.modulus
    }

    fn add(&self, a: &u64, b: &u64) -> Result<u64, FieldError> {
        let sum = self.reduce(*a) as u128 + self.reduce(*b) as u128;
        Ok((sum % self.modulus as u128) as u64)
    }

    fn negate(&self, a: &u64) -> Result<u64, FieldError> {
        Ok((self.modulus - self.reduce(*a)) % self.modulus)
    }

    fn multiply(&self, a: &u64, b: &u64) -> Result<u64, FieldError> {
        Ok(self.mul_mod(*a, *b))
    }

    fn divide(&self, a: &u64, b: &u64) -> Result<u64, FieldError> {
        Ok(self.mul_mod(*a, self.inverse(*b)?))
    }

    fn multiply_by_scalar(&self, a: &u64, k: f64) -> Result<u64, FieldError> {
        if !k.is_finite() || k.fract() != 0.0 {
            return Err(FieldError::ScalarNotRepresentable { scalar: k });
        }
        let k = (k as i128).rem_euclid(self.modulus as i128) as u64;
        Ok(self.mul_mod(*a, k))
    }
}
