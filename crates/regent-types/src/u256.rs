use crate::error::TypesError;
use std::fmt;
use std::ops::{Add, Div, Mul, Rem, Sub};
use std::str::FromStr;

/// 256-bit unsigned integer for token amounts and price arithmetic.
///
/// Stored as 4 x u64 in little-endian limb order. The auction price curve
/// raises second counts to the eighth power, which overflows u128 but fits
/// comfortably here, so all settlement math stays exact.
///
/// Engine code uses the `checked_*` methods and converts overflow into a
/// typed error; the operator impls panic on overflow rather than clamp,
/// since a silently saturated balance is an accounting bug.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct U256([u64; 4]); // [low, mid_low, mid_high, high] little-endian limbs

impl PartialOrd for U256 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for U256 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        for i in (0..4).rev() {
            match self.0[i].cmp(&other.0[i]) {
                std::cmp::Ordering::Equal => continue,
                ord => return ord,
            }
        }
        std::cmp::Ordering::Equal
    }
}

impl U256 {
    pub const ZERO: Self = Self([0, 0, 0, 0]);
    pub const ONE: Self = Self([1, 0, 0, 0]);
    pub const MAX: Self = Self([u64::MAX, u64::MAX, u64::MAX, u64::MAX]);

    /// Smallest-unit scale of one whole token (10^18)
    pub const COIN: Self = Self([1_000_000_000_000_000_000, 0, 0, 0]);

    pub const fn from_limbs(limbs: [u64; 4]) -> Self {
        Self(limbs)
    }

    pub const fn as_limbs(&self) -> &[u64; 4] {
        &self.0
    }

    /// Create from a u64 value
    pub const fn from_u64(val: u64) -> Self {
        Self([val, 0, 0, 0])
    }

    /// Create from a u128 value
    pub const fn from_u128(val: u128) -> Self {
        let low = val as u64;
        let high = (val >> 64) as u64;
        Self([low, high, 0, 0])
    }

    /// Checked addition
    pub fn checked_add(&self, rhs: &Self) -> Option<Self> {
        let mut result = [0u64; 4];
        let mut carry = 0u64;

        for i in 0..4 {
            let (sum1, overflow1) = self.0[i].overflowing_add(rhs.0[i]);
            let (sum2, overflow2) = sum1.overflowing_add(carry);
            result[i] = sum2;
            carry = (overflow1 as u64) + (overflow2 as u64);
        }

        if carry != 0 {
            None
        } else {
            Some(Self(result))
        }
    }

    /// Checked subtraction
    pub fn checked_sub(&self, rhs: &Self) -> Option<Self> {
        if self < rhs {
            return None;
        }
        Some(self.wrapping_sub(rhs))
    }

    fn wrapping_sub(&self, rhs: &Self) -> Self {
        let mut result = [0u64; 4];
        let mut borrow = 0u64;

        for i in 0..4 {
            let (diff1, underflow1) = self.0[i].overflowing_sub(rhs.0[i]);
            let (diff2, underflow2) = diff1.overflowing_sub(borrow);
            result[i] = diff2;
            borrow = (underflow1 as u64) | (underflow2 as u64);
        }

        Self(result)
    }

    /// Checked multiplication
    pub fn checked_mul(&self, rhs: &Self) -> Option<Self> {
        // Schoolbook multiplication into a 512-bit scratch; any weight
        // landing in the upper half is an overflow.
        let mut wide = [0u64; 8];

        for i in 0..4 {
            if self.0[i] == 0 {
                continue;
            }
            let mut carry: u128 = 0;
            for j in 0..4 {
                let sum = (self.0[i] as u128) * (rhs.0[j] as u128)
                    + wide[i + j] as u128
                    + carry;
                wide[i + j] = sum as u64;
                carry = sum >> 64;
            }
            wide[i + 4] = carry as u64;
        }

        if wide[4..].iter().any(|&limb| limb != 0) {
            return None;
        }

        Some(Self([wide[0], wide[1], wide[2], wide[3]]))
    }

    /// Checked floor division
    pub fn checked_div(&self, rhs: &Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        if self.is_zero() {
            return Some(Self::ZERO);
        }
        if rhs == &Self::ONE {
            return Some(*self);
        }

        // Binary long division, scanning from the dividend's top bit.
        // The remainder register conceptually holds 257 bits; `carried`
        // stands in for the bit a shift pushes past limb 3.
        let mut quotient = Self::ZERO;
        let mut remainder = Self::ZERO;

        for i in (0..self.bit_len()).rev() {
            let carried = remainder.bit(255);
            remainder = remainder.shl_one();
            if self.bit(i) {
                remainder.0[0] |= 1;
            }

            if carried || remainder >= *rhs {
                remainder = remainder.wrapping_sub(rhs);
                quotient.set_bit(i);
            }
        }

        Some(quotient)
    }

    /// Checked remainder
    pub fn checked_rem(&self, rhs: &Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }

        let div = self.checked_div(rhs)?;
        let mul = div.checked_mul(rhs)?;
        self.checked_sub(&mul)
    }

    /// Checked exponentiation by squaring
    pub fn checked_pow(&self, exp: u32) -> Option<Self> {
        if exp == 0 {
            return Some(Self::ONE);
        }

        let mut result = Self::ONE;
        let mut base = *self;
        let mut exp = exp;

        loop {
            if exp & 1 == 1 {
                result = result.checked_mul(&base)?;
            }
            exp >>= 1;
            if exp == 0 {
                break;
            }
            base = base.checked_mul(&base)?;
        }

        Some(result)
    }

    /// `self * mul / div` with full 256-bit intermediate precision,
    /// floor division. None on overflow of the product or div == 0.
    pub fn checked_mul_div(&self, mul: &Self, div: &Self) -> Option<Self> {
        self.checked_mul(mul)?.checked_div(div)
    }

    fn shl_one(&self) -> Self {
        let mut result = [0u64; 4];
        let mut carry = 0u64;
        for i in 0..4 {
            result[i] = (self.0[i] << 1) | carry;
            carry = self.0[i] >> 63;
        }
        Self(result)
    }

    fn set_bit(&mut self, pos: u32) {
        self.0[(pos / 64) as usize] |= 1 << (pos % 64);
    }

    /// Get bit at position
    pub fn bit(&self, pos: u32) -> bool {
        if pos >= 256 {
            return false;
        }
        let limb = (pos / 64) as usize;
        let bit = pos % 64;
        (self.0[limb] >> bit) & 1 != 0
    }

    /// Bit length (position of highest set bit + 1)
    pub fn bit_len(&self) -> u32 {
        for i in (0..4).rev() {
            if self.0[i] != 0 {
                return (i as u32 + 1) * 64 - self.0[i].leading_zeros();
            }
        }
        0
    }

    /// Check if zero
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&l| l == 0)
    }

    /// Convert to big-endian bytes
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        for i in 0..4 {
            let limb_bytes = self.0[3 - i].to_be_bytes();
            bytes[i * 8..(i + 1) * 8].copy_from_slice(&limb_bytes);
        }
        bytes
    }

    /// Convert from big-endian bytes
    pub fn from_be_bytes(bytes: [u8; 32]) -> Self {
        let mut limbs = [0u64; 4];
        for i in 0..4 {
            let mut limb_bytes = [0u8; 8];
            limb_bytes.copy_from_slice(&bytes[i * 8..(i + 1) * 8]);
            limbs[3 - i] = u64::from_be_bytes(limb_bytes);
        }
        Self(limbs)
    }

    /// Parse from decimal string
    pub fn from_decimal_str(s: &str) -> Result<Self, TypesError> {
        if s.is_empty() {
            return Err(TypesError::InvalidU256String(s.to_string()));
        }

        let mut result = Self::ZERO;
        for c in s.chars() {
            if !c.is_ascii_digit() {
                return Err(TypesError::InvalidU256String(s.to_string()));
            }

            let digit = c as u64 - '0' as u64;
            result = result
                .checked_mul(&Self::from_u64(10))
                .ok_or(TypesError::U256Overflow)?;
            result = result
                .checked_add(&Self::from_u64(digit))
                .ok_or(TypesError::U256Overflow)?;
        }

        Ok(result)
    }
}

impl From<u64> for U256 {
    fn from(val: u64) -> Self {
        Self::from_u64(val)
    }
}

impl From<u128> for U256 {
    fn from(val: u128) -> Self {
        Self::from_u128(val)
    }
}

impl From<u32> for U256 {
    fn from(val: u32) -> Self {
        Self::from_u64(val as u64)
    }
}

impl TryFrom<U256> for u64 {
    type Error = TypesError;

    fn try_from(value: U256) -> Result<Self, Self::Error> {
        if value.0[1] != 0 || value.0[2] != 0 || value.0[3] != 0 {
            Err(TypesError::U256Overflow)
        } else {
            Ok(value.0[0])
        }
    }
}

impl TryFrom<U256> for u128 {
    type Error = TypesError;

    fn try_from(value: U256) -> Result<Self, Self::Error> {
        if value.0[2] != 0 || value.0[3] != 0 {
            Err(TypesError::U256Overflow)
        } else {
            Ok((value.0[1] as u128) << 64 | value.0[0] as u128)
        }
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }

        let mut n = *self;
        let mut s = String::new();

        while !n.is_zero() {
            let rem = n.checked_rem(&Self::from_u64(10)).map(|v| v.0[0]).unwrap_or(0);
            s.push((rem as u8 + b'0') as char);
            n = n.checked_div(&Self::from_u64(10)).unwrap_or(Self::ZERO);
        }

        write!(f, "{}", s.chars().rev().collect::<String>())
    }
}

impl fmt::Debug for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U256({})", self)
    }
}

impl fmt::LowerHex for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_be_bytes()))
    }
}

impl FromStr for U256 {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("0x") || s.starts_with("0X") {
            let bytes = hex::decode(&s[2..])?;
            if bytes.len() > 32 {
                return Err(TypesError::U256Overflow);
            }
            let mut padded = [0u8; 32];
            padded[32 - bytes.len()..].copy_from_slice(&bytes);
            Ok(Self::from_be_bytes(padded))
        } else {
            Self::from_decimal_str(s)
        }
    }
}

impl Add for U256 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.checked_add(&rhs).expect("U256 addition overflow")
    }
}

impl Sub for U256 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        self.checked_sub(&rhs).expect("U256 subtraction underflow")
    }
}

impl Mul for U256 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.checked_mul(&rhs).expect("U256 multiplication overflow")
    }
}

impl Div for U256 {
    type Output = Self;

    fn div(self, rhs: Self) -> Self::Output {
        self.checked_div(&rhs).expect("U256 division by zero")
    }
}

impl Rem for U256 {
    type Output = Self;

    fn rem(self, rhs: Self) -> Self::Output {
        self.checked_rem(&rhs).expect("U256 remainder by zero")
    }
}

impl std::ops::AddAssign for U256 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::SubAssign for U256 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}
