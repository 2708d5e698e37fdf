//! Integer price and volume types.
//!
//! The venue quotes every price as an integer number of its minimum price
//! unit (cents) and every quantity as an integer number of lots. Wrapping
//! both keeps prices and volumes from being mixed in calculations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Price in the venue's minimum price unit.
///
/// A zero price means "no price" in venue snapshots (empty book level).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(pub u64);

impl Price {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Signed view for offset arithmetic.
    #[inline]
    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }

    /// Shift by a signed amount. Returns `None` if the result is not a
    /// positive price.
    #[inline]
    pub fn offset(&self, delta: i64) -> Option<Self> {
        let shifted = self.as_i64().checked_add(delta)?;
        if shifted > 0 {
            Some(Self(shifted as u64))
        } else {
            None
        }
    }

    /// Round down to a multiple of the tick size.
    #[inline]
    pub fn round_down_to_tick(&self, tick_size: u64) -> Self {
        if tick_size == 0 {
            return *self;
        }
        Self(self.0 / tick_size * tick_size)
    }

    /// Round up to a multiple of the tick size.
    #[inline]
    pub fn round_up_to_tick(&self, tick_size: u64) -> Self {
        if tick_size == 0 {
            return *self;
        }
        Self(self.0.div_ceil(tick_size) * tick_size)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Price {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Order or fill volume in lots.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Volume(pub u64);

impl Volume {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Signed view for position arithmetic.
    #[inline]
    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }

    #[inline]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Clamp a signed headroom value into a volume (negative becomes zero).
    #[inline]
    pub fn from_headroom(headroom: i64) -> Self {
        Self(headroom.max(0) as u64)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Volume {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

// Volumes arrive from the venue unchecked; arithmetic saturates.
impl Add for Volume {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Volume {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Volume {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_offset() {
        let p = Price::new(10_000);
        assert_eq!(p.offset(-100), Some(Price::new(9_900)));
        assert_eq!(p.offset(300), Some(Price::new(10_300)));
        assert_eq!(p.offset(-10_000), None);
        assert_eq!(p.offset(-20_000), None);
    }

    #[test]
    fn test_price_round_to_tick() {
        assert_eq!(Price::new(101).round_up_to_tick(100), Price::new(200));
        assert_eq!(Price::new(2_147_483_647).round_down_to_tick(100), Price::new(2_147_483_600));
        assert_eq!(Price::new(500).round_down_to_tick(100), Price::new(500));
        assert_eq!(Price::new(500).round_up_to_tick(100), Price::new(500));
        assert_eq!(Price::new(123).round_down_to_tick(0), Price::new(123));
    }

    #[test]
    fn test_volume_headroom_clamp() {
        assert_eq!(Volume::from_headroom(-5), Volume::ZERO);
        assert_eq!(Volume::from_headroom(40), Volume::new(40));
        assert_eq!(Volume::new(3).saturating_sub(Volume::new(7)), Volume::ZERO);
    }

    #[test]
    fn test_volume_arithmetic_saturates() {
        let huge = Volume::new(u64::MAX - 1);
        assert_eq!(huge + Volume::new(10), Volume::new(u64::MAX));
        let mut acc = huge;
        acc += Volume::new(5);
        assert_eq!(acc, Volume::new(u64::MAX));
        assert_eq!(Volume::new(4) - Volume::new(9), Volume::ZERO);
        assert_eq!(Volume::new(9) - Volume::new(4), Volume::new(5));
    }
}
