use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Shl, ShlAssign, ShrAssign, Sub, SubAssign};

/// Global octree node id. Node indices grow as `factor^depth`, so past a few
/// dozen levels they no longer fit a machine word; arithmetic stays exact.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(BigUint);

impl Id {
    pub fn zero() -> Id {
        Id(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Narrow to a machine word. Only legal for values that fit one, e.g.
    /// chunk-relative offsets.
    pub fn simple(&self) -> usize {
        self.0.to_usize().expect("node id exceeds machine word")
    }
}

impl From<u64> for Id {
    fn from(v: u64) -> Id {
        Id(BigUint::from(v))
    }
}

impl From<usize> for Id {
    fn from(v: usize) -> Id {
        Id(BigUint::from(v))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Id {
    type Err = num_bigint::ParseBigIntError;

    fn from_str(s: &str) -> Result<Id, Self::Err> {
        Ok(Id(s.parse()?))
    }
}

impl ShlAssign<u32> for Id {
    fn shl_assign(&mut self, bits: u32) {
        self.0 <<= bits;
    }
}

impl Shl<u32> for &Id {
    type Output = Id;

    fn shl(self, bits: u32) -> Id {
        Id(&self.0 << bits)
    }
}

impl ShrAssign<u32> for Id {
    fn shr_assign(&mut self, bits: u32) {
        self.0 >>= bits;
    }
}

impl AddAssign<u64> for Id {
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

impl AddAssign<&Id> for Id {
    fn add_assign(&mut self, rhs: &Id) {
        self.0 += &rhs.0;
    }
}

impl Add<u64> for &Id {
    type Output = Id;

    fn add(self, rhs: u64) -> Id {
        Id(&self.0 + rhs)
    }
}

impl Add<&Id> for &Id {
    type Output = Id;

    fn add(self, rhs: &Id) -> Id {
        Id(&self.0 + &rhs.0)
    }
}

impl SubAssign<u64> for Id {
    fn sub_assign(&mut self, rhs: u64) {
        debug_assert!(self.0 >= BigUint::from(rhs), "id subtraction underflow");
        self.0 -= rhs;
    }
}

impl Sub<&Id> for &Id {
    type Output = Id;

    fn sub(self, rhs: &Id) -> Id {
        debug_assert!(self.0 >= rhs.0, "id subtraction underflow");
        Id(&self.0 - &rhs.0)
    }
}

impl Mul<u64> for &Id {
    type Output = Id;

    fn mul(self, rhs: u64) -> Id {
        Id(&self.0 * rhs)
    }
}

impl Div<u64> for &Id {
    type Output = Id;

    fn div(self, rhs: u64) -> Id {
        Id(&self.0 / rhs)
    }
}
