//! Device numbers.
//!
//! A [`DevNum`] names one device (major = driver class, minor = instance);
//! a [`DevRegion`] is a contiguous run of minors under one major, which is
//! what the host registry hands out.

use core::fmt;

/// Bits of the minor number in the packed `dev_t` encoding.
const MINOR_BITS: u32 = 20;
/// Mask for the minor number.
const MINOR_MASK: u32 = (1 << MINOR_BITS) - 1;
/// Largest representable major number (12 bits).
pub const MAX_MAJOR: u32 = (1 << (32 - MINOR_BITS)) - 1;

/// A `(major, minor)` device number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevNum {
    major: u32,
    minor: u32,
}

impl DevNum {
    /// Creates a device number, or `None` if either half is out of range.
    pub const fn new(major: u32, minor: u32) -> Option<Self> {
        if major > MAX_MAJOR || minor > MINOR_MASK {
            return None;
        }
        Some(Self { major, minor })
    }

    /// The major number.
    pub const fn major(self) -> u32 {
        self.major
    }

    /// The minor number.
    pub const fn minor(self) -> u32 {
        self.minor
    }

    /// Packs into the kernel `dev_t` layout (`major << 20 | minor`).
    pub const fn as_raw(self) -> u32 {
        (self.major << MINOR_BITS) | self.minor
    }

    /// Unpacks a kernel `dev_t`.
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            major: raw >> MINOR_BITS,
            minor: raw & MINOR_MASK,
        }
    }
}

impl fmt::Display for DevNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}

/// A contiguous range of device numbers under one major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DevRegion {
    first: DevNum,
    count: u32,
}

impl DevRegion {
    /// Creates a region of `count` minors starting at `first`.
    ///
    /// Returns `None` for an empty region or one that runs past the largest
    /// minor number.
    pub const fn new(first: DevNum, count: u32) -> Option<Self> {
        if count == 0 {
            return None;
        }
        match first.minor.checked_add(count - 1) {
            Some(last) if last <= MINOR_MASK => Some(Self { first, count }),
            _ => None,
        }
    }

    /// The first device number of the region.
    pub const fn first(self) -> DevNum {
        self.first
    }

    /// The major number shared by the whole region.
    pub const fn major(self) -> u32 {
        self.first.major
    }

    /// Number of minors in the region.
    pub const fn count(self) -> u32 {
        self.count
    }

    /// Returns `true` if `dev` falls inside this region.
    pub const fn contains(self, dev: DevNum) -> bool {
        dev.major == self.first.major
            && dev.minor >= self.first.minor
            && dev.minor - self.first.minor < self.count
    }

    /// Returns `true` if the two regions share any device number.
    pub const fn overlaps(self, other: DevRegion) -> bool {
        if self.first.major != other.first.major {
            return false;
        }
        let a_end = self.first.minor + self.count;
        let b_end = other.first.minor + other.count;
        self.first.minor < b_end && other.first.minor < a_end
    }
}

impl fmt::Display for DevRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 1 {
            write!(f, "{}", self.first)
        } else {
            write!(
                f,
                "{}:{}-{}",
                self.first.major,
                self.first.minor,
                self.first.minor + self.count - 1
            )
        }
    }
}
