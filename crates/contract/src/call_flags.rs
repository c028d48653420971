//! Call permission flags for contract and syscall invocation.

use std::ops::BitOr;

/// Flags that control what operations an executing context can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallFlags(pub u8);

impl CallFlags {
    /// No flags.
    pub const NONE: Self = Self(0);

    /// Allow reading states.
    pub const READ_STATES: Self = Self(0x01);

    /// Allow writing states.
    pub const WRITE_STATES: Self = Self(0x02);

    /// Allow calling other contracts.
    pub const ALLOW_CALL: Self = Self(0x04);

    /// Allow sending notifications.
    pub const ALLOW_NOTIFY: Self = Self(0x08);

    /// Allow reading and writing states.
    pub const STATES: Self = Self(Self::READ_STATES.0 | Self::WRITE_STATES.0);

    /// Allow all operations.
    pub const ALL: Self = Self(
        Self::READ_STATES.0 | Self::WRITE_STATES.0 | Self::ALLOW_CALL.0 | Self::ALLOW_NOTIFY.0,
    );

    /// Checks if the flags include the specified flags.
    pub fn has_flag(&self, flag: Self) -> bool {
        (self.0 & flag.0) == flag.0
    }

    /// Returns the flags present in both operands.
    pub fn intersect(&self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Creates CallFlags from bits, returning None if invalid bits are set.
    pub fn from_bits(bits: u32) -> Option<Self> {
        if bits <= 0xFF && (bits & !(Self::ALL.0 as u32)) == 0 {
            Some(Self(bits as u8))
        } else {
            None
        }
    }
}

impl BitOr for CallFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_values() {
        assert_eq!(CallFlags::NONE.0, 0);
        assert_eq!(CallFlags::STATES.0, 0x03);
        assert_eq!(CallFlags::ALL.0, 0x0F);
    }

    #[test]
    fn test_has_flag() {
        assert!(CallFlags::ALL.has_flag(CallFlags::STATES));
        assert!(CallFlags::STATES.has_flag(CallFlags::READ_STATES));
        assert!(!CallFlags::STATES.has_flag(CallFlags::ALLOW_CALL));
        assert!(!CallFlags::NONE.has_flag(CallFlags::READ_STATES));
    }

    #[test]
    fn test_intersect() {
        let granted = CallFlags::READ_STATES | CallFlags::ALLOW_NOTIFY;
        assert_eq!(granted.intersect(CallFlags::ALL), granted);
        assert_eq!(granted.intersect(CallFlags::WRITE_STATES), CallFlags::NONE);
    }

    #[test]
    fn test_from_bits() {
        assert_eq!(CallFlags::from_bits(0x0F), Some(CallFlags::ALL));
        assert_eq!(CallFlags::from_bits(0x10), None);
        assert_eq!(CallFlags::from_bits(0x100), None);
    }
}
