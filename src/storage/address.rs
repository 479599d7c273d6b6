use std::fmt;
use std::ops::{Add, Sub};

use crate::block::BlockSize;

/// データ領域内の位置を表す40bit幅の整数値.
///
/// 単位は**ブロック**で、バイト位置への変換には`to_byte_offset`を用いる.
#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct Address(u64);
impl Address {
    /// 取り得るアドレスの最大値.
    pub const MAX: u64 = (1 << 40) - 1;

    /// アドレスの値を返す.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// `value`を対応する位置のアドレスに変換する.
    ///
    /// `value`の値が40bit以内に収まらない場合には`None`が返される.
    pub fn from_u64(value: u64) -> Option<Self> {
        if value <= Self::MAX {
            Some(Address(value))
        } else {
            None
        }
    }

    /// ブロック単位のアドレスを、先頭からのバイト位置に変換する.
    pub fn to_byte_offset(self, block_size: BlockSize) -> u64 {
        self.0 * u64::from(block_size.as_u16())
    }
}
impl From<u32> for Address {
    fn from(from: u32) -> Self {
        Address(u64::from(from))
    }
}
impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl Add for Address {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        let value = self.0 + rhs.0;
        Address::from_u64(value).expect("address overflow")
    }
}
impl Sub for Address {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        let value = self.0.checked_sub(rhs.0).expect("address underflow");
        Address(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        assert_eq!(Address::from_u64(0).map(|a| a.as_u64()), Some(0));
        assert_eq!(
            Address::from_u64(Address::MAX).map(|a| a.as_u64()),
            Some(Address::MAX)
        );
        assert_eq!(Address::from_u64(Address::MAX + 1), None);

        assert_eq!(Address::from(10) + Address::from(2), Address::from(12));
        assert_eq!(Address::from(10) - Address::from(2), Address::from(8));
        assert_eq!(Address::from(3).to_byte_offset(BlockSize::min()), 1536);
    }

    #[test]
    #[should_panic]
    fn overflow() {
        let _ = Address::from_u64(Address::MAX).map(|a| a + Address::from(1));
    }

    #[test]
    #[should_panic]
    fn underflow() {
        let _ = Address::from(0) - Address::from(1);
    }
}
