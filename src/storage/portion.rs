//! Data Portion
use crate::block::BlockSize;
use crate::storage::Address;

/// データ領域内の部分領域(レコードの格納場所)を示すための構造体.
///
/// `DataRegion::put`によって生成され、以降の全ての操作で使用される.
/// 長さは割当後に変化することはなく、レコードが使用可能な容量の上限となる.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataPortion {
    /// 部分領域の開始位置（ブロック単位）
    pub start: Address,

    /// 部分領域の長さ（ブロック単位）
    pub len: u16,
}
impl DataPortion {
    /// 部分領域の終端位置を返す.
    ///
    /// 部分領域は[start, end)の範囲を占めるので、end自体は含まれない.
    pub fn end(&self) -> Address {
        self.start + Address::from(u32::from(self.len))
    }

    /// 部分領域を`(開始位置, 長さ)`のバイト単位の組に変換する.
    pub fn to_bytes(&self, block_size: BlockSize) -> (u64, usize) {
        let offset = self.start.to_byte_offset(block_size);
        let size = self.len as usize * block_size.as_u16() as usize;
        (offset, size)
    }
}

/// `DataPortion`を64bit整数にエンコードした構造体.
///
/// インデックスのような、数百万～数千万オーダーの部分領域を保持する
/// データ構造では、各要素のメモリ使用量を節約することが
/// 重要となるので、そのような目的でこの構造体が提供されている.
///
/// 下位40bitに開始位置を、その上の16bitに長さを格納する.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataPortionU64(u64);
impl DataPortionU64 {
    /// エンコード済みの値を返す.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// エンコード済みの値から`DataPortionU64`を復元する.
    ///
    /// 使用されていない上位8bitが立っている場合には`None`が返される.
    pub fn from_u64(value: u64) -> Option<Self> {
        if value >> 56 == 0 {
            Some(DataPortionU64(value))
        } else {
            None
        }
    }
}
impl From<DataPortion> for DataPortionU64 {
    fn from(f: DataPortion) -> Self {
        DataPortionU64(f.start.as_u64() | (u64::from(f.len) << 40))
    }
}
impl From<DataPortionU64> for DataPortion {
    fn from(f: DataPortionU64) -> Self {
        let len = (f.0 >> 40) as u16;
        let start = Address::from_u64(f.0 & Address::MAX).expect("Never fails");
        DataPortion { start, len }
    }
}

#[cfg(test)]
mod tests {
    use std::mem;

    use super::*;

    #[test]
    fn it_works() {
        let p = DataPortion {
            start: Address::from(10),
            len: 30,
        };
        assert_eq!(p.end(), Address::from(40));
        assert_eq!(p.to_bytes(BlockSize::min()), (5120, 15360));
    }

    #[test]
    fn u64_encoding_works() {
        let p0 = DataPortion {
            start: Address::from_u64(Address::MAX).unwrap(),
            len: 0xFFFF,
        };
        let p1 = DataPortionU64::from(p0);
        assert_eq!(mem::size_of_val(&p1), 8);
        assert_eq!(DataPortion::from(p1), p0);

        assert_eq!(DataPortionU64::from_u64(p1.as_u64()), Some(p1));
        assert_eq!(DataPortionU64::from_u64(1 << 56), None);
    }
}
