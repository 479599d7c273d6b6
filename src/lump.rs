//! Lump関連のデータ構造群.
//!
//! "lump"とは、外部から識別子で参照される可変長のバイト列.
//! データ領域のレイヤでは識別子は扱わず、データ(バイト列)のみを格納・取得する.
//!
//! データ領域では、保存されているlumpの整合性の保証や検証は行わないため、
//! 必要であれば、利用側で冗長化やチェックサム検証等を施す必要がある.
use std::cmp;
use std::fmt;

use crate::block::{AlignedBytes, BlockSize};
use crate::{ErrorKind, Result};

/// Lumpのデータ.
///
/// 内部的には、データ領域のブロック境界に揃えられたバッファ([`AlignedBytes`])を保持しており、
/// PUT時にはこのバッファが直接(トレイラの付与およびパディングが行われた上で)デバイスに書き出される.
///
/// 最大で`MAX_SIZE`までのバイト列を保持可能.
///
/// [`AlignedBytes`]: ../block/struct.AlignedBytes.html
#[derive(Clone)]
pub struct LumpData {
    bytes: AlignedBytes,
}
impl LumpData {
    /// データの最大長（バイト単位）.
    ///
    /// 一つのレコードが占有可能な最大ブロック数(`0xFFFF`)に、最小のブロックサイズを掛けた値となる.
    /// 最後の`-2`は、レコード末尾に付与されるトレイラのサイズ分.
    pub const MAX_SIZE: usize = 0xFFFF * (BlockSize::MIN as usize) - 2;

    /// 引数で指定されたデータを保持する`LumpData`インスタンスを生成する.
    ///
    /// # 性能上の注意
    ///
    /// アライメント用に、データサイズ分のメモリコピーが発生する.
    /// コピーを避けたい場合には`aligned_allocate`を用いて確保したバッファに直接書き込むと良い.
    ///
    /// # Errors
    ///
    /// データのサイズが`MAX_SIZE`を超えている場合は、`ErrorKind::InvalidInput`エラーが返される.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(data: Vec<u8>) -> Result<Self> {
        track!(Self::from_bytes(&data))
    }

    /// `bytes`と等しい内容を持つ`LumpData`インスタンスを生成する.
    ///
    /// # Errors
    ///
    /// データのサイズが`MAX_SIZE`を超えている場合は、`ErrorKind::InvalidInput`エラーが返される.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        track!(Self::check_size(bytes.len()))?;
        Ok(LumpData {
            bytes: AlignedBytes::from_bytes(bytes, BlockSize::min()),
        })
    }

    /// データ長が`data_len`の、アライメント済みの`LumpData`インスタンスを生成する.
    ///
    /// 後のPUTで付与されるトレイラ分の領域も、予め確保されている.
    /// 初期値はゼロ埋めされている.
    ///
    /// # Errors
    ///
    /// 指定されたサイズが`MAX_SIZE`を超えている場合は、`ErrorKind::InvalidInput`エラーが返される.
    pub fn aligned_allocate(data_len: usize) -> Result<Self> {
        track!(Self::check_size(data_len))?;
        let mut bytes = AlignedBytes::new(data_len, BlockSize::min());
        bytes.aligned_resize(data_len + 2);
        bytes.truncate(data_len);
        Ok(LumpData { bytes })
    }

    /// データを表すバイト列への参照を返す.
    pub fn as_bytes(&self) -> &[u8] {
        self.as_ref()
    }

    /// データを表すバイト列への破壊的な参照を返す.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        self.as_mut()
    }

    /// データの長さを返す.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// データが空かどうかを判定する.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 所有権を放棄して、内部のバイト列を返す.
    ///
    /// アライメントされたメモリ領域を通常の`Vec<u8>`に変換するためのメモリコピーが発生する.
    pub fn into_bytes(self) -> Vec<u8> {
        Vec::from(self.as_bytes())
    }

    pub(crate) fn from_aligned_bytes(bytes: AlignedBytes) -> Self {
        LumpData { bytes }
    }

    pub(crate) fn into_aligned_bytes(self) -> AlignedBytes {
        self.bytes
    }

    fn check_size(size: usize) -> Result<()> {
        track_assert!(
            size <= LumpData::MAX_SIZE,
            ErrorKind::InvalidInput,
            "Too large lump data: {} bytes",
            size
        );
        Ok(())
    }
}
impl AsRef<[u8]> for LumpData {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}
impl AsMut<[u8]> for LumpData {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}
impl fmt::Debug for LumpData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let len = cmp::min(128, self.len());
        let bytes = &self.as_bytes()[0..len];
        let omitted = if len < self.len() {
            format!("({} bytes omitted)", self.len() - len)
        } else {
            "".to_owned()
        };
        write!(f, "LumpData {{ bytes: {:?}{} }}", bytes, omitted)
    }
}
impl PartialEq for LumpData {
    fn eq(&self, other: &Self) -> bool {
        self.as_ref() == other.as_ref()
    }
}
impl Eq for LumpData {}

#[cfg(test)]
mod tests {
    use trackable::result::TestResult;

    use super::*;
    use crate::ErrorKind;

    #[test]
    fn new_works() -> TestResult {
        let data = track!(LumpData::new(b"foo".to_vec()))?;
        assert_eq!(data.as_bytes(), b"foo");
        assert_eq!(data.len(), 3);
        assert_eq!(data.into_bytes(), b"foo".to_vec());

        assert!(track!(LumpData::new(Vec::new()))?.is_empty());
        Ok(())
    }

    #[test]
    fn too_large_data_is_rejected() {
        assert!(LumpData::aligned_allocate(LumpData::MAX_SIZE).is_ok());
        assert_eq!(
            LumpData::aligned_allocate(LumpData::MAX_SIZE + 1)
                .err()
                .map(|e| *e.kind()),
            Some(ErrorKind::InvalidInput)
        );
        assert_eq!(
            LumpData::new(vec![0; LumpData::MAX_SIZE + 1])
                .err()
                .map(|e| *e.kind()),
            Some(ErrorKind::InvalidInput)
        );
    }

    #[test]
    fn aligned_allocate_reserves_trailer() -> TestResult {
        let mut data = track!(LumpData::aligned_allocate(510))?;
        data.as_bytes_mut().copy_from_slice(&[1; 510][..]);
        assert_eq!(data.len(), 510);
        assert_eq!(data.into_aligned_bytes().capacity(), 512);

        let data = track!(LumpData::aligned_allocate(511))?;
        assert_eq!(data.into_aligned_bytes().capacity(), 1024);
        Ok(())
    }

    #[test]
    fn debug_omits_large_data() -> TestResult {
        let data = track!(LumpData::new(vec![0; 130]))?;
        assert!(format!("{:?}", data).ends_with("(2 bytes omitted) }"));
        Ok(())
    }
}
