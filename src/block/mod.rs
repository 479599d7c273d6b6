//! ブロック(読み書きおよび割当の最小単位)関連の構成要素.
use crate::{ErrorKind, Result};

pub use self::aligned_bytes::AlignedBytes;

mod aligned_bytes;

/// ブロックサイズを表現するための構造体.
///
/// "ブロック"は、デバイスのアドレス指定および領域割当の最小単位であり、
/// 読み書き対象の領域およびその際に使用するバッファは、
/// `BlockSize`によって指定された境界にアライメントされている必要がある.
///
/// データ領域は、デバイス固有のブロックサイズに関わらず、常に`BlockSize::min()`を用いて計算を行う.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockSize(u16);
impl BlockSize {
    /// 許容されるブロックサイズの最小値.
    ///
    /// 全てのブロックサイズは、この値の倍数である必要がある.
    pub const MIN: u16 = 512;

    /// 許容可能な最小のブロックサイズを持つ`BlockSize`インスタンスを返す.
    ///
    /// # Examples
    ///
    /// ```
    /// use lumpstore::block::BlockSize;
    ///
    /// assert_eq!(BlockSize::min().as_u16(), BlockSize::MIN);
    /// ```
    pub fn min() -> Self {
        BlockSize(Self::MIN)
    }

    /// 指定された値のブロックサイズを表現する`BlockSize`インスタンスを生成する.
    ///
    /// # Errors
    ///
    /// 以下の場合には、種類が`ErrorKind::InvalidInput`のエラーが返される:
    ///
    /// - `block_size`が`BlockSize::MIN`未満
    /// - `block_size`が二の冪ではない
    ///
    /// # Examples
    ///
    /// ```
    /// use lumpstore::ErrorKind;
    /// use lumpstore::block::BlockSize;
    ///
    /// assert_eq!(BlockSize::new(512).ok().map(|a| a.as_u16()), Some(512));
    /// assert_eq!(BlockSize::new(4096).ok().map(|a| a.as_u16()), Some(4096));
    ///
    /// assert_eq!(BlockSize::new(256).err().map(|e| *e.kind()), Some(ErrorKind::InvalidInput));
    /// assert_eq!(BlockSize::new(1536).err().map(|e| *e.kind()), Some(ErrorKind::InvalidInput));
    /// ```
    #[allow(clippy::new_ret_no_self)]
    pub fn new(block_size: u16) -> Result<Self> {
        track_assert!(
            block_size >= Self::MIN,
            ErrorKind::InvalidInput,
            "Too small block size: {}",
            block_size
        );
        track_assert!(
            block_size.is_power_of_two(),
            ErrorKind::InvalidInput,
            "Block size must be a power of two: {}",
            block_size
        );
        Ok(BlockSize(block_size))
    }

    /// 指定位置より後方の最初のブロック境界を返す.
    ///
    /// # Examples
    ///
    /// ```
    /// use lumpstore::block::BlockSize;
    ///
    /// let block_size = BlockSize::min();
    /// assert_eq!(block_size.ceil_align(0), 0);
    /// assert_eq!(block_size.ceil_align(1), 512);
    /// assert_eq!(block_size.ceil_align(512), 512);
    /// ```
    pub fn ceil_align(self, position: u64) -> u64 {
        let block_size = u64::from(self.0);
        (position + block_size - 1) / block_size * block_size
    }

    /// 指定位置より前方の最初のブロック境界を返す.
    ///
    /// # Examples
    ///
    /// ```
    /// use lumpstore::block::BlockSize;
    ///
    /// let block_size = BlockSize::min();
    /// assert_eq!(block_size.floor_align(0), 0);
    /// assert_eq!(block_size.floor_align(1), 0);
    /// assert_eq!(block_size.floor_align(513), 512);
    /// ```
    pub fn floor_align(self, position: u64) -> u64 {
        let block_size = u64::from(self.0);
        (position / block_size) * block_size
    }

    /// `size`バイトをカバーするのに必要なブロック数を返す.
    ///
    /// # Examples
    ///
    /// ```
    /// use lumpstore::block::BlockSize;
    ///
    /// let block_size = BlockSize::min();
    /// assert_eq!(block_size.block_count(0), 0);
    /// assert_eq!(block_size.block_count(7), 1);
    /// assert_eq!(block_size.block_count(512), 1);
    /// assert_eq!(block_size.block_count(513), 2);
    /// ```
    pub fn block_count(self, size: u64) -> u64 {
        self.ceil_align(size) / u64::from(self.0)
    }

    /// ブロックサイズ値を`u16`に変換して返す.
    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// 指定位置がブロック境界に沿っているかどうかを判定する.
    ///
    /// # Examples
    ///
    /// ```
    /// use lumpstore::block::BlockSize;
    ///
    /// let block_size = BlockSize::min();
    /// assert!(block_size.is_aligned(0));
    /// assert!(block_size.is_aligned(1024));
    /// assert!(!block_size.is_aligned(511));
    /// ```
    pub fn is_aligned(self, position: u64) -> bool {
        (position % u64::from(self.0)) == 0
    }
}
impl Default for BlockSize {
    fn default() -> Self {
        Self::min()
    }
}
