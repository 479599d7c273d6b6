//! 不揮発性メモリ(ブロックデバイス)のインターフェース定義と実装群.
//!
//! このモジュールは[DataRegion](../storage/struct.DataRegion.html)が
//! レコードの読み書きに使用する永続化領域を提供する.
use std::io::{Read, Seek, SeekFrom, Write};

pub use self::memory::MemoryNvm;
pub use self::shared_memory::SharedMemoryNvm;

use crate::block::BlockSize;
use crate::{ErrorKind, Result};

mod memory;
mod shared_memory;

/// 不揮発性メモリを表すトレイト.
///
/// "不揮発性メモリ"は「永続化可能なバイト列(領域)」を意味し、lump群のレコードを保存するために使用される.
///
/// データ領域が要求する契約は以下の三つのみ:
///
/// - `seek(SeekFrom::Start(offset))`: 絶対位置へのシーク
/// - `read_exact(buf)`: `buf`全体を埋める読み込み(埋められなければ失敗)
/// - `write_all(buf)`: `buf`全体の書き込み(書ききれなければ失敗)
///
/// 読み書きの際には、位置およびサイズ、がブロック境界にアライメントされている必要がある.
pub trait NonVolatileMemory: Read + Write + Seek {
    /// メモリの内容を、物理デバイスに同期する.
    ///
    /// 内部的にバッファ管理等を行っておらず、常に内容が同期されている場合には、
    /// このメソッド内で特に何かを行う必要はない。
    fn sync(&mut self) -> Result<()>;

    /// 読み書き用カーソルの現在位置を返す.
    fn position(&self) -> u64;

    /// メモリの容量(バイト単位)を返す.
    fn capacity(&self) -> u64;

    /// このインスタンスのブロックサイズを返す.
    ///
    /// 利用者は、ブロックサイズに揃うように、読み書き時のアライメントを行う必要がある.
    fn block_size(&self) -> BlockSize;

    /// `SeekFrom`形式で指定された位置を、開始地点からのオフセットに変換する.
    ///
    /// # Errors
    ///
    /// 「指定位置が容量を超えている」ないし「`0`未満」の場合には、
    /// 種類が`ErrorKind::InvalidInput`のエラーが返される.
    fn convert_to_offset(&self, pos: SeekFrom) -> Result<u64> {
        match pos {
            SeekFrom::Start(offset) => {
                track_assert!(offset <= self.capacity(), ErrorKind::InvalidInput);
                Ok(offset)
            }
            SeekFrom::End(delta) => {
                let offset = self.capacity() as i64 + delta;
                track_assert!(0 <= offset, ErrorKind::InvalidInput);
                Ok(offset as u64)
            }
            SeekFrom::Current(delta) => {
                let offset = self.position() as i64 + delta;
                track_assert!(0 <= offset, ErrorKind::InvalidInput);
                Ok(offset as u64)
            }
        }
    }
}
