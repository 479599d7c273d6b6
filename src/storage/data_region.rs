use byteorder::{BigEndian, ByteOrder};
use slog::Logger;
use std::error;
use std::fmt;
use std::io::{Read, SeekFrom, Write};
use std::ops::Range;
use trackable::error::ErrorKindExt;

use crate::block::{AlignedBytes, BlockSize};
use crate::lump::LumpData;
use crate::metrics::DataRegionMetrics;
use crate::nvm::NonVolatileMemory;
use crate::storage::allocator::Allocate;
use crate::storage::portion::DataPortion;
use crate::{Error, ErrorKind, Result};

/// 各レコードの末尾に埋め込まれるトレイラ(パディング長)のサイズ.
pub const LUMP_DATA_TRAILER_SIZE: usize = 2;

/// ランプのデータを格納するための領域.
///
/// # レコードのフォーマット
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                       Lump Data (Variable)
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                       Padding (Variable)
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |    Padding Size (Big Endian)  |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// レコード全体の長さはブロックサイズの倍数で、パディング長は常にブロックサイズ未満となる.
/// ブロックサイズには、デバイス固有の値ではなく、常に`BlockSize::min()`が使われる.
///
/// # 並行性
///
/// 全ての操作は「シーク→読み書き」の列をロック無しで発行する.
/// 複数スレッドから利用する場合には、利用者側で直列化を行う必要がある.
#[derive(Debug)]
pub struct DataRegion<A, N> {
    allocator: A,
    nvm: N,
    block_size: BlockSize,
    logger: Logger,
    metrics: DataRegionMetrics,
}
impl<A, N> DataRegion<A, N>
where
    A: Allocate,
    N: NonVolatileMemory,
{
    pub(crate) fn with_parts(
        allocator: A,
        nvm: N,
        logger: Logger,
        metrics: DataRegionMetrics,
    ) -> Self {
        DataRegion {
            allocator,
            nvm,
            block_size: BlockSize::min(),
            logger,
            metrics,
        }
    }

    /// 計算に用いられるブロックサイズを返す.
    pub fn block_size(&self) -> BlockSize {
        self.block_size
    }

    /// データ領域のメトリクスを返す.
    pub fn metrics(&self) -> &DataRegionMetrics {
        &self.metrics
    }

    /// アロケータへの参照を返す.
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    /// データを格納する.
    ///
    /// `data`の所有権は移動し、そのバッファにトレイラの付与とパディングを施した上で、
    /// そのままデバイスに書き出される.
    ///
    /// 格納場所は`DataRegion`(のアロケータ)が決定し、成功した場合にはそれが返される.
    ///
    /// # Errors
    ///
    /// - 空き容量が不足している場合には、種類が`ErrorKind::StorageFull`のエラーが返される
    /// - 領域の割当後に書き込みが失敗した場合には、割当済みの部分領域がエラーと共に返される
    ///   - この部分領域は解放されないので、必要に応じて利用者が`release`を呼び出すこと
    ///
    /// # Panics
    ///
    /// パディング長がブロックサイズ以上になった場合や、
    /// アロケータが要求と異なるサイズの部分領域を返した場合には、現在のスレッドがパニックする.
    pub fn put(&mut self, data: LumpData) -> std::result::Result<DataPortion, PutError> {
        let bytes = self.encode(data);
        let block_count = self.block_size.block_count(bytes.len() as u64);
        assert!(block_count <= 0xFFFF, "Too many blocks: {}", block_count);

        let portion = match self.allocator.allocate(block_count as u16) {
            Some(portion) => portion,
            None => {
                let e = ErrorKind::StorageFull.cause(format!(
                    "No free portion for {} blocks",
                    block_count
                ));
                return Err(PutError::from(track!(Error::from(e))));
            }
        };
        let (offset, size) = portion.to_bytes(self.block_size);
        assert_eq!(
            size,
            bytes.len(),
            "Allocated portion does not match the record: {:?}",
            portion
        );

        if let Err(e) = track!(self.write_blocks(offset, &bytes)) {
            self.metrics.write_failures.increment();
            warn!(self.logger, "Cannot write a lump to the allocated portion";
                  "start" => portion.start.as_u64(), "blocks" => portion.len,
                  "error" => e.to_string());
            return Err(PutError {
                error: e,
                portion: Some(portion),
            });
        }
        self.metrics.put_lumps.increment();
        debug!(self.logger, "Put a lump";
               "start" => portion.start.as_u64(), "blocks" => portion.len);
        Ok(portion)
    }

    /// 指定された領域に格納されているデータを取得する.
    ///
    /// `portion`で指定された領域が有効かどうかの判定は、このメソッド内では行われない.
    ///
    /// # Errors
    ///
    /// 読み込んだトレイラが不正な場合には、種類が`ErrorKind::StorageCorrupted`のエラーが返される.
    pub fn get(&mut self, portion: DataPortion) -> Result<LumpData> {
        let (offset, size) = portion.to_bytes(self.block_size);
        track_assert!(
            size >= LUMP_DATA_TRAILER_SIZE,
            ErrorKind::InvalidInput,
            "Empty portion: {:?}",
            portion
        );

        let mut bytes = track!(self.read_blocks(offset, size))?;
        let padding_len = track!(self.read_trailer(&bytes, size))?;
        bytes.truncate(size - padding_len - LUMP_DATA_TRAILER_SIZE);

        self.metrics.get_whole_lumps.increment();
        Ok(LumpData::from_aligned_bytes(bytes))
    }

    /// 指定された領域に格納されているデータの一部を取得する.
    ///
    /// データの`start`バイト目から、最大で`length`バイトが読み込まれる.
    /// データの末尾を超える範囲が指定された場合には、結果は`length`よりも短くなる.
    ///
    /// レコード全体ではなく、指定範囲をカバーする最小のブロック群のみが読み込まれる.
    ///
    /// # Errors
    ///
    /// - `start + length`がレコードの確保済み容量を超えている場合には、
    ///   種類が`ErrorKind::CapacityExceeded`のエラーが返される
    /// - `start`がデータの末尾を超えている場合には、種類が`ErrorKind::OutOfRange`のエラーが返される
    pub fn get_with_offset(
        &mut self,
        portion: DataPortion,
        start: usize,
        length: usize,
    ) -> Result<Vec<u8>> {
        let (offset, size) = portion.to_bytes(self.block_size);
        let end = track!(self.check_capacity(portion, start, length))?;

        let range = self.covering_range(start, end, size);
        let bytes = track!(self.read_blocks(offset + range.start as u64, range.len()))?;
        self.metrics.get_partial_lumps.increment();
        if range.end < size {
            // 読み込み範囲がデータの末尾に届き得ないので、そのまま返せる
            return Ok(bytes[start - range.start..end - range.start].to_vec());
        }

        let padding_len = track!(self.read_trailer(&bytes, size))?;
        let data_end = size - padding_len - LUMP_DATA_TRAILER_SIZE;
        if start > data_end {
            self.metrics.out_of_range_errors.increment();
            track_panic!(
                ErrorKind::OutOfRange,
                "start={}, data_len={}",
                start,
                data_end
            );
        }
        let end = std::cmp::min(end, data_end);
        Ok(bytes[start - range.start..end - range.start].to_vec())
    }

    /// 指定された領域に格納されているデータの一部を上書きする.
    ///
    /// データの`start`バイト目から`payload.len()`バイトが`payload`の内容で置き換えられる.
    /// 格納場所および確保済みの容量は変化せず、トレイラも書き換えられることはない.
    /// そのため、書き込みの終端が最終ブロックに掛かり、かつ既存のデータの末尾を超える場合には拒否される.
    ///
    /// 書き込み範囲をカバーする最小のブロック群のみが読み込まれ、書き戻される.
    ///
    /// # Errors
    ///
    /// 書き込み範囲が、レコードの確保済み容量ないし(最終ブロック内の)既存のデータの末尾を超えている場合には、
    /// 種類が`ErrorKind::CapacityExceeded`のエラーが返される.
    pub fn update(&mut self, portion: DataPortion, start: usize, payload: &[u8]) -> Result<()> {
        let (offset, size) = portion.to_bytes(self.block_size);
        let end = track!(self.check_capacity(portion, start, payload.len()))?;

        let range = self.covering_range(start, end, size);
        let mut bytes = track!(self.read_blocks(offset + range.start as u64, range.len()))?;
        bytes[start - range.start..end - range.start].copy_from_slice(payload);

        // 書き込みの終端が最終ブロックに掛かる場合にのみ、既存のデータ長と比較する
        if end + self.block_size.as_u16() as usize > size {
            let padding_len = track!(self.read_trailer(&bytes, size))?;
            let new_padding_len = size - end - LUMP_DATA_TRAILER_SIZE;
            if new_padding_len < padding_len {
                self.metrics.capacity_errors.increment();
                warn!(self.logger, "Update exceeds the data length";
                      "start" => portion.start.as_u64(), "blocks" => portion.len,
                      "offset" => start, "len" => payload.len());
                track_panic!(
                    ErrorKind::CapacityExceeded,
                    "Update exceeds the data length: end={}, data_len={}",
                    end,
                    size - padding_len - LUMP_DATA_TRAILER_SIZE
                );
            }
        }

        track!(self.write_blocks(offset + range.start as u64, &bytes))?;
        self.metrics.update_lumps.increment();
        debug!(self.logger, "Update a lump";
               "start" => portion.start.as_u64(), "blocks" => portion.len,
               "offset" => start, "len" => payload.len());
        Ok(())
    }

    /// 指定された領域を解放する.
    ///
    /// デバイス上のデータの消去は行われず、将来の割当によって上書きされるまで残り続ける.
    /// 解放後の`portion`を使用してはならない.
    ///
    /// # Panics
    ///
    /// アロケータの実装によっては、未割当の領域が指定された場合に、現在のスレッドがパニックする.
    pub fn release(&mut self, portion: DataPortion) {
        self.allocator.release(portion);
        self.metrics.release_lumps.increment();
        debug!(self.logger, "Release a lump";
               "start" => portion.start.as_u64(), "blocks" => portion.len);
    }

    /// 不揮発性メモリの内容を物理デバイスに同期する.
    pub fn sync(&mut self) -> Result<()> {
        track!(self.nvm.sync())
    }

    // トレイラを付与し、ブロック境界までパディングを行う
    fn encode(&self, data: LumpData) -> AlignedBytes {
        let mut bytes = data.into_aligned_bytes();
        let size = bytes.len() + LUMP_DATA_TRAILER_SIZE;
        bytes.aligned_resize(size);

        let padding_len = bytes.len() - size;
        assert!(
            padding_len < self.block_size.as_u16() as usize,
            "Too large padding: {}",
            padding_len
        );
        let trailer_offset = bytes.len() - LUMP_DATA_TRAILER_SIZE;
        BigEndian::write_u16(&mut bytes[trailer_offset..], padding_len as u16);
        bytes
    }

    // `[start, start + length)`が確保済み容量に収まっているかを検査し、終端位置を返す
    fn check_capacity(&self, portion: DataPortion, start: usize, length: usize) -> Result<usize> {
        let (_, size) = portion.to_bytes(self.block_size);
        track_assert!(
            size >= LUMP_DATA_TRAILER_SIZE,
            ErrorKind::InvalidInput,
            "Empty portion: {:?}",
            portion
        );
        let capacity = size - LUMP_DATA_TRAILER_SIZE;
        match start.checked_add(length) {
            Some(end) if end <= capacity => Ok(end),
            _ => {
                self.metrics.capacity_errors.increment();
                track_panic!(
                    ErrorKind::CapacityExceeded,
                    "Reserved capacity exceeded: start={}, length={}, capacity={}",
                    start,
                    length,
                    capacity
                );
            }
        }
    }

    // `[start, end)`をカバーする最小のブロック範囲を返す(レコードの先頭からの相対位置).
    //
    // データの末尾はレコード終端から`ブロックサイズ + 1`バイト以内に必ず存在するので、
    // `end`がそこに届き得る場合には、トレイラを含むようにレコードの終端まで範囲を広げる.
    fn covering_range(&self, start: usize, end: usize, record_size: usize) -> Range<usize> {
        let block_size = self.block_size.as_u16() as usize;
        let range_start = self.block_size.floor_align(start as u64) as usize;
        let range_end = if end + block_size + 1 > record_size {
            record_size
        } else {
            self.block_size.ceil_align(end as u64) as usize
        };
        range_start..range_end
    }

    // `bytes`の末尾から、サイズ`record_size`のレコードのパディング長を読み込む
    fn read_trailer(&self, bytes: &[u8], record_size: usize) -> Result<usize> {
        let trailer_offset = bytes.len() - LUMP_DATA_TRAILER_SIZE;
        let padding_len = BigEndian::read_u16(&bytes[trailer_offset..]) as usize;
        track_assert!(
            padding_len < self.block_size.as_u16() as usize
                && padding_len + LUMP_DATA_TRAILER_SIZE <= record_size,
            ErrorKind::StorageCorrupted,
            "Broken trailer: padding_len={}, record_size={}",
            padding_len,
            record_size
        );
        Ok(padding_len)
    }

    fn read_blocks(&mut self, offset: u64, size: usize) -> Result<AlignedBytes> {
        let mut buf = AlignedBytes::new(size, self.block_size);
        track_io!(self.nvm.seek(SeekFrom::Start(offset)))?;
        track_io!(self.nvm.read_exact(&mut buf))?;
        Ok(buf)
    }

    fn write_blocks(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        track_io!(self.nvm.seek(SeekFrom::Start(offset)))?;
        track_io!(self.nvm.write_all(bytes))?;

        // `sync`は利用者(e.g., ジャーナル)に委ね、ここでは`flush`のみに留める
        track_io!(self.nvm.flush())?;
        Ok(())
    }
}

/// `DataRegion::put`のエラー.
///
/// 領域の割当後に書き込みが失敗した場合には、割当済みの部分領域も保持している.
#[derive(Debug, Clone)]
pub struct PutError {
    error: Error,
    portion: Option<DataPortion>,
}
impl PutError {
    /// 発生したエラーを返す.
    pub fn error(&self) -> &Error {
        &self.error
    }

    /// エラーの種類を返す.
    pub fn kind(&self) -> &ErrorKind {
        self.error.kind()
    }

    /// エラー発生時点で既に割り当てられていた部分領域を返す.
    ///
    /// この部分領域は解放されていない.
    pub fn portion(&self) -> Option<DataPortion> {
        self.portion
    }
}
impl From<Error> for PutError {
    fn from(error: Error) -> Self {
        PutError {
            error,
            portion: None,
        }
    }
}
impl From<PutError> for Error {
    fn from(f: PutError) -> Self {
        f.error
    }
}
impl fmt::Display for PutError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(portion) = self.portion {
            write!(f, "{} (allocated portion: {:?})", self.error, portion)
        } else {
            write!(f, "{}", self.error)
        }
    }
}
impl error::Error for PutError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.error)
    }
}
