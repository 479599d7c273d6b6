use crate::block::BlockSize;

/// 物理長が常にブロックサイズの倍数となるバイト列.
///
/// 論理長(`len()`)は物理長(`capacity()`)以下の任意の値を取ることができ、
/// `Deref`経由で参照可能なのは論理長の範囲のみとなる.
///
/// また、先頭アドレスもブロック境界に揃えられているため、
/// `O_DIRECT`付きでオープンされたファイルへの読み書きにそのまま使用可能.
#[derive(Debug)]
pub struct AlignedBytes {
    buf: Vec<u8>,
    offset: usize,
    len: usize,
    block_size: BlockSize,
}
impl AlignedBytes {
    /// 論理長が`size`の新しい`AlignedBytes`インスタンスを生成する.
    ///
    /// 結果のバイト列はゼロ埋めされている.
    pub fn new(size: usize, block_size: BlockSize) -> Self {
        let (buf, offset) = allocate_buf(size, block_size);
        AlignedBytes {
            buf,
            offset,
            len: size,
            block_size,
        }
    }

    /// `bytes`と等しい内容を持つ`AlignedBytes`インスタンスを生成する.
    pub fn from_bytes(bytes: &[u8], block_size: BlockSize) -> Self {
        let mut aligned = Self::new(bytes.len(), block_size);
        aligned.as_mut().copy_from_slice(bytes);
        aligned
    }

    /// このバイト列のブロックサイズを返す.
    pub fn block_size(&self) -> BlockSize {
        self.block_size
    }

    /// 論理長を次のブロック境界に揃える.
    ///
    /// 既に揃っているなら何もしない.
    pub fn align(&mut self) {
        self.len = self.block_size.ceil_align(self.len as u64) as usize;
    }

    /// 論理長を指定サイズに切り詰める.
    ///
    /// 再アロケートは行われない.
    /// `size`が、現在の論理長を超えている場合には何も行わない.
    pub fn truncate(&mut self, size: usize) {
        if size < self.len {
            self.len = size;
        }
    }

    /// 論理長を`new_min_len`の次のブロック境界へとリサイズする.
    ///
    /// サイズ拡大時には、必要に応じて内部バッファの再アロケートが行われる.
    pub fn aligned_resize(&mut self, new_min_len: usize) {
        self.resize(new_min_len);
        self.align();
    }

    /// 論理長をリサイズする.
    ///
    /// 拡張された部分の値は未定義(過去の内容が残っているかもしれない).
    /// サイズ拡大時には、必要に応じて内部バッファの再アロケートが行われる.
    pub fn resize(&mut self, new_len: usize) {
        if new_len > self.capacity() {
            let (mut new_buf, new_offset) = allocate_buf(new_len, self.block_size);
            new_buf[new_offset..][..self.len].copy_from_slice(self.as_ref());
            self.buf = new_buf;
            self.offset = new_offset;
        }
        self.len = new_len;
    }

    /// バッファの物理長(キャパシティ)を返す.
    ///
    /// 常にブロックサイズの倍数となる.
    pub fn capacity(&self) -> usize {
        self.block_size
            .floor_align((self.buf.len() - self.offset) as u64) as usize
    }
}
impl std::ops::Deref for AlignedBytes {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.buf[self.offset..][..self.len]
    }
}
impl std::ops::DerefMut for AlignedBytes {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.offset..][..self.len]
    }
}
impl AsRef<[u8]> for AlignedBytes {
    fn as_ref(&self) -> &[u8] {
        &*self
    }
}
impl AsMut<[u8]> for AlignedBytes {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut *self
    }
}
impl Clone for AlignedBytes {
    fn clone(&self) -> Self {
        let mut cloned = AlignedBytes::new(self.capacity(), self.block_size);
        cloned.as_mut().copy_from_slice(&self.buf[self.offset..][..self.capacity()]);
        cloned.truncate(self.len);
        cloned
    }
}

// 先頭位置をブロック境界に合わせられるだけの余剰を含めてバッファを確保する
fn allocate_buf(size: usize, block_size: BlockSize) -> (Vec<u8>, usize) {
    let capacity =
        block_size.ceil_align(size as u64) as usize + block_size.as_u16() as usize - 1;
    let buf = vec![0; capacity];
    let offset = alignment_offset(&buf, block_size);
    (buf, offset)
}

fn alignment_offset(buf: &[u8], block_size: BlockSize) -> usize {
    let ptr = buf.as_ptr() as usize;
    block_size.ceil_align(ptr as u64) as usize - ptr
}
