use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::block::BlockSize;
use crate::nvm::{MemoryNvm, NonVolatileMemory};
use crate::{Error, Result};

/// クローン間で内容を共有する[`MemoryNvm`](./struct.MemoryNvm.html).
///
/// データ領域に渡したインスタンスの内容を、外部から検査するために使用する.
/// 読み書き用のカーソルも共有される.
#[derive(Debug, Clone)]
pub struct SharedMemoryNvm(Arc<Mutex<MemoryNvm>>);
impl SharedMemoryNvm {
    /// 新しい`SharedMemoryNvm`インスタンスを生成する.
    pub fn new(memory: Vec<u8>) -> Self {
        SharedMemoryNvm(Arc::new(Mutex::new(MemoryNvm::new(memory))))
    }

    /// メモリの内容のコピーを返す.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let inner = track!(self.lock())?;
        Ok(inner.as_bytes().to_vec())
    }

    fn lock(&self) -> Result<MutexGuard<MemoryNvm>> {
        self.0.lock().map_err(|e| track!(Error::from(e)))
    }
}
impl NonVolatileMemory for SharedMemoryNvm {
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
    fn position(&self) -> u64 {
        self.lock().map(|m| m.position()).unwrap_or(0)
    }
    fn capacity(&self) -> u64 {
        self.lock().map(|m| m.capacity()).unwrap_or(0)
    }
    fn block_size(&self) -> BlockSize {
        BlockSize::min()
    }
}
impl Seek for SharedMemoryNvm {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        track!(self.lock())?.seek(pos)
    }
}
impl Read for SharedMemoryNvm {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        track!(self.lock())?.read(buf)
    }
}
impl Write for SharedMemoryNvm {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        track!(self.lock())?.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
