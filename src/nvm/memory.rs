use std::cmp;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use crate::block::BlockSize;
use crate::nvm::NonVolatileMemory;
use crate::{ErrorKind, Result};

/// メモリベースの`NonVolatileMemory`の実装.
///
/// 容量は生成時に渡されたバイト列の長さで固定され、それを超える書き込みは行われない.
///
/// # 注意
///
/// これは主にテストや性能計測用途を意図した実装であり、
/// `NonVolatileMemory`が本来要求する"不揮発性"は満たしていない.
#[derive(Debug)]
pub struct MemoryNvm {
    memory: Cursor<Vec<u8>>,
}
impl MemoryNvm {
    /// 新しい`MemoryNvm`インスタンスを生成する.
    pub fn new(memory: Vec<u8>) -> Self {
        MemoryNvm {
            memory: Cursor::new(memory),
        }
    }

    /// メモリの内容を返す.
    pub fn as_bytes(&self) -> &[u8] {
        self.memory.get_ref()
    }

    fn remaining(&self) -> usize {
        self.capacity().saturating_sub(self.position()) as usize
    }

    fn seek_impl(&mut self, position: u64) -> Result<()> {
        track_assert!(
            self.block_size().is_aligned(position),
            ErrorKind::InvalidInput,
            "Unaligned position: {}",
            position
        );
        self.memory.set_position(position);
        Ok(())
    }
    fn read_impl(&mut self, buf: &mut [u8]) -> Result<usize> {
        track_assert!(
            self.block_size().is_aligned(buf.len() as u64),
            ErrorKind::InvalidInput,
            "Unaligned buffer length: {}",
            buf.len()
        );
        track_io!(self.memory.read(buf))
    }
    fn write_impl(&mut self, buf: &[u8]) -> Result<usize> {
        track_assert!(
            self.block_size().is_aligned(buf.len() as u64),
            ErrorKind::InvalidInput,
            "Unaligned buffer length: {}",
            buf.len()
        );

        // `Cursor<Vec<u8>>`は末尾を超えた書き込みで伸長してしまうので、容量内に切り詰める
        let len = cmp::min(self.remaining(), buf.len());
        track_io!(self.memory.write_all(&buf[..len]))?;
        Ok(len)
    }
}
impl NonVolatileMemory for MemoryNvm {
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
    fn position(&self) -> u64 {
        self.memory.position()
    }
    fn capacity(&self) -> u64 {
        self.memory.get_ref().len() as u64
    }
    fn block_size(&self) -> BlockSize {
        BlockSize::min()
    }
}
impl Seek for MemoryNvm {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let position = self.convert_to_offset(pos)?;
        track!(self.seek_impl(position))?;
        Ok(position)
    }
}
impl Read for MemoryNvm {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read_size = track!(self.read_impl(buf))?;
        Ok(read_size)
    }
}
impl Write for MemoryNvm {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written_size = track!(self.write_impl(buf))?;
        Ok(written_size)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek, SeekFrom, Write};
    use trackable::result::TestResult;

    use super::*;
    use crate::nvm::NonVolatileMemory;

    #[test]
    fn it_works() -> TestResult {
        let mut nvm = MemoryNvm::new(vec![0; 1024]);
        assert_eq!(nvm.capacity(), 1024);
        assert_eq!(nvm.position(), 0);

        let mut buf = vec![0; 512];
        track_io!(nvm.read_exact(&mut buf))?;
        assert_eq!(buf, vec![0; 512]);
        assert_eq!(nvm.position(), 512);

        track_io!(nvm.write_all(&[1; 512][..]))?;
        assert_eq!(nvm.position(), 1024);

        track_io!(nvm.seek(SeekFrom::Start(512)))?;
        assert_eq!(nvm.position(), 512);

        track_io!(nvm.read_exact(&mut buf))?;
        assert_eq!(buf, vec![1; 512]);
        assert_eq!(nvm.position(), 1024);
        Ok(())
    }

    #[test]
    fn capacity_is_fixed() -> TestResult {
        let mut nvm = MemoryNvm::new(vec![0; 512]);

        track_io!(nvm.seek(SeekFrom::Start(0)))?;
        assert!(nvm.write_all(&[2; 1024][..]).is_err());
        assert_eq!(nvm.capacity(), 512);
        assert_eq!(nvm.as_bytes(), &[2; 512][..]);

        let mut buf = vec![0; 512];
        assert!(nvm.read_exact(&mut buf).is_err());
        assert!(nvm.seek(SeekFrom::Start(1024)).is_err());
        Ok(())
    }

    #[test]
    fn unaligned_access_is_rejected() -> TestResult {
        let mut nvm = MemoryNvm::new(vec![0; 1024]);
        assert!(nvm.seek(SeekFrom::Start(10)).is_err());
        assert!(nvm.write_all(&[0; 10][..]).is_err());

        let mut buf = vec![0; 100];
        assert!(nvm.read_exact(&mut buf).is_err());
        Ok(())
    }
}
