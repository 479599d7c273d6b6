use prometrics::metrics::MetricBuilder;
use slog::{Discard, Logger};

use crate::block::BlockSize;
use crate::metrics::DataRegionMetrics;
use crate::nvm::NonVolatileMemory;
use crate::storage::allocator::Allocate;
use crate::storage::DataRegion;
use crate::{ErrorKind, Result};

/// `DataRegion`のビルダ.
#[derive(Debug, Clone)]
pub struct DataRegionBuilder {
    logger: Logger,
    metrics: MetricBuilder,
}
impl DataRegionBuilder {
    /// デフォルト設定で`DataRegionBuilder`インスタンスを生成する.
    pub fn new() -> Self {
        DataRegionBuilder {
            logger: Logger::root(Discard, o!()),
            metrics: MetricBuilder::new(),
        }
    }

    /// データ領域が使用するロガーを登録する.
    ///
    /// デフォルト値は`Logger::root(Discard, o!())`.
    pub fn logger(&mut self, logger: Logger) -> &mut Self {
        self.logger = logger;
        self
    }

    /// メトリクス用の共通設定を登録する.
    ///
    /// デフォルト値は`MetricBuilder::new()`.
    pub fn metrics(&mut self, metrics: MetricBuilder) -> &mut Self {
        self.metrics = metrics;
        self
    }

    /// 指定されたアロケータと不揮発性メモリを用いて、`DataRegion`インスタンスを生成する.
    ///
    /// アロケータがメトリクスを公開している場合には、その容量がデータ領域の容量として扱われる.
    ///
    /// # Errors
    ///
    /// 以下のいずれかに該当する場合には、種類が`ErrorKind::InvalidInput`のエラーが返される:
    ///
    /// - アロケータのブロックサイズが`BlockSize::min()`と異なる
    /// - アロケータの容量が、不揮発性メモリの容量を超えている
    pub fn finish<A, N>(&self, allocator: A, nvm: N) -> Result<DataRegion<A, N>>
    where
        A: Allocate,
        N: NonVolatileMemory,
    {
        let mut capacity = nvm.capacity();
        let allocator_metrics = allocator.metrics().cloned();
        if let Some(ref m) = allocator_metrics {
            track_assert_eq!(m.block_size(), BlockSize::min(), ErrorKind::InvalidInput);
            track_assert!(
                m.capacity_bytes() <= nvm.capacity(),
                ErrorKind::InvalidInput,
                "allocator_capacity={}, nvm_capacity={}",
                m.capacity_bytes(),
                nvm.capacity()
            );
            capacity = m.capacity_bytes();
        }

        let mut metrics = DataRegionMetrics::new(&self.metrics, capacity);
        if let Some(m) = allocator_metrics {
            metrics = metrics.with_allocator(m);
        }
        debug!(self.logger, "Data region is created"; "capacity" => capacity);
        Ok(DataRegion::with_parts(
            allocator,
            nvm,
            self.logger.clone(),
            metrics,
        ))
    }
}
impl Default for DataRegionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use prometrics::metrics::MetricBuilder;
    use trackable::result::TestResult;

    use super::*;
    use crate::block::BlockSize;
    use crate::metrics::DataAllocatorMetrics;
    use crate::nvm::MemoryNvm;
    use crate::storage::allocator::DataPortionAllocator;

    #[test]
    fn finish_works() -> TestResult {
        let allocator = track!(allocator(8))?;
        let nvm = MemoryNvm::new(vec![0; 8192]);
        let region = track!(DataRegionBuilder::new().finish(allocator, nvm))?;
        assert_eq!(region.block_size(), BlockSize::min());
        assert_eq!(region.metrics().capacity_bytes(), 4096);
        assert!(region.metrics().allocator().is_some());
        Ok(())
    }

    #[test]
    fn too_small_nvm_is_rejected() -> TestResult {
        let allocator = track!(allocator(8))?;
        let nvm = MemoryNvm::new(vec![0; 2048]);
        let e = DataRegionBuilder::new().finish(allocator, nvm).err();
        assert_eq!(e.map(|e| *e.kind()), Some(ErrorKind::InvalidInput));
        Ok(())
    }

    fn allocator(capacity_blocks: u64) -> Result<DataPortionAllocator> {
        let block_size = BlockSize::min();
        let metrics = DataAllocatorMetrics::new(
            &MetricBuilder::new(),
            capacity_blocks * u64::from(block_size.as_u16()),
            block_size,
        );
        track!(DataPortionAllocator::build(metrics, Vec::new()))
    }
}
