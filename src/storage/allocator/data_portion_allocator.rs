//! Data Portion Allocator.
use std::collections::{BTreeMap, BTreeSet};

use super::Allocate;
use crate::metrics::DataAllocatorMetrics;
use crate::storage::portion::DataPortion;
use crate::storage::Address;
use crate::{ErrorKind, Result};

/// データ領域用のアロケータ.
///
/// 指定された容量を有するデータ領域から、個々のlumpに必要な部分領域の割当を担当する.
///
/// 割当の単位は"バイト"ではなく、"ブロック"となる.
///
/// この実装自体は、完全にメモリ上のデータ構造であり、状態は永続化されない.
/// 再起動時には、上位層(e.g., インデックス)が保持している割当済みの部分領域群から状態を復元する.
///
/// # 割当戦略
///
/// "BestFit"戦略を採用している.
///
/// 空き領域は「(サイズ, 開始位置)順の集合」と「開始位置をキーとするマップ」の二つで管理される.
/// 割当時には前者から要求サイズ以上で最小のものを選び、余剰分は空き領域に戻す.
/// 解放時には後者を用いて前後に隣接する空き領域を探し、一つにまとめる.
#[derive(Debug)]
pub struct DataPortionAllocator {
    // (ブロック数, 開始位置)
    by_size: BTreeSet<(u64, u64)>,

    // 開始位置 => ブロック数
    by_start: BTreeMap<u64, u64>,

    metrics: DataAllocatorMetrics,
}
impl DataPortionAllocator {
    /// アロケータを構築する.
    ///
    /// `portions`には、既に割当済みの部分領域群が列挙されている.
    ///
    /// アロケータが利用可能な領域のサイズ（キャパシティ）の情報は、`metrics`から取得される.
    ///
    /// # Errors
    ///
    /// `portions`の中に、容量を超える部分領域や互いに重なり合う部分領域が含まれている場合には、
    /// 種類が`ErrorKind::InvalidInput`のエラーが返される.
    pub fn build<I>(metrics: DataAllocatorMetrics, portions: I) -> Result<Self>
    where
        I: IntoIterator<Item = DataPortion>,
    {
        let block_size = u64::from(metrics.block_size.as_u16());
        let mut portions = portions.into_iter().collect::<Vec<_>>();
        metrics
            .allocated_portions_at_starting
            .add_u64(portions.len() as u64);
        metrics
            .allocated_bytes_at_starting
            .add_u64(portions.iter().map(|p| u64::from(p.len) * block_size).sum());
        portions.sort_by_key(|p| p.start);

        let capacity = metrics.capacity_bytes / block_size;
        track_assert!(
            capacity <= Address::MAX,
            ErrorKind::InvalidInput,
            "Too large capacity: {} blocks",
            capacity
        );
        let mut allocator = DataPortionAllocator {
            by_size: BTreeSet::new(),
            by_start: BTreeMap::new(),
            metrics,
        };

        // 先頭から順に、割当済みの部分領域同士の隙間を空き領域として登録する
        let mut cursor = 0;
        for portion in portions {
            let start = portion.start.as_u64();
            let end = portion.end().as_u64();
            track_assert!(
                cursor <= start && end <= capacity,
                ErrorKind::InvalidInput,
                "Out of range or overlapped portion: {:?}",
                portion
            );
            if cursor < start {
                allocator.add_free(cursor, start - cursor);
            }
            cursor = end;
        }
        if cursor < capacity {
            allocator.add_free(cursor, capacity - cursor);
        }
        Ok(allocator)
    }

    fn add_free(&mut self, start: u64, len: u64) {
        assert!(self.by_size.insert((len, start)));
        assert!(self.by_start.insert(start, len).is_none());
        self.metrics.inserted_free_portions.increment();
    }

    fn delete_free(&mut self, start: u64, len: u64) {
        assert!(self.by_size.remove(&(len, start)));
        assert_eq!(self.by_start.remove(&start), Some(len));
        self.metrics.removed_free_portions.increment();
    }

    // 空き領域のいずれとも重なっていなければ、割当済みの領域であると判断する
    fn is_allocated_portion(&self, portion: &DataPortion) -> bool {
        let start = portion.start.as_u64();
        let end = portion.end().as_u64();
        let overlaps_prev = self
            .by_start
            .range(..=start)
            .next_back()
            .map_or(false, |(&s, &len)| start < s + len);
        let overlaps_next = self
            .by_start
            .range(start..)
            .next()
            .map_or(false, |(&s, _)| s < end);
        !(overlaps_prev || overlaps_next)
    }
}
impl Allocate for DataPortionAllocator {
    fn allocate(&mut self, block_count: u16) -> Option<DataPortion> {
        let wanted = u64::from(block_count);
        let found = self.by_size.range((wanted, 0)..).next().cloned();
        let (len, start) = match found {
            Some(free) => free,
            None => {
                self.metrics.nospace_failures.increment();
                return None;
            }
        };
        self.delete_free(start, len);
        if wanted < len {
            self.add_free(start + wanted, len - wanted);
        }

        // 容量は`build`時に`Address::MAX`以下であることが保証されている
        let allocated = DataPortion {
            start: Address::from_u64(start).expect("Never fails"),
            len: block_count,
        };
        self.metrics.count_allocation(allocated.len);
        Some(allocated)
    }

    /// # Panics
    ///
    /// `portion`が未割当の領域と重なっている場合には、現在のスレッドがパニックする.
    fn release(&mut self, portion: DataPortion) {
        assert!(
            self.is_allocated_portion(&portion),
            "Releasing an unallocated portion: {:?}",
            portion
        );
        self.metrics.count_releasion(portion.len);

        let mut start = portion.start.as_u64();
        let mut len = u64::from(portion.len);
        let prev = self
            .by_start
            .range(..start)
            .next_back()
            .map(|(&s, &l)| (s, l));
        if let Some((prev_start, prev_len)) = prev {
            if prev_start + prev_len == start {
                self.delete_free(prev_start, prev_len);
                start = prev_start;
                len += prev_len;
            }
        }
        if let Some(next_len) = self.by_start.get(&(start + len)).cloned() {
            self.delete_free(start + len, next_len);
            len += next_len;
        }
        self.add_free(start, len);
    }

    fn metrics(&self) -> Option<&DataAllocatorMetrics> {
        Some(&self.metrics)
    }
}

#[cfg(test)]
mod tests {
    use prometrics::metrics::MetricBuilder;
    use std::iter;
    use trackable::result::TestResult;

    use crate::block::BlockSize;
    use crate::metrics::DataAllocatorMetrics;
    use crate::storage::allocator::{Allocate, DataPortionAllocator};
    use crate::storage::portion::DataPortion;
    use crate::storage::Address;

    #[test]
    fn it_works() -> TestResult {
        let mut allocator = track!(DataPortionAllocator::build(metrics(24), iter::empty()))?;
        assert_eq!(allocator.allocate(10), Some(portion(0, 10)));
        assert_eq!(allocator.allocate(10), Some(portion(10, 10)));
        assert_eq!(allocator.allocate(10), None);
        assert_eq!(allocator.allocate(4), Some(portion(20, 4)));

        allocator.release(portion(10, 10));
        assert_eq!(allocator.allocate(5), Some(portion(10, 5)));
        assert_eq!(allocator.allocate(2), Some(portion(15, 2)));
        assert_eq!(allocator.allocate(4), None);

        let m = allocator.metrics().expect("Never fails");
        assert_eq!(m.free_list_len(), 1);
        assert_eq!(m.allocated_portions(), 5);
        assert_eq!(m.released_portions(), 1);
        assert_eq!(m.nospace_failures(), 2);
        assert_eq!(m.usage_bytes(), 21 * u64::from(BlockSize::MIN));
        assert_eq!(m.capacity_bytes(), 24 * u64::from(BlockSize::MIN));
        Ok(())
    }

    #[test]
    #[should_panic]
    fn releasing_unallocated_portion_panics() {
        let mut allocator =
            DataPortionAllocator::build(metrics(24), iter::empty()).expect("Unexpected panic");
        allocator.release(portion(10, 10));
    }

    #[test]
    fn rebuild() -> TestResult {
        let live = vec![portion(2, 3), portion(15, 5)];
        let mut allocator = track!(DataPortionAllocator::build(metrics(20), live))?;
        {
            let m = allocator.metrics().expect("Never fails");
            assert_eq!(m.free_list_len(), 2);
            assert_eq!(m.allocated_portions(), 2);
        }

        assert_eq!(allocator.allocate(11), None);
        assert_eq!(allocator.allocate(10), Some(portion(5, 10)));
        assert_eq!(allocator.allocate(3), None);
        assert_eq!(allocator.allocate(1), Some(portion(0, 1)));
        assert_eq!(allocator.allocate(1), Some(portion(1, 1)));
        assert_eq!(allocator.allocate(1), None);

        let m = allocator.metrics().expect("Never fails");
        assert_eq!(m.free_list_len(), 0);
        assert_eq!(m.usage_bytes(), m.capacity_bytes());
        Ok(())
    }

    #[test]
    fn rebuild_rejects_invalid_portions() {
        // 容量超過
        let live = vec![portion(15, 10)];
        assert!(DataPortionAllocator::build(metrics(20), live).is_err());

        // 重複
        let live = vec![portion(0, 10), portion(5, 10)];
        assert!(DataPortionAllocator::build(metrics(20), live).is_err());
    }

    #[test]
    fn released_portions_are_merged() -> TestResult {
        let mut allocator = track!(DataPortionAllocator::build(metrics(30), iter::empty()))?;
        let p0 = allocator.allocate(10).expect("Never fails");
        let p1 = allocator.allocate(10).expect("Never fails");
        let p2 = allocator.allocate(10).expect("Never fails");
        assert_eq!(allocator.allocate(1), None);

        allocator.release(p0);
        allocator.release(p2);
        allocator.release(p1);
        assert_eq!(allocator.metrics().map(|m| m.free_list_len()), Some(1));
        assert_eq!(allocator.allocate(30), Some(portion(0, 30)));
        Ok(())
    }

    #[test]
    fn allocate_and_release() -> TestResult {
        let mut allocator =
            track!(DataPortionAllocator::build(metrics(419_431), iter::empty()))?;

        let p0 = allocator.allocate(65).expect("Never fails");
        let p1 = allocator.allocate(65).expect("Never fails");
        let p2 = allocator.allocate(65).expect("Never fails");
        allocator.release(p0);
        allocator.release(p1);

        let p3 = allocator.allocate(65).expect("Never fails");
        let p4 = allocator.allocate(65).expect("Never fails");
        allocator.release(p2);
        allocator.release(p3);

        let p5 = allocator.allocate(65).expect("Never fails");
        let p6 = allocator.allocate(65).expect("Never fails");
        allocator.release(p4);
        allocator.release(p5);
        allocator.release(p6);
        assert_eq!(allocator.metrics().map(|m| m.usage_bytes()), Some(0));
        Ok(())
    }

    fn portion(offset: u32, length: u16) -> DataPortion {
        DataPortion {
            start: Address::from(offset),
            len: length,
        }
    }

    fn metrics(capacity_blocks: u64) -> DataAllocatorMetrics {
        let capacity_bytes = capacity_blocks * u64::from(BlockSize::MIN);
        DataAllocatorMetrics::new(&MetricBuilder::new(), capacity_bytes, BlockSize::min())
    }
}
