//! [Prometheus][prometheus]用のメトリクス.
//!
//! [prometheus]: https://prometheus.io/
use prometrics::metrics::{Counter, Gauge, MetricBuilder};

use crate::block::BlockSize;

/// データ領域用のアロケータのメトリクス.
#[derive(Debug, Clone)]
pub struct DataAllocatorMetrics {
    pub(crate) inserted_free_portions: Counter,
    pub(crate) removed_free_portions: Counter,
    pub(crate) allocated_portions_at_starting: Counter,
    pub(crate) allocated_portions_at_running: Counter,
    pub(crate) allocated_bytes_at_starting: Counter,
    pub(crate) allocated_bytes_at_running: Counter,
    pub(crate) released_portions: Counter,
    pub(crate) released_bytes: Counter,
    pub(crate) nospace_failures: Counter,
    pub(crate) block_size: BlockSize,
    pub(crate) capacity_bytes: u64,
}
impl DataAllocatorMetrics {
    /// 新しい`DataAllocatorMetrics`インスタンスを生成する.
    ///
    /// `capacity_bytes`はアロケータが管理するデータ領域の容量で、
    /// `block_size`は割当の単位となるブロックサイズ.
    pub fn new(builder: &MetricBuilder, capacity_bytes: u64, block_size: BlockSize) -> Self {
        let mut builder = builder.clone();
        builder.namespace("lumpstore").subsystem("data_allocator");
        DataAllocatorMetrics {
            inserted_free_portions: builder
                .counter("inserted_free_portions_total")
                .help("Number of inserted portions into free list")
                .finish()
                .expect("Never fails"),
            removed_free_portions: builder
                .counter("removed_free_portions_total")
                .help("Number of removed portions from free list")
                .finish()
                .expect("Never fails"),
            allocated_portions_at_starting: builder
                .counter("allocated_portions_total")
                .help("Number of allocated portions")
                .label("phase", "starting")
                .finish()
                .expect("Never fails"),
            allocated_portions_at_running: builder
                .counter("allocated_portions_total")
                .help("Number of allocated portions")
                .label("phase", "running")
                .finish()
                .expect("Never fails"),
            allocated_bytes_at_starting: builder
                .counter("allocated_bytes_total")
                .help("Number of allocated bytes")
                .label("phase", "starting")
                .finish()
                .expect("Never fails"),
            allocated_bytes_at_running: builder
                .counter("allocated_bytes_total")
                .help("Number of allocated bytes")
                .label("phase", "running")
                .finish()
                .expect("Never fails"),
            released_portions: builder
                .counter("released_portions_total")
                .help("Number of released portions")
                .finish()
                .expect("Never fails"),
            released_bytes: builder
                .counter("released_bytes_total")
                .help("Number of released bytes")
                .finish()
                .expect("Never fails"),
            nospace_failures: builder
                .counter("nospace_failures_total")
                .help("Number of allocation failures caused by no available space")
                .finish()
                .expect("Never fails"),
            capacity_bytes,
            block_size,
        }
    }

    /// アロケータが管理する領域の容量(バイト単位).
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    /// 割当の単位となるブロックサイズ.
    pub fn block_size(&self) -> BlockSize {
        self.block_size
    }

    /// フリーリストの長さ.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// lumpstore_data_allocator_inserted_free_portions_total - lumpstore_data_allocator_removed_free_portions_total
    /// ```
    pub fn free_list_len(&self) -> usize {
        // NOTE: 以下の順番で値を取得しないとアンダーフローする可能性がある
        let dec = self.removed_free_portions.value() as u64;
        let inc = self.inserted_free_portions.value() as u64;
        (inc - dec) as usize
    }

    /// 部分領域の割当回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// lumpstore_data_allocator_allocated_portions_total { phase="starting|running" } <COUNTER>
    /// ```
    pub fn allocated_portions(&self) -> u64 {
        self.allocated_portions_at_starting.value() as u64
            + self.allocated_portions_at_running.value() as u64
    }

    /// これまでに割り当てた部分領域のバイト数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// lumpstore_data_allocator_allocated_bytes_total { phase="starting|running" } <COUNTER>
    /// ```
    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes_at_starting.value() as u64
            + self.allocated_bytes_at_running.value() as u64
    }

    /// 部分領域の解放回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// lumpstore_data_allocator_released_portions_total <COUNTER>
    /// ```
    pub fn released_portions(&self) -> u64 {
        self.released_portions.value() as u64
    }

    /// これまでに解放された部分領域のバイト数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// lumpstore_data_allocator_released_bytes_total <COUNTER>
    /// ```
    pub fn released_bytes(&self) -> u64 {
        self.released_bytes.value() as u64
    }

    /// 空き領域不足による割当失敗回数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// lumpstore_data_allocator_nospace_failures_total <COUNTER>
    /// ```
    pub fn nospace_failures(&self) -> u64 {
        self.nospace_failures.value() as u64
    }

    /// 現在割当中のバイト数.
    pub fn usage_bytes(&self) -> u64 {
        // NOTE: 以下の順番で値を取得しないとアンダーフローする可能性がある
        let dec = self.released_bytes();
        let inc = self.allocated_bytes();
        inc - dec
    }

    pub(crate) fn count_allocation(&self, size: u16) {
        self.allocated_portions_at_running.increment();
        self.allocated_bytes_at_running
            .add_u64(u64::from(self.block_size.as_u16()) * u64::from(size));
    }

    pub(crate) fn count_releasion(&self, size: u16) {
        self.released_portions.increment();
        self.released_bytes
            .add_u64(u64::from(self.block_size.as_u16()) * u64::from(size));
    }
}

/// データ領域のメトリクス.
#[derive(Debug, Clone)]
pub struct DataRegionMetrics {
    pub(crate) capacity_bytes: Gauge,
    pub(crate) put_lumps: Counter,
    pub(crate) get_whole_lumps: Counter,
    pub(crate) get_partial_lumps: Counter,
    pub(crate) update_lumps: Counter,
    pub(crate) release_lumps: Counter,
    pub(crate) capacity_errors: Counter,
    pub(crate) out_of_range_errors: Counter,
    pub(crate) write_failures: Counter,
    allocator: Option<DataAllocatorMetrics>,
}
impl DataRegionMetrics {
    /// データ領域の容量を返す.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// lumpstore_data_region_capacity_bytes <GAUGE>
    /// ```
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes.value() as u64
    }

    /// データ領域に格納されたlumpの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// lumpstore_data_region_put_lumps_total <COUNTER>
    /// ```
    pub fn put_lumps(&self) -> u64 {
        self.put_lumps.value() as u64
    }

    /// データ領域から取得されたlumpの数.
    ///
    /// 返り値のタプルの第一要素は`kind="whole"`ラベルを持ち、第二要素は`kind="partial"`ラベルを持つ.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// lumpstore_data_region_get_lumps_total { kind="whole|partial" } <COUNTER>
    /// ```
    pub fn get_lumps(&self) -> (u64, u64) {
        (
            self.get_whole_lumps.value() as u64,
            self.get_partial_lumps.value() as u64,
        )
    }

    /// 部分更新されたlumpの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// lumpstore_data_region_update_lumps_total <COUNTER>
    /// ```
    pub fn update_lumps(&self) -> u64 {
        self.update_lumps.value() as u64
    }

    /// 解放されたlumpの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// lumpstore_data_region_release_lumps_total <COUNTER>
    /// ```
    pub fn release_lumps(&self) -> u64 {
        self.release_lumps.value() as u64
    }

    /// レコードの確保済み容量ないしデータ長を超えていたために拒否された、部分取得・部分更新の数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// lumpstore_data_region_capacity_errors_total <COUNTER>
    /// ```
    pub fn capacity_errors(&self) -> u64 {
        self.capacity_errors.value() as u64
    }

    /// 開始位置がデータの末尾を超えていたために拒否された部分取得の数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// lumpstore_data_region_out_of_range_errors_total <COUNTER>
    /// ```
    pub fn out_of_range_errors(&self) -> u64 {
        self.out_of_range_errors.value() as u64
    }

    /// 領域の割当後に、デバイスへの書き込みに失敗したPUTの数.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// lumpstore_data_region_write_failures_total <COUNTER>
    /// ```
    pub fn write_failures(&self) -> u64 {
        self.write_failures.value() as u64
    }

    /// データ領域の使用量を返す.
    ///
    /// アロケータのメトリクスが登録されていない場合には`0`となる.
    ///
    /// # Prometheus
    ///
    /// ```prometheus
    /// lumpstore_data_allocator_allocated_bytes_total - lumpstore_data_allocator_released_bytes_total
    /// ```
    pub fn usage_bytes(&self) -> u64 {
        self.allocator.as_ref().map_or(0, |a| a.usage_bytes())
    }

    /// アロケータのメトリクスを返す.
    pub fn allocator(&self) -> Option<&DataAllocatorMetrics> {
        self.allocator.as_ref()
    }

    pub(crate) fn new(builder: &MetricBuilder, capacity: u64) -> Self {
        let mut builder = builder.clone();
        builder.namespace("lumpstore").subsystem("data_region");
        let get_lumps = |kind| {
            builder
                .counter("get_lumps_total")
                .help("Number of lumps got from the data region")
                .label("kind", kind)
                .finish()
                .expect("Never fails")
        };
        DataRegionMetrics {
            capacity_bytes: builder
                .gauge("capacity_bytes")
                .help("Capacity of the data region")
                .initial_value(capacity as f64)
                .finish()
                .expect("Never fails"),
            put_lumps: builder
                .counter("put_lumps_total")
                .help("Number of lumps putted on the data region")
                .finish()
                .expect("Never fails"),
            get_whole_lumps: get_lumps("whole"),
            get_partial_lumps: get_lumps("partial"),
            update_lumps: builder
                .counter("update_lumps_total")
                .help("Number of lumps partially updated")
                .finish()
                .expect("Never fails"),
            release_lumps: builder
                .counter("release_lumps_total")
                .help("Number of lumps released from the data region")
                .finish()
                .expect("Never fails"),
            capacity_errors: builder
                .counter("capacity_errors_total")
                .help("Number of partial requests exceeding the capacity or the length of lumps")
                .finish()
                .expect("Never fails"),
            out_of_range_errors: builder
                .counter("out_of_range_errors_total")
                .help("Number of partial gets starting beyond the end of lumps")
                .finish()
                .expect("Never fails"),
            write_failures: builder
                .counter("write_failures_total")
                .help("Number of puts failed to write after allocation")
                .finish()
                .expect("Never fails"),
            allocator: None,
        }
    }

    pub(crate) fn with_allocator(mut self, allocator: DataAllocatorMetrics) -> Self {
        self.allocator = Some(allocator);
        self
    }
}

#[cfg(test)]
mod tests {
    use prometrics::metrics::MetricBuilder;

    use super::*;

    #[test]
    fn allocator_metrics_works() {
        let metrics = DataAllocatorMetrics::new(&MetricBuilder::new(), 4096, BlockSize::min());
        metrics.count_allocation(3);
        metrics.count_releasion(1);
        assert_eq!(metrics.allocated_portions(), 1);
        assert_eq!(metrics.allocated_bytes(), 1536);
        assert_eq!(metrics.released_bytes(), 512);
        assert_eq!(metrics.usage_bytes(), 1024);
    }

    #[test]
    fn region_metrics_works() {
        let builder = MetricBuilder::new();
        let allocator = DataAllocatorMetrics::new(&builder, 4096, BlockSize::min());
        let metrics = DataRegionMetrics::new(&builder, 4096).with_allocator(allocator.clone());
        assert_eq!(metrics.capacity_bytes(), 4096);
        assert_eq!(metrics.usage_bytes(), 0);

        // クローンされたカウンタは値を共有する
        allocator.count_allocation(2);
        assert_eq!(metrics.usage_bytes(), 1024);

        metrics.get_partial_lumps.increment();
        assert_eq!(metrics.get_lumps(), (0, 1));
    }
}
