//! データ領域用のアロケータ.
//!
//! アロケータは、データ格納用に利用可能な連続した領域を（仮想的に）受け取り、
//! 個々のlumpに対して、その中から必要なサイズの部分領域（Portion）を割り当てる責務を負っている。
//!
//! アロケータが担当するのは、領域の計算処理のみで、実際のデータの読み書き等を、この中で行うことは無い.
pub use self::data_portion_allocator::DataPortionAllocator;

use crate::metrics::DataAllocatorMetrics;
use crate::storage::portion::DataPortion;

mod data_portion_allocator;

/// データ領域が要求するアロケータの契約.
///
/// 割当・解放の単位は"ブロック"であり、そのサイズはデータ領域側と一致している必要がある.
///
/// 実装は、生存中の部分領域同士が重なり合うような割当を決して行ってはならない.
pub trait Allocate {
    /// `block_count`ブロック分の部分領域の割当を行う.
    ///
    /// 十分な空き領域が存在しない場合には`None`が返される.
    fn allocate(&mut self, block_count: u16) -> Option<DataPortion>;

    /// 割当済みの部分領域の解放を行う.
    ///
    /// `portion`は「以前に割当済み」かつ「未解放」の部分領域である必要がある.
    fn release(&mut self, portion: DataPortion);

    /// アロケータのメトリクスを返す.
    ///
    /// メトリクスを持たない実装の場合には`None`を返す.
    fn metrics(&self) -> Option<&DataAllocatorMetrics> {
        None
    }
}
