//! Lump用のデータ領域.
//!
//! [DataRegion]は、領域の割当を[Allocate]トレイトの実装に、実際のI/Oを[NonVolatileMemory]の実装に委譲し、
//! 自身はレコードのレイアウト(パディングおよびトレイラ)の計算のみを担当する.
//!
//! PUTで返される[DataPortion]は、上位のインデックス等で保持されることが想定されており、
//! 永続化が必要な場合には[DataPortionU64]形式に変換すると良い.
//!
//! [DataRegion]: ./struct.DataRegion.html
//! [Allocate]: ./allocator/trait.Allocate.html
//! [NonVolatileMemory]: ../nvm/trait.NonVolatileMemory.html
//! [DataPortion]: ./struct.DataPortion.html
//! [DataPortionU64]: ./struct.DataPortionU64.html
pub use self::address::Address;
pub use self::builder::DataRegionBuilder;
pub use self::data_region::{DataRegion, PutError, LUMP_DATA_TRAILER_SIZE};
pub use self::portion::{DataPortion, DataPortionU64};

use crate::block::BlockSize;

pub mod allocator;

mod address;
mod builder;
mod data_region;
mod portion;

/// データ領域の最大サイズ(バイト単位).
///
/// およそ512TB.
pub const MAX_DATA_REGION_SIZE: u64 = Address::MAX * BlockSize::MIN as u64;
