//! Lump Storage Data Region.
//!
//! `lumpstore`は、ログ構造型key-valueストレージにおける「データ領域」の実装.
//!
//! 可変長のバイト列(lump)を、ブロック単位でアドレス指定されるデバイス上に格納し、
//! 後から取得・部分更新・解放するための機能を提供する.
//!
//! # 特徴
//!
//! - 全ての計算は、サポートされる最小のブロックサイズ([BlockSize::MIN])を単位として行われる
//!   - そのため、どのブロックサイズのデバイスからでも、書き込まれたデータを読み出すことが可能
//! - 各レコードの末尾には、パディング長を保持する2バイトのトレイラが付与される
//! - 部分更新および部分取得は、レコードが最初に確保した領域の外側を読み書きすることはない
//! - 内部でのロックやリトライは行わず、全ての操作は同期的に実行される
//!
//! # モジュールの依存関係
//!
//! ```text
//! storage => (nvm, storage::allocator) => block
//! ```
//!
//! - [storage]モジュール:
//!   - 主に[DataRegion]構造体を提供
//!   - 領域の割当を[Allocate]トレイトに、実際のI/Oを[NonVolatileMemory]トレイトに委譲する
//! - [nvm]モジュール:
//!   - 主に[NonVolatileMemory]トレイトとその実装群を提供
//! - [block]モジュール:
//!   - ブロックサイズおよびアライメントされたバイト列を提供
//!
//! [BlockSize::MIN]: ./block/struct.BlockSize.html#associatedconstant.MIN
//! [storage]: ./storage/index.html
//! [DataRegion]: ./storage/struct.DataRegion.html
//! [Allocate]: ./storage/allocator/trait.Allocate.html
//! [nvm]: ./nvm/index.html
//! [NonVolatileMemory]: ./nvm/trait.NonVolatileMemory.html
//! [block]: ./block/index.html
#![warn(missing_docs)]
extern crate byteorder;
extern crate prometrics;
#[macro_use]
extern crate slog;
#[macro_use]
extern crate trackable;

pub use crate::error::{Error, ErrorKind};

macro_rules! track_io {
    ($expr:expr) => {
        $expr.map_err(|e: ::std::io::Error| track!(crate::Error::from(e)))
    };
}

pub mod block;
pub mod lump;
pub mod metrics;
pub mod nvm;
pub mod storage;

mod error;

/// crate固有の`Result`型.
pub type Result<T> = std::result::Result<T, Error>;
