//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **MemoryStore**: 揮発 KeyValueStore（テスト用）
//! - **FileStore**: ファイルベースの KeyValueStore（本番用）
//! - **ReqwestSender**: reqwest による Sender

pub mod file_store;
pub mod http_sender;
pub mod memory_store;

pub use self::file_store::FileStore;
pub use self::http_sender::ReqwestSender;
pub use self::memory_store::MemoryStore;
