//! KeyValueStore port - 永続化バックエンドの抽象化
//!
//! キュー本体はこの trait しか知りません。バックエンドは差し替え可能です。
//! - **MemoryStore**: テスト用・揮発
//! - **FileStore**: key ごとに 1 ファイル（本番用）

use async_trait::async_trait;

use crate::error::StoreError;

/// String-valued key/value persistence.
///
/// Implementations must make `set` atomic per key: a reader sees either the
/// old value or the new one, never a torn write.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
