//! courier-core
//!
//! Durable delivery of side-effecting HTTP requests for clients with flaky
//! connectivity.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, request, operation, state）
//! - **ports**: 抽象化レイヤー（Sender, KeyValueStore, Clock, IdGenerator）
//! - **impls**: 実装（ReqwestSender, FileStore, MemoryStore）
//! - **transport**: タイムアウト + 指数バックオフの HTTP 実行
//! - **queue**: 永続化キュー、処理ループ、変更通知
//! - **classify**: エラー分類とユーザー向けメッセージ
//! - **app**: 接続状態ブリッジと CourierBuilder
//! - **config / logging**: 設定ファイルと tracing の初期化

pub mod app;
pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod logging;
pub mod ports;
pub mod queue;
pub mod transport;

#[cfg(test)]
mod testing;

pub use app::{Connectivity, Courier, CourierBuilder};
pub use error::{CourierError, StoreError};
pub use queue::{ProcessReport, QueueManager};
