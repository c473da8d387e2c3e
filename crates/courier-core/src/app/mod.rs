//! App - アプリケーション層
//!
//! # 主要コンポーネント
//! - **CourierBuilder**: 構築とワイヤリング
//! - **Connectivity**: オンライン/オフラインのフラグ
//! - **ConnectivityBridge**: 再接続時にキューを処理するタスク

pub mod builder;
pub mod connectivity;

pub use self::builder::{Courier, CourierBuilder};
pub use self::connectivity::{Connectivity, ConnectivityBridge, ProcessTrigger};
