//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（HTTP, 永続化ストレージ, 時刻）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod id_generator;
pub mod kv_store;
pub mod sender;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::kv_store::KeyValueStore;
pub use self::sender::Sender;
