//! `spark-alloc` 提供面向高频网络 I/O 的可回收字节缓冲与分档缓冲池。
//!
//! # 模块定位（Why）
//! - 转发报文时逐包向堆申请内存，分配开销会主导整体成本；本 crate 让底层存储在
//!   “租借 → 写入 → 释放 → 再租借”之间循环，热路径上不再分配；
//! - 协议栈经常需要在载荷前补头部，每块存储起始处预留 [`HEADROOM`] 字节，
//!   前插只移动窗口起点，不搬动载荷。
//!
//! # 设计概要（How）
//! - `buffer` 模块实现 [`Buffer`]：定长存储上的 `[start, start + len)` 窗口，
//!   支持追加、前插、切片、排空与从数据源填充，并以显式的来源标签区分池化、逃逸与本地存储；
//! - `pool` 模块实现 [`Pool`]：以带代际计数的槽位表管理闲置存储，过期句柄的回收会被拒绝；
//! - `size_class` 模块实现 [`SizeClassPools`]：小 / 中 / 大三档池，按请求大小选择最小可容纳档位；
//! - `config`、`error`、`digest` 分别承载可反序列化的池配置、错误域与摘要协作者契约。
//!
//! # 契约与边界（What）
//! - 池的租借与归还可以跨线程并发调用；单个缓冲只允许一个所有者修改，阶段之间通过移动交接；
//! - 复用的存储**不清零**，残留字节在被覆写前可见，需要时开启 [`PoolConfig::zero_on_release`]；
//! - 不负责网络 I/O，也不限制在外缓冲的总数。

extern crate alloc;

mod buffer;
mod config;
mod digest;
mod error;
mod pool;
mod size_class;

/// 每块底层存储起始处为前插保留的字节数。
pub const HEADROOM: usize = 16;

pub use buffer::{Buffer, Drain};
pub use config::{LARGE_CAPACITY, MEDIUM_CAPACITY, PoolConfig, SMALL_CAPACITY, SizeClassConfig};
pub use digest::{HeaderDigest, Truncated};
pub use error::{AllocError, Result};
pub use pool::{Pool, PoolStats, SlotId};
pub use size_class::{SizeClass, SizeClassPools};
