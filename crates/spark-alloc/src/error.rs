//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义缓冲窗口操作与池配置可能返回的错误，调用方可以用 `?` 直接传播；
//! - 区分“调用方违反契约”（头部预留耗尽、切片越界）与“配置非法”两类来源，便于告警归类。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，兼容 `std::error::Error`；
//! - `EndOfData` 不属于错误，由 [`Drain`](crate::Drain) 表达，避免与真实的数据源失败混淆；
//! - 数据源（`fill_from`）自身的 `std::io::Error` 原样透传，本模块不做二次包装。

use thiserror::Error;

/// 统一的结果别名，默认错误类型为 [`AllocError`]。
pub type Result<T, E = AllocError> = core::result::Result<T, E>;

/// 缓冲分配器的错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：头部预留区只有固定的 [`HEADROOM`](crate::HEADROOM) 字节，
///   越界前插属于编程错误，但绝不能悄悄改写窗口之外的内存，因此显式返回错误，由嵌入方决定终止还是降级。
/// - **契约 (What)**：
///   - 返回错误时缓冲窗口与底层存储保持调用前的状态；
///   - 所有变体均为 `Send + Sync + 'static`，可跨线程传播。
/// - **设计权衡 (Trade-offs)**：字段只携带 `usize` 数值，不分配堆内存，错误路径本身也保持零分配。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum AllocError {
    /// 向前扩展窗口会越过存储起点。
    ///
    /// - `requested`：本次希望向前扩展的字节数；
    /// - `available`：当前窗口起点之前仍可使用的字节数。
    #[error("headroom exhausted: requested {requested} bytes, {available} available")]
    HeadroomExhausted { requested: usize, available: usize },

    /// 切片参数超出当前窗口。
    #[error("slice [{from}, {to}) out of range for window of {len} bytes")]
    SliceOutOfRange { from: usize, to: usize, len: usize },

    /// 池或分级配置非法。
    #[error("invalid pool configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl AllocError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        AllocError::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// 是否为头部预留耗尽。
    pub fn is_headroom_exhausted(&self) -> bool {
        matches!(self, AllocError::HeadroomExhausted { .. })
    }
}
