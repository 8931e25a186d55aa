//! 缓冲池配置。
//!
//! # 模块定位（Why）
//! - 池的容量、闲置上限、回收清零等策略需要由部署方决定，而不是写死在模块级单例里；
//! - 配置结构派生 `serde`，可以挂在宿主应用的 TOML/JSON 配置树下直接反序列化。
//!
//! # 契约说明（What）
//! - 所有字段都有默认值（`#[serde(default)]`），缺省配置即三档标准尺寸 1 KiB / 8 KiB / 64 KiB；
//! - 分档配置中某一档只写了部分字段时，缺失的 `capacity` 取该档自己的标准尺寸，而不是单池默认值；
//! - 使用前调用 `validate`，非法组合返回 [`AllocError::InvalidConfig`]。

use serde::{Deserialize, Serialize};

use crate::{AllocError, HEADROOM, Result};

/// 小档底层存储容量（含头部预留）。
pub const SMALL_CAPACITY: usize = 1024;
/// 中档底层存储容量（含头部预留）。
pub const MEDIUM_CAPACITY: usize = 8 * 1024;
/// 大档底层存储容量（含头部预留）。
pub const LARGE_CAPACITY: usize = 64 * 1024;

/// 单个池的配置。
///
/// # 字段说明
/// - `capacity`：底层存储总字节数 `C`，必须不小于 [`HEADROOM`]；
/// - `max_idle`：闲置存储保留上限，`None` 表示不设上限，超出部分在归还时直接丢弃；
/// - `zero_on_release`：归还时是否清零。默认关闭：复用的存储会暴露上一次使用残留的字节，
///   处理敏感数据的部署应显式开启；
/// - `prefill`：构造池时预先创建的闲置存储数量。
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub capacity: usize,
    pub max_idle: Option<usize>,
    pub zero_on_release: bool,
    pub prefill: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::with_capacity(MEDIUM_CAPACITY)
    }
}

impl PoolConfig {
    /// 以给定存储容量构造其余字段取默认值的配置。
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            max_idle: None,
            zero_on_release: false,
            prefill: 0,
        }
    }

    /// 校验字段组合。
    pub fn validate(&self) -> Result<()> {
        if self.capacity < HEADROOM {
            return Err(AllocError::invalid_config(format!(
                "capacity {} is smaller than the {HEADROOM}-byte headroom",
                self.capacity
            )));
        }
        if let Some(max_idle) = self.max_idle {
            if self.prefill > max_idle {
                return Err(AllocError::invalid_config(format!(
                    "prefill {} exceeds max_idle {max_idle}",
                    self.prefill
                )));
            }
        }
        Ok(())
    }

    /// 该配置下缓冲初始窗口可承载的字节数，即 `C - HEADROOM`。
    pub fn usable(&self) -> usize {
        self.capacity.saturating_sub(HEADROOM)
    }
}

/// 三档标准尺寸的配置集合。
///
/// 反序列化时先读成各档字段可缺省的中间形态，缺省容量按档位补齐。
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSizeClassConfig")]
pub struct SizeClassConfig {
    pub small: PoolConfig,
    pub medium: PoolConfig,
    pub large: PoolConfig,
}

impl Default for SizeClassConfig {
    fn default() -> Self {
        Self {
            small: PoolConfig::with_capacity(SMALL_CAPACITY),
            medium: PoolConfig::with_capacity(MEDIUM_CAPACITY),
            large: PoolConfig::with_capacity(LARGE_CAPACITY),
        }
    }
}

impl SizeClassConfig {
    /// 校验每一档配置，并要求容量严格递增，否则分档选择会失去意义。
    pub fn validate(&self) -> Result<()> {
        self.small.validate()?;
        self.medium.validate()?;
        self.large.validate()?;
        if !(self.small.capacity < self.medium.capacity
            && self.medium.capacity < self.large.capacity)
        {
            return Err(AllocError::invalid_config(format!(
                "size classes must be strictly ascending, got {} / {} / {}",
                self.small.capacity, self.medium.capacity, self.large.capacity
            )));
        }
        Ok(())
    }
}

/// 分档配置中单档的原始形态：`capacity` 缺省时由所在档位决定。
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawClassConfig {
    capacity: Option<usize>,
    max_idle: Option<usize>,
    zero_on_release: bool,
    prefill: usize,
}

impl RawClassConfig {
    fn resolve(self, class_capacity: usize) -> PoolConfig {
        PoolConfig {
            capacity: self.capacity.unwrap_or(class_capacity),
            max_idle: self.max_idle,
            zero_on_release: self.zero_on_release,
            prefill: self.prefill,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSizeClassConfig {
    small: RawClassConfig,
    medium: RawClassConfig,
    large: RawClassConfig,
}

impl From<RawSizeClassConfig> for SizeClassConfig {
    fn from(raw: RawSizeClassConfig) -> Self {
        Self {
            small: raw.small.resolve(SMALL_CAPACITY),
            medium: raw.medium.resolve(MEDIUM_CAPACITY),
            large: raw.large.resolve(LARGE_CAPACITY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_standard_classes() {
        let config = SizeClassConfig::default();
        assert_eq!(config.small.capacity, 1024);
        assert_eq!(config.medium.capacity, 8192);
        assert_eq!(config.large.capacity, 65536);
        assert!(config.validate().is_ok());
        assert_eq!(config.small.usable(), 1024 - HEADROOM);
    }

    #[test]
    fn rejects_capacity_below_headroom() {
        let err = PoolConfig::with_capacity(HEADROOM - 1)
            .validate()
            .expect_err("容量小于头部预留应被拒绝");
        assert!(matches!(err, AllocError::InvalidConfig { .. }));
    }

    #[test]
    fn rejects_prefill_over_idle_cap() {
        let config = PoolConfig {
            max_idle: Some(2),
            prefill: 3,
            ..PoolConfig::with_capacity(64)
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unordered_classes() {
        let mut config = SizeClassConfig::default();
        config.medium.capacity = config.large.capacity;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_sections_resolve_to_standard_classes() {
        assert_eq!(
            SizeClassConfig::from(RawSizeClassConfig::default()),
            SizeClassConfig::default()
        );
    }

    #[test]
    fn partial_class_keeps_its_own_capacity() {
        let raw = RawSizeClassConfig {
            large: RawClassConfig {
                prefill: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        let config = SizeClassConfig::from(raw);
        assert_eq!(config.large.capacity, LARGE_CAPACITY);
        assert_eq!(config.large.prefill, 2);
        assert!(config.validate().is_ok());
    }
}
