//! 三档标准尺寸的缓冲池集合。
//!
//! # 模块定位（Why）
//! - 报文大小跨度很大：控制包不足 1 KiB，批量载荷可达 64 KiB；单一档位要么浪费内存、要么频繁扩容逃逸；
//! - `SizeClassPools` 由宿主显式构造，再以克隆句柄注入各连接或流水线，不存在进程级默认池，
//!   测试之间也不会互相污染闲置列表。
//!
//! # 选择规则（How）
//! - 请求的逻辑大小与各档“可用容量”（存储容量减去头部预留）比较，自小档起取第一个能容纳的档位；
//! - 超过大档可用容量的请求仍返回大档缓冲，后续追加由缓冲自身的扩容路径兜底。

use crate::{Buffer, Pool, PoolStats, Result, SizeClassConfig};

/// 尺寸档位。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SizeClass {
    Small,
    Medium,
    Large,
}

/// 小 / 中 / 大三档缓冲池。
#[derive(Clone, Debug)]
pub struct SizeClassPools {
    small: Pool,
    medium: Pool,
    large: Pool,
}

impl Default for SizeClassPools {
    fn default() -> Self {
        let config = SizeClassConfig::default();
        Self {
            small: Pool::from_valid(config.small),
            medium: Pool::from_valid(config.medium),
            large: Pool::from_valid(config.large),
        }
    }
}

impl SizeClassPools {
    pub fn new(config: SizeClassConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            small: Pool::from_valid(config.small),
            medium: Pool::from_valid(config.medium),
            large: Pool::from_valid(config.large),
        })
    }

    /// 能容纳 `size` 字节的最小档位。
    pub fn size_class(&self, size: usize) -> SizeClass {
        if size <= self.small.config().usable() {
            SizeClass::Small
        } else if size <= self.medium.config().usable() {
            SizeClass::Medium
        } else {
            SizeClass::Large
        }
    }

    pub fn pool(&self, class: SizeClass) -> &Pool {
        match class {
            SizeClass::Small => &self.small,
            SizeClass::Medium => &self.medium,
            SizeClass::Large => &self.large,
        }
    }

    /// 按逻辑大小从最小可容纳档位租借缓冲。
    pub fn allocate(&self, size: usize) -> Buffer {
        self.pool(self.size_class(size)).allocate()
    }

    pub fn allocate_small(&self) -> Buffer {
        self.small.allocate()
    }

    pub fn allocate_medium(&self) -> Buffer {
        self.medium.allocate()
    }

    pub fn allocate_large(&self) -> Buffer {
        self.large.allocate()
    }

    /// 三档统计快照，顺序为小、中、大。
    pub fn stats(&self) -> [PoolStats; 3] {
        [self.small.stats(), self.medium.stats(), self.large.stats()]
    }
}
