use alloc::{sync::Arc, vec::Vec};
use core::{
    mem,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

use bytes::BytesMut;
use spin::Mutex;
use tracing::{debug, trace, warn};

use crate::{Buffer, PoolConfig, Result};

/// 池内槽位标识：槽位下标加代际计数。
///
/// 每次租借都会递增槽位代际，因此旧租约在槽位被再次租出后无法冒充新租约，
/// 池在回收时据此拒绝过期句柄，而不是让它与新内容别名。
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SlotId {
    index: usize,
    generation: u64,
}

impl SlotId {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// `Pool` 提供单一尺寸档位的可回收底层存储，基于槽位表（slab）与闲置索引实现。
///
/// # 模块角色（Why）
/// - 网络收发路径每个报文都需要一块缓冲，逐包向堆申请会让分配开销主导成本；
/// - 池把归还的 `BytesMut` 留在槽位里，下一次 [`allocate`](Pool::allocate) 直接取用，
///   只有在没有闲置存储时才新建。
///
/// # 核心机制（How）
/// - 内部维护 `spin::Mutex<Slab>`：`slots` 记录每个槽位的状态（租出 / 闲置 / 空置）与代际，
///   `idle`、`vacant` 两个索引栈分别指向闲置与空置槽位；
/// - `PoolMetrics` 以原子计数记录租借、复用、未命中、逃逸与拒绝次数，支撑 [`stats`](Pool::stats) 快照；
/// - `Pool` 本身是 `Arc` 包装的廉价句柄，可以克隆后注入到每个需要缓冲的连接或流水线阶段，
///   不依赖任何进程级单例。
///
/// # 契约说明（What）
/// - **线程安全**：`allocate` 与归还路径可在任意线程并发调用，调用方无需额外加锁；
/// - **复用顺序**：不保证取回哪一块闲置存储；
/// - **内容**：新租出的缓冲窗口为 `[HEADROOM, C)`，内容是上一次使用残留的任意字节，**不清零**；
///   需要空缓冲时调用 [`Buffer::clear`]，需要归还时清零则开启 `zero_on_release`。
///
/// # 设计权衡（Trade-offs）
/// - 使用自旋锁（`spin::Mutex`）而非操作系统互斥量：临界区只有几次下标操作，且不会阻塞；
/// - 闲置上限默认不设（`max_idle = None`），突发归还会让闲置存储一直保留到 [`shrink`](Pool::shrink)；
///   需要限制驻留内存的部署应显式配置上限。
#[derive(Clone)]
pub struct Pool {
    shared: Arc<PoolShared>,
}

impl Pool {
    /// 按配置构造池，配置非法时返回 [`AllocError::InvalidConfig`](crate::AllocError::InvalidConfig)。
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    /// 以默认策略构造指定存储容量的池。
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::new(PoolConfig::with_capacity(capacity))
    }

    /// 调用方已确认配置合法。
    pub(crate) fn from_valid(config: PoolConfig) -> Self {
        Self {
            shared: Arc::new(PoolShared::new(config)),
        }
    }

    /// 底层存储容量 `C`（含头部预留）。
    pub fn capacity(&self) -> usize {
        self.shared.config.capacity
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// 租出一个缓冲：优先复用闲置存储，否则新建。
    ///
    /// 返回的缓冲窗口覆盖整个尾部容量 `[HEADROOM, C)`，内容未初始化语义（残留字节）。
    pub fn allocate(&self) -> Buffer {
        let (slot, store) = self.shared.lease();
        Buffer::from_lease(
            store,
            Lease {
                pool: Arc::clone(&self.shared),
                slot,
            },
        )
    }

    /// 槽位是否仍被该标识对应的租约持有；代际不符或已归还时为 `false`。
    pub fn is_leased(&self, slot: SlotId) -> bool {
        let slab = self.shared.slab.lock();
        slab.slots.get(slot.index).is_some_and(|entry| {
            entry.generation == slot.generation && matches!(entry.state, SlotState::Leased)
        })
    }

    /// 丢弃全部闲置存储，返回释放的字节数。
    pub fn shrink(&self) -> usize {
        let released = {
            let mut guard = self.shared.slab.lock();
            let slab = &mut *guard;
            let mut released = Vec::with_capacity(slab.idle.len());
            for index in slab.idle.drain(..) {
                let entry = &mut slab.slots[index];
                if let SlotState::Idle(store) = mem::replace(&mut entry.state, SlotState::Vacant) {
                    released.push(store);
                }
                slab.vacant.push(index);
            }
            released
        };
        let bytes: usize = released.iter().map(BytesMut::len).sum();
        debug!(
            capacity = self.capacity(),
            stores = released.len(),
            bytes,
            "pool shrunk"
        );
        bytes
    }

    /// 读取统计快照。
    pub fn stats(&self) -> PoolStats {
        let (idle, slots) = {
            let slab = self.shared.slab.lock();
            (slab.idle.len(), slab.slots.len())
        };
        let metrics = &self.shared.metrics;
        PoolStats {
            capacity: self.capacity(),
            live: metrics.live.load(Ordering::Relaxed),
            idle,
            slots,
            allocations: metrics.allocations.load(Ordering::Relaxed),
            reuses: metrics.reuses.load(Ordering::Relaxed),
            misses: metrics.misses.load(Ordering::Relaxed),
            escaped: metrics.escaped.load(Ordering::Relaxed),
            rejected: metrics.rejected.load(Ordering::Relaxed),
        }
    }
}

impl core::fmt::Debug for Pool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

/// 池的统计快照。
///
/// - `live`：当前租出的缓冲数；
/// - `idle` / `slots`：闲置存储数与槽位总数；
/// - `allocations` / `reuses` / `misses`：累计租借、命中闲置、新建存储次数；
/// - `escaped`：因追加扩容而未能回到池中的存储数；
/// - `rejected`：被拒绝的过期回收次数。
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PoolStats {
    pub capacity: usize,
    pub live: usize,
    pub idle: usize,
    pub slots: usize,
    pub allocations: u64,
    pub reuses: u64,
    pub misses: u64,
    pub escaped: u64,
    pub rejected: u64,
}

/// 缓冲对所属池的回指：持有池共享状态与租借时获得的槽位标识。
pub(crate) struct Lease {
    pool: Arc<PoolShared>,
    slot: SlotId,
}

impl Lease {
    pub(crate) fn slot(&self) -> SlotId {
        self.slot
    }

    /// 结束租约。`store` 为 `None` 表示原存储已因扩容被替换，只需空出槽位。
    pub(crate) fn finish(self, store: Option<BytesMut>) {
        self.pool.reclaim(self.slot, store);
    }
}

enum SlotState {
    Leased,
    Idle(BytesMut),
    Vacant,
}

struct Slot {
    generation: u64,
    state: SlotState,
}

#[derive(Default)]
struct Slab {
    slots: Vec<Slot>,
    idle: Vec<usize>,
    vacant: Vec<usize>,
}

struct PoolShared {
    config: PoolConfig,
    slab: Mutex<Slab>,
    metrics: PoolMetrics,
}

impl PoolShared {
    fn new(config: PoolConfig) -> Self {
        let mut slab = Slab::default();
        for index in 0..config.prefill {
            slab.slots.push(Slot {
                generation: 0,
                state: SlotState::Idle(new_store(config.capacity)),
            });
            slab.idle.push(index);
        }
        Self {
            config,
            slab: Mutex::new(slab),
            metrics: PoolMetrics::default(),
        }
    }

    /// 取出一个槽位并将其标记为租出，返回槽位标识与底层存储。
    fn lease(&self) -> (SlotId, BytesMut) {
        let (slot, previous) = {
            let mut guard = self.slab.lock();
            let slab = &mut *guard;
            let index = match slab.idle.pop().or_else(|| slab.vacant.pop()) {
                Some(index) => index,
                None => {
                    slab.slots.push(Slot {
                        generation: 0,
                        state: SlotState::Vacant,
                    });
                    slab.slots.len() - 1
                }
            };
            let entry = &mut slab.slots[index];
            entry.generation = entry.generation.wrapping_add(1);
            let previous = mem::replace(&mut entry.state, SlotState::Leased);
            (
                SlotId {
                    index,
                    generation: entry.generation,
                },
                previous,
            )
        };

        self.metrics.allocations.fetch_add(1, Ordering::Relaxed);
        self.metrics.live.fetch_add(1, Ordering::Relaxed);
        let store = match previous {
            SlotState::Idle(store) => {
                self.metrics.reuses.fetch_add(1, Ordering::Relaxed);
                trace!(
                    capacity = self.config.capacity,
                    slot = slot.index,
                    generation = slot.generation,
                    "reusing idle backing store"
                );
                store
            }
            SlotState::Vacant | SlotState::Leased => {
                self.metrics.misses.fetch_add(1, Ordering::Relaxed);
                debug!(
                    capacity = self.config.capacity,
                    slot = slot.index,
                    generation = slot.generation,
                    "pool miss, constructing backing store"
                );
                new_store(self.config.capacity)
            }
        };
        (slot, store)
    }

    /// 回收槽位。代际或状态不匹配的回收被拒绝，存储直接丢弃。
    fn reclaim(&self, slot: SlotId, store: Option<BytesMut>) {
        let store = store
            .filter(|store| store.len() == self.config.capacity)
            .map(|mut store| {
                if self.config.zero_on_release {
                    store.fill(0);
                }
                store
            });

        enum Outcome {
            Kept,
            OverCap,
            Escaped,
            Rejected,
        }

        let outcome = {
            let mut guard = self.slab.lock();
            let slab = &mut *guard;
            match slab.slots.get_mut(slot.index) {
                Some(entry)
                    if entry.generation == slot.generation
                        && matches!(entry.state, SlotState::Leased) =>
                {
                    let keep = self
                        .config
                        .max_idle
                        .is_none_or(|max_idle| slab.idle.len() < max_idle);
                    match store {
                        Some(store) if keep => {
                            entry.state = SlotState::Idle(store);
                            slab.idle.push(slot.index);
                            Outcome::Kept
                        }
                        Some(_) => {
                            entry.state = SlotState::Vacant;
                            slab.vacant.push(slot.index);
                            Outcome::OverCap
                        }
                        None => {
                            entry.state = SlotState::Vacant;
                            slab.vacant.push(slot.index);
                            Outcome::Escaped
                        }
                    }
                }
                _ => Outcome::Rejected,
            }
        };

        match outcome {
            Outcome::Rejected => {
                self.metrics.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(
                    capacity = self.config.capacity,
                    slot = slot.index,
                    generation = slot.generation,
                    "rejecting reclaim of stale slot"
                );
                return;
            }
            Outcome::OverCap => debug!(
                capacity = self.config.capacity,
                slot = slot.index,
                "idle cap reached, dropping backing store"
            ),
            Outcome::Escaped => {
                self.metrics.escaped.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Kept => {}
        }
        saturating_sub(&self.metrics.live, 1);
    }
}

#[derive(Default)]
struct PoolMetrics {
    live: AtomicUsize,
    allocations: AtomicU64,
    reuses: AtomicU64,
    misses: AtomicU64,
    escaped: AtomicU64,
    rejected: AtomicU64,
}

fn new_store(capacity: usize) -> BytesMut {
    BytesMut::zeroed(capacity)
}

fn saturating_sub(target: &AtomicUsize, value: usize) {
    let _ = target.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_sub(value))
    });
}
