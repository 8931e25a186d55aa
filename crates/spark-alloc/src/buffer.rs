use alloc::{borrow::Cow, string::String};
use core::{cmp, fmt, mem};
use std::io;

use bytes::{Buf, BufMut, BytesMut};
use tracing::debug;

use crate::{
    AllocError, HEADROOM, Result,
    digest::HeaderDigest,
    pool::{Lease, SlotId},
};

/// 底层存储的来源。
///
/// - `Pooled`：来自池，释放时归还原存储；
/// - `Escaped`：来自池，但追加时容量不足，已换成更大的本地存储；释放时只空出槽位，大存储直接丢弃；
/// - `Local`：调用方直接构造，不归属任何池；
/// - `Released`：已释放，所有引用清空。
enum Provenance {
    Pooled(Lease),
    Escaped(Lease),
    Local,
    Released,
}

impl Provenance {
    fn label(&self) -> &'static str {
        match self {
            Provenance::Pooled(_) => "pooled",
            Provenance::Escaped(_) => "escaped",
            Provenance::Local => "local",
            Provenance::Released => "released",
        }
    }
}

/// 排空操作的结果。
///
/// `EndOfData` 是控制信号而非错误：窗口在调用前已经为空。
#[must_use]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Drain {
    /// 本次取出的字节数，恒大于零。
    Bytes(usize),
    /// 窗口已空，没有可取的数据。
    EndOfData,
}

impl Drain {
    /// 是否为 [`Drain::EndOfData`]，便于在循环条件里直接判断。
    pub fn is_end(&self) -> bool {
        matches!(self, Drain::EndOfData)
    }
}

/// `Buffer` 是定长底层存储上的可移动窗口，面向报文转发等高频收发路径。
///
/// # 设计动机（Why）
/// - 转发路径需要在载荷前面补协议头；存储起始处预留 [`HEADROOM`] 字节，
///   前插只需把窗口起点前移再写入，不必搬动载荷；
/// - 存储来自 [`Pool`](crate::Pool) 时，释放即归还，下一次租借直接复用，避免逐包分配。
///
/// # 窗口模型（How）
/// - 窗口为 `[start, start + len)`，始终满足 `start + len <= capacity()`；
/// - 追加写入窗口尾部，超出存储容量时按倍增换成更大的本地存储并复制窗口（见下文“扩容逃逸”）；
/// - 前插与 [`slice_back`](Buffer::slice_back) 把起点前移，起点之前剩余的字节数即 [`headroom`](Buffer::headroom)；
/// - [`clear`](Buffer::clear) 回到 `[HEADROOM, HEADROOM)`，[`reset`](Buffer::reset) 覆盖整块存储 `[0, C)`。
///
/// # 契约说明（What）
/// - **所有权**：`Buffer` 只能移动、不能克隆；[`release`](Buffer::release) 消耗句柄，
///   `Drop` 执行同样的释放逻辑，且对已释放的缓冲是空操作；
/// - **并发**：单个缓冲不支持并发修改，流水线阶段之间通过移动所有权交接；
/// - **未初始化内容**：新租出或复用的缓冲窗口内是残留字节，不会清零，需要空缓冲时显式调用 `clear`。
///   这是信任边界：残留字节可能来自其它连接。
///
/// # 扩容逃逸（Trade-offs）
/// - 追加超出容量时换成新的、更大的存储，新存储不受任何池管理；
/// - 一旦逃逸，释放时只通知池空出原槽位，大存储随缓冲一起丢弃。池化只优化“留在档位内”的常见路径。
pub struct Buffer {
    store: BytesMut,
    start: usize,
    len: usize,
    provenance: Provenance,
}

impl Buffer {
    pub(crate) fn from_lease(store: BytesMut, lease: Lease) -> Self {
        Self::with_provenance(store, Provenance::Pooled(lease))
    }

    /// 构造不归属任何池的本地缓冲，窗口为 `[HEADROOM, capacity)`。
    ///
    /// `capacity` 小于 [`HEADROOM`] 时按 `HEADROOM` 分配。
    pub fn local(capacity: usize) -> Self {
        let store = BytesMut::zeroed(cmp::max(capacity, HEADROOM));
        Self::with_provenance(store, Provenance::Local)
    }

    fn with_provenance(store: BytesMut, provenance: Provenance) -> Self {
        let len = store.len() - HEADROOM;
        Self {
            store,
            start: HEADROOM,
            len,
            provenance,
        }
    }

    /// 释放缓冲：池化存储归还所属池，其余情况直接丢弃。
    pub fn release(mut self) {
        self.release_in_place();
    }

    fn release_in_place(&mut self) {
        let provenance = mem::replace(&mut self.provenance, Provenance::Released);
        let store = mem::take(&mut self.store);
        self.start = 0;
        self.len = 0;
        match provenance {
            Provenance::Pooled(lease) => lease.finish(Some(store)),
            Provenance::Escaped(lease) => lease.finish(None),
            Provenance::Local | Provenance::Released => {}
        }
    }

    /// 清空内容，窗口变为 `[HEADROOM, HEADROOM)`。
    pub fn clear(&mut self) -> &mut Self {
        self.start = HEADROOM;
        self.len = 0;
        self
    }

    /// 窗口覆盖整块存储 `[0, C)`。此后已无头部预留可用。
    pub fn reset(&mut self) -> &mut Self {
        self.start = 0;
        self.len = self.store.len();
        self
    }

    /// 在窗口尾部追加字节。
    pub fn append(&mut self, data: &[u8]) -> &mut Self {
        let end = self.reserve_tail(data.len());
        self.store[end..end + data.len()].copy_from_slice(data);
        self.len += data.len();
        self
    }

    pub fn append_str(&mut self, text: &str) -> &mut Self {
        self.append(text.as_bytes())
    }

    /// 以网络字节序追加 16 位整数。
    pub fn append_u16(&mut self, value: u16) -> &mut Self {
        let end = self.reserve_tail(2);
        let mut dst = &mut self.store[end..end + 2];
        dst.put_u16(value);
        self.len += 2;
        self
    }

    /// 以网络字节序追加 32 位整数。
    pub fn append_u32(&mut self, value: u32) -> &mut Self {
        let end = self.reserve_tail(4);
        let mut dst = &mut self.store[end..end + 4];
        dst.put_u32(value);
        self.len += 4;
        self
    }

    /// 在窗口之前写入 `data` 并把起点前移。
    ///
    /// 剩余头部预留不足时返回 [`AllocError::HeadroomExhausted`]，窗口与存储均不变。
    pub fn prepend(&mut self, data: &[u8]) -> Result<&mut Self> {
        self.slice_back(data.len())?;
        self.store[self.start..self.start + data.len()].copy_from_slice(data);
        Ok(self)
    }

    pub fn prepend_u16(&mut self, value: u16) -> Result<&mut Self> {
        self.slice_back(2)?;
        let mut dst = &mut self.store[self.start..self.start + 2];
        dst.put_u16(value);
        Ok(self)
    }

    pub fn prepend_u32(&mut self, value: u32) -> Result<&mut Self> {
        self.slice_back(4)?;
        let mut dst = &mut self.store[self.start..self.start + 4];
        dst.put_u32(value);
        Ok(self)
    }

    /// 在窗口之前写入摘要，恰好消耗 `digest.digest_size()` 字节头部预留。
    pub fn prepend_digest<D: HeaderDigest + ?Sized>(&mut self, digest: &D) -> Result<&mut Self> {
        let size = digest.digest_size();
        self.slice_back(size)?;
        digest.finalize_into(&mut self.store[self.start..self.start + size]);
        Ok(self)
    }

    /// 当前窗口内容。
    pub fn as_bytes(&self) -> &[u8] {
        &self.store[self.start..self.start + self.len]
    }

    /// 当前窗口内容的可写视图，可原地改写已写入的字节（例如回填长度字段）。
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.store[self.start..self.start + self.len]
    }

    /// 把窗口收窄为相对区间 `[from, to)`。
    pub fn slice(&mut self, from: usize, to: usize) -> Result<&mut Self> {
        if from > to || to > self.len {
            return Err(AllocError::SliceOutOfRange {
                from,
                to,
                len: self.len,
            });
        }
        self.start += from;
        self.len = to - from;
        Ok(self)
    }

    /// 丢弃窗口前 `from` 字节。
    pub fn slice_from(&mut self, from: usize) -> Result<&mut Self> {
        self.slice(from, self.len)
    }

    /// 把窗口起点前移 `offset` 字节，是前插操作的底层原语。
    ///
    /// 新暴露的字节内容未定义，调用方应立即覆写。
    pub fn slice_back(&mut self, offset: usize) -> Result<&mut Self> {
        if offset > self.start {
            return Err(AllocError::HeadroomExhausted {
                requested: offset,
                available: self.start,
            });
        }
        self.start -= offset;
        self.len += offset;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 窗口已延伸到存储末尾，再追加就会触发扩容。
    pub fn is_full(&self) -> bool {
        self.tail_room() == 0
    }

    /// 底层存储容量 `C`。
    pub fn capacity(&self) -> usize {
        self.store.len()
    }

    /// 窗口起点之前仍可前插的字节数。
    pub fn headroom(&self) -> usize {
        self.start
    }

    /// 窗口末尾之后、存储末尾之前的字节数。
    pub fn tail_room(&self) -> usize {
        self.store.len() - (self.start + self.len)
    }

    /// 池化缓冲的槽位标识；本地或已释放的缓冲为 `None`。
    pub fn slot(&self) -> Option<SlotId> {
        match &self.provenance {
            Provenance::Pooled(lease) | Provenance::Escaped(lease) => Some(lease.slot()),
            Provenance::Local | Provenance::Released => None,
        }
    }

    /// 底层存储仍是池租出的原存储。
    pub fn is_pooled(&self) -> bool {
        matches!(self.provenance, Provenance::Pooled(_))
    }

    /// 是否因扩容脱离了所属池。
    pub fn has_escaped(&self) -> bool {
        matches!(self.provenance, Provenance::Escaped(_))
    }

    /// 从窗口头部取出至多 `dst.len()` 字节。
    ///
    /// 窗口为空时返回 [`Drain::EndOfData`]；恰好取完时窗口回到 `clear` 之后的状态。
    pub fn drain_into(&mut self, dst: &mut [u8]) -> Drain {
        if self.len == 0 {
            return Drain::EndOfData;
        }
        let n = cmp::min(dst.len(), self.len);
        dst[..n].copy_from_slice(&self.store[self.start..self.start + n]);
        if n == self.len {
            self.clear();
        } else {
            self.start += n;
            self.len -= n;
        }
        Drain::Bytes(n)
    }

    /// 从数据源读取一次，写入窗口末尾之后的空闲尾部容量，已有内容保持不变。
    ///
    /// 不触发扩容；尾部容量为零时数据源收到空切片。数据源的错误原样返回，窗口不变。
    pub fn fill_from<R: io::Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<usize> {
        let end = self.start + self.len;
        let n = reader.read(&mut self.store[end..])?;
        self.len += n;
        Ok(n)
    }

    /// 以文本形式返回窗口内容，非法 UTF-8 以替换字符表示。
    pub fn to_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    /// 确保窗口尾部还能容纳 `additional` 字节，返回当前窗口末尾的存储偏移。
    fn reserve_tail(&mut self, additional: usize) -> usize {
        let end = self.start + self.len;
        let needed = end + additional;
        if needed > self.store.len() {
            self.grow(needed);
        }
        end
    }

    /// 换成至少 `needed` 字节的新存储，按倍增摊销；窗口偏移保持不变。
    fn grow(&mut self, needed: usize) {
        let capacity = cmp::max(needed, self.store.len().saturating_mul(2));
        let mut grown = BytesMut::zeroed(capacity);
        let end = self.start + self.len;
        grown[..end].copy_from_slice(&self.store[..end]);
        self.store = grown;

        self.provenance = match mem::replace(&mut self.provenance, Provenance::Released) {
            Provenance::Pooled(lease) => {
                debug!(
                    slot = lease.slot().index(),
                    generation = lease.slot().generation(),
                    needed,
                    capacity,
                    "buffer outgrew its size class, backing store escapes the pool"
                );
                Provenance::Escaped(lease)
            }
            other => other,
        };
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        self.release_in_place();
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("start", &self.start)
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("provenance", &self.provenance.label())
            .finish()
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// 作为数据汇：总是接收全部字节，必要时扩容。
impl io::Write for Buffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.append(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// 作为数据源：`EndOfData` 映射为 `Ok(0)`。
impl io::Read for Buffer {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        match self.drain_into(dst) {
            Drain::Bytes(n) => Ok(n),
            Drain::EndOfData => Ok(0),
        }
    }
}

impl Buf for Buffer {
    fn remaining(&self) -> usize {
        self.len
    }

    fn chunk(&self) -> &[u8] {
        self.as_bytes()
    }

    fn advance(&mut self, cnt: usize) {
        assert!(
            cnt <= self.len,
            "cannot advance past the window: {cnt} > {}",
            self.len
        );
        if cnt == self.len {
            self.clear();
        } else {
            self.start += cnt;
            self.len -= cnt;
        }
    }
}
