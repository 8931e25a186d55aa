//! 摘要协作者契约。
//!
//! `Buffer::prepend_digest` 只依赖“固定摘要长度 + 写出摘要”两个能力，
//! 哈希算法本身不属于本 crate 的职责。

use sha2::Digest;

/// 可写入缓冲头部的固定长度摘要。
///
/// # 契约说明（What）
/// - `digest_size`：摘要长度，`prepend_digest` 恰好消耗这么多头部预留字节；
/// - `finalize_into`：把摘要写入长度恰为 `digest_size()` 的目标切片，不得改动摘要器之外的状态。
pub trait HeaderDigest {
    fn digest_size(&self) -> usize;

    fn finalize_into(&self, dst: &mut [u8]);
}

/// 将 `sha2` 摘要截断为前 `len` 字节的适配器。
///
/// 头部预留只有 16 字节，完整的 SHA-256 放不下；协议上常见的做法是取摘要前缀作为认证标签。
#[derive(Clone, Debug)]
pub struct Truncated<D> {
    hasher: D,
    len: usize,
}

impl<D: Digest> Truncated<D> {
    /// `len` 超过算法输出长度时截到输出长度。
    pub fn new(hasher: D, len: usize) -> Self {
        let len = len.min(<D as Digest>::output_size());
        Self { hasher, len }
    }
}

impl<D: Digest + Clone> HeaderDigest for Truncated<D> {
    fn digest_size(&self) -> usize {
        self.len
    }

    fn finalize_into(&self, dst: &mut [u8]) {
        let output = self.hasher.clone().finalize();
        dst.copy_from_slice(&output[..self.len]);
    }
}
