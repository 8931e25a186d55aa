//! `buffer_contract` 集成测试：以公开 API 验证 `Buffer` 窗口操作的契约。
//!
//! # 测试目标（Why）
//! - 覆盖追加、前插、切片、排空与填充的典型报文处理路径；
//! - 确认头部预留耗尽时返回错误而非改写窗口之外的内存；
//! - 确认数据源错误原样透传，`EndOfData` 与真实错误可以区分。

use std::io::{self, Read, Write};

use sha2::{Digest, Sha256};
use spark_alloc::{AllocError, Buffer, Drain, HEADROOM, LARGE_CAPACITY, SizeClassPools, Truncated};

/// 场景一：小档缓冲清空后追加 `"hello"`。
#[test]
fn append_after_clear_yields_exact_content() {
    let pools = SizeClassPools::default();
    let mut buffer = pools.allocate_small();
    buffer.clear().append_str("hello");
    assert_eq!(buffer.len(), 5);
    assert_eq!(buffer.as_bytes(), b"hello");
    assert_eq!(buffer.to_text(), "hello");
}

/// 场景二：在 `"hello"` 之前插入大端 `0x1234`，剩余头部预留 14 字节。
#[test]
fn prepend_big_endian_u16_consumes_two_bytes_of_headroom() {
    let pools = SizeClassPools::default();
    let mut buffer = pools.allocate_small();
    buffer.clear().append_str("hello");
    buffer.prepend_u16(0x1234).expect("头部预留充足");
    assert_eq!(buffer.as_bytes(), &[0x12, 0x34, b'h', b'e', b'l', b'l', b'o']);
    assert_eq!(buffer.headroom(), 14);
}

/// 场景三：连续四次 5 字节前插，第四次越界失败。
#[test]
fn fourth_five_byte_prepend_exhausts_headroom() {
    let mut buffer = Buffer::local(64);
    buffer.clear();
    for round in 0..3 {
        buffer
            .prepend(&[round; 5])
            .expect("前三次前插总计 15 字节，应成功");
    }
    let before = buffer.as_bytes().to_vec();
    let err = buffer.prepend(&[9; 5]).expect_err("第四次前插越界");
    assert!(err.is_headroom_exhausted());
    assert_eq!(
        err,
        AllocError::HeadroomExhausted {
            requested: 5,
            available: 1
        }
    );
    assert_eq!(buffer.as_bytes(), &before[..], "失败的前插不得改写窗口");
}

/// 场景四：5 字节窗口依次排空 3、2 字节，随后返回 `EndOfData`。
#[test]
fn drain_reports_partial_reads_then_end_of_data() {
    let mut buffer = Buffer::local(32);
    buffer.clear().append(b"abcde");

    let mut dst = [0u8; 3];
    assert_eq!(buffer.drain_into(&mut dst), Drain::Bytes(3));
    assert_eq!(&dst, b"abc");
    assert_eq!(buffer.len(), 2);

    assert_eq!(buffer.drain_into(&mut dst), Drain::Bytes(2));
    assert_eq!(&dst[..2], b"de");
    assert!(buffer.is_empty());
    assert_eq!(buffer.headroom(), HEADROOM, "取完后窗口应回到清空状态");

    assert!(buffer.drain_into(&mut dst).is_end());
}

/// 场景五：大档缓冲从 10 字节数据源填充。
#[test]
fn fill_from_source_into_large_buffer() {
    let pools = SizeClassPools::default();
    let mut buffer = pools.allocate_large();
    assert_eq!(buffer.capacity(), LARGE_CAPACITY);
    buffer.clear();
    let mut source: &[u8] = b"0123456789";
    let n = buffer.fill_from(&mut source).expect("内存数据源不会失败");
    assert_eq!(n, 10);
    assert_eq!(buffer.len(), 10);
    assert_eq!(buffer.as_bytes(), b"0123456789");
}

#[test]
fn fill_from_preserves_existing_bytes() {
    let mut buffer = Buffer::local(32);
    buffer.clear().append(b"ab");
    let mut source: &[u8] = b"cd";
    buffer.fill_from(&mut source).expect("内存数据源不会失败");
    assert_eq!(buffer.as_bytes(), b"abcd");
}

struct FailingSource;

impl Read for FailingSource {
    fn read(&mut self, _dst: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away"))
    }
}

#[test]
fn fill_from_propagates_source_error_unchanged() {
    let mut buffer = Buffer::local(32);
    buffer.clear().append(b"kept");
    let err = buffer
        .fill_from(&mut FailingSource)
        .expect_err("数据源错误应透传");
    assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    assert_eq!(err.to_string(), "peer went away");
    assert_eq!(buffer.as_bytes(), b"kept");
}

#[test]
fn clear_and_reset_define_window_extremes() {
    let mut buffer = Buffer::local(48);
    buffer.clear().append(b"payload");
    buffer.slice(1, 3).expect("区间合法");

    buffer.clear();
    assert_eq!(buffer.len(), 0);
    assert_eq!(buffer.headroom(), HEADROOM);

    buffer.reset();
    assert_eq!(buffer.len(), 48);
    assert_eq!(buffer.headroom(), 0);
    assert!(buffer.is_full());
    assert!(buffer.prepend(b"x").is_err(), "覆盖整块存储后没有头部预留");
}

#[test]
fn slice_validates_bounds_without_mutating() {
    let mut buffer = Buffer::local(32);
    buffer.clear().append(b"abcdef");

    assert_eq!(
        buffer.slice(2, 9).expect_err("越界"),
        AllocError::SliceOutOfRange {
            from: 2,
            to: 9,
            len: 6
        }
    );
    assert!(buffer.slice(4, 3).is_err());
    assert!(buffer.slice_from(7).is_err());
    assert_eq!(buffer.as_bytes(), b"abcdef");

    buffer.slice(1, 4).expect("区间合法");
    assert_eq!(buffer.as_bytes(), b"bcd");
    assert_eq!(buffer.headroom(), HEADROOM + 1);
    buffer.slice_from(2).expect("区间合法");
    assert_eq!(buffer.as_bytes(), b"d");
}

#[test]
fn append_integers_use_network_byte_order() {
    let mut buffer = Buffer::local(32);
    buffer.clear().append_u16(0x0102).append_u32(0x0304_0506);
    assert_eq!(buffer.as_bytes(), &[1, 2, 3, 4, 5, 6]);

    buffer.prepend_u32(0xdead_beef).expect("头部预留充足");
    assert_eq!(&buffer.as_bytes()[..4], &[0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(buffer.headroom(), HEADROOM - 4);
}

#[test]
fn prepend_digest_consumes_digest_size() {
    let mut buffer = Buffer::local(64);
    buffer.clear().append(b"body");
    let digest = Truncated::new(Sha256::new_with_prefix(b"body"), 8);
    buffer.prepend_digest(&digest).expect("8 字节摘要放得下");
    assert_eq!(buffer.len(), 12);
    assert_eq!(&buffer.as_bytes()[..8], &Sha256::digest(b"body")[..8]);
    assert_eq!(&buffer.as_bytes()[8..], b"body");
}

#[test]
fn full_sha256_does_not_fit_headroom() {
    let mut buffer = Buffer::local(64);
    buffer.clear().append(b"body");
    let digest = Truncated::new(Sha256::new(), 32);
    let err = buffer.prepend_digest(&digest).expect_err("32 字节超出头部预留");
    assert!(err.is_headroom_exhausted());
    assert_eq!(buffer.as_bytes(), b"body");
}

#[test]
fn write_sink_accepts_everything_and_grows() {
    let mut buffer = Buffer::local(32);
    buffer.clear();
    let payload = vec![0x5a; 100];
    buffer.write_all(&payload).expect("数据汇总是接收");
    assert_eq!(buffer.len(), 100);
    assert!(buffer.capacity() >= HEADROOM + 100);
    assert_eq!(buffer.as_bytes(), &payload[..]);
}

#[test]
fn read_adapter_maps_end_of_data_to_zero() {
    let mut buffer = Buffer::local(32);
    buffer.clear().append(b"stream");
    let mut out = Vec::new();
    buffer.read_to_end(&mut out).expect("内存读取不会失败");
    assert_eq!(out, b"stream");
    assert_eq!(buffer.read(&mut [0u8; 4]).expect("EOF 不是错误"), 0);
}

#[test]
fn stale_bytes_survive_until_overwritten() {
    let mut buffer = Buffer::local(32);
    buffer.clear().append(b"old-data");
    buffer.clear().append(b"new");
    buffer.reset();
    assert_eq!(&buffer.as_bytes()[HEADROOM..HEADROOM + 8], b"new-data");
}
