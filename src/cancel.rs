//! 协作式取消信号
//!
//! 长扫描在每行调用一次 `check`；信号触发时返回 `ReadError::Cancelled`，
//! 由调用方用 `?` 向上传播。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::common::{ReadError, Result};

pub trait CancellationSignal {
    fn is_cancelled(&self) -> bool;

    #[inline]
    fn check(&self) -> Result<()> {
        if self.is_cancelled() { Err(ReadError::Cancelled) } else { Ok(()) }
    }
}

impl<T: CancellationSignal + ?Sized> CancellationSignal for &T {
    fn is_cancelled(&self) -> bool { (**self).is_cancelled() }
}

impl<T: CancellationSignal + ?Sized> CancellationSignal for Arc<T> {
    fn is_cancelled(&self) -> bool { (**self).is_cancelled() }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancellationSignal for NeverCancel {
    #[inline]
    fn is_cancelled(&self) -> bool { false }
}

/// 可跨线程触发的取消标志；克隆共享同一个标志
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) { self.flag.store(true, Ordering::Release); }

    pub fn reset(&self) { self.flag.store(false, Ordering::Release); }
}

impl CancellationSignal for CancelFlag {
    #[inline]
    fn is_cancelled(&self) -> bool { self.flag.load(Ordering::Acquire) }
}

/// 到达截止时间后视为取消
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn at(at: Instant) -> Self { Self { at } }

    pub fn after(timeout: Duration) -> Self { Self::at(Instant::now() + timeout) }
}

impl CancellationSignal for Deadline {
    fn is_cancelled(&self) -> bool { Instant::now() >= self.at }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_is_shared_between_clones() {
        let flag  = CancelFlag::new();
        let other = flag.clone();
        assert!(flag.check().is_ok());
        other.cancel();
        assert!(flag.check().unwrap_err().is_cancelled());
        flag.reset();
        assert!(!other.is_cancelled());
    }

    #[test]
    fn deadlines_and_never() {
        assert!(Deadline::at(Instant::now()).is_cancelled());
        assert!(!Deadline::after(Duration::from_secs(3600)).is_cancelled());
        assert!(NeverCancel.check().is_ok());
        let by_ref: &dyn CancellationSignal = &NeverCancel;
        assert!(!by_ref.is_cancelled());
    }
}
