//! 操作运行统计.

use std::time::{Duration, Instant};

/// ablation/benchmark 计时器.
///
/// 该计时器支持 "中途中断" 与 "结束中断, 继续开始计时".
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器. 初始化时会视为已经开始计时.
    #[inline]
    fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    #[inline]
    fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时, 并将这一区间的时间累加. 返回本轮计时时长.
    #[inline]
    fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    #[inline]
    fn total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

/// 一类操作的统计.
#[derive(Clone, Debug)]
pub struct Profile {
    /// 完成的操作次数.
    ops: u64,

    /// 返回了 `Err` 或 `false` 的操作次数.
    failed: u64,

    /// 所有操作的累计耗时 (包括等待锁的时间).
    op_time: AccTimer,

    /// 从开始到 `finish` 的总时间.
    real_time: AccTimer,

    /// 最耗时的一次操作.
    most: Option<Duration>,
}

impl Profile {
    /// 初始化, 并开始总计时.
    #[inline]
    pub fn new() -> Self {
        Self {
            ops: 0,
            failed: 0,
            op_time: AccTimer::new(),
            real_time: AccTimer::new(),
            most: None,
        }
    }

    /// 计时执行一次操作. `f` 返回操作是否成功.
    pub fn measure<F: FnOnce() -> bool>(&mut self, f: F) {
        self.op_time.start();
        let ok = f();
        let d = self.op_time.elapsed();
        self.most = Some(self.most.map_or(d, |m| m.max(d)));
        self.ops += 1;
        if !ok {
            self.failed += 1;
        }
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.real_time.elapsed();
        self
    }

    /// 合并另一个同类统计.
    pub fn merge(mut self, other: Self) -> Self {
        self.ops += other.ops;
        self.failed += other.failed;
        self.op_time.consumed += other.op_time.consumed;
        self.real_time.consumed = self.real_time.consumed.max(other.real_time.consumed);
        self.most = match (self.most, other.most) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self
    }

    /// 操作次数.
    #[inline]
    pub fn get_ops(&self) -> u64 {
        self.ops
    }

    /// 失败次数.
    #[inline]
    pub fn get_failed(&self) -> u64 {
        self.failed
    }

    /// 以微秒为单位获得操作累计耗时.
    #[inline]
    pub fn get_op_time_us(&self) -> u64 {
        self.op_time.total_us()
    }

    /// 以微秒为单位获得总自然时间.
    #[inline]
    pub fn get_real_time_us(&self) -> u64 {
        self.real_time.total_us()
    }

    /// 以微秒为单位获得单次操作平均耗时.
    #[inline]
    pub fn get_avg_op_time_us(&self) -> Option<f64> {
        match self.ops {
            0 => None,
            ops => Some(self.get_op_time_us() as f64 / ops as f64),
        }
    }

    /// 最耗时的一次操作. 没有操作时返回 `None`.
    #[inline]
    pub fn get_most_time_consuming(&self) -> Option<Duration> {
        self.most
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}
