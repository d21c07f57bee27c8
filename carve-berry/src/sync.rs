//! "先排空读者, 再修改" 同步原语.
//!
//! 这不是标准读写锁: 已经进入的读者不会被打断, 修改方只保证自己开始修改时
//! 没有正在执行的读者. 修改方一旦开始等待, 新读者就在进入处阻塞, 直到
//! 所有等待中的修改方完成. 排空完成后修改方一直持有内部互斥锁, 修改方之间
//! 两两串行.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// 受互斥锁保护的计数.
#[derive(Debug, Default)]
struct Counts {
    /// 正在执行的读者.
    active: usize,

    /// 已开始排空, 尚未结束的修改方.
    writers: usize,
}

/// 活跃读者计数 + 等待中的修改方计数 + 条件变量.
#[derive(Debug, Default)]
pub struct ReaderDrain {
    counts: Mutex<Counts>,
    cond: Condvar,
}

impl ReaderDrain {
    /// 初始化, 没有活跃读者.
    pub const fn new() -> Self {
        Self {
            counts: Mutex::new(Counts {
                active: 0,
                writers: 0,
            }),
            cond: Condvar::new(),
        }
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, Counts> {
        // 计数在持锁期间不会 panic, 中毒时数据仍然有效.
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn wait<'a>(&self, guard: MutexGuard<'a, Counts>) -> MutexGuard<'a, Counts> {
        self.cond.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    /// 作为读者进入. 返回的票据被丢弃时离开.
    ///
    /// 若有修改方正在等待或持有 [`Drained`], 则阻塞到其全部结束.
    ///
    /// # 注意
    ///
    /// 持有票据时在同一线程再次进入, 若恰好有修改方在等待, 会死锁.
    pub fn enter(&self) -> ReadTicket<'_> {
        let mut c = self.lock();
        while c.writers > 0 {
            c = self.wait(c);
        }
        c.active += 1;
        ReadTicket { drain: self }
    }

    /// 登记为等待中的修改方, 获取互斥锁并等待活跃读者归零.
    ///
    /// # 注意
    ///
    /// 持有 [`ReadTicket`] 的线程调用该方法会死锁.
    pub fn drain(&self) -> Drained<'_> {
        let mut c = self.lock();
        c.writers += 1;
        while c.active > 0 {
            c = self.wait(c);
        }
        Drained {
            drain: self,
            guard: c,
        }
    }

    /// 当前活跃读者个数.
    #[inline]
    pub fn active_readers(&self) -> usize {
        self.lock().active
    }

    /// 当前已开始排空, 尚未结束的修改方个数.
    #[inline]
    pub fn pending_writers(&self) -> usize {
        self.lock().writers
    }
}

/// 活跃读者的票据.
#[derive(Debug)]
pub struct ReadTicket<'a> {
    drain: &'a ReaderDrain,
}

impl Drop for ReadTicket<'_> {
    fn drop(&mut self) {
        let mut c = self.drain.lock();
        debug_assert!(c.active > 0);
        c.active -= 1;
        if c.active == 0 {
            self.drain.cond.notify_all();
        }
    }
}

/// 排空完成后的独占凭据. 持有期间活跃读者恒为零.
#[derive(Debug)]
pub struct Drained<'a> {
    drain: &'a ReaderDrain,
    guard: MutexGuard<'a, Counts>,
}

impl Drained<'_> {
    /// 当前活跃读者个数, 总是零.
    #[inline]
    pub fn active_readers(&self) -> usize {
        self.guard.active
    }
}

impl Drop for Drained<'_> {
    fn drop(&mut self) {
        self.guard.writers -= 1;
        self.drain.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::ReaderDrain;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_ticket_counting() {
        let d = ReaderDrain::new();
        let a = d.enter();
        let b = d.enter();
        assert_eq!(d.active_readers(), 2);
        drop(a);
        assert_eq!(d.active_readers(), 1);
        drop(b);
        assert_eq!(d.active_readers(), 0);
        assert_eq!(d.drain().active_readers(), 0);
    }

    /// 修改方必须等到正在执行的读者离开.
    #[test]
    fn test_drain_waits_for_reader() {
        let d = ReaderDrain::new();
        let reader_done = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel();

        thread::scope(|s| {
            s.spawn(|| {
                let _t = d.enter();
                tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(50));
                reader_done.store(true, Ordering::SeqCst);
            });

            rx.recv().unwrap();
            let g = d.drain();
            assert!(reader_done.load(Ordering::SeqCst));
            assert_eq!(g.active_readers(), 0);
        });
    }

    /// 排空期间新读者阻塞在进入处.
    #[test]
    fn test_reader_blocks_while_drained() {
        let d = ReaderDrain::new();
        let writing = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel();

        thread::scope(|s| {
            let g = d.drain();
            writing.store(true, Ordering::SeqCst);
            s.spawn(|| {
                tx.send(()).unwrap();
                let _t = d.enter();
                assert!(!writing.load(Ordering::SeqCst));
            });
            rx.recv().unwrap();
            thread::sleep(Duration::from_millis(30));
            writing.store(false, Ordering::SeqCst);
            drop(g);
        });
        assert_eq!(d.active_readers(), 0);
    }

    /// 修改方开始等待后, 后来的读者排在它之后.
    #[test]
    fn test_pending_writer_blocks_new_readers() {
        let d = ReaderDrain::new();
        let written = AtomicBool::new(false);

        thread::scope(|s| {
            let first = d.enter();
            s.spawn(|| {
                let _g = d.drain();
                thread::sleep(Duration::from_millis(20));
                written.store(true, Ordering::SeqCst);
            });
            while d.pending_writers() == 0 {
                thread::yield_now();
            }
            s.spawn(|| {
                let _t = d.enter();
                assert!(written.load(Ordering::SeqCst));
            });
            thread::sleep(Duration::from_millis(20));
            assert_eq!(d.active_readers(), 1);
            drop(first);
        });
        assert_eq!(d.active_readers(), 0);
        assert_eq!(d.pending_writers(), 0);
    }

    /// 读者不停进出时, 修改方仍然能够完成.
    #[test]
    fn test_busy_readers_do_not_starve_writer() {
        let d = ReaderDrain::new();
        let stop = AtomicBool::new(false);

        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    while !stop.load(Ordering::SeqCst) {
                        let _t = d.enter();
                    }
                });
            }
            for _ in 0..100 {
                assert_eq!(d.drain().active_readers(), 0);
            }
            stop.store(true, Ordering::SeqCst);
        });
        assert_eq!(d.active_readers(), 0);
    }

    #[test]
    fn test_many_readers_and_writers() {
        let d = Arc::new(ReaderDrain::new());
        let in_read = Arc::new(AtomicUsize::new(0));
        let violations = Arc::new(AtomicUsize::new(0));
        let pool = threadpool::ThreadPool::new(num_cpus::get().max(2));

        for i in 0..64 {
            let (d, in_read, violations) = (d.clone(), in_read.clone(), violations.clone());
            pool.execute(move || {
                if i % 4 == 0 {
                    let _g = d.drain();
                    if in_read.load(Ordering::SeqCst) != 0 {
                        violations.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_micros(200));
                } else {
                    let _t = d.enter();
                    in_read.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_micros(300));
                    in_read.fetch_sub(1, Ordering::SeqCst);
                }
            });
        }
        pool.join();
        assert_eq!(violations.load(Ordering::SeqCst), 0);
        assert_eq!(d.active_readers(), 0);
    }
}
