//! 区域读取与目标簿记之间的锁竞争消融实验.
//!
//! 若干读者线程反复读取整个体的分割与 "已完成" 覆盖层,
//! 同时一个簿记线程反复执行 "涂种子, 重算, 保存, 加载" 循环.
//! 统计两侧的吞吐与最长等待.

mod profile;
mod result;
mod runner;

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init()
        .expect("Logger initialization error");

    let result = runner::run(runner::Config::default());
    result.analyze();
}
