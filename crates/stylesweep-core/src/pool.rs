//! 逐文件处理调度：串行，或 Rayon 并行 + 按序汇总
//!
//! 并行时 worker 只做“读 + 计算”，结果经通道送回调用线程，
//! 调用线程按扫描序号重排后再交给 sink（写文件/汇总），
//! 因此输出顺序与串行路径完全一致，且只有调用线程会写文件。
use crossbeam_channel as channel;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::Result;
use crate::scan::Scanner;
use crate::types::ScanEntry;

/// 对扫描到的每个文件执行 `work`，并按扫描顺序把结果交给 `sink`
pub(crate) fn for_each_file<T, W, S>(scanner: &Scanner, threads: usize, work: W, mut sink: S) -> Result<()>
where
    T: Send,
    W: Fn(&ScanEntry) -> T + Sync,
    S: FnMut(T) -> Result<()>,
{
    if threads <= 1 {
        // 串行路径：保持惰性，边遍历边处理
        for entry in scanner.files() {
            sink(work(&entry))?;
        }
        return Ok(());
    }

    // 并行路径需要先收集文件列表以建立序号
    let entries: Vec<ScanEntry> = scanner.files().collect();
    debug!(files = entries.len(), threads, "dispatching to worker pool");
    run_ordered(&entries, threads, &work, &mut sink)
}

fn run_ordered<T, W, S>(entries: &[ScanEntry], threads: usize, work: &W, sink: &mut S) -> Result<()>
where
    T: Send,
    W: Fn(&ScanEntry) -> T + Sync,
    S: FnMut(T) -> Result<()>,
{
    let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;

    std::thread::scope(|scope| {
        // 通道用于 worker → 调用线程传递 (序号, 结果)
        let (tx, rx) = channel::bounded::<(usize, T)>(256);

        scope.spawn(move || {
            pool.install(|| {
                entries.par_iter().enumerate().for_each(|(idx, entry)| {
                    // 接收端提前退出（sink 出错）时发送失败，直接丢弃
                    let _ = tx.send((idx, work(entry)));
                });
            });
            // 结束后 Sender 被丢弃，Receiver 收到关闭信号
        });

        // 维护 next_idx 与缓存，按序冲刷
        let mut next_idx: usize = 0;
        let mut buffer: BTreeMap<usize, T> = BTreeMap::new();
        while let Ok((idx, item)) = rx.recv() {
            buffer.insert(idx, item);
            while let Some(item) = buffer.remove(&next_idx) {
                sink(item)?;
                next_idx += 1;
            }
        }
        Ok(())
    })
}
