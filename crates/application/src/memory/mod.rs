//! 内存适配器
//!
//! 开发模式（未配置数据库或 Kafka）和单元测试使用。

mod queue;
mod store;

pub use queue::InMemoryQueue;
pub use store::InMemoryStore;

use std::sync::Mutex;

use crate::dead_letter::{DeadLetter, DeadLetterSink};

/// 把失败记录保存在内存中，便于检查
#[derive(Debug, Default)]
pub struct MemoryDeadLetterSink {
    letters: Mutex<Vec<DeadLetter>>,
}

impl MemoryDeadLetterSink {
    pub fn letters(&self) -> Vec<DeadLetter> {
        self.letters
            .lock()
            .map(|letters| letters.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl DeadLetterSink for MemoryDeadLetterSink {
    fn record(&self, letter: DeadLetter) {
        tracing::warn!(kind = letter.kind(), "记录后台任务失败");
        match self.letters.lock() {
            Ok(mut letters) => letters.push(letter),
            Err(poisoned) => poisoned.into_inner().push(letter),
        }
    }
}
