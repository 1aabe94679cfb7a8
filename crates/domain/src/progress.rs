/// Externally observable phases of one metadata index scan, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPhase {
    SearchingForImages { found: usize },
    IndexingImage { current: usize, total: usize },
    SavingCache,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

impl Progress {
    pub fn new(current: usize, total: usize) -> Self {
        Self { current, total }
    }

    pub fn ratio(self) -> f64 {
        self.current as f64 / self.total.max(1) as f64
    }
}
