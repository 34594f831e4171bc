/// Items collected during the current window.
pub(crate) struct Pool<T> {
    max_size: usize,
    items: Vec<T>,
}

impl<T> Pool<T> {
    pub(crate) fn new(max_size: usize) -> Self {
        Self {
            max_size,
            items: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub(crate) fn is_full(&self) -> bool {
        self.items.len() >= self.max_size
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Take every pooled item, leaving the pool empty.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }
}
