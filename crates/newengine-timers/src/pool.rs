use log::debug;

/// Reusable-instance cache.
///
/// The free list is pre-populated with `T::default()` instances. `release` runs the reset
/// hook before the instance goes back on the free list, so every `acquire` hands out an
/// instance in its reset state. When the free list runs dry a fresh default is created.
pub struct Pool<T> {
    free: Vec<T>,
    reset: Option<Box<dyn Fn(&mut T)>>,
    grown: usize,
}

impl<T: Default> Pool<T> {
    pub fn new(initial_capacity: usize) -> Self {
        let mut free = Vec::with_capacity(initial_capacity);
        free.resize_with(initial_capacity, T::default);
        Self {
            free,
            reset: None,
            grown: 0,
        }
    }

    pub fn with_reset<F>(initial_capacity: usize, reset: F) -> Self
    where
        F: Fn(&mut T) + 'static,
    {
        let mut pool = Self::new(initial_capacity);
        pool.reset = Some(Box::new(reset));
        pool
    }

    pub fn acquire(&mut self) -> T {
        match self.free.pop() {
            Some(item) => item,
            None => {
                self.grown += 1;
                debug!("pool exhausted; allocating instance #{} beyond the seed", self.grown);
                T::default()
            }
        }
    }

    pub fn release(&mut self, mut item: T) {
        if let Some(reset) = self.reset.as_ref() {
            reset(&mut item);
        }
        self.free.push(item);
    }

    /// Instances currently parked on the free list.
    #[inline]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// How many instances were created on demand after the initial seed.
    #[inline]
    pub fn grown_count(&self) -> usize {
        self.grown
    }

    /// Drop every parked instance.
    #[inline]
    pub fn clear(&mut self) {
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug, PartialEq)]
    struct Item {
        value: u32,
        tag: Option<String>,
    }

    #[test]
    fn seeded_with_initial_capacity() {
        let pool: Pool<Item> = Pool::new(4);
        assert_eq!(pool.free_count(), 4);
    }

    #[test]
    fn release_runs_reset_hook() {
        let mut pool = Pool::with_reset(1, |i: &mut Item| *i = Item::default());

        let mut item = pool.acquire();
        item.value = 42;
        item.tag = Some("dirty".into());
        pool.release(item);

        assert_eq!(pool.acquire(), Item::default());
    }

    #[test]
    fn grows_when_empty() {
        let mut pool: Pool<Item> = Pool::new(1);

        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(pool.grown_count(), 1);

        pool.release(a);
        pool.release(b);
        assert_eq!(pool.free_count(), 2);

        pool.clear();
        assert_eq!(pool.free_count(), 0);
    }
}
