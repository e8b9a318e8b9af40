/// Splits a (possibly lazy) window sequence into consecutive batches of at
/// most `size` items. Only one batch is materialized at a time.
pub struct Batches<I: Iterator> {
    inner: I,
    size: usize,
}

impl<I: Iterator> Batches<I> {
    pub fn new(inner: I, size: usize) -> Self {
        Self {
            inner,
            size: size.max(1),
        }
    }
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<_> = self.inner.by_ref().take(self.size).collect();
        (!batch.is_empty()).then_some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_batch_holds_the_remainder() {
        let sizes: Vec<_> = Batches::new(0..51, 50).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![50, 1]);

        let exact: Vec<_> = Batches::new(0..100, 50).map(|b| b.len()).collect();
        assert_eq!(exact, vec![50, 50]);

        assert_eq!(Batches::new(0..0, 50).count(), 0);
    }

    #[test]
    fn preserves_order() {
        let flat: Vec<_> = Batches::new(0..7, 3).flatten().collect();
        assert_eq!(flat, (0..7).collect::<Vec<_>>());
    }
}
