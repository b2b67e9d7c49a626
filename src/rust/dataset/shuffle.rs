//! Lazy Fisher–Yates shuffling.
//!
//! [`shuffle`] buffers its input once and then yields the elements in a
//! uniformly random order, one draw per element, without a second pass over
//! the buffer.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Returns an iterator over `items` in uniformly random order.
///
/// At step `i` an index `j` is drawn from `i..n`, `buffer[j]` is yielded and
/// the slot is refilled with `buffer[i]`. Every permutation is equally likely
/// and the output holds exactly the input elements.
///
/// Pass `&mut rng` to keep using the generator afterwards.
///
/// # Example
/// ```
/// use imagefront::dataset::shuffle;
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
/// let mut out: Vec<u32> = shuffle(vec![1, 2, 3, 4], &mut rng).collect();
/// out.sort();
/// assert_eq!(out, vec![1, 2, 3, 4]);
/// ```
pub fn shuffle<T, R, I>(items: I, rng: R) -> Shuffled<T, R>
where
    I: IntoIterator<Item = T>,
    R: Rng,
{
    Shuffled {
        buffer: items.into_iter().map(Some).collect(),
        next: 0,
        rng,
    }
}

/// Shuffles with a generator seeded from `seed`, so the order is reproducible.
pub fn shuffle_seeded<T, I>(items: I, seed: u64) -> Shuffled<T, StdRng>
where
    I: IntoIterator<Item = T>,
{
    shuffle(items, StdRng::seed_from_u64(seed))
}

/// Iterator returned by [`shuffle`].
#[derive(Debug)]
pub struct Shuffled<T, R> {
    buffer: Vec<Option<T>>,
    next: usize,
    rng: R,
}

impl<T, R: Rng> Iterator for Shuffled<T, R> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let i = self.next;
        let n = self.buffer.len();
        if i >= n {
            return None;
        }
        let j = self.rng.gen_range(i..n);
        // Moving slot i into j keeps the undrawn elements in i+1..n.
        self.buffer.swap(i, j);
        self.next += 1;
        self.buffer[i].take()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.buffer.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl<T, R: Rng> ExactSizeIterator for Shuffled<T, R> {}
