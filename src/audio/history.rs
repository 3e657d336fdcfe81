//! Bounded playback history.
//!
//! Ring buffer of recently retired songs. Once full, the oldest entry is
//! dropped on every push.

use std::collections::VecDeque;

use super::queue::Song;

#[derive(Debug, Clone)]
pub struct History {
    /// Más reciente al final
    songs: VecDeque<Song>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            songs: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Agrega una canción, descartando la más antigua si está lleno
    pub fn push(&mut self, song: Song) {
        if self.capacity == 0 {
            return;
        }
        while self.songs.len() >= self.capacity {
            self.songs.pop_front();
        }
        self.songs.push_back(song);
    }

    /// Más antigua primero
    pub fn to_vec(&self) -> Vec<Song> {
        self.songs.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::testing::song;

    #[test]
    fn push_keeps_insertion_order() {
        let mut history = History::new(10);
        history.push(song("a"));
        history.push(song("b"));

        let ids: Vec<_> = history.to_vec().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn oldest_entries_are_evicted_first() {
        let mut history = History::new(10);
        for i in 0..25 {
            history.push(song(&format!("s{}", i)));
            assert!(history.to_vec().len() <= 10);
        }

        let ids: Vec<_> = history.to_vec().into_iter().map(|s| s.id).collect();
        let expected: Vec<_> = (15..25).map(|i| format!("s{}", i)).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let mut history = History::new(0);
        history.push(song("a"));
        assert!(history.to_vec().is_empty());
    }
}
