use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// A resolved song: display title plus the canonical URL used for playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Song {
    pub title: String,
    pub url: String,
}

impl Song {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Queue shared by the command handlers and the playback session.
pub type SharedQueue = Arc<RwLock<SongQueue>>;

/// Strict FIFO list of pending songs. The head is the song currently
/// playing, or the next one to play when nothing is.
#[derive(Debug, Default)]
pub struct SongQueue {
    items: Vec<Song>,
}

impl SongQueue {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn shared() -> SharedQueue {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn add(&mut self, song: Song) {
        info!("➕ Added to queue: {} ({} ahead)", song.title, self.len());
        self.items.push(song);
    }

    /// Drops the head, which is the song that just finished or was skipped.
    pub fn shift(&mut self) -> Option<Song> {
        if self.is_empty() {
            return None;
        }
        let song = self.items.remove(0);
        debug!("⬅️ Removed head of queue: {}", song.title);
        Some(song)
    }

    pub fn first(&self) -> Option<&Song> {
        self.items.first()
    }

    #[allow(dead_code)]
    pub fn get(&self) -> &[Song] {
        &self.items
    }

    /// Removes the first occurrence of `song`. Returns whether anything was removed.
    #[allow(dead_code)]
    pub fn remove(&mut self, song: &Song) -> bool {
        match self.items.iter().position(|item| item == song) {
            Some(index) => {
                self.items.remove(index);
                debug!("❌ Removed from queue at position {}", index);
                true
            }
            None => false,
        }
    }

    pub fn titles(&self) -> Vec<&str> {
        self.items.iter().map(|song| song.title.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
