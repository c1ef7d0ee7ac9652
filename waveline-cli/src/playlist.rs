use std::path::{Path, PathBuf};

/// Files given on the command line and which one is playing.
#[derive(Debug, Clone)]
pub struct Playlist {
    files: Vec<PathBuf>,
    current: usize,
}

impl Playlist {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self { files, current: 0 }
    }

    pub fn current(&self) -> Option<&Path> {
        self.files.get(self.current).map(PathBuf::as_path)
    }

    pub fn following(&self) -> Option<&Path> {
        self.files.get(self.current + 1).map(PathBuf::as_path)
    }

    /// 1-based position and total, for display.
    pub fn position(&self) -> (usize, usize) {
        (self.current + 1, self.files.len())
    }

    /// Move forward and return the new current file.
    pub fn advance(&mut self) -> Option<&Path> {
        if self.current + 1 >= self.files.len() {
            return None;
        }
        self.current += 1;
        self.current()
    }

    /// Catch up after the player moved on to the following file by itself.
    /// Returns true if the playlist advanced.
    pub fn sync(&mut self, playing: &Path) -> bool {
        if self.following() == Some(playing) {
            self.current += 1;
            return true;
        }
        false
    }

    /// Forget the following file, e.g. because it cannot be opened.
    pub fn drop_following(&mut self) -> Option<PathBuf> {
        if self.following().is_some() {
            Some(self.files.remove(self.current + 1))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist() -> Playlist {
        Playlist::new(vec!["a.mp3".into(), "b.mp3".into(), "c.mp3".into()])
    }

    #[test]
    fn sync_follows_the_player() {
        let mut list = playlist();
        assert!(!list.sync(Path::new("a.mp3")));
        assert!(!list.sync(Path::new("c.mp3")));
        assert!(list.sync(Path::new("b.mp3")));
        assert_eq!(list.current(), Some(Path::new("b.mp3")));
        assert_eq!(list.position(), (2, 3));
    }

    #[test]
    fn advance_stops_at_the_end() {
        let mut list = playlist();
        assert_eq!(list.advance(), Some(Path::new("b.mp3")));
        assert_eq!(list.advance(), Some(Path::new("c.mp3")));
        assert_eq!(list.advance(), None);
        assert_eq!(list.following(), None);
    }

    #[test]
    fn unreadable_files_can_be_dropped() {
        let mut list = playlist();
        assert_eq!(list.drop_following(), Some(PathBuf::from("b.mp3")));
        assert_eq!(list.following(), Some(Path::new("c.mp3")));
        assert_eq!(list.position(), (1, 2));
    }
}
