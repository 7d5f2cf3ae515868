//! Command history for console clients
//!
//! Each connected client owns one [`HistoryRing`] taken from a shared
//! [`HistoryPool`]. Rings are keyed by application name; a freed ring keeps
//! its commands so the next client of the same application gets them back.
//!
//! ```text
//! HistoryPool (front = most recently allocated)
//! ├── HistoryRing "cmd.exe"   allocated, owner 7
//! ├── HistoryRing "ftp.exe"   free, commands kept
//! └── HistoryRing "cmd.exe"   allocated, owner 3
//! ```

use bitflags::bitflags;
use tracing::{debug, info};

use crate::error::{ConsoleError, Result};
use crate::text::{eq_ignore_case, starts_with_ignore_case};

/// Largest accepted history depth
pub const MAX_HISTORY_DEPTH: usize = 32767;

/// Identifies a connected console client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u32);

/// Stable handle to a ring inside the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HistoryId(u64);

bitflags! {
    /// Ring state flags
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct HistoryFlags: u8 {
        /// Owned by a connected client
        const ALLOCATED = 0b0001;
        /// Next Up returns the current entry without moving
        const RESET     = 0b0010;
    }
}

bitflags! {
    /// Options for [`HistoryRing::find_matching_command`]
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MatchFlags: u8 {
        /// Whole entry must match, not just its prefix
        const EXACT        = 0b0001;
        /// Do not consume a pending reset
        const JUST_LOOKING = 0b0010;
    }
}

/// History navigation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards older entries
    Up,
    /// Towards newer entries
    Down,
}

/// Bounded command history of one application
#[derive(Debug, Clone)]
pub struct HistoryRing {
    id: HistoryId,
    app_name: String,
    owner: Option<ClientId>,
    max_commands: usize,
    /// Oldest first
    commands: Vec<String>,
    last_displayed: Option<usize>,
    flags: HistoryFlags,
}

impl HistoryRing {
    fn new(id: HistoryId, app_name: &str, max_commands: usize) -> Self {
        Self {
            id,
            app_name: app_name.to_string(),
            owner: None,
            max_commands,
            commands: Vec::new(),
            last_displayed: None,
            flags: HistoryFlags::empty(),
        }
    }

    pub fn id(&self) -> HistoryId {
        self.id
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn owner(&self) -> Option<ClientId> {
        self.owner
    }

    pub fn flags(&self) -> HistoryFlags {
        self.flags
    }

    pub fn is_allocated(&self) -> bool {
        self.flags.contains(HistoryFlags::ALLOCATED)
    }

    pub fn max_commands(&self) -> usize {
        self.max_commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Index of the entry recall is positioned on
    pub fn last_displayed(&self) -> Option<usize> {
        let idx = self.last_displayed?;
        debug_assert!(idx < self.commands.len(), "last_displayed out of range");
        Some(idx.min(self.commands.len().checked_sub(1)?))
    }

    fn prev(&self, idx: usize) -> usize {
        if idx == 0 {
            self.commands.len() - 1
        } else {
            idx - 1
        }
    }

    fn next(&self, idx: usize) -> usize {
        (idx + 1) % self.commands.len()
    }

    /// Record a submitted line
    pub fn add(&mut self, text: &str, suppress_duplicates: bool) -> Result<()> {
        if text.is_empty() || self.max_commands == 0 {
            return Ok(());
        }

        if self.commands.last().map_or(true, |newest| newest != text) {
            if suppress_duplicates {
                if let Some(idx) = self.commands.iter().position(|c| c == text) {
                    self.remove(idx);
                }
            }
            if self.commands.len() >= self.max_commands {
                self.remove(0);
            }

            let mut entry = String::new();
            entry.try_reserve(text.len())?;
            entry.push_str(text);
            self.commands.try_reserve(1)?;
            self.commands.push(entry);
        }

        let keep_position = self
            .last_displayed()
            .map_or(false, |idx| self.commands[idx] == text);
        if !keep_position {
            self.last_displayed = Some(self.commands.len() - 1);
        }
        self.flags.insert(HistoryFlags::RESET);
        Ok(())
    }

    /// Step through history and return the entry landed on
    pub fn retrieve(&mut self, direction: Direction) -> Option<&str> {
        if self.commands.is_empty() {
            return None;
        }

        let current = self.last_displayed().unwrap_or(self.commands.len() - 1);
        let idx = if self.commands.len() == 1 {
            0
        } else {
            match direction {
                Direction::Up if self.flags.contains(HistoryFlags::RESET) => {
                    self.flags.remove(HistoryFlags::RESET);
                    current
                }
                Direction::Up => self.prev(current),
                Direction::Down => self.next(current),
            }
        };
        self.last_displayed = Some(idx);
        Some(&self.commands[idx])
    }

    /// Jump to an entry by index
    pub fn retrieve_nth(&mut self, index: usize) -> Option<&str> {
        if index >= self.commands.len() {
            return None;
        }
        self.last_displayed = Some(index);
        Some(&self.commands[index])
    }

    pub fn get_nth(&self, index: usize) -> Option<&str> {
        self.commands.get(index).map(String::as_str)
    }

    /// Entry recall is positioned on, used by the copy keys
    pub fn last_command(&self) -> Option<&str> {
        self.last_displayed().map(|idx| self.commands[idx].as_str())
    }

    /// Search backwards (wrapping) for an entry starting with `prefix`,
    /// ignoring case.
    pub fn find_matching_command(
        &mut self,
        prefix: &str,
        start: usize,
        flags: MatchFlags,
    ) -> Option<usize> {
        if self.commands.is_empty() {
            return None;
        }
        if prefix.is_empty() {
            return Some(0);
        }

        let mut idx = start.min(self.commands.len() - 1);
        if !flags.contains(MatchFlags::JUST_LOOKING) && self.flags.contains(HistoryFlags::RESET) {
            self.flags.remove(HistoryFlags::RESET);
        } else {
            idx = self.prev(idx);
        }

        for _ in 0..self.commands.len() {
            let command = &self.commands[idx];
            let matched = if flags.contains(MatchFlags::EXACT) {
                eq_ignore_case(command, prefix)
            } else {
                starts_with_ignore_case(command, prefix)
            };
            if matched {
                return Some(idx);
            }
            idx = self.prev(idx);
        }
        None
    }

    /// Delete one entry, keeping recall on the same or the older neighbour
    pub fn remove(&mut self, index: usize) -> Option<String> {
        if index >= self.commands.len() {
            return None;
        }
        let removed = self.commands.remove(index);

        self.last_displayed = match self.last_displayed {
            _ if self.commands.is_empty() => None,
            Some(ld) if ld > index => Some(ld - 1),
            Some(ld) if ld == index => Some(index.saturating_sub(1)),
            other => other,
        };
        Some(removed)
    }

    /// Change the depth. Shrinking keeps the first entries in storage order.
    pub fn realloc(&mut self, max_commands: usize) -> Result<()> {
        if max_commands > MAX_HISTORY_DEPTH {
            return Err(ConsoleError::InvalidArgument("history depth above 32767"));
        }
        if max_commands == self.max_commands {
            return Ok(());
        }

        self.commands.truncate(max_commands);
        self.max_commands = max_commands;
        self.last_displayed = self.commands.len().checked_sub(1);
        self.flags.insert(HistoryFlags::RESET);
        Ok(())
    }

    /// Forget every entry
    pub fn empty(&mut self) {
        self.commands.clear();
        self.last_displayed = None;
        self.flags.insert(HistoryFlags::RESET);
    }

    /// Put recall back on the newest entry
    pub fn reset(&mut self) {
        self.last_displayed = self.commands.len().checked_sub(1);
        self.flags.insert(HistoryFlags::RESET);
    }

    /// `command\0` for every entry, oldest first
    pub fn flatten(&self) -> String {
        let mut out = String::new();
        for command in &self.commands {
            out.push_str(command);
            out.push('\0');
        }
        out
    }
}

/// Shared pool of history rings
#[derive(Debug)]
pub struct HistoryPool {
    /// Front = most recently allocated
    rings: Vec<HistoryRing>,
    max_rings: usize,
    default_size: usize,
    next_id: u64,
}

impl HistoryPool {
    /// Create a pool of at most `max_rings` rings holding `default_size`
    /// commands each
    pub fn new(max_rings: usize, default_size: usize) -> Self {
        Self {
            rings: Vec::new(),
            max_rings,
            default_size: default_size.min(MAX_HISTORY_DEPTH),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    pub fn default_size(&self) -> usize {
        self.default_size
    }

    pub fn get(&self, id: HistoryId) -> Option<&HistoryRing> {
        self.rings.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: HistoryId) -> Option<&mut HistoryRing> {
        self.rings.iter_mut().find(|r| r.id == id)
    }

    /// Rings in recency order
    pub fn rings(&self) -> &[HistoryRing] {
        &self.rings
    }

    /// Give `owner` a ring for `app`.
    ///
    /// Returns `None` when every ring is in use and the pool is full.
    pub fn allocate(&mut self, app: &str, owner: ClientId) -> Option<HistoryId> {
        let mut same_app = None;
        let mut lru_free = None;
        for (idx, ring) in self.rings.iter().enumerate().rev() {
            if ring.is_allocated() {
                continue;
            }
            if eq_ignore_case(&ring.app_name, app) {
                same_app = Some(idx);
                break;
            }
            if lru_free.is_none() {
                lru_free = Some(idx);
            }
        }

        let idx = match same_app {
            Some(idx) => {
                debug!(app, "history ring reused with contents");
                idx
            }
            None if self.rings.len() < self.max_rings => {
                let id = HistoryId(self.next_id);
                self.next_id += 1;
                self.rings.insert(0, HistoryRing::new(id, app, self.default_size));
                debug!(app, rings = self.rings.len(), "history ring created");
                0
            }
            None => {
                let idx = lru_free?;
                let ring = &mut self.rings[idx];
                info!(from = %ring.app_name, to = app, "history ring recycled");
                ring.commands.clear();
                ring.last_displayed = None;
                ring.app_name = app.to_string();
                ring.max_commands = self.default_size;
                idx
            }
        };

        let mut ring = self.rings.remove(idx);
        ring.owner = Some(owner);
        ring.flags.insert(HistoryFlags::ALLOCATED | HistoryFlags::RESET);
        ring.last_displayed = ring.commands.len().checked_sub(1);
        let id = ring.id;
        self.rings.insert(0, ring);
        Some(id)
    }

    /// Release the ring owned by `owner`; its commands are kept
    pub fn free(&mut self, owner: ClientId) {
        for ring in self.rings.iter_mut().filter(|r| r.owner == Some(owner)) {
            ring.owner = None;
            ring.flags.remove(HistoryFlags::ALLOCATED);
        }
    }

    pub fn find_by_owner(&self, owner: ClientId) -> Option<HistoryId> {
        self.rings
            .iter()
            .find(|r| r.is_allocated() && r.owner == Some(owner))
            .map(|r| r.id)
    }

    /// Allocated ring of an application
    pub fn find_by_app(&self, app: &str) -> Option<HistoryId> {
        self.rings
            .iter()
            .find(|r| r.is_allocated() && eq_ignore_case(&r.app_name, app))
            .map(|r| r.id)
    }

    /// Change the depth of every ring and of rings created later
    pub fn resize_all(&mut self, max_commands: usize) -> Result<()> {
        if max_commands > MAX_HISTORY_DEPTH {
            return Err(ConsoleError::InvalidArgument("history depth above 32767"));
        }
        for ring in &mut self.rings {
            ring.realloc(max_commands)?;
        }
        self.default_size = max_commands;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ring(max: usize, entries: &[&str]) -> HistoryRing {
        let mut ring = HistoryRing::new(HistoryId(1), "cmd.exe", max);
        for e in entries {
            ring.add(e, false).unwrap();
        }
        ring
    }

    #[test]
    fn test_eviction_keeps_newest() {
        let ring = ring(3, &["a", "b", "c", "d"]);
        assert_eq!(ring.commands(), &["b", "c", "d"]);
        assert_eq!(ring.last_displayed(), Some(2));
    }

    #[test]
    fn test_consecutive_duplicate_ignored() {
        let ring = ring(10, &["a", "a"]);
        assert_eq!(ring.commands(), &["a"]);
    }

    #[test]
    fn test_duplicate_suppression() {
        let mut ring = HistoryRing::new(HistoryId(1), "cmd.exe", 10);
        for e in ["dir", "ls", "dir"] {
            ring.add(e, true).unwrap();
        }
        assert_eq!(ring.commands(), &["ls", "dir"]);

        let kept = self::ring(10, &["dir", "ls", "dir"]);
        assert_eq!(kept.commands(), &["dir", "ls", "dir"]);
    }

    #[test]
    fn test_empty_and_zero_capacity_ignored() {
        let mut r = ring(0, &["a"]);
        assert!(r.is_empty());
        r.realloc(5).unwrap();
        r.add("", false).unwrap();
        assert!(r.is_empty());
    }

    #[test]
    fn test_up_wraps() {
        let mut ring = ring(10, &["a", "b", "c"]);
        let seen: Vec<String> = (0..4)
            .map(|_| ring.retrieve(Direction::Up).unwrap().to_string())
            .collect();
        assert_eq!(seen, vec!["c", "b", "a", "c"]);
    }

    #[test]
    fn test_down_wraps() {
        let mut ring = ring(10, &["a", "b", "c"]);
        assert_eq!(ring.retrieve(Direction::Down), Some("a"));
        assert_eq!(ring.retrieve(Direction::Down), Some("b"));
    }

    #[test]
    fn test_single_entry_always_returned() {
        let mut ring = ring(10, &["only"]);
        assert_eq!(ring.retrieve(Direction::Up), Some("only"));
        assert_eq!(ring.retrieve(Direction::Down), Some("only"));
        assert_eq!(ring.retrieve(Direction::Up), Some("only"));
    }

    #[test]
    fn test_readd_recalled_keeps_position() {
        let mut ring = ring(10, &["a", "b", "c"]);
        ring.retrieve(Direction::Up);
        ring.retrieve(Direction::Up);
        ring.add("b", false).unwrap();
        // "b" was appended; recall still sits on the old "b"
        assert_eq!(ring.commands(), &["a", "b", "c", "b"]);
        assert_eq!(ring.retrieve(Direction::Up), Some("b"));
        assert_eq!(ring.last_displayed(), Some(1));
    }

    #[test]
    fn test_find_matching_command() {
        let mut ring = ring(10, &["dir /s", "echo", "DIR"]);
        let newest = ring.len() - 1;
        // Pending reset: search starts at the newest entry
        assert_eq!(ring.find_matching_command("di", newest, MatchFlags::empty()), Some(2));
        assert_eq!(ring.find_matching_command("di", 2, MatchFlags::empty()), Some(0));
        assert_eq!(ring.find_matching_command("dir", 0, MatchFlags::EXACT), Some(2));
        assert_eq!(ring.find_matching_command("zz", 0, MatchFlags::empty()), None);
        assert_eq!(ring.find_matching_command("", 2, MatchFlags::empty()), Some(0));
    }

    #[test]
    fn test_just_looking_keeps_reset() {
        let mut ring = ring(10, &["a", "b"]);
        assert_eq!(ring.find_matching_command("a", 1, MatchFlags::JUST_LOOKING), Some(0));
        assert!(ring.flags().contains(HistoryFlags::RESET));
    }

    #[test]
    fn test_remove_fixes_last_displayed() {
        let mut r = ring(10, &["a", "b", "c"]);
        r.retrieve_nth(2);
        r.remove(0);
        assert_eq!(r.last_command(), Some("c"));
        r.remove(1);
        assert_eq!(r.last_command(), Some("b"));
        r.remove(0);
        assert_eq!(r.last_displayed(), None);
        assert_eq!(r.remove(3), None);
    }

    #[test]
    fn test_realloc_keeps_first_entries() {
        let mut r = ring(10, &["a", "b", "c", "d"]);
        r.realloc(2).unwrap();
        assert_eq!(r.commands(), &["a", "b"]);
        assert_eq!(r.last_displayed(), Some(1));
        assert_eq!(
            r.realloc(40000),
            Err(ConsoleError::InvalidArgument("history depth above 32767"))
        );
    }

    #[test]
    fn test_flatten() {
        let r = ring(10, &["a", "bc"]);
        assert_eq!(r.flatten(), "a\0bc\0");
    }

    #[test]
    fn test_pool_reuses_same_app_contents() {
        let mut pool = HistoryPool::new(4, 10);
        let id = pool.allocate("cmd.exe", ClientId(1)).unwrap();
        pool.get_mut(id).unwrap().add("dir", false).unwrap();
        pool.free(ClientId(1));
        assert_eq!(pool.find_by_app("cmd.exe"), None);

        let again = pool.allocate("CMD.EXE", ClientId(2)).unwrap();
        assert_eq!(again, id);
        assert_eq!(pool.get(again).unwrap().commands(), &["dir"]);
        assert_eq!(pool.find_by_owner(ClientId(2)), Some(id));
    }

    #[test]
    fn test_pool_creates_until_full_then_recycles_lru() {
        let mut pool = HistoryPool::new(2, 10);
        let a = pool.allocate("a.exe", ClientId(1)).unwrap();
        let b = pool.allocate("b.exe", ClientId(2)).unwrap();
        pool.get_mut(a).unwrap().add("from a", false).unwrap();
        assert_eq!(pool.allocate("c.exe", ClientId(3)), None);

        pool.free(ClientId(2));
        pool.free(ClientId(1));
        // "a.exe" is the least recently allocated free ring
        let c = pool.allocate("c.exe", ClientId(3)).unwrap();
        assert_eq!(c, a);
        let ring = pool.get(c).unwrap();
        assert_eq!(ring.app_name(), "c.exe");
        assert!(ring.is_empty());
        assert_eq!(pool.rings()[0].id(), c);
        assert!(pool.get(b).is_some());
    }

    #[test]
    fn test_pool_resize_all() {
        let mut pool = HistoryPool::new(2, 10);
        let a = pool.allocate("a.exe", ClientId(1)).unwrap();
        pool.resize_all(3).unwrap();
        assert_eq!(pool.get(a).unwrap().max_commands(), 3);
        assert_eq!(pool.default_size(), 3);
    }
}
