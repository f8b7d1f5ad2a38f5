//! Two-level linked text buffer backed by index arenas.
//!
//! ```text
//! head ─► LineNode ──► LineNode ──► LineNode
//!            │            │            │
//!            ▼            ▼            ▼
//!          'a' ⇄ 'b'   (empty)     'c' ⇄ ' ' ⇄ 'd'
//! ```
//!
//! Lines and characters live in two arenas and refer to their neighbours by
//! slot index. Every character also records the line that owns it, so a split
//! or a merge is a matter of relinking indices and rewriting owners.
//!
//! The buffer itself is single-threaded; [`crate::Document`] wraps it in a
//! mutex so every edit and every render sees a consistent chain.

use std::fmt;

/// Stable index of a [`LineNode`] in the line arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineId(usize);

/// Stable index of a [`CharacterNode`] in the character arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharId(usize);

/// One line of the document.
#[derive(Debug, Clone, Default)]
pub struct LineNode {
    prev: Option<LineId>,
    next: Option<LineId>,
    /// First character of the line (None = empty line)
    head: Option<CharId>,
}

/// One character slot within a line.
#[derive(Debug, Clone)]
pub struct CharacterNode {
    value: char,
    prev: Option<CharId>,
    next: Option<CharId>,
    /// Line currently owning this character
    line: LineId,
}

/// Slot arena with a free list. Released slots keep their stale value until
/// they are handed out again.
#[derive(Debug, Clone)]
struct Arena<T> {
    slots: Vec<T>,
    free: Vec<usize>,
}

impl<T> Arena<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn alloc(&mut self, value: T) -> usize {
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = value;
                index
            }
            None => {
                self.slots.push(value);
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, index: usize) {
        self.free.push(index);
    }

    fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

impl<T> std::ops::Index<usize> for Arena<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.slots[index]
    }
}

impl<T> std::ops::IndexMut<usize> for Arena<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.slots[index]
    }
}

/// Character used to back-fill columns skipped by an insert.
pub const PADDING: char = ' ';

/// The text buffer: a list of lines, each a list of characters.
///
/// All coordinates are 0-based. Operations report success as a `bool` and
/// leave the buffer untouched when they fail.
#[derive(Debug, Clone)]
pub struct Buffer {
    lines: Arena<LineNode>,
    chars: Arena<CharacterNode>,
    head: LineId,
    line_count: usize,
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buffer {
    /// A buffer holding exactly one empty line.
    pub fn new() -> Self {
        let mut lines = Arena::new();
        let head = LineId(lines.alloc(LineNode::default()));
        Self {
            lines,
            chars: Arena::new(),
            head,
            line_count: 1,
        }
    }

    /// Number of lines. Never less than 1.
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Number of characters across all lines.
    pub fn char_count(&self) -> usize {
        self.chars.live()
    }

    /// Insert `ch` at (`line`, `column`).
    ///
    /// Missing lines are appended as empty lines and missing columns are
    /// padded with spaces, so this never fails. The cost is proportional to
    /// the gap: a far-off coordinate allocates one node per skipped line and
    /// column, all while the caller holds the document lock.
    pub fn insert(&mut self, line: usize, column: usize, ch: char) -> bool {
        let line_id = match self.line_at(line) {
            Some(id) => id,
            None => self.extend_to(line),
        };

        let mut cursor = self.lines[line_id.0].head;
        let mut tail = None;
        let mut index = 0;
        while let Some(id) = cursor {
            if index == column {
                self.splice_before(line_id, id, ch);
                return true;
            }
            tail = Some(id);
            cursor = self.chars[id.0].next;
            index += 1;
        }

        while index < column {
            tail = Some(self.push_char(line_id, tail, PADDING));
            index += 1;
        }
        self.push_char(line_id, tail, ch);
        true
    }

    /// Overwrite the character at (`line`, `column`). The position must exist.
    pub fn modify(&mut self, line: usize, column: usize, ch: char) -> bool {
        match self.char_id_at(line, column) {
            Some(id) => {
                self.chars[id.0].value = ch;
                true
            }
            None => false,
        }
    }

    /// Remove the character at (`line`, `column`). The position must exist.
    pub fn delete(&mut self, line: usize, column: usize) -> bool {
        let Some(id) = self.char_id_at(line, column) else {
            return false;
        };

        let node = &self.chars[id.0];
        let (prev, next, owner) = (node.prev, node.next, node.line);
        match prev {
            Some(p) => self.chars[p.0].next = next,
            None => self.lines[owner.0].head = next,
        }
        if let Some(n) = next {
            self.chars[n.0].prev = prev;
        }
        self.chars.release(id.0);
        true
    }

    /// Split `line` before `column`.
    ///
    /// The character at `column` and everything after it move to a new line
    /// inserted right after `line`. The column must hold an existing
    /// character: a break at or past the end of the line is refused.
    pub fn insert_line_break(&mut self, line: usize, column: usize) -> bool {
        let Some(line_id) = self.line_at(line) else {
            return false;
        };
        let Some(split) = self.char_in_line(line_id, column) else {
            return false;
        };

        let prev = self.chars[split.0].prev.take();
        match prev {
            Some(p) => self.chars[p.0].next = None,
            None => self.lines[line_id.0].head = None,
        }

        let new_line = self.link_line_after(line_id);
        self.lines[new_line.0].head = Some(split);
        self.reown(Some(split), new_line);
        true
    }

    /// Merge line `line + 1` into the end of `line`.
    ///
    /// Fails when `line` is the last line or does not exist.
    pub fn delete_line_break(&mut self, line: usize) -> bool {
        let Some(line_id) = self.line_at(line) else {
            return false;
        };
        let Some(next_id) = self.lines[line_id.0].next else {
            return false;
        };

        let moved = self.lines[next_id.0].head;
        let after = self.lines[next_id.0].next;

        self.lines[line_id.0].next = after;
        if let Some(a) = after {
            self.lines[a.0].prev = Some(line_id);
        }
        self.lines.release(next_id.0);
        self.line_count -= 1;

        self.reown(moved, line_id);
        match self.last_char(line_id) {
            None => self.lines[line_id.0].head = moved,
            Some(tail) => {
                self.chars[tail.0].next = moved;
                if let Some(m) = moved {
                    self.chars[m.0].prev = Some(tail);
                }
            }
        }
        true
    }

    /// Character at (`line`, `column`), if present.
    pub fn char_at(&self, line: usize, column: usize) -> Option<char> {
        self.char_id_at(line, column).map(|id| self.chars[id.0].value)
    }

    /// Number of characters on `line`, if the line exists.
    pub fn line_len(&self, line: usize) -> Option<usize> {
        self.line_at(line).map(|id| self.line_chars(id).count())
    }

    /// Content of every line, without terminators.
    pub fn lines(&self) -> Vec<String> {
        self.line_ids()
            .map(|id| self.line_chars(id).collect())
            .collect()
    }

    /// Walk the line list from the head and count the nodes reached.
    pub fn reachable_lines(&self) -> usize {
        self.line_ids().count()
    }

    fn line_ids(&self) -> impl Iterator<Item = LineId> + '_ {
        std::iter::successors(Some(self.head), move |id| self.lines[id.0].next)
    }

    fn char_ids(&self, line_id: LineId) -> impl Iterator<Item = CharId> + '_ {
        std::iter::successors(self.lines[line_id.0].head, move |id| self.chars[id.0].next)
    }

    fn line_chars(&self, line_id: LineId) -> impl Iterator<Item = char> + '_ {
        self.char_ids(line_id).map(move |id| self.chars[id.0].value)
    }

    fn line_at(&self, line: usize) -> Option<LineId> {
        self.line_ids().nth(line)
    }

    fn char_in_line(&self, line_id: LineId, column: usize) -> Option<CharId> {
        self.char_ids(line_id).nth(column)
    }

    fn char_id_at(&self, line: usize, column: usize) -> Option<CharId> {
        self.line_at(line)
            .and_then(|line_id| self.char_in_line(line_id, column))
    }

    fn last_line(&self) -> LineId {
        self.line_ids().last().unwrap_or(self.head)
    }

    fn last_char(&self, line_id: LineId) -> Option<CharId> {
        self.char_ids(line_id).last()
    }

    /// Append empty lines until index `line` exists and return it.
    fn extend_to(&mut self, line: usize) -> LineId {
        let mut current = self.last_line();
        while self.line_count <= line {
            current = self.link_line_after(current);
        }
        current
    }

    /// Create an empty line right after `prev` and count it.
    fn link_line_after(&mut self, prev: LineId) -> LineId {
        let next = self.lines[prev.0].next;
        let id = LineId(self.lines.alloc(LineNode {
            prev: Some(prev),
            next,
            head: None,
        }));
        self.lines[prev.0].next = Some(id);
        if let Some(n) = next {
            self.lines[n.0].prev = Some(id);
        }
        self.line_count += 1;
        id
    }

    fn splice_before(&mut self, line_id: LineId, at: CharId, ch: char) -> CharId {
        let prev = self.chars[at.0].prev;
        let id = CharId(self.chars.alloc(CharacterNode {
            value: ch,
            prev,
            next: Some(at),
            line: line_id,
        }));
        self.chars[at.0].prev = Some(id);
        match prev {
            Some(p) => self.chars[p.0].next = Some(id),
            None => self.lines[line_id.0].head = Some(id),
        }
        id
    }

    fn push_char(&mut self, line_id: LineId, tail: Option<CharId>, ch: char) -> CharId {
        let id = CharId(self.chars.alloc(CharacterNode {
            value: ch,
            prev: tail,
            next: None,
            line: line_id,
        }));
        match tail {
            Some(t) => self.chars[t.0].next = Some(id),
            None => self.lines[line_id.0].head = Some(id),
        }
        id
    }

    /// Point every character from `from` to the end of its chain at `owner`.
    fn reown(&mut self, from: Option<CharId>, owner: LineId) {
        let mut cursor = from;
        while let Some(id) = cursor {
            let node = &mut self.chars[id.0];
            node.line = owner;
            cursor = node.next;
        }
    }
}

impl fmt::Display for Buffer {
    /// Lines joined by `\n`, without a trailing terminator.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, line_id) in self.line_ids().enumerate() {
            if index > 0 {
                f.write_str("\n")?;
            }
            for ch in self.line_chars(line_id) {
                write!(f, "{ch}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Check that prev/next links are symmetric and that every character
    /// points back at the line holding it.
    fn assert_consistent(buffer: &Buffer) {
        let lines: Vec<LineId> = buffer.line_ids().collect();
        assert_eq!(lines.len(), buffer.line_count());
        assert!(buffer.line_count() >= 1);
        assert!(buffer.lines[buffer.head.0].prev.is_none());

        let mut chars = 0;
        for (i, line_id) in lines.iter().enumerate() {
            let node = &buffer.lines[line_id.0];
            if i > 0 {
                assert_eq!(node.prev, Some(lines[i - 1]));
            }
            let mut prev = None;
            for char_id in buffer.char_ids(*line_id) {
                let ch = &buffer.chars[char_id.0];
                assert_eq!(ch.line, *line_id, "stale owner on {:?}", char_id);
                assert_eq!(ch.prev, prev);
                prev = Some(char_id);
                chars += 1;
            }
        }
        assert_eq!(chars, buffer.char_count());
    }

    fn buffer_from(text: &str) -> Buffer {
        let mut buffer = Buffer::new();
        for (line, content) in text.split('\n').enumerate() {
            for (column, ch) in content.chars().enumerate() {
                assert!(buffer.insert(line, column, ch));
            }
        }
        buffer
    }

    #[test]
    fn test_new_buffer_has_one_empty_line() {
        let buffer = Buffer::new();
        assert_eq!(buffer.line_count(), 1);
        assert_eq!(buffer.to_string(), "");
        assert_eq!(buffer.lines(), vec![String::new()]);
        assert_consistent(&buffer);
    }

    #[test]
    fn test_insert_at_head_prepends() {
        let mut buffer = Buffer::new();
        assert!(buffer.insert(0, 0, 'a'));
        assert!(buffer.insert(0, 0, 'b'));
        assert_eq!(buffer.to_string(), "ba");
        assert_consistent(&buffer);
    }

    #[test]
    fn test_insert_in_middle_and_at_end() {
        let mut buffer = buffer_from("ac");
        assert!(buffer.insert(0, 1, 'b'));
        assert!(buffer.insert(0, 3, 'd'));
        assert_eq!(buffer.to_string(), "abcd");
        assert_consistent(&buffer);
    }

    #[test]
    fn test_insert_past_end_pads_columns() {
        let mut buffer = Buffer::new();
        assert!(buffer.insert(0, 3, 'x'));
        assert_eq!(buffer.to_string(), "   x");
        assert_eq!(buffer.line_len(0), Some(4));
        assert_consistent(&buffer);
    }

    #[test]
    fn test_insert_past_last_line_appends_lines() {
        let mut buffer = Buffer::new();
        assert!(buffer.insert(3, 2, 'z'));
        assert_eq!(buffer.line_count(), 4);
        assert_eq!(buffer.to_string(), "\n\n\n  z");
        assert_consistent(&buffer);
    }

    #[test]
    fn test_modify_requires_existing_position() {
        let mut buffer = buffer_from("ab");
        assert!(buffer.modify(0, 1, 'z'));
        assert_eq!(buffer.to_string(), "az");

        assert!(!buffer.modify(0, 2, 'q'));
        assert!(!buffer.modify(1, 0, 'q'));
        assert_eq!(buffer.to_string(), "az");
        assert_eq!(buffer.line_count(), 1);
    }

    #[test]
    fn test_delete_head_middle_tail() {
        let mut buffer = buffer_from("abcde");
        assert!(buffer.delete(0, 0));
        assert_eq!(buffer.to_string(), "bcde");
        assert!(buffer.delete(0, 1));
        assert_eq!(buffer.to_string(), "bde");
        assert!(buffer.delete(0, 2));
        assert_eq!(buffer.to_string(), "bd");
        assert_consistent(&buffer);
    }

    #[test]
    fn test_delete_missing_position_is_noop() {
        let mut buffer = buffer_from("ab");
        assert!(!buffer.delete(0, 2));
        assert!(!buffer.delete(4, 0));
        assert_eq!(buffer.to_string(), "ab");
        assert_eq!(buffer.char_count(), 2);
    }

    #[test]
    fn test_delete_last_char_leaves_empty_line() {
        let mut buffer = buffer_from("a");
        assert!(buffer.delete(0, 0));
        assert_eq!(buffer.to_string(), "");
        assert_eq!(buffer.line_count(), 1);
        assert_consistent(&buffer);
    }

    #[test]
    fn test_line_break_in_middle() {
        let mut buffer = buffer_from("ba");
        assert!(buffer.insert_line_break(0, 1));
        assert_eq!(buffer.lines(), vec!["b", "a"]);
        assert_eq!(buffer.line_count(), 2);
        assert_consistent(&buffer);
    }

    #[test]
    fn test_line_break_at_column_zero_moves_whole_line() {
        let mut buffer = buffer_from("ba");
        assert!(buffer.insert_line_break(0, 0));
        assert_eq!(buffer.lines(), vec!["", "ba"]);
        assert_eq!(buffer.to_string(), "\nba");
        assert_consistent(&buffer);
    }

    #[test]
    fn test_line_break_at_end_of_line_is_refused() {
        let mut buffer = buffer_from("ab");
        assert!(!buffer.insert_line_break(0, 2));
        assert!(!buffer.insert_line_break(0, 5));
        assert!(!buffer.insert_line_break(1, 0));
        assert_eq!(buffer.line_count(), 1);

        let mut empty = Buffer::new();
        assert!(!empty.insert_line_break(0, 0));
    }

    #[test]
    fn test_line_break_between_existing_lines() {
        let mut buffer = buffer_from("abc\nxyz");
        assert!(buffer.insert_line_break(0, 2));
        assert_eq!(buffer.lines(), vec!["ab", "c", "xyz"]);
        assert_consistent(&buffer);
    }

    #[test]
    fn test_delete_line_break_merges_next_line() {
        let mut buffer = buffer_from("ab\ncd\nef");
        assert!(buffer.delete_line_break(0));
        assert_eq!(buffer.lines(), vec!["abcd", "ef"]);
        assert_eq!(buffer.line_count(), 2);
        assert_consistent(&buffer);
    }

    #[test]
    fn test_delete_line_break_with_empty_sides() {
        let mut buffer = buffer_from("\nab\n\ncd");
        assert!(buffer.delete_line_break(0));
        assert_eq!(buffer.lines(), vec!["ab", "", "cd"]);
        assert!(buffer.delete_line_break(0));
        assert_eq!(buffer.lines(), vec!["ab", "cd"]);
        assert_consistent(&buffer);
    }

    #[test]
    fn test_delete_line_break_on_last_line_fails() {
        let mut buffer = buffer_from("ab\ncd");
        assert!(!buffer.delete_line_break(1));
        assert!(!buffer.delete_line_break(7));
        assert_eq!(buffer.line_count(), 2);
        assert_eq!(buffer.to_string(), "ab\ncd");
    }

    #[test]
    fn test_split_then_merge_restores_line() {
        let mut buffer = buffer_from("hello world");
        assert!(buffer.insert_line_break(0, 5));
        assert!(buffer.delete_line_break(0));
        assert_eq!(buffer.to_string(), "hello world");
        assert_eq!(buffer.line_count(), 1);
        assert_consistent(&buffer);
    }

    #[test]
    fn test_released_slots_are_reused() {
        let mut buffer = buffer_from("abc");
        let slots = buffer.chars.slots.len();
        assert!(buffer.delete(0, 1));
        assert!(buffer.insert(0, 1, 'x'));
        assert_eq!(buffer.chars.slots.len(), slots);
        assert_eq!(buffer.to_string(), "axc");
        assert_consistent(&buffer);
    }

    #[test]
    fn test_far_insert_allocates_one_slot_per_gap() {
        let mut buffer = Buffer::new();
        assert!(buffer.insert(3, 2000, 'z'));
        assert_eq!(buffer.line_count(), 4);
        assert_eq!(buffer.line_len(3), Some(2001));
        assert_eq!(buffer.chars.slots.len(), 2001);
        assert_eq!(buffer.lines.slots.len(), 4);
        assert_eq!(buffer.char_at(3, 2000), Some('z'));
        assert_consistent(&buffer);
    }

    #[test]
    fn test_merged_line_chars_follow_new_owner() {
        let mut buffer = buffer_from("ab\ncd");
        assert!(buffer.delete_line_break(0));
        // Editing the merged tail must address line 0 now.
        assert!(buffer.modify(0, 3, 'D'));
        assert_eq!(buffer.to_string(), "abcD");
        assert_consistent(&buffer);
    }

    #[test]
    fn test_char_at() {
        let buffer = buffer_from("ab\nc");
        assert_eq!(buffer.char_at(0, 1), Some('b'));
        assert_eq!(buffer.char_at(1, 0), Some('c'));
        assert_eq!(buffer.char_at(1, 1), None);
        assert_eq!(buffer.char_at(2, 0), None);
    }
}
