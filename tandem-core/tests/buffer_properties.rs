//! Property tests for the line/character buffer.
//!
//! Random edit sequences are replayed against both the buffer and a plain
//! `Vec<Vec<char>>` model; after every step the two must agree and the line
//! chain must stay intact.

use proptest::prelude::*;
use tandem_core::Buffer;

#[derive(Debug, Clone)]
enum Edit {
    Insert(usize, usize, char),
    Modify(usize, usize, char),
    Delete(usize, usize),
    Split(usize, usize),
    Merge(usize),
}

fn edit() -> impl Strategy<Value = Edit> {
    let coord = (0usize..6, 0usize..8);
    let ch = prop::char::range('a', 'z');
    prop_oneof![
        4 => (coord.clone(), ch.clone()).prop_map(|((l, c), ch)| Edit::Insert(l, c, ch)),
        1 => (coord.clone(), ch).prop_map(|((l, c), ch)| Edit::Modify(l, c, ch)),
        2 => coord.clone().prop_map(|(l, c)| Edit::Delete(l, c)),
        1 => coord.prop_map(|(l, c)| Edit::Split(l, c)),
        1 => (0usize..6).prop_map(Edit::Merge),
    ]
}

/// Reference model with the same semantics as [`Buffer`].
struct Model(Vec<Vec<char>>);

impl Model {
    fn apply(&mut self, edit: &Edit) -> bool {
        let lines = &mut self.0;
        match *edit {
            Edit::Insert(l, c, ch) => {
                while lines.len() <= l {
                    lines.push(Vec::new());
                }
                let line = &mut lines[l];
                while line.len() < c {
                    line.push(' ');
                }
                line.insert(c, ch);
                true
            }
            Edit::Modify(l, c, ch) => match lines.get_mut(l).and_then(|line| line.get_mut(c)) {
                Some(slot) => {
                    *slot = ch;
                    true
                }
                None => false,
            },
            Edit::Delete(l, c) => match lines.get_mut(l) {
                Some(line) if c < line.len() => {
                    line.remove(c);
                    true
                }
                _ => false,
            },
            Edit::Split(l, c) => match lines.get_mut(l) {
                Some(line) if c < line.len() => {
                    let tail = line.split_off(c);
                    lines.insert(l + 1, tail);
                    true
                }
                _ => false,
            },
            Edit::Merge(l) => {
                if l + 1 >= lines.len() {
                    return false;
                }
                let tail = lines.remove(l + 1);
                lines[l].extend(tail);
                true
            }
        }
    }

    fn lines(&self) -> Vec<String> {
        self.0.iter().map(|line| line.iter().collect()).collect()
    }
}

fn apply(buffer: &mut Buffer, edit: &Edit) -> bool {
    match *edit {
        Edit::Insert(l, c, ch) => buffer.insert(l, c, ch),
        Edit::Modify(l, c, ch) => buffer.modify(l, c, ch),
        Edit::Delete(l, c) => buffer.delete(l, c),
        Edit::Split(l, c) => buffer.insert_line_break(l, c),
        Edit::Merge(l) => buffer.delete_line_break(l),
    }
}

proptest! {
    #[test]
    fn buffer_matches_model(edits in prop::collection::vec(edit(), 0..64)) {
        let mut buffer = Buffer::new();
        let mut model = Model(vec![Vec::new()]);

        for edit in &edits {
            let expected = model.apply(edit);
            prop_assert_eq!(apply(&mut buffer, edit), expected, "{:?}", edit);
            prop_assert_eq!(buffer.lines(), model.lines());
            prop_assert_eq!(buffer.line_count(), buffer.reachable_lines());
            prop_assert!(buffer.line_count() >= 1);
        }

        prop_assert_eq!(buffer.to_string(), model.lines().join("\n"));
    }

    #[test]
    fn split_then_merge_restores_content(
        text in "[a-z]{1,24}",
        column_seed in any::<usize>(),
    ) {
        let mut buffer = Buffer::new();
        for (column, ch) in text.chars().enumerate() {
            buffer.insert(0, column, ch);
        }
        let column = column_seed % text.len();

        prop_assert!(buffer.insert_line_break(0, column));
        prop_assert_eq!(buffer.line_count(), 2);
        prop_assert!(buffer.delete_line_break(0));
        prop_assert_eq!(buffer.line_count(), 1);
        prop_assert_eq!(buffer.to_string(), text);
    }

    #[test]
    fn insert_beyond_extent_pads_with_spaces(line in 0usize..20, column in 0usize..40) {
        let mut buffer = Buffer::new();
        prop_assert!(buffer.insert(line, column, 'x'));
        prop_assert_eq!(buffer.line_count(), line + 1);
        prop_assert_eq!(buffer.line_len(line), Some(column + 1));
        for c in 0..column {
            prop_assert_eq!(buffer.char_at(line, c), Some(' '));
        }
        prop_assert_eq!(buffer.char_at(line, column), Some('x'));
    }
}
