//! Text-area edits: popup trigger detection, `$name$` expansion and inserting
//! a picked macro.
//!
//! Cursors are byte offsets into the UTF-8 text.

use std::time::Duration;

use ghmacros_protocol::MacroItem;
use ghmacros_protocol::macro_item::macro_markup;

pub const POPUP_TRIGGER: char = '!';
pub const PATTERN_DELIMITER: char = '$';

/// Delay between typing the trigger and opening the popup.
pub const POPUP_TRIGGER_DELAY: Duration = Duration::from_millis(250);

/// Text and cursor after an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub text: String,
    pub cursor: usize,
}

/// True when the character just before `cursor` is a `!` standing alone as a
/// word (start of text, space or newline on both sides).
pub fn is_popup_trigger(text: &str, cursor: usize) -> bool {
    let bytes = text.as_bytes();
    if cursor == 0 || cursor > bytes.len() || bytes[cursor - 1] != b'!' {
        return false;
    }
    let is_break = |b: u8| b == b' ' || b == b'\n';
    let left_ok = cursor == 1 || is_break(bytes[cursor - 2]);
    let right_ok = cursor == bytes.len() || is_break(bytes[cursor]);
    left_ok && right_ok
}

/// When the user just typed the closing `$` of `$name$`, return `name`.
pub fn pattern_name_before_cursor(text: &str, cursor: usize) -> Option<&str> {
    if cursor == 0 || cursor > text.len() || !text.is_char_boundary(cursor) {
        return None;
    }
    let before = &text[..cursor];
    let value = before.strip_suffix(PATTERN_DELIMITER)?;
    let start = value.rfind(|c: char| c.is_whitespace() || c == PATTERN_DELIMITER)?;
    let name = value[start..].strip_prefix(PATTERN_DELIMITER)?;
    if name.is_empty() { None } else { Some(name) }
}

/// Replace every `$name$` in `text` with the macro markup, keeping the cursor
/// on the same logical character.
pub fn expand_pattern(text: &str, cursor: usize, name: &str, url: &str) -> TextEdit {
    let pattern = format!("{PATTERN_DELIMITER}{name}{PATTERN_DELIMITER}");
    let markup = macro_markup(name, url);

    let mut out = String::with_capacity(text.len());
    let mut new_cursor = cursor;
    let mut rest = text;
    let mut offset = 0;
    while let Some(pos) = rest.find(&pattern) {
        if offset + pos < cursor {
            new_cursor = new_cursor + markup.len() - pattern.len();
        }
        out.push_str(&rest[..pos]);
        out.push_str(&markup);
        rest = &rest[pos + pattern.len()..];
        offset += pos + pattern.len();
    }
    out.push_str(rest);

    TextEdit {
        text: out,
        cursor: new_cursor,
    }
}

/// Insert `item`'s markup at `cursor`, consuming the `!` that opened the popup.
pub fn insert_selected_macro(text: &str, cursor: usize, item: &MacroItem) -> TextEdit {
    let mut cursor = cursor.min(text.len());
    while cursor > 0 && !text.is_char_boundary(cursor) {
        cursor -= 1;
    }

    let head = &text[..cursor];
    let head = head.strip_suffix(POPUP_TRIGGER).unwrap_or(head);
    let markup = item.markup();

    let mut out = String::with_capacity(text.len() + markup.len());
    out.push_str(head);
    out.push_str(&markup);
    out.push_str(&text[cursor..]);

    TextEdit {
        text: out,
        cursor: head.len() + markup.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn trigger_requires_standalone_bang() {
        assert!(is_popup_trigger("!", 1));
        assert!(is_popup_trigger("hi !", 4));
        assert!(is_popup_trigger("hi\n! there", 4));
        assert!(!is_popup_trigger("hi!", 3));
        assert!(!is_popup_trigger("hi !x", 4));
        assert!(!is_popup_trigger("hi ?", 4));
        assert!(!is_popup_trigger("", 0));
    }

    #[test]
    fn finds_pattern_name() {
        assert_eq!(pattern_name_before_cursor("see $party$", 11), Some("party"));
        assert_eq!(pattern_name_before_cursor("$party$ later", 7), Some("party"));
        assert_eq!(pattern_name_before_cursor("see party$", 10), None);
        assert_eq!(pattern_name_before_cursor("see $$", 6), None);
        assert_eq!(pattern_name_before_cursor("see $party", 10), None);
    }

    #[test]
    fn expands_all_occurrences_and_shifts_cursor() {
        let markup = macro_markup("p", "u");
        let text = "$p$ and $p$ end";
        let cursor = 11;
        let edit = expand_pattern(text, cursor, "p", "u");

        assert_eq!(edit.text, format!("{markup} and {markup} end"));
        assert_eq!(edit.cursor, cursor + 2 * (markup.len() - 3));
    }

    #[test]
    fn occurrences_after_cursor_do_not_move_it() {
        let edit = expand_pattern("ab $p$", 2, "p", "u");
        assert_eq!(edit.cursor, 2);
    }

    #[test]
    fn selection_replaces_trigger() {
        let item = MacroItem::new("party", "https://e/p.gif");
        let edit = insert_selected_macro("look ! here", 6, &item);
        assert_eq!(
            edit.text,
            "look ![github-macros-party](https://e/p.gif) here"
        );
        assert_eq!(edit.cursor, 5 + item.markup().len());
    }

    #[test]
    fn selection_without_trigger_inserts_at_cursor() {
        let item = MacroItem::new("a", "u");
        let edit = insert_selected_macro("xy", 1, &item);
        assert_eq!(edit.text, format!("x{}y", item.markup()));
        assert_eq!(edit.cursor, 1 + item.markup().len());
    }
}
