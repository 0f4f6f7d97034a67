//! Plain-text rendering of macro listings.

use ghmacros_protocol::MacroItem;
use ghmacros_search::PageState;
use ghmacros_search::RenderSink;
use ghmacros_search::SearchPage;

/// Render sink for the interactive session. Output is buffered until the
/// owner drains it with [`TextSink::take_output`].
#[derive(Debug, Default)]
pub struct TextSink {
    output: Vec<String>,
    shown: Vec<MacroItem>,
    shown_query: Option<String>,
}

impl TextSink {
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    pub fn note(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    /// Items currently listed, in display order (1-based in the output).
    pub fn shown(&self) -> &[MacroItem] {
        &self.shown
    }

    pub fn clear(&mut self) {
        self.shown.clear();
        self.shown_query = None;
    }
}

impl RenderSink for TextSink {
    fn render(&mut self, query: &str, state: &PageState, is_first_page: bool) {
        let continues = !is_first_page && self.shown_query.as_deref() == Some(query);
        let start = if continues { self.shown.len() } else { 0 };
        if !continues {
            self.output.push(heading(query, state.items().len(), state.has_more()));
        }

        let new_items = state.items().get(start..).unwrap_or_default();
        self.output.extend(item_lines(new_items, start));
        if continues && !state.has_more() {
            self.output.push("(end of results)".to_string());
        }

        self.shown = state.items().to_vec();
        self.shown_query = Some(query.to_string());
    }

    fn render_error(&mut self, query: &str) {
        self.output
            .push(format!("could not load {}; try again", query_label(query)));
    }
}

/// A single fetched page, as printed by the one-shot commands.
pub fn format_page(query: &str, page_index: u32, page: &SearchPage) -> String {
    let mut lines = vec![format!(
        "{} page {page_index}: {} item(s){}",
        query_label(query),
        page.items.len(),
        if page.has_more { ", more available" } else { "" }
    )];
    lines.extend(item_lines(&page.items, 0));
    lines.join("\n")
}

pub fn format_items(items: &[MacroItem]) -> String {
    item_lines(items, 0).collect::<Vec<_>>().join("\n")
}

fn heading(query: &str, count: usize, has_more: bool) -> String {
    let more = if has_more { ", more available" } else { "" };
    format!("{}: {count} item(s){more}", query_label(query))
}

fn query_label(query: &str) -> String {
    if query.is_empty() {
        "suggestions".to_string()
    } else {
        format!("results for {query:?}")
    }
}

fn item_lines(items: &[MacroItem], start: usize) -> impl Iterator<Item = String> + '_ {
    items.iter().enumerate().map(move |(idx, item)| {
        let gif = if item.is_gif == Some(true) { " [gif]" } else { "" };
        format!("{}. {}{gif}  {}", start + idx + 1, item.name, item.url)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghmacros_search::MacroCache;
    use insta::assert_snapshot;
    use pretty_assertions::assert_eq;

    fn item(name: &str) -> MacroItem {
        MacroItem::new(name, format!("https://img.test/{name}.png"))
    }

    #[test]
    fn first_page_then_load_more() {
        let mut cache = MacroCache::default();
        let mut sink = TextSink::default();

        cache.merge_page("cat", vec![item("cat-nap"), item("cat-jam")], true, true);
        sink.render("cat", cache.lookup("cat").expect("cached"), true);
        cache.merge_page("cat", vec![item("cat-vibe")], true, false);
        sink.render("cat", cache.lookup("cat").expect("cached"), false);

        assert_snapshot!(sink.take_output().join("\n"), @r#"
        results for "cat": 2 item(s), more available
        1. cat-nap  https://img.test/cat-nap.png
        2. cat-jam  https://img.test/cat-jam.png
        3. cat-vibe  https://img.test/cat-vibe.png
        (end of results)
        "#);
        assert_eq!(sink.shown().len(), 3);
    }

    #[test]
    fn suggestions_and_errors() {
        let mut cache = MacroCache::default();
        let mut sink = TextSink::default();
        let mut gif = item("party");
        gif.is_gif = Some(true);

        cache.merge_page("", vec![gif], true, false);
        sink.render("", cache.lookup("").expect("cached"), true);
        sink.render_error("dog");

        assert_snapshot!(sink.take_output().join("\n"), @r#"
        suggestions: 1 item(s)
        1. party [gif]  https://img.test/party.png
        could not load results for "dog"; try again
        "#);
        assert!(sink.take_output().is_empty());
    }

    #[test]
    fn one_shot_page() {
        let page = SearchPage::new(vec![item("a"), item("b")], true);
        assert_snapshot!(format_page("", 0, &page), @r"
        suggestions page 0: 2 item(s), more available
        1. a  https://img.test/a.png
        2. b  https://img.test/b.png
        ");
    }
}
