use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, OnceLock};

/// Render assistant Markdown to terminal lines: headings, emphasis,
/// GFM strikethrough and tables, lists, block quotes, and fenced code blocks
/// with syntax highlighting.
pub fn render_markdown(text: &str) -> Vec<Line<'static>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut renderer = Renderer::default();
    for event in Parser::new_ext(text, options) {
        renderer.handle(event);
    }
    renderer.finish()
}

enum ListKind {
    Unordered,
    Ordered(u64),
}

struct CodeBlock {
    lang: String,
    text: String,
}

#[derive(Default)]
struct TableState {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    current_row: Vec<String>,
    current_cell: String,
    in_cell: bool,
}

#[derive(Default)]
struct Renderer {
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    style_stack: Vec<Style>,
    list_stack: Vec<ListKind>,
    quote_depth: usize,
    code_block: Option<CodeBlock>,
    table: Option<TableState>,
}

impl Renderer {
    fn handle(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.push_text(&text),
            Event::Code(code) => {
                if self.route_to_buffer(&code) {
                    return;
                }
                self.spans.push(Span::styled(
                    code.to_string(),
                    self.current_style().fg(Color::Yellow),
                ));
            }
            Event::SoftBreak | Event::HardBreak => {
                if self.route_to_buffer("\n") {
                    return;
                }
                self.flush_line();
            }
            Event::Rule => {
                self.flush_line();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(40),
                    Style::default().fg(Color::DarkGray),
                )));
                self.block_gap();
            }
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                self.spans.push(Span::raw(marker));
            }
            Event::Html(html) | Event::InlineHtml(html) => self.push_text(&html),
            _ => {}
        }
    }

    fn start_tag(&mut self, tag: Tag) {
        match tag {
            Tag::Paragraph => {}
            Tag::Heading { level, .. } => {
                self.flush_line();
                self.style_stack.push(heading_style(level));
            }
            Tag::BlockQuote(_) => {
                self.flush_line();
                self.quote_depth += 1;
                self.style_stack
                    .push(Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC));
            }
            Tag::CodeBlock(kind) => {
                self.flush_line();
                let lang = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_ascii_whitespace()
                        .next()
                        .unwrap_or("")
                        .to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code_block = Some(CodeBlock {
                    lang,
                    text: String::new(),
                });
            }
            Tag::List(start) => {
                self.flush_line();
                self.list_stack.push(match start {
                    Some(n) => ListKind::Ordered(n),
                    None => ListKind::Unordered,
                });
            }
            Tag::Item => {
                self.flush_line();
                let depth = self.list_stack.len().saturating_sub(1);
                let marker = match self.list_stack.last_mut() {
                    Some(ListKind::Ordered(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                if depth > 0 {
                    self.spans.push(Span::raw("  ".repeat(depth)));
                }
                self.spans
                    .push(Span::styled(marker, Style::default().fg(Color::Cyan)));
            }
            Tag::Emphasis => self.push_modifier(Modifier::ITALIC),
            Tag::Strong => self.push_modifier(Modifier::BOLD),
            Tag::Strikethrough => self.push_modifier(Modifier::CROSSED_OUT),
            Tag::Link { .. } => {
                self.style_stack.push(
                    self.current_style()
                        .fg(Color::Blue)
                        .add_modifier(Modifier::UNDERLINED),
                );
            }
            Tag::Image { .. } => {
                self.style_stack
                    .push(self.current_style().add_modifier(Modifier::ITALIC));
            }
            Tag::Table(_) => {
                self.flush_line();
                self.table = Some(TableState::default());
            }
            Tag::TableRow => {
                if let Some(table) = &mut self.table {
                    table.current_row.clear();
                }
            }
            Tag::TableCell => {
                if let Some(table) = &mut self.table {
                    table.current_cell.clear();
                    table.in_cell = true;
                }
            }
            _ => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.flush_line();
                self.block_gap();
            }
            TagEnd::Heading(_) => {
                self.style_stack.pop();
                self.flush_line();
                self.block_gap();
            }
            TagEnd::BlockQuote(_) => {
                self.style_stack.pop();
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.block_gap();
            }
            TagEnd::CodeBlock => {
                if let Some(block) = self.code_block.take() {
                    let highlighted = highlight_code_block(&block.lang, &block.text);
                    self.lines.extend(highlighted);
                }
                self.block_gap();
            }
            TagEnd::List(_) => {
                self.flush_line();
                self.list_stack.pop();
                self.block_gap();
            }
            TagEnd::Item => self.flush_line(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.style_stack.pop();
            }
            TagEnd::Link | TagEnd::Image => {
                self.style_stack.pop();
            }
            TagEnd::TableHead => {
                if let Some(table) = &mut self.table {
                    table.header = std::mem::take(&mut table.current_row);
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = &mut self.table {
                    let row = std::mem::take(&mut table.current_row);
                    table.rows.push(row);
                }
            }
            TagEnd::TableCell => {
                if let Some(table) = &mut self.table {
                    let cell = std::mem::take(&mut table.current_cell);
                    table.current_row.push(cell.trim().to_string());
                    table.in_cell = false;
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.render_table(table);
                }
                self.block_gap();
            }
            _ => {}
        }
    }

    /// Text events inside code blocks and table cells go to their buffers
    /// instead of the current line.
    fn route_to_buffer(&mut self, text: &str) -> bool {
        if let Some(block) = &mut self.code_block {
            block.text.push_str(text);
            return true;
        }
        if let Some(table) = &mut self.table {
            if table.in_cell {
                table.current_cell.push_str(text);
                return true;
            }
        }
        false
    }

    fn push_text(&mut self, text: &str) {
        if self.route_to_buffer(text) {
            return;
        }
        self.spans
            .push(Span::styled(text.to_string(), self.current_style()));
    }

    fn push_modifier(&mut self, modifier: Modifier) {
        self.style_stack.push(self.current_style().add_modifier(modifier));
    }

    fn current_style(&self) -> Style {
        self.style_stack.last().copied().unwrap_or_default()
    }

    fn flush_line(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let mut spans = std::mem::take(&mut self.spans);
        if self.quote_depth > 0 {
            spans.insert(
                0,
                Span::styled(
                    "│ ".repeat(self.quote_depth),
                    Style::default().fg(Color::DarkGray),
                ),
            );
        }
        self.lines.push(Line::from(spans));
    }

    /// Blank line between top-level blocks; nested blocks stay tight.
    fn block_gap(&mut self) {
        if self.list_stack.is_empty()
            && self.quote_depth == 0
            && matches!(self.lines.last(), Some(line) if !line.spans.is_empty())
        {
            self.lines.push(Line::default());
        }
    }

    fn render_table(&mut self, table: TableState) {
        let mut widths: Vec<usize> = table.header.iter().map(|c| c.chars().count()).collect();
        for row in &table.rows {
            for (i, cell) in row.iter().enumerate() {
                let len = cell.chars().count();
                if i >= widths.len() {
                    widths.push(len);
                } else if len > widths[i] {
                    widths[i] = len;
                }
            }
        }

        let pad = |cell: &str, width: usize| {
            let mut padded = cell.to_string();
            let len = cell.chars().count();
            padded.push_str(&" ".repeat(width.saturating_sub(len)));
            padded
        };

        if !table.header.is_empty() {
            let cells: Vec<String> = table
                .header
                .iter()
                .enumerate()
                .map(|(i, c)| pad(c, widths.get(i).copied().unwrap_or(0)))
                .collect();
            self.lines.push(Line::from(Span::styled(
                cells.join(" │ "),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            self.lines.push(Line::from(Span::styled(
                rule.join("─┼─"),
                Style::default().fg(Color::DarkGray),
            )));
        }

        for row in &table.rows {
            let cells: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, c)| pad(c, widths.get(i).copied().unwrap_or(0)))
                .collect();
            self.lines.push(Line::from(cells.join(" │ ")));
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush_line();
        while matches!(self.lines.last(), Some(line) if line.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}

fn heading_style(level: HeadingLevel) -> Style {
    let style = Style::default().add_modifier(Modifier::BOLD);
    match level {
        HeadingLevel::H1 | HeadingLevel::H2 => style.fg(Color::Cyan),
        _ => style.fg(Color::Blue),
    }
}

// Bounded FIFO cache for highlighted blocks so the reveal animation does not
// re-run syntect on every frame.
struct HighlightCache {
    map: HashMap<(String, u64), Vec<Line<'static>>>,
    order: VecDeque<(String, u64)>,
    cap: usize,
}

impl HighlightCache {
    fn new(cap: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            cap,
        }
    }

    fn get(&self, key: &(String, u64)) -> Option<Vec<Line<'static>>> {
        self.map.get(key).cloned()
    }

    fn put(&mut self, key: (String, u64), value: Vec<Line<'static>>) {
        if !self.map.contains_key(&key) {
            self.order.push_back(key.clone());
        }
        self.map.insert(key, value);
        while self.map.len() > self.cap {
            if let Some(old) = self.order.pop_front() {
                self.map.remove(&old);
            } else {
                break;
            }
        }
    }
}

static HIGHLIGHT_CACHE: Mutex<Option<HighlightCache>> = Mutex::new(None);

fn hash_code(lang: &str, code: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    lang.hash(&mut hasher);
    code.hash(&mut hasher);
    hasher.finish()
}

fn normalize_lang_hint(hint: &str) -> String {
    let t = hint.trim().to_ascii_lowercase();
    match t.as_str() {
        "py" | "python" => "python".into(),
        "bash" | "sh" | "zsh" | "shell" => "bash".into(),
        "js" | "javascript" | "jsx" => "javascript".into(),
        "ts" | "tsx" | "typescript" => "typescript".into(),
        "rust" | "rs" => "rust".into(),
        "yaml" | "yml" => "yaml".into(),
        "cpp" | "cc" | "cxx" | "hpp" | "hxx" => "cpp".into(),
        "c" | "h" => "c".into(),
        other => other.into(),
    }
}

fn plain_code_lines(code: &str) -> Vec<Line<'static>> {
    code.lines()
        .map(|line| {
            Line::from(Span::styled(
                line.replace('\t', "    "),
                Style::default().fg(Color::Gray),
            ))
        })
        .collect()
}

fn highlight_code_block(lang_hint: &str, code: &str) -> Vec<Line<'static>> {
    static SYNTAX_SET: OnceLock<syntect::parsing::SyntaxSet> = OnceLock::new();
    static THEME_SET: OnceLock<syntect::highlighting::ThemeSet> = OnceLock::new();

    let lang = normalize_lang_hint(lang_hint);
    let key = (lang.clone(), hash_code(&lang, code));
    {
        let mut guard = HIGHLIGHT_CACHE.lock().unwrap();
        let cache = guard.get_or_insert_with(|| HighlightCache::new(64));
        if let Some(lines) = cache.get(&key) {
            return lines;
        }
    }

    let ps = SYNTAX_SET.get_or_init(syntect::parsing::SyntaxSet::load_defaults_newlines);
    let ts = THEME_SET.get_or_init(syntect::highlighting::ThemeSet::load_defaults);
    let Some(theme) = ts.themes.get("base16-ocean.dark") else {
        return plain_code_lines(code);
    };

    let syntax = ps
        .find_syntax_by_token(&lang)
        .unwrap_or_else(|| ps.find_syntax_plain_text());
    let mut highlighter = syntect::easy::HighlightLines::new(syntax, theme);

    let mut out: Vec<Line<'static>> = Vec::new();
    for line in syntect::util::LinesWithEndings::from(code) {
        let Ok(ranges) = highlighter.highlight_line(line, ps) else {
            return plain_code_lines(code);
        };
        let mut spans: Vec<Span<'static>> = Vec::new();
        for (style, text) in ranges {
            let fragment = text.strip_suffix('\n').unwrap_or(text);
            if fragment.is_empty() {
                continue;
            }
            let fg = style.foreground;
            spans.push(Span::styled(
                fragment.replace('\t', "    "),
                Style::default().fg(Color::Rgb(fg.r, fg.g, fg.b)),
            ));
        }
        if spans.is_empty() {
            out.push(Line::from(""));
        } else {
            out.push(Line::from(spans));
        }
    }

    let mut guard = HIGHLIGHT_CACHE.lock().unwrap();
    let cache = guard.get_or_insert_with(|| HighlightCache::new(64));
    cache.put(key, out.clone());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn all_text(lines: &[Line]) -> Vec<String> {
        lines.iter().map(line_text).collect()
    }

    #[test]
    fn plain_text_passes_through() {
        let lines = render_markdown("just some text");
        assert_eq!(all_text(&lines), vec!["just some text"]);
    }

    #[test]
    fn heading_is_bold() {
        let lines = render_markdown("# Title");
        assert_eq!(line_text(&lines[0]), "Title");
        assert!(lines[0].spans[0]
            .style
            .add_modifier
            .contains(Modifier::BOLD));
    }

    #[test]
    fn strong_and_emphasis_spans_are_styled() {
        let lines = render_markdown("**bold** and *italic*");
        let spans = &lines[0].spans;
        let bold = spans.iter().find(|s| s.content == "bold").unwrap();
        assert!(bold.style.add_modifier.contains(Modifier::BOLD));
        let italic = spans.iter().find(|s| s.content == "italic").unwrap();
        assert!(italic.style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn strikethrough_is_crossed_out() {
        let lines = render_markdown("~~gone~~");
        let span = lines[0].spans.iter().find(|s| s.content == "gone").unwrap();
        assert!(span.style.add_modifier.contains(Modifier::CROSSED_OUT));
    }

    #[test]
    fn fenced_code_block_keeps_every_line() {
        let lines = render_markdown("```rust\nfn main() {\n    let x = 1;\n}\n```");
        let texts = all_text(&lines);
        assert!(texts.iter().any(|l| l.contains("fn main() {")));
        assert!(texts.iter().any(|l| l.contains("let x = 1;")));
        assert!(texts.iter().any(|l| l == "}"));
    }

    #[test]
    fn unordered_list_gets_bullets() {
        let lines = render_markdown("- first\n- second");
        let texts = all_text(&lines);
        assert_eq!(texts[0], "• first");
        assert_eq!(texts[1], "• second");
    }

    #[test]
    fn ordered_list_counts_from_start() {
        let lines = render_markdown("3. third\n4. fourth");
        let texts = all_text(&lines);
        assert_eq!(texts[0], "3. third");
        assert_eq!(texts[1], "4. fourth");
    }

    #[test]
    fn table_renders_header_rule_and_rows() {
        let lines = render_markdown("| left | right |\n| --- | --- |\n| a | b |");
        let texts = all_text(&lines);
        assert!(texts[0].contains("left"));
        assert!(texts[0].contains("│"));
        assert!(texts[1].contains("┼"));
        assert!(texts[2].contains("a"));
        assert!(texts[2].contains("b"));
    }

    #[test]
    fn block_quote_lines_are_prefixed() {
        let lines = render_markdown("> quoted words");
        assert!(line_text(&lines[0]).starts_with("│ "));
        assert!(line_text(&lines[0]).contains("quoted words"));
    }

    #[test]
    fn paragraphs_are_separated_by_one_blank_line() {
        let lines = render_markdown("one\n\ntwo");
        let texts = all_text(&lines);
        assert_eq!(texts, vec!["one", "", "two"]);
    }

    #[test]
    fn inline_code_is_highlighted() {
        let lines = render_markdown("use `cargo test` here");
        let span = lines[0]
            .spans
            .iter()
            .find(|s| s.content == "cargo test")
            .unwrap();
        assert_eq!(span.style.fg, Some(Color::Yellow));
    }
}
