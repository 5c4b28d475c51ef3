use crate::error::{Result, ScanError};
use crate::result::{DivisionNode, DivisionType};
use ego_tree::iter::Edge;
use regex::Regex;
use scraper::{Html, Node};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

static TR_DATA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\w+)tr").unwrap());
static TR_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\w+)head").unwrap());
static LINK_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+/)*([\d/]+)\.html$").unwrap());

/// Record field a header column can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Code,
    Name,
}

/// Header cell text -> field. Columns with any other header text are ignored.
const LABELS: &[(&str, Field)] = &[("统计用区划代码", Field::Code), ("名称", Field::Name)];

pub fn translate_label(text: &str) -> Option<Field> {
    LABELS
        .iter()
        .find(|(label, _)| *label == text)
        .map(|(_, field)| *field)
}

/// What an opening tag means for row tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowClass {
    NoMatch,
    HeaderRow(DivisionType),
    DataRow(DivisionType),
}

/// Classify a tag by name and `class` attribute.
///
/// `<tr class="citytr">` is a city data row, `<tr class="cityhead">` a city
/// header row. Rows whose class names an unknown division type are skipped.
pub fn classify_row(tag: &str, class: Option<&str>) -> RowClass {
    if tag != "tr" {
        return RowClass::NoMatch;
    }
    let Some(class) = class else {
        return RowClass::NoMatch;
    };

    let data_word = TR_DATA_RE.captures(class).map(|c| c[1].to_string());
    if let Some(kind) = data_word.as_deref().and_then(DivisionType::from_str) {
        return RowClass::DataRow(kind);
    }
    let head_word = TR_HEAD_RE.captures(class).map(|c| c[1].to_string());
    if let Some(kind) = head_word.as_deref().and_then(DivisionType::from_str) {
        return RowClass::HeaderRow(kind);
    }

    if let Some(word) = data_word.or(head_word) {
        warn!("Unsupported division row type: {}", word);
    }
    RowClass::NoMatch
}

/// Join a raw `href` onto the page's path prefix.
pub fn resolve_link(prefix: &str, href: &str) -> String {
    if prefix.is_empty() {
        href.to_string()
    } else {
        format!("{}/{}", prefix, href)
    }
}

/// Trailing numeric segment of a link such as `"11/1101.html"`.
pub fn code_from_link(link: &str) -> Option<String> {
    LINK_CODE_RE
        .captures(link)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowKind {
    #[default]
    None,
    Head,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum HeaderState {
    #[default]
    Absent,
    /// Header row seen on a root page; only binding once it maps a column.
    Pending,
    Active,
}

/// Per-page parser state. Dropped with the parser.
#[derive(Debug, Default)]
struct ParseContext {
    row_kind: RowKind,
    row_type: Option<DivisionType>,
    column: usize,
    collecting: bool,
    href: Option<String>,
    current: Option<usize>,
    header: HeaderState,
    columns: HashMap<usize, Field>,
}

/// Turns the markup of one division page into records.
///
/// Each page gets its own parser: the column map, header state and row
/// tracking never carry over between pages.
pub struct PageParser<'a> {
    parent: Option<&'a DivisionNode>,
    prefix: String,
    ctx: ParseContext,
    nodes: Vec<DivisionNode>,
    rows_seen: usize,
}

impl<'a> PageParser<'a> {
    /// Parser for the root page: no spawning record, empty prefix.
    pub fn root() -> Self {
        Self::new(None, "")
    }

    pub fn new(parent: Option<&'a DivisionNode>, prefix: impl Into<String>) -> Self {
        Self {
            parent,
            prefix: prefix.into(),
            ctx: ParseContext::default(),
            nodes: Vec::new(),
            rows_seen: 0,
        }
    }

    /// Level of the records this page holds.
    pub fn level(&self) -> u8 {
        self.parent.map(|p| p.level.saturating_add(1)).unwrap_or(1)
    }

    pub fn column(&self) -> usize {
        self.ctx.column
    }

    pub fn row_kind(&self) -> RowKind {
        self.ctx.row_kind
    }

    pub fn nodes(&self) -> &[DivisionNode] {
        &self.nodes
    }

    /// Parse an HTML document and replay it as tag/text events.
    pub fn feed(&mut self, html: &str) -> Result<()> {
        let document = Html::parse_document(html);

        for edge in document.tree.root().traverse() {
            match edge {
                Edge::Open(node) => match node.value() {
                    Node::Element(el) => {
                        let attrs: HashMap<&str, &str> = el.attrs().collect();
                        self.handle_start_tag(el.name(), &attrs);
                    }
                    Node::Text(text) => self.handle_text(text),
                    _ => {}
                },
                Edge::Close(node) => {
                    if let Node::Element(el) = node.value() {
                        self.handle_end_tag(el.name());
                    }
                }
            }
        }

        if self.rows_seen == 0 {
            return Err(ScanError::ParseError(
                "no division rows found in page".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse a whole page and return its records.
    pub fn parse(mut self, html: &str) -> Result<Vec<DivisionNode>> {
        self.feed(html)?;
        Ok(self.finish())
    }

    pub fn finish(self) -> Vec<DivisionNode> {
        self.nodes
    }

    pub fn handle_start_tag(&mut self, tag: &str, attrs: &HashMap<&str, &str>) {
        match classify_row(tag, attrs.get("class").copied()) {
            RowClass::DataRow(kind) => self.open_data_row(kind),
            RowClass::HeaderRow(kind) => self.open_header_row(kind),
            RowClass::NoMatch => {
                if (tag == "td" || tag == "a") && self.ctx.row_kind != RowKind::None {
                    self.open_cell(tag, attrs.get("href").copied());
                }
            }
        }
    }

    pub fn handle_end_tag(&mut self, tag: &str) {
        if tag == "tr" {
            self.close_row();
        }
        self.ctx.collecting = false;
    }

    pub fn handle_text(&mut self, data: &str) {
        if !self.ctx.collecting {
            return;
        }
        let text = data.trim();
        if text.is_empty() {
            return;
        }

        match self.ctx.row_kind {
            RowKind::Head => self.bind_column(text),
            RowKind::Data if self.ctx.header == HeaderState::Active => self.fill_column(text),
            RowKind::Data => self.push_labelled_node(text),
            RowKind::None => {}
        }
    }

    fn open_data_row(&mut self, kind: DivisionType) {
        self.ctx.row_kind = RowKind::Data;
        self.ctx.row_type = Some(kind);
        self.ctx.column = 0;
        self.ctx.href = None;
        self.ctx.current = None;
        self.rows_seen += 1;

        let level = self.level();
        if kind.level() != level {
            debug!("{} row found on a level {} page", kind, level);
        }

        if self.ctx.header == HeaderState::Active {
            self.ctx.current = Some(self.push_node(kind));
        }
    }

    fn open_header_row(&mut self, kind: DivisionType) {
        debug!("Header row for {} on level {} page", kind, self.level());
        self.ctx.row_kind = RowKind::Head;
        self.ctx.row_type = Some(kind);
        self.ctx.column = 0;
        self.ctx.href = None;
        self.ctx.current = None;
        self.ctx.columns = HashMap::new();
        self.ctx.header = if self.level() > 1 {
            HeaderState::Active
        } else {
            HeaderState::Pending
        };
        self.rows_seen += 1;
    }

    fn open_cell(&mut self, tag: &str, href: Option<&str>) {
        if tag == "td" {
            self.ctx.column += 1;
            // Labelled rows take their link from the cell holding the label.
            if self.ctx.header != HeaderState::Active {
                self.ctx.href = None;
            }
        }
        self.ctx.collecting = true;

        if let Some(href) = href {
            let link = resolve_link(&self.prefix, href);
            if let Some(idx) = self.ctx.current {
                self.nodes[idx].link = Some(link.clone());
            }
            self.ctx.href = Some(link);
        }
    }

    fn close_row(&mut self) {
        if self.ctx.row_kind == RowKind::Head
            && self.ctx.header == HeaderState::Pending
            && !self.ctx.columns.is_empty()
        {
            self.ctx.header = HeaderState::Active;
        }
        self.ctx.row_kind = RowKind::None;
        self.ctx.current = None;
    }

    fn bind_column(&mut self, text: &str) {
        if let Some(field) = translate_label(text) {
            self.ctx.columns.insert(self.ctx.column, field);
        }
    }

    fn fill_column(&mut self, text: &str) {
        let Some(idx) = self.ctx.current else {
            return;
        };
        let node = &mut self.nodes[idx];
        match self.ctx.columns.get(&self.ctx.column) {
            Some(Field::Code) => node.code = Some(text.to_string()),
            Some(Field::Name) => node.name = Some(text.to_string()),
            None => {}
        }
    }

    fn push_labelled_node(&mut self, text: &str) {
        let Some(kind) = self.ctx.row_type else {
            return;
        };
        let idx = self.push_node(kind);
        let link = self.ctx.href.clone();
        let node = &mut self.nodes[idx];
        node.name = Some(text.to_string());
        node.code = link.as_deref().and_then(code_from_link);
        node.link = link;
        // One record per cell: further text waits for the next cell or anchor.
        self.ctx.collecting = false;
    }

    fn push_node(&mut self, kind: DivisionType) -> usize {
        self.nodes.push(DivisionNode::new(kind, self.parent));
        self.nodes.len() - 1
    }
}
