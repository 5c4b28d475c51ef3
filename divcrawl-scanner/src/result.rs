use crate::error::FailureKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Administrative level of a division row, ordered from the top down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DivisionType {
    Province,
    City,
    County,
    Town,
    Village,
}

impl DivisionType {
    pub const ALL: [DivisionType; 5] = [
        DivisionType::Province,
        DivisionType::City,
        DivisionType::County,
        DivisionType::Town,
        DivisionType::Village,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "province" => Some(DivisionType::Province),
            "city" => Some(DivisionType::City),
            "county" => Some(DivisionType::County),
            "town" => Some(DivisionType::Town),
            "village" => Some(DivisionType::Village),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DivisionType::Province => "province",
            DivisionType::City => "city",
            DivisionType::County => "county",
            DivisionType::Town => "town",
            DivisionType::Village => "village",
        }
    }

    /// Crawl level this type normally appears on (province = 1).
    pub fn level(&self) -> u8 {
        match self {
            DivisionType::Province => 1,
            DivisionType::City => 2,
            DivisionType::County => 3,
            DivisionType::Town => 4,
            DivisionType::Village => 5,
        }
    }
}

impl fmt::Display for DivisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One administrative unit discovered on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionNode {
    pub code: Option<String>,
    #[serde(rename = "p_code")]
    pub parent_code: Option<String>,
    pub level: u8,
    pub name: Option<String>,
    #[serde(rename = "href")]
    pub link: Option<String>,
    #[serde(rename = "type")]
    pub kind: DivisionType,
}

impl DivisionNode {
    /// Start a node for a row of `kind` found on the page spawned by `parent`.
    ///
    /// Root pages have no parent: level 1 and no parent code.
    pub fn new(kind: DivisionType, parent: Option<&DivisionNode>) -> Self {
        let (level, parent_code) = match parent {
            Some(p) => (p.level.saturating_add(1), p.code.clone()),
            None => (1, None),
        };
        Self {
            code: None,
            parent_code,
            level,
            name: None,
            link: None,
            kind,
        }
    }

    /// Directory part of this node's link, used to resolve links on its child page.
    ///
    /// `"11/1101.html"` gives `"11"`; a bare `"11.html"` gives an empty prefix.
    pub fn child_prefix(&self) -> Option<String> {
        let link = self.link.as_deref()?;
        let segments: Vec<&str> = link.split('/').collect();
        if segments.len() > 1 {
            Some(segments[..segments.len() - 1].join("/"))
        } else {
            Some(String::new())
        }
    }
}

/// A child page that could not be fetched or parsed, kept for a manual retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryEntry {
    #[serde(rename = "href")]
    pub link: String,
    pub node: DivisionNode,
    pub path: String,
    pub kind: FailureKind,
    pub error: String,
}

/// Everything a crawl produced: records in discovery order and the failed expansions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlOutcome {
    pub records: Vec<DivisionNode>,
    pub retries: Vec<RetryEntry>,
}

impl CrawlOutcome {
    pub fn is_complete(&self) -> bool {
        self.retries.is_empty()
    }

    pub fn count_by_type(&self, kind: DivisionType) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }
}
