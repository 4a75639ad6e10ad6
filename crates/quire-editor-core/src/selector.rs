//! Selector matching for type definitions.
//!
//! Supports the subset of CSS selectors type definitions use: comma lists,
//! type and universal selectors, classes, ids, attribute selectors
//! (`[a]`, `[a=v]`, `[a*=v]`, `[a^=v]`, `[a$=v]`, `[a~=v]`) and the child
//! (`>`) and descendant combinators. Comparisons on the `style` attribute
//! ignore whitespace and case so `font-weight: bold` matches
//! `font-weight:bold`.

use std::fmt;

use smol_str::SmolStr;

use crate::dom::DomTree;
use crate::error::{EditorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Contains,
    Prefix,
    Suffix,
    Includes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSelector {
    name: SmolStr,
    op: AttrOp,
    value: String,
}

impl AttrSelector {
    fn matches(&self, actual: Option<String>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        let (actual, value) = if self.name == "style" {
            (normalize_style(&actual), normalize_style(&self.value))
        } else {
            (actual, self.value.clone())
        };
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == value,
            AttrOp::Contains => !value.is_empty() && actual.contains(&value),
            AttrOp::Prefix => !value.is_empty() && actual.starts_with(&value),
            AttrOp::Suffix => !value.is_empty() && actual.ends_with(&value),
            AttrOp::Includes => actual.split_ascii_whitespace().any(|w| w == value),
        }
    }
}

fn normalize_style(style: &str) -> String {
    style
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    /// `None` for `*` or an omitted type.
    tag: Option<SmolStr>,
    id: Option<SmolStr>,
    classes: Vec<SmolStr>,
    attributes: Vec<AttrSelector>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attributes.is_empty()
    }

    fn matches<D: DomTree>(&self, dom: &D, node: &D::Node) -> bool {
        let Some(tag) = dom.tag_name(node) else {
            return false;
        };
        if self.tag.as_ref().is_some_and(|t| *t != tag) {
            return false;
        }
        if let Some(id) = &self.id {
            if dom.attribute(node, "id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| dom.has_class(node, c)) {
            return false;
        }
        self.attributes
            .iter()
            .all(|a| a.matches(dom.attribute(node, &a.name)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

impl Complex {
    fn matches<D: DomTree>(&self, dom: &D, node: &D::Node) -> bool {
        self.matches_at(dom, node, self.compounds.len() - 1)
    }

    fn matches_at<D: DomTree>(&self, dom: &D, node: &D::Node, index: usize) -> bool {
        if !self.compounds[index].matches(dom, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => dom
                .parent(node)
                .is_some_and(|p| self.matches_at(dom, &p, index - 1)),
            Combinator::Descendant => {
                let mut current = dom.parent(node);
                while let Some(p) = current {
                    if self.matches_at(dom, &p, index - 1) {
                        return true;
                    }
                    current = dom.parent(&p);
                }
                false
            }
        }
    }
}

/// A parsed comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    source: String,
    selectors: Vec<Complex>,
}

impl SelectorList {
    pub fn parse(source: &str) -> Result<Self> {
        let selectors = Parser::new(source).parse_list()?;
        Ok(Self {
            source: source.trim().to_string(),
            selectors,
        })
    }

    /// A list matching nothing.
    pub fn empty() -> Self {
        Self {
            source: String::new(),
            selectors: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Union of several lists, in order.
    pub fn union<'a>(lists: impl IntoIterator<Item = &'a SelectorList>) -> Self {
        let mut combined = Self::empty();
        for list in lists {
            if list.is_empty() {
                continue;
            }
            if !combined.source.is_empty() {
                combined.source.push_str(", ");
            }
            combined.source.push_str(&list.source);
            combined.selectors.extend(list.selectors.iter().cloned());
        }
        combined
    }

    /// False for anything that is not an element.
    pub fn matches<D: DomTree>(&self, dom: &D, node: &D::Node) -> bool {
        dom.is_element(node) && self.selectors.iter().any(|s| s.matches(dom, node))
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// === Parser ===

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> EditorError {
        EditorError::invalid_selector(self.source, reason)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_list(&mut self) -> Result<Vec<Complex>> {
        let mut list = Vec::new();
        loop {
            self.skip_ws();
            list.push(self.parse_complex()?);
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(',') => self.pos += 1,
                Some(c) => return Err(self.error(format!("unexpected `{c}`"))),
            }
        }
        Ok(list)
    }

    fn parse_complex(&mut self) -> Result<Complex> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                Some('>') => {
                    self.pos += 1;
                    self.skip_ws();
                    Combinator::Child
                }
                Some(',') | None => break,
                Some(_) if had_ws => Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected `{c}`"))),
            };
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }
        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let mut universal = false;
        if self.peek() == Some('*') {
            self.pos += 1;
            universal = true;
        } else if self.peek().is_some_and(is_ident_char) {
            compound.tag = Some(self.parse_ident()?.to_ascii_lowercase().into());
        }
        loop {
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.parse_ident()?.into());
                }
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.parse_ident()?.into());
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attributes.push(self.parse_attribute()?);
                }
                _ => break,
            }
        }
        if compound.is_empty() && !universal {
            return Err(self.error("expected a selector"));
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected an identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_attribute(&mut self) -> Result<AttrSelector> {
        self.skip_ws();
        let name: SmolStr = self.parse_ident()?.to_ascii_lowercase().into();
        self.skip_ws();
        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttrSelector {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                });
            }
            Some('=') => AttrOp::Equals,
            Some('*') => AttrOp::Contains,
            Some('^') => AttrOp::Prefix,
            Some('$') => AttrOp::Suffix,
            Some('~') => AttrOp::Includes,
            _ => return Err(self.error("malformed attribute selector")),
        };
        self.pos += 1;
        if op != AttrOp::Equals {
            if self.peek() != Some('=') {
                return Err(self.error("malformed attribute operator"));
            }
            self.pos += 1;
        }
        self.skip_ws();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != quote) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(self.error("unterminated string"));
                }
                let value: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                value
            }
            _ => self.parse_ident()?,
        };
        self.skip_ws();
        if self.peek() != Some(']') {
            return Err(self.error("expected `]`"));
        }
        self.pos += 1;
        Ok(AttrSelector { name, op, value })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}
