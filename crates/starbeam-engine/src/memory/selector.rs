//! The CSS subset understood by [`MemoryDom`](super::MemoryDom).
//!
//! Supported: type, `*`, `#id`, `.class`, `[attr]` with `= ^= $= *= ~= |=`,
//! descendant and child combinators, and comma-separated groups.

use super::{NodeId, Tree};
use crate::dom::DomError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
    Includes { key: String, value: String },
    DashMatch { key: String, value: String },
}

impl AttrCondition {
    fn key(&self) -> &str {
        match self {
            AttrCondition::Exists { key }
            | AttrCondition::Eq { key, .. }
            | AttrCondition::StartsWith { key, .. }
            | AttrCondition::EndsWith { key, .. }
            | AttrCondition::Contains { key, .. }
            | AttrCondition::Includes { key, .. }
            | AttrCondition::DashMatch { key, .. } => key,
        }
    }

    fn accepts(&self, attr: &str) -> bool {
        match self {
            AttrCondition::Exists { .. } => true,
            AttrCondition::Eq { value, .. } => attr == value,
            AttrCondition::StartsWith { value, .. } => !value.is_empty() && attr.starts_with(value),
            AttrCondition::EndsWith { value, .. } => !value.is_empty() && attr.ends_with(value),
            AttrCondition::Contains { value, .. } => !value.is_empty() && attr.contains(value),
            AttrCondition::Includes { value, .. } => {
                attr.split_whitespace().any(|token| token == value)
            }
            AttrCondition::DashMatch { value, .. } => {
                attr == value || attr.starts_with(&format!("{value}-"))
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Part {
    compound: Compound,
    // relation to the part on the left
    combinator: Option<Combinator>,
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorList {
    groups: Vec<Vec<Part>>,
}

impl SelectorList {
    pub(crate) fn parse(selector: &str) -> Result<Self, DomError> {
        let invalid = || DomError::InvalidSelector(selector.to_string());
        let groups = split_outside_brackets(selector, |c| c == ',')
            .ok_or_else(invalid)?
            .into_iter()
            .map(|group| parse_chain(&group).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { groups })
    }

    pub(crate) fn matches(&self, tree: &Tree, node: NodeId) -> bool {
        self.groups.iter().any(|chain| matches_chain(tree, node, chain))
    }
}

/// Split on `sep` outside of `[...]` and quotes. Empty pieces are rejected.
fn split_outside_brackets(src: &str, sep: impl Fn(char) -> bool) -> Option<Vec<String>> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in src.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(ch);
                current.push(ch);
            }
            (None, '[') => {
                depth += 1;
                current.push(ch);
            }
            (None, ']') => {
                depth = depth.checked_sub(1)?;
                current.push(ch);
            }
            (None, c) if depth == 0 && sep(c) => {
                let trimmed = current.trim();
                if trimmed.is_empty() {
                    return None;
                }
                pieces.push(trimmed.to_string());
                current.clear();
            }
            (None, c) => current.push(c),
        }
    }

    if depth != 0 || quote.is_some() || current.trim().is_empty() {
        return None;
    }
    pieces.push(current.trim().to_string());
    Some(pieces)
}

fn parse_chain(group: &str) -> Option<Vec<Part>> {
    // Give `>` room so whitespace splitting sees it as its own token.
    let mut spaced = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for ch in group.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, '>') if depth == 0 => {
                spaced.push_str(" > ");
                continue;
            }
            _ => {}
        }
        spaced.push(ch);
    }

    let tokens = split_whitespace_outside_brackets(&spaced)?;
    let mut parts = Vec::new();
    let mut pending: Option<Combinator> = None;

    for token in tokens {
        if token == ">" {
            if pending.is_some() || parts.is_empty() {
                return None;
            }
            pending = Some(Combinator::Child);
            continue;
        }
        let compound = parse_compound(&token)?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(pending.take().unwrap_or(Combinator::Descendant))
        };
        parts.push(Part {
            compound,
            combinator,
        });
    }

    if parts.is_empty() || pending.is_some() {
        return None;
    }
    Some(parts)
}

fn split_whitespace_outside_brackets(src: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in src.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.checked_sub(1)?,
            (None, c) if depth == 0 && c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Some(tokens)
}

fn parse_compound(token: &str) -> Option<Compound> {
    let chars: Vec<char> = token.chars().collect();
    let mut compound = Compound::default();
    let mut universal = false;
    let mut i = 0usize;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                if universal || compound.tag.is_some() || i != 0 {
                    return None;
                }
                universal = true;
                i += 1;
            }
            '#' => {
                let (id, next) = parse_ident(&chars, i + 1)?;
                if compound.id.replace(id).is_some() {
                    return None;
                }
                i = next;
            }
            '.' => {
                let (class, next) = parse_ident(&chars, i + 1)?;
                compound.classes.push(class);
                i = next;
            }
            '[' => {
                let (cond, next) = parse_attr(&chars, i + 1)?;
                compound.attrs.push(cond);
                i = next;
            }
            _ => {
                if i != 0 {
                    return None;
                }
                let (tag, next) = parse_ident(&chars, i)?;
                compound.tag = Some(tag.to_ascii_lowercase());
                i = next;
            }
        }
    }
    Some(compound)
}

fn parse_ident(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut end = start;
    while end < chars.len() && (chars[end].is_alphanumeric() || matches!(chars[end], '-' | '_'))
    {
        end += 1;
    }
    if end == start {
        return None;
    }
    Some((chars[start..end].iter().collect(), end))
}

/// Parses the inside of `[...]`; `start` points just past the `[`.
fn parse_attr(chars: &[char], start: usize) -> Option<(AttrCondition, usize)> {
    let skip_ws = |mut i: usize| {
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        i
    };

    let i = skip_ws(start);
    let (key, i) = parse_ident(chars, i)?;
    let key = key.to_ascii_lowercase();
    let mut i = skip_ws(i);

    if *chars.get(i)? == ']' {
        return Some((AttrCondition::Exists { key }, i + 1));
    }

    let op = match chars.get(i)? {
        '=' => {
            i += 1;
            '='
        }
        c @ ('^' | '$' | '*' | '~' | '|') if chars.get(i + 1) == Some(&'=') => {
            i += 2;
            *c
        }
        _ => return None,
    };
    i = skip_ws(i);

    let value: String = match chars.get(i)? {
        q @ ('"' | '\'') => {
            let close = chars[i + 1..].iter().position(|c| c == q)? + i + 1;
            let value = chars[i + 1..close].iter().collect();
            i = close + 1;
            value
        }
        _ => {
            let (value, next) = parse_ident(chars, i)?;
            i = next;
            value
        }
    };

    i = skip_ws(i);
    if *chars.get(i)? != ']' {
        return None;
    }

    let cond = match op {
        '=' => AttrCondition::Eq { key, value },
        '^' => AttrCondition::StartsWith { key, value },
        '$' => AttrCondition::EndsWith { key, value },
        '*' => AttrCondition::Contains { key, value },
        '~' => AttrCondition::Includes { key, value },
        _ => AttrCondition::DashMatch { key, value },
    };
    Some((cond, i + 1))
}

fn matches_compound(tree: &Tree, node: NodeId, compound: &Compound) -> bool {
    let Some(element) = tree.element(node) else {
        return false;
    };

    if let Some(tag) = &compound.tag {
        if element.tag != *tag {
            return false;
        }
    }
    if let Some(id) = &compound.id {
        if element.attr("id") != Some(id.as_str()) {
            return false;
        }
    }
    if compound.classes.iter().any(|class| {
        !element
            .attr("class")
            .is_some_and(|attr| attr.split_whitespace().any(|c| c == class))
    }) {
        return false;
    }
    compound.attrs.iter().all(|cond| {
        element
            .attr(cond.key())
            .is_some_and(|attr| cond.accepts(attr))
    })
}

/// Right-to-left match. Ancestors are looked up within the node's own tree.
fn matches_chain(tree: &Tree, node: NodeId, chain: &[Part]) -> bool {
    let Some((last, rest)) = chain.split_last() else {
        return false;
    };
    if !matches_compound(tree, node, &last.compound) {
        return false;
    }
    match last.combinator {
        None => true,
        Some(Combinator::Child) => tree
            .parent_element(node)
            .is_some_and(|parent| matches_chain(tree, parent, rest)),
        Some(Combinator::Descendant) => {
            let mut cursor = tree.parent_element(node);
            while let Some(ancestor) = cursor {
                if matches_chain(tree, ancestor, rest) {
                    return true;
                }
                cursor = tree.parent_element(ancestor);
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_production_selectors() {
        for selector in [
            r#"textarea[formcontrolname="website"]"#,
            r#"textarea[placeholder*="Paste link"]"#,
            r#"button, div[role="button"]"#,
            "div, span, button",
            "form > .row textarea",
            "*",
        ] {
            assert!(SelectorList::parse(selector).is_ok(), "{selector}");
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for selector in ["", "div,", "[unclosed", "a >", "> a", "div[x~y]", "a**"] {
            assert!(
                matches!(
                    SelectorList::parse(selector),
                    Err(DomError::InvalidSelector(_))
                ),
                "{selector}"
            );
        }
    }

    #[test]
    fn test_quoted_value_may_contain_separators() {
        let list = SelectorList::parse(r#"input[placeholder="a, b > c"]"#).unwrap();
        assert_eq!(list.groups.len(), 1);
        assert_eq!(list.groups[0].len(), 1);
    }
}
