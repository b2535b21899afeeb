//! Declarative extraction rules and the single resolver that evaluates them.
//!
//! A field is described by an ordered list of [`FieldRule`]s; the first rule
//! that yields non-empty text wins. Site differences live in rule tables,
//! not in branching code.

use scraper::{ElementRef, Selector};
use tracing::warn;

use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pick {
    /// Whitespace-normalized text of the element.
    Text,
    /// Texts of the element's `<p>` children joined by newlines, or the
    /// element's own text when it has none.
    Paragraphs,
    /// Attribute value, falling back to the element's text.
    AttrOrText(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRule {
    pub selector: &'static str,
    pub pick: Pick,
}

impl FieldRule {
    pub const fn text(selector: &'static str) -> Self {
        Self { selector, pick: Pick::Text }
    }

    pub const fn paragraphs(selector: &'static str) -> Self {
        Self { selector, pick: Pick::Paragraphs }
    }

    pub const fn attr_or_text(selector: &'static str, attr: &'static str) -> Self {
        Self { selector, pick: Pick::AttrOrText(attr) }
    }
}

pub fn compile(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|_| FetchError::Selector(css.to_string()))
}

/// Rule tables are static; a bad selector is logged and treated as no match.
fn compile_or_warn(css: &str) -> Option<Selector> {
    match compile(css) {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("{}", e);
            None
        }
    }
}

pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn text_of(el: ElementRef) -> String {
    normalize_whitespace(&el.text().collect::<String>())
}

fn pick(el: ElementRef, how: Pick) -> String {
    match how {
        Pick::Text => text_of(el),
        Pick::Paragraphs => {
            let p = Selector::parse("p").ok();
            let paras: Vec<String> = p
                .iter()
                .flat_map(|sel| el.select(sel))
                .map(text_of)
                .filter(|t| !t.is_empty())
                .collect();
            if paras.is_empty() {
                text_of(el)
            } else {
                paras.join("\n")
            }
        }
        Pick::AttrOrText(attr) => match el.value().attr(attr).map(str::trim) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => text_of(el),
        },
    }
}

/// First non-empty value accepted by `accept`, trying rules in order and
/// matches of each rule in document order.
pub fn first_match_where(
    scope: ElementRef,
    rules: &[FieldRule],
    accept: impl Fn(&str) -> bool,
) -> Option<String> {
    for rule in rules {
        let Some(sel) = compile_or_warn(rule.selector) else { continue };
        for el in scope.select(&sel) {
            let value = pick(el, rule.pick);
            if !value.is_empty() && accept(&value) {
                return Some(value);
            }
        }
    }
    None
}

pub fn first_match(scope: ElementRef, rules: &[FieldRule]) -> Option<String> {
    first_match_where(scope, rules, |_| true)
}

/// First element (under `scope`) with non-empty text, trying selectors in order.
pub fn first_element<'a>(scope: ElementRef<'a>, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors
        .iter()
        .filter_map(|css| compile_or_warn(css))
        .find_map(|sel| scope.select(&sel).find(|el| !text_of(*el).is_empty()))
}

/// Elements of the first selector that matches anything.
pub fn select_items<'a>(scope: ElementRef<'a>, selectors: &[&str]) -> Vec<ElementRef<'a>> {
    for css in selectors {
        let Some(sel) = compile_or_warn(css) else { continue };
        let found: Vec<_> = scope.select(&sel).collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}
