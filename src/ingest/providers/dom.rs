// src/ingest/providers/dom.rs
//! Tree walks over a parsed `scraper::Html` document.

use std::collections::VecDeque;

use scraper::{ElementRef, Node};

/// True if the element carries `class` as one of its class tokens.
pub fn has_class(el: &ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// Element named `tag` with class `class`.
pub fn is_tag_with_class(el: &ElementRef<'_>, tag: &str, class: &str) -> bool {
    el.value().name() == tag && has_class(el, class)
}

/// Breadth-first search below (and including) `root` for the first element
/// matching `pred`.
pub fn find_first<'a, F>(root: ElementRef<'a>, pred: F) -> Option<ElementRef<'a>>
where
    F: Fn(&ElementRef<'a>) -> bool,
{
    let mut queue = VecDeque::from([root]);
    while let Some(el) = queue.pop_front() {
        if pred(&el) {
            return Some(el);
        }
        queue.extend(el.children().filter_map(ElementRef::wrap));
    }
    None
}

/// Concatenated text of `root` up to the first `<br>`, in document order.
///
/// Children are pushed right-to-left so the stack pops them left-to-right;
/// the walk ends entirely at the first line break.
pub fn text_before_break(root: ElementRef<'_>) -> String {
    let mut buf = String::new();
    let mut stack = vec![*root];
    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(text) => buf.push_str(text),
            Node::Element(el) => {
                if el.name() == "br" {
                    break;
                }
                stack.extend(node.children().rev());
            }
            _ => {}
        }
    }
    buf
}
