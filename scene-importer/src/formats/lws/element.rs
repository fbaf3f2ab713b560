//! Line-oriented element tree of LightWave scene files
//!
//! Every line is one element: its first word and the rest of the line. A
//! line starting with `{` opens a block whose elements become children of
//! that line, and a line starting with `}` closes it. Plugin sections are
//! kept as a single element without their body.

use crate::{
    error::{Error, Result},
    formats::MAX_DEPTH,
    scanner::Scanner,
};

use super::FORMAT;

/// One line of a scene file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Element {
    pub keyword: String,
    pub value: String,
    pub children: Vec<Element>,
}

impl Element {
    fn new(keyword: String, value: String) -> Self {
        Self {
            keyword,
            value,
            children: Vec::new(),
        }
    }
}

/// Parse `data` into an unnamed root element holding the top-level lines.
///
/// Fails with [`Error::RecursionLimit`] when blocks nest deeper than
/// [`MAX_DEPTH`]. Unbalanced braces are tolerated: a stray `}` is skipped
/// and blocks still open at the end of the file are closed.
pub(crate) fn parse(data: &[u8]) -> Result<Element> {
    let mut scanner = Scanner::new(data);
    // open blocks, the root first
    let mut stack = vec![Element::default()];

    while scanner.skip_spaces_and_line_ends() {
        match scanner.peek() {
            Some(b'}') => {
                if stack.len() > 1 {
                    close_block(&mut stack);
                } else {
                    log::warn!("LWS: line {}: unbalanced '}}'", scanner.line_number());
                }
                scanner.skip_line();
                continue;
            }
            Some(b'{') => {
                scanner.advance(1);
                if stack.len() > MAX_DEPTH {
                    return Err(Error::RecursionLimit {
                        format: FORMAT,
                        limit: MAX_DEPTH,
                    });
                }
                let element = read_element(&mut scanner);
                stack.push(element);
            }
            _ => {
                let element = read_element(&mut scanner);
                let plugin = element.keyword == "Plugin";
                push_child(&mut stack, element);
                if plugin {
                    skip_plugin(&mut scanner);
                }
            }
        }
        scanner.skip_line();
    }

    while stack.len() > 1 {
        close_block(&mut stack);
    }
    Ok(stack.pop().unwrap_or_default())
}

fn read_element(scanner: &mut Scanner<'_>) -> Element {
    let keyword = scanner.next_token().unwrap_or_default().into_owned();
    let value = scanner.rest_of_line().into_owned();
    Element::new(keyword, value)
}

fn push_child(stack: &mut [Element], element: Element) {
    if let Some(top) = stack.last_mut() {
        top.children.push(element);
    }
}

fn close_block(stack: &mut Vec<Element>) {
    if let Some(block) = stack.pop() {
        push_child(stack, block);
    }
}

/// Leave the scanner on the `EndPlugin` line, or at the end of the data.
fn skip_plugin(scanner: &mut Scanner<'_>) {
    while scanner.skip_line() && scanner.skip_spaces_and_line_ends() {
        if scanner.remaining().starts_with(b"EndPlugin") {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_and_plugins() {
        let root = parse(
            b"LWSC\n3\n\nChannel 0\n{ Envelope\n  1\n  Key 2 0 0 0 0 0 0 0 0\n}\n\
              Plugin Foo 1 Bar\n  junk { here\nEndPlugin\nLastFrame 10\n",
        )
        .expect("parses");
        let keywords: Vec<_> = root.children.iter().map(|e| e.keyword.as_str()).collect();
        assert_eq!(keywords, ["LWSC", "3", "Channel", "Envelope", "Plugin", "LastFrame"]);

        let envelope = &root.children[3];
        assert_eq!(envelope.children.len(), 2);
        assert_eq!(envelope.children[0].keyword, "1");
        assert_eq!(envelope.children[1].value, "2 0 0 0 0 0 0 0 0");
        assert_eq!(root.children[4].value, "Foo 1 Bar");
        assert_eq!(root.children[5].value, "10");
    }

    #[test]
    fn test_unbalanced_braces() {
        let root = parse(b"}\nA 1\n{ B\nC 2\n").expect("parses");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[1].keyword, "B");
        assert_eq!(root.children[1].children[0].keyword, "C");
    }

    #[test]
    fn test_nesting_limit() {
        let data = "{ Deeper\n".repeat(10_000);
        let err = parse(data.as_bytes()).unwrap_err();
        assert!(err.is_recursion_limit());
    }
}
