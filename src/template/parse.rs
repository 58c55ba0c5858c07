#![allow(unused_assignments)]

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::diagnostic::Location;
use crate::template::source_map::LineIndex;

const OPEN: &str = "<%";
const CLOSE: &str = "%>";
const ESCAPED_OPEN: &str = "<%%";
const ESCAPED_CLOSE: &str = "%%>";

/// Name of the output buffer inside generated code; templates may not bind it.
pub const BUFFER_NAME: &str = "stencil_buf";

#[derive(Debug, Error, Diagnostic)]
#[error("{template}:{location}: {reason}")]
#[diagnostic(
    code(stencil::template::parse),
    help("Code regions are <% ... %>, <%= ... %> and <%# ... %>; write <%% or %%> for literal delimiters")
)]
pub struct ParseError {
    pub template: String,
    /// Byte offset into the template, always within `0..=len`.
    pub offset: usize,
    pub location: Location,
    pub reason: String,
    #[source_code]
    source_code: NamedSource<String>,
    #[label("here")]
    span: SourceSpan,
}

/// A piece of embedded code together with where it starts in the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub code: String,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Literal(String),
    Interpolate(Fragment),
    Code(Fragment),
    If {
        branches: Vec<(Fragment, Vec<Node>)>,
        otherwise: Option<Vec<Node>>,
    },
    For {
        binding: String,
        binding_offset: usize,
        iterable: Fragment,
        body: Vec<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct ParsedTemplate {
    pub id: String,
    pub source: String,
    pub nodes: Vec<Node>,
}

impl ParsedTemplate {
    /// True when the template contains no code regions at all.
    pub fn is_literal(&self) -> bool {
        self.nodes.iter().all(|n| matches!(n, Node::Literal(_)))
    }
}

enum BlockKind {
    If {
        branches: Vec<(Fragment, Vec<Node>)>,
        /// `None` once the `else` branch has been entered.
        condition: Option<Fragment>,
    },
    For {
        binding: String,
        binding_offset: usize,
        iterable: Fragment,
    },
}

struct OpenBlock {
    offset: usize,
    kind: BlockKind,
    body: Vec<Node>,
}

enum RegionKind {
    Interpolate,
    Comment,
    Code,
}

struct Parser<'a> {
    id: &'a str,
    text: &'a str,
    lines: LineIndex,
    root: Vec<Node>,
    stack: Vec<OpenBlock>,
    literal: String,
}

/// Parse template text into a node tree.
pub fn parse(id: &str, text: &str) -> Result<ParsedTemplate, ParseError> {
    let mut parser = Parser {
        id,
        text,
        lines: LineIndex::new(text),
        root: Vec::new(),
        stack: Vec::new(),
        literal: String::new(),
    };
    parser.run()?;

    tracing::trace!(template = %id, nodes = parser.root.len(), "parsed template");

    Ok(ParsedTemplate {
        id: id.to_string(),
        source: text.to_string(),
        nodes: parser.root,
    })
}

impl<'a> Parser<'a> {
    fn run(&mut self) -> Result<(), ParseError> {
        let text = self.text;
        let mut pos = 0;

        while pos < text.len() {
            let rest = &text[pos..];
            let Some(next) = rest.find(['<', '%']) else {
                self.literal.push_str(rest);
                break;
            };
            self.literal.push_str(&rest[..next]);
            pos += next;
            let rest = &text[pos..];

            if rest.starts_with(ESCAPED_OPEN) {
                self.literal.push_str(OPEN);
                pos += ESCAPED_OPEN.len();
            } else if rest.starts_with(ESCAPED_CLOSE) {
                self.literal.push_str(CLOSE);
                pos += ESCAPED_CLOSE.len();
            } else if rest.starts_with(OPEN) {
                pos = self.region(pos)?;
            } else if rest.starts_with(CLOSE) {
                return Err(self.error(
                    pos,
                    "unexpected `%>` outside a code region (write `%%>` for a literal)",
                ));
            } else {
                // a lone '<' or '%'
                self.literal.push_str(&rest[..1]);
                pos += 1;
            }
        }

        self.flush_literal();

        if let Some(block) = self.stack.last() {
            let what = match block.kind {
                BlockKind::If { .. } => "`if` block is never closed with `<% end %>`",
                BlockKind::For { .. } => "`for` block is never closed with `<% end %>`",
            };
            return Err(self.error(block.offset, what));
        }
        Ok(())
    }

    /// Consume one `<% ... %>` region starting at `start`, returning the
    /// offset just past it.
    fn region(&mut self, start: usize) -> Result<usize, ParseError> {
        let text = self.text;
        let mut content_start = start + OPEN.len();
        let kind = match text[content_start..].chars().next() {
            Some('=') => {
                content_start += 1;
                RegionKind::Interpolate
            }
            Some('#') => {
                content_start += 1;
                RegionKind::Comment
            }
            _ => RegionKind::Code,
        };

        let Some(close_rel) = text[content_start..].find(CLOSE) else {
            return Err(self.error(start, "unterminated code region: missing `%>`"));
        };
        let close = content_start + close_rel;

        let trim_newline = close > content_start && text[..close].ends_with('-');
        let content_end = if trim_newline { close - 1 } else { close };
        let content = &text[content_start..content_end];

        let mut end = close + CLOSE.len();
        if trim_newline {
            if text[end..].starts_with("\r\n") {
                end += 2;
            } else if text[end..].starts_with('\n') {
                end += 1;
            }
        }

        match kind {
            RegionKind::Comment => {}
            RegionKind::Interpolate => {
                let fragment = self.fragment(content, content_start);
                if fragment.code.is_empty() {
                    return Err(self.error(start, "empty interpolation"));
                }
                self.reserved(start, &fragment)?;
                self.push(Node::Interpolate(fragment));
            }
            RegionKind::Code => self.code(start, content, content_start)?,
        }

        Ok(end)
    }

    fn code(&mut self, start: usize, content: &str, content_start: usize) -> Result<(), ParseError> {
        let fragment = self.fragment(content, content_start);
        if fragment.code.is_empty() {
            return Ok(());
        }

        let (keyword, rest) = split_keyword(&fragment.code);
        let rest_offset = fragment.offset + (fragment.code.len() - rest.len());
        let rest_fragment = self.fragment(rest, rest_offset);

        match keyword {
            "if" => {
                if rest_fragment.code.is_empty() {
                    return Err(self.error(start, "`if` needs a condition"));
                }
                self.reserved(start, &rest_fragment)?;
                self.flush_literal();
                self.stack.push(OpenBlock {
                    offset: start,
                    kind: BlockKind::If {
                        branches: Vec::new(),
                        condition: Some(rest_fragment),
                    },
                    body: Vec::new(),
                });
            }
            "elif" => self.elif(start, rest_fragment)?,
            "else" => {
                // `else if cond` is accepted as `elif cond`
                let (inner, cond) = split_keyword(&rest_fragment.code);
                if inner == "if" {
                    let cond_offset =
                        rest_fragment.offset + (rest_fragment.code.len() - cond.len());
                    let cond = self.fragment(cond, cond_offset);
                    self.elif(start, cond)?;
                } else if !rest_fragment.code.is_empty() {
                    return Err(self.error(start, "`else` takes no arguments"));
                } else {
                    self.flush_literal();
                    let problem = match self.stack.last_mut() {
                        Some(OpenBlock {
                            kind: BlockKind::If { branches, condition },
                            body,
                            ..
                        }) => match condition.take() {
                            Some(cond) => {
                                branches.push((cond, std::mem::take(body)));
                                None
                            }
                            None => Some("duplicate `else` in `if` block"),
                        },
                        _ => Some("`else` without an open `if` block"),
                    };
                    if let Some(reason) = problem {
                        return Err(self.error(start, reason));
                    }
                }
            }
            "for" => {
                let (binding, tail) = split_keyword(&rest_fragment.code);
                let (in_kw, iterable) = split_keyword(tail);
                if !is_identifier(binding) || in_kw != "in" || iterable.is_empty() {
                    return Err(self.error(start, "expected `for <name> in <expression>`"));
                }
                if binding == BUFFER_NAME {
                    return Err(self.error(start, "`stencil_buf` is reserved for template output"));
                }
                let iterable_offset =
                    rest_fragment.offset + (rest_fragment.code.len() - iterable.len());
                let iterable = self.fragment(iterable, iterable_offset);
                self.reserved(start, &iterable)?;
                self.flush_literal();
                self.stack.push(OpenBlock {
                    offset: start,
                    kind: BlockKind::For {
                        binding: binding.to_string(),
                        binding_offset: rest_fragment.offset,
                        iterable,
                    },
                    body: Vec::new(),
                });
            }
            "end" => {
                if !rest_fragment.code.is_empty() {
                    return Err(self.error(start, "`end` takes no arguments"));
                }
                self.flush_literal();
                let Some(block) = self.stack.pop() else {
                    return Err(self.error(start, "`end` without an open block"));
                };
                let node = match block.kind {
                    BlockKind::If {
                        mut branches,
                        condition,
                    } => {
                        let otherwise = match condition {
                            Some(cond) => {
                                branches.push((cond, block.body));
                                None
                            }
                            None => Some(block.body),
                        };
                        Node::If {
                            branches,
                            otherwise,
                        }
                    }
                    BlockKind::For {
                        binding,
                        binding_offset,
                        iterable,
                    } => Node::For {
                        binding,
                        binding_offset,
                        iterable,
                        body: block.body,
                    },
                };
                self.push(node);
            }
            _ => {
                self.reserved(start, &fragment)?;
                self.push(Node::Code(fragment));
            }
        }
        Ok(())
    }

    fn elif(&mut self, start: usize, cond: Fragment) -> Result<(), ParseError> {
        if cond.code.is_empty() {
            return Err(self.error(start, "`elif` needs a condition"));
        }
        self.reserved(start, &cond)?;
        self.flush_literal();
        let problem = match self.stack.last_mut() {
            Some(OpenBlock {
                kind: BlockKind::If { branches, condition },
                body,
                ..
            }) => match condition.take() {
                Some(previous) => {
                    branches.push((previous, std::mem::take(body)));
                    *condition = Some(cond);
                    None
                }
                None => Some("`elif` after `else`"),
            },
            _ => Some("`elif` without an open `if` block"),
        };
        match problem {
            Some(reason) => Err(self.error(start, reason)),
            None => Ok(()),
        }
    }

    fn reserved(&self, start: usize, fragment: &Fragment) -> Result<(), ParseError> {
        if fragment.code.contains(BUFFER_NAME) {
            return Err(self.error(start, "`stencil_buf` is reserved for template output"));
        }
        Ok(())
    }

    /// Trim `raw` (which starts at `offset`) and record where the trimmed code begins.
    fn fragment(&self, raw: &str, offset: usize) -> Fragment {
        let leading = raw.len() - raw.trim_start().len();
        Fragment {
            code: raw.trim().to_string(),
            offset: offset + leading,
        }
    }

    fn push(&mut self, node: Node) {
        self.flush_literal();
        self.target().push(node);
    }

    fn flush_literal(&mut self) {
        if self.literal.is_empty() {
            return;
        }
        let literal = std::mem::take(&mut self.literal);
        match self.target().last_mut() {
            Some(Node::Literal(previous)) => previous.push_str(&literal),
            _ => self.target().push(Node::Literal(literal)),
        }
    }

    fn target(&mut self) -> &mut Vec<Node> {
        match self.stack.last_mut() {
            Some(block) => &mut block.body,
            None => &mut self.root,
        }
    }

    fn error(&self, offset: usize, reason: &str) -> ParseError {
        let offset = offset.min(self.text.len());
        ParseError {
            template: self.id.to_string(),
            offset,
            location: self.lines.location(self.text, offset),
            reason: reason.to_string(),
            source_code: NamedSource::new(self.id, self.text.to_string()),
            span: (offset, 0).into(),
        }
    }
}

/// Split off the first whitespace-delimited word.
fn split_keyword(code: &str) -> (&str, &str) {
    let code = code.trim_start();
    match code.find(char::is_whitespace) {
        Some(i) => (&code[..i], code[i..].trim_start()),
        None => (code, ""),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn literal(text: &str) -> Node {
        Node::Literal(text.to_string())
    }

    #[rstest]
    #[case("")]
    #[case("plain text")]
    #[case("a < b and 100% sure > less")]
    #[case("multi\nline\r\nwith unicode é ✓")]
    fn test_pure_literal_round_trip(#[case] text: &str) {
        let parsed = parse("t", text).unwrap();
        assert!(parsed.is_literal());
        let joined: String = parsed
            .nodes
            .iter()
            .map(|n| match n {
                Node::Literal(s) => s.as_str(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn test_escaped_delimiters() {
        let parsed = parse("t", "a <%% b %%> c").unwrap();
        assert_eq!(parsed.nodes, vec![literal("a <% b %> c")]);
    }

    #[test]
    fn test_interpolation_records_offset() {
        let parsed = parse("t", "Hi <%=  model.name %>!").unwrap();
        assert_eq!(
            parsed.nodes,
            vec![
                literal("Hi "),
                Node::Interpolate(Fragment {
                    code: "model.name".to_string(),
                    offset: 8,
                }),
                literal("!"),
            ]
        );
    }

    #[test]
    fn test_comment_produces_nothing() {
        let parsed = parse("t", "a<%# ignored %>b").unwrap();
        assert_eq!(parsed.nodes, vec![literal("ab")]);
    }

    #[test]
    fn test_trim_marker_swallows_one_newline() {
        let parsed = parse("t", "<% let x = 1; -%>\n\nrest").unwrap();
        assert_eq!(parsed.nodes.len(), 2);
        assert_eq!(parsed.nodes[1], literal("\nrest"));
    }

    #[test]
    fn test_if_elif_else_structure() {
        let parsed = parse(
            "t",
            "<% if model.a %>A<% elif model.b %>B<% else %>C<% end %>",
        )
        .unwrap();
        match &parsed.nodes[..] {
            [Node::If {
                branches,
                otherwise,
            }] => {
                assert_eq!(branches.len(), 2);
                assert_eq!(branches[0].0.code, "model.a");
                assert_eq!(branches[1].0.code, "model.b");
                assert_eq!(branches[1].1, vec![literal("B")]);
                assert_eq!(otherwise.as_deref(), Some(&[literal("C")][..]));
            }
            other => panic!("unexpected nodes: {other:?}"),
        }
    }

    #[test]
    fn test_else_if_is_elif() {
        let parsed = parse("t", "<% if a %>1<% else if b %>2<% end %>").unwrap();
        match &parsed.nodes[..] {
            [Node::If {
                branches,
                otherwise: None,
            }] => assert_eq!(branches.len(), 2),
            other => panic!("unexpected nodes: {other:?}"),
        }
    }

    #[test]
    fn test_for_block() {
        let parsed = parse("t", "<% for item in model.items %>-<%= item %><% end %>").unwrap();
        match &parsed.nodes[..] {
            [Node::For {
                binding,
                iterable,
                body,
                ..
            }] => {
                assert_eq!(binding, "item");
                assert_eq!(iterable.code, "model.items");
                assert_eq!(iterable.offset, 15);
                assert_eq!(body.len(), 2);
            }
            other => panic!("unexpected nodes: {other:?}"),
        }
    }

    #[rstest]
    #[case("abc <% let x = 1;", 4)]
    #[case("<%= model.a", 0)]
    #[case("x\n<%# never closed", 2)]
    fn test_unterminated_region(#[case] text: &str, #[case] offset: usize) {
        let err = parse("t", text).unwrap_err();
        assert_eq!(err.offset, offset);
        assert!(err.offset <= text.len());
        assert!(err.reason.contains("unterminated"));
    }

    #[test]
    fn test_stray_close_delimiter() {
        let err = parse("t", "line one\nbad %> here").unwrap_err();
        assert_eq!(err.offset, 13);
        assert_eq!(err.location, Location::new(2, 5));
    }

    #[rstest]
    #[case("<% if a %>open", 0, "never closed")]
    #[case("x<% for i in xs %><% if i %>", 18, "never closed")]
    #[case("<% end %>", 0, "without an open block")]
    #[case("<% else %>", 0, "without an open `if`")]
    #[case("<% if a %><% else %><% elif b %><% end %>", 20, "after `else`")]
    #[case("<% if a %><% else %><% else %><% end %>", 20, "duplicate `else`")]
    #[case("<% for in xs %><% end %>", 0, "expected `for")]
    #[case("<%=   %>", 0, "empty interpolation")]
    #[case("<% if %>", 0, "needs a condition")]
    fn test_block_structure_errors(
        #[case] text: &str,
        #[case] offset: usize,
        #[case] reason: &str,
    ) {
        let err = parse("t", text).unwrap_err();
        assert_eq!(err.offset, offset, "reason was: {}", err.reason);
        assert!(err.reason.contains(reason), "reason was: {}", err.reason);
    }

    #[rstest]
    #[case("<% stencil_buf = \"\"; %>", 0)]
    #[case("x<%= stencil_buf %>", 1)]
    #[case("<% if stencil_buf == \"\" %>a<% end %>", 0)]
    #[case("<% if a %>a<% elif stencil_buf != \"\" %>b<% end %>", 11)]
    #[case("<% for c in stencil_buf %><% end %>", 0)]
    #[case("<% for stencil_buf in xs %><% end %>", 0)]
    fn test_reserved_buffer_name(#[case] text: &str, #[case] offset: usize) {
        let err = parse("t", text).unwrap_err();
        assert!(err.reason.contains("reserved"), "reason was: {}", err.reason);
        assert_eq!(err.offset, offset);
    }

    #[test]
    fn test_empty_code_region_is_ignored() {
        let parsed = parse("t", "a<%   %>b").unwrap();
        assert_eq!(parsed.nodes, vec![literal("ab")]);
    }
}
