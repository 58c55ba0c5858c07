use crate::diagnostic::{Diagnostic, Location};
use crate::template::parse::{Fragment, Node, ParsedTemplate, BUFFER_NAME};
use crate::template::source_map::{LineIndex, SourceMap};

/// Name of the single function every generated program defines.
pub const ENTRY_POINT: &str = "render";

/// Name under which templates see the bound model.
pub const MODEL_PARAM: &str = "model";

const INDENT: &str = "    ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Expression,
    Statements,
}

/// A code fragment as it appeared in the template, kept for isolated re-checks.
#[derive(Debug, Clone)]
pub struct SourceFragment {
    pub kind: FragmentKind,
    pub code: String,
    pub origin: Location,
}

/// Rhai program text produced from one template.
#[derive(Debug, Clone)]
pub struct GeneratedSource {
    pub template: String,
    pub code: String,
    pub source_map: SourceMap,
    pub fragments: Vec<SourceFragment>,
    pub warnings: Vec<Diagnostic>,
}

impl GeneratedSource {
    /// The program with each of `names` bound to `()` at the start of the
    /// entry point. Only the unmapped first line changes.
    pub(crate) fn with_declarations(&self, names: &[String]) -> String {
        let declarations: String = names.iter().map(|n| format!(" let {n} = ();")).collect();
        match self.code.split_once('\n') {
            Some((first, rest)) => format!("{first}{declarations}\n{rest}"),
            None => self.code.clone(),
        }
    }
}

struct Emitter<'a> {
    parsed: &'a ParsedTemplate,
    lines: LineIndex,
    out: String,
    line: usize,
    depth: usize,
    source_map: SourceMap,
    fragments: Vec<SourceFragment>,
    warnings: Vec<Diagnostic>,
}

/// Lower a parsed template into a program whose `render(model)` returns the text.
pub fn lower(parsed: &ParsedTemplate) -> GeneratedSource {
    let mut emitter = Emitter {
        parsed,
        lines: LineIndex::new(&parsed.source),
        out: String::new(),
        line: 1,
        depth: 0,
        source_map: SourceMap::default(),
        fragments: Vec::new(),
        warnings: Vec::new(),
    };

    emitter.line_of(&format!("fn {ENTRY_POINT}({MODEL_PARAM}) {{"));
    emitter.depth += 1;
    emitter.line_of(&format!("let {BUFFER_NAME} = \"\";"));
    emitter.nodes(&parsed.nodes);
    emitter.line_of(BUFFER_NAME);
    emitter.depth -= 1;
    emitter.line_of("}");

    tracing::trace!(
        template = %parsed.id,
        lines = emitter.line - 1,
        "lowered template"
    );

    GeneratedSource {
        template: parsed.id.clone(),
        code: emitter.out,
        source_map: emitter.source_map,
        fragments: emitter.fragments,
        warnings: emitter.warnings,
    }
}

impl<'a> Emitter<'a> {
    fn nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.node(node);
        }
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Literal(text) => {
                self.line_of(&format!("{BUFFER_NAME} += {};", string_literal(text)));
            }
            Node::Interpolate(fragment) => {
                self.code_line(
                    &format!("{BUFFER_NAME} += to_string("),
                    fragment,
                    ");",
                    FragmentKind::Expression,
                );
            }
            Node::Code(fragment) => {
                // own line: a trailing `//` comment would swallow it
                self.code_line("", fragment, "", FragmentKind::Statements);
                self.line_of(";");
            }
            Node::If {
                branches,
                otherwise,
            } => {
                for (i, (condition, body)) in branches.iter().enumerate() {
                    let prefix = if i == 0 { "if " } else { "} else if " };
                    self.code_line(prefix, condition, " {", FragmentKind::Expression);
                    self.block(body);
                }
                if let Some(body) = otherwise {
                    self.line_of("} else {");
                    self.block(body);
                }
                self.line_of("}");
            }
            Node::For {
                binding,
                binding_offset,
                iterable,
                body,
            } => {
                if binding == MODEL_PARAM {
                    let location = self.lines.location(&self.parsed.source, *binding_offset);
                    self.warnings.push(Diagnostic::warning(
                        &self.parsed.id,
                        format!("loop variable `{binding}` shadows the model inside the loop"),
                        Some(location),
                    ));
                }
                self.code_line(
                    &format!("for {binding} in "),
                    iterable,
                    " {",
                    FragmentKind::Expression,
                );
                self.block(body);
                self.line_of("}");
            }
        }
    }

    fn block(&mut self, body: &[Node]) {
        self.depth += 1;
        self.nodes(body);
        self.depth -= 1;
    }

    fn indent(&mut self) -> usize {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.depth * INDENT.len()
    }

    /// Emit one line of scaffolding with no template counterpart.
    fn line_of(&mut self, text: &str) {
        self.indent();
        self.out.push_str(text);
        self.out.push('\n');
        self.line += 1;
    }

    /// Emit user code between `prefix` and `suffix`, recording where it came from.
    fn code_line(&mut self, prefix: &str, fragment: &Fragment, suffix: &str, kind: FragmentKind) {
        let origin = self.lines.location(&self.parsed.source, fragment.offset);
        let width = self.indent() + prefix.chars().count();
        let line_count = fragment.code.matches('\n').count() + 1;

        self.source_map
            .record(self.line, width + 1, line_count, origin);
        self.fragments.push(SourceFragment {
            kind,
            code: fragment.code.clone(),
            origin,
        });

        self.out.push_str(prefix);
        self.out.push_str(&fragment.code);
        self.out.push_str(suffix);
        self.out.push('\n');
        self.line += line_count;
    }
}

/// Quote text as a Rhai string literal.
fn string_literal(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                quoted.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
