pub mod context;

use std::sync::Arc;

use miette::Diagnostic as MietteDiagnostic;
use rhai::{ParseError, ParseErrorType, Position, AST};
use thiserror::Error;

use crate::diagnostic::{sort_diagnostics, Diagnostic, Location};
use crate::template::lower::{FragmentKind, GeneratedSource};
use crate::template::source_map::SourceMap;

pub use context::{CompileContext, EngineLimits};

/// Most undefined names collected from one template before giving up.
const MAX_UNDEFINED: usize = 64;

/// A compiled template, ready to be executed any number of times.
#[derive(Debug, Clone)]
pub struct CompiledUnit {
    pub template: String,
    pub(crate) ast: Arc<AST>,
    pub(crate) source_map: SourceMap,
    pub warnings: Vec<Diagnostic>,
}

impl CompiledUnit {
    /// Map a generated-source position back into the template.
    pub(crate) fn locate(&self, position: Position) -> Option<Location> {
        map_position(&self.source_map, position)
    }
}

#[derive(Debug, Error, MietteDiagnostic)]
#[error("template '{template}' failed to compile ({} problem(s))", diagnostics.len())]
#[diagnostic(code(stencil::compile))]
pub struct CompileError {
    pub template: String,
    #[related]
    pub diagnostics: Vec<Diagnostic>,
}

/// Compile generated source into an executable unit.
///
/// On failure every problem found is returned at once: the error reported
/// for the whole program plus a syntax check of each embedded fragment on
/// its own, so independent mistakes in different regions all show up.
pub fn compile(ctx: &CompileContext, source: &GeneratedSource) -> Result<CompiledUnit, CompileError> {
    match ctx.engine().compile(&source.code) {
        Ok(ast) => {
            tracing::debug!(template = %source.template, "compiled template");
            Ok(CompiledUnit {
                template: source.template.clone(),
                ast: Arc::new(ast),
                source_map: source.source_map.clone(),
                warnings: source.warnings.clone(),
            })
        }
        Err(err) => {
            let fragments = check_fragments(ctx, source);

            let mut diagnostics = Vec::with_capacity(fragments.len() + 1);
            for whole in whole_program_errors(ctx, source, err) {
                // A fragment-level report on the same line is more precise
                // than the whole-program one. An unlocated error that the
                // fragment checks already explain adds nothing.
                let covered = match whole.location {
                    Some(loc) => fragments
                        .iter()
                        .any(|d| d.location.map(|l| l.line) == Some(loc.line)),
                    None => !fragments.is_empty(),
                };
                if !covered && !diagnostics.contains(&whole) {
                    diagnostics.push(whole);
                }
            }
            for diag in fragments {
                if !diagnostics.contains(&diag) {
                    diagnostics.push(diag);
                }
            }
            sort_diagnostics(&mut diagnostics);

            tracing::debug!(
                template = %source.template,
                problems = diagnostics.len(),
                "template failed to compile"
            );
            Err(CompileError {
                template: source.template.clone(),
                diagnostics,
            })
        }
    }
}

/// Errors from compiling the whole program.
///
/// The parser stops at the first undefined variable. Each one found is
/// declared at the top of the entry point and the program compiled again,
/// until it compiles or fails for another reason.
fn whole_program_errors(
    ctx: &CompileContext,
    source: &GeneratedSource,
    first: ParseError,
) -> Vec<Diagnostic> {
    let mut errors = Vec::new();
    let mut declared: Vec<String> = Vec::new();
    let mut err = first;
    loop {
        errors.push(Diagnostic::error(
            &source.template,
            err.err_type().to_string(),
            map_position(&source.source_map, err.position()),
        ));
        let ParseErrorType::VariableUndefined(name) = err.err_type() else {
            break;
        };
        if declared.contains(name) || declared.len() >= MAX_UNDEFINED {
            break;
        }
        declared.push(name.clone());
        match ctx.engine().compile(source.with_declarations(&declared)) {
            Ok(_) => break,
            Err(next) => err = next,
        }
    }
    errors
}

fn check_fragments(ctx: &CompileContext, source: &GeneratedSource) -> Vec<Diagnostic> {
    let engine = ctx.syntax_engine();
    source
        .fragments
        .iter()
        .filter_map(|fragment| {
            let result = match fragment.kind {
                FragmentKind::Expression => engine.compile_expression(&fragment.code),
                FragmentKind::Statements => engine.compile(&fragment.code),
            };
            let err = result.err()?;
            let location = match (err.position().line(), err.position().position()) {
                (Some(line), column) => Some(fragment.origin.advance(line, column.unwrap_or(1))),
                (None, _) => Some(fragment.origin),
            };
            Some(Diagnostic::error(
                &source.template,
                err.err_type().to_string(),
                location,
            ))
        })
        .collect()
}

fn map_position(source_map: &SourceMap, position: Position) -> Option<Location> {
    let line = position.line()?;
    source_map.lookup(line, position.position().unwrap_or(1))
}
