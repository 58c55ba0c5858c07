#![allow(unused_assignments)]

use std::fmt;

use miette::Diagnostic;
use rhai::{EvalAltResult, ImmutableString, Scope};
use thiserror::Error;

use crate::compile::{CompileContext, CompiledUnit};
use crate::diagnostic::Location;
use crate::model::Model;
use crate::template::ENTRY_POINT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The template read a field the model does not have.
    MissingField(String),
    /// The render exceeded an engine limit (operations, sizes, call depth).
    LimitExceeded,
    Runtime,
}

/// A fault raised while running an already-compiled template.
#[derive(Debug, Error, Diagnostic)]
#[error("rendering '{template}' failed{}: {message}", LocationSuffix(*location))]
#[diagnostic(
    code(stencil::execute),
    help("This is a data problem: check the model values the template reads")
)]
pub struct ExecutionFailure {
    pub template: String,
    pub cause: FailureCause,
    pub message: String,
    pub location: Option<Location>,
}

struct LocationSuffix(Option<Location>);

impl fmt::Display for LocationSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(loc) => write!(f, " at {loc}"),
            None => Ok(()),
        }
    }
}

/// Run the unit's entry point once against `model` and return its text.
pub fn execute(
    ctx: &CompileContext,
    unit: &CompiledUnit,
    model: &Model,
) -> Result<String, ExecutionFailure> {
    let mut scope = Scope::new();
    let result = ctx.engine().call_fn::<ImmutableString>(
        &mut scope,
        &unit.ast,
        ENTRY_POINT,
        (model.to_dynamic(),),
    );

    match result {
        Ok(text) => {
            tracing::debug!(template = %unit.template, bytes = text.len(), "rendered template");
            Ok(text.to_string())
        }
        Err(err) => {
            let failure = failure_from(unit, *err);
            tracing::debug!(template = %unit.template, error = %failure, "render failed");
            Err(failure)
        }
    }
}

fn failure_from(unit: &CompiledUnit, err: EvalAltResult) -> ExecutionFailure {
    let mut inner = innermost(err);
    let position = inner.take_position();
    let location = unit.locate(position);

    let (cause, message) = match &inner {
        EvalAltResult::ErrorPropertyNotFound(name, _) => (
            FailureCause::MissingField(name.clone()),
            format!("model has no field `{name}`"),
        ),
        EvalAltResult::ErrorTooManyOperations(_)
        | EvalAltResult::ErrorDataTooLarge(..)
        | EvalAltResult::ErrorStackOverflow(_) => (FailureCause::LimitExceeded, inner.to_string()),
        _ => (FailureCause::Runtime, inner.to_string()),
    };

    ExecutionFailure {
        template: unit.template.clone(),
        cause,
        message,
        location,
    }
}

/// Errors raised inside `render` arrive wrapped in a function-call error.
fn innermost(err: EvalAltResult) -> EvalAltResult {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => innermost(*inner),
        other => other,
    }
}
