pub mod batch;
pub mod context;
pub mod file;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::compile::{compile, CompileContext, CompileError};
use crate::diagnostic::{sort_diagnostics, Diagnostic};
use crate::execute::{execute, ExecutionFailure};
use crate::model::Model;
use crate::template::{lower, parse, ParseError};

pub use batch::{render_batch, render_plan, BatchOptions, BatchOutcome, RenderJob, RenderedFile};
pub use context::{build_context, check_bool_expr, eval_bool_expr};
pub use file::render_path_component;

/// Why a single template produced no output.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum RenderError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Execution(#[from] ExecutionFailure),
}

impl RenderError {
    /// Every diagnostic this failure carries, in template coordinates.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            RenderError::Parse(err) => vec![Diagnostic::error(
                &err.template,
                err.reason.clone(),
                Some(err.location),
            )],
            RenderError::Compile(err) => err.diagnostics.clone(),
            RenderError::Execution(failure) => vec![Diagnostic::error(
                &failure.template,
                failure.message.clone(),
                failure.location,
            )],
        }
    }
}

/// Parse, compile and run one template against `model`.
pub fn render_template(
    ctx: &CompileContext,
    id: &str,
    text: &str,
    model: &Model,
) -> Result<String, RenderError> {
    let parsed = parse(id, text)?;
    let unit = compile(ctx, &lower(&parsed))?;
    for warning in &unit.warnings {
        tracing::warn!(template = %id, "{warning}");
    }
    Ok(execute(ctx, &unit, model)?)
}

/// Result of checking a template without running it.
#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub template: String,
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse and compile a template, collecting every problem found.
pub fn check_template(ctx: &CompileContext, id: &str, text: &str) -> CheckReport {
    let mut report = CheckReport {
        template: id.to_string(),
        ..CheckReport::default()
    };

    let parsed = match parse(id, text) {
        Ok(parsed) => parsed,
        Err(err) => {
            report.errors = RenderError::Parse(err).diagnostics();
            return report;
        }
    };

    let source = lower(&parsed);
    report.warnings = source.warnings.clone();
    if let Err(err) = compile(ctx, &source) {
        report.errors = err.diagnostics;
    }
    sort_diagnostics(&mut report.warnings);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::FailureCause;
    use crate::model::ModelBinder;
    use rstest::rstest;
    use serde_json::json;

    fn model() -> Model {
        ModelBinder::new()
            .bind("name", "Shop")
            .bind("pages", json!(["Login", "Logout"]))
            .bind("use_ef", true)
            .build()
            .unwrap()
    }

    #[rstest]
    #[case("")]
    #[case("plain text")]
    #[case("@model LoginModel\n<div class=\"x\">{{ not tera }}</div>\n")]
    #[case("multi\r\nline\ttabs \\ \"quotes\" ${interp} `ticks`")]
    #[case("unicode ✓ ünïcödé 日本")]
    fn test_pure_literal_round_trip(#[case] text: &str) {
        let ctx = CompileContext::default();
        assert_eq!(render_template(&ctx, "t", text, &model()).unwrap(), text);
        assert_eq!(
            render_template(&ctx, "t", text, &Model::default()).unwrap(),
            text
        );
    }

    #[test]
    fn test_escapes_render_as_delimiters() {
        let ctx = CompileContext::default();
        let out = render_template(&ctx, "t", "<%% x %%>", &model()).unwrap();
        assert_eq!(out, "<% x %>");
    }

    #[test]
    fn test_full_template() {
        let ctx = CompileContext::default();
        let text = "\
namespace <%= model.name %>;
<% for page in model.pages -%>
page <%= page %>
<% end -%>
<% if model.use_ef -%>
ef
<% else -%>
none
<% end -%>
";
        let out = render_template(&ctx, "t", text, &model()).unwrap();
        assert_eq!(out, "namespace Shop;\npage Login\npage Logout\nef\n");
    }

    #[test]
    fn test_missing_field_yields_no_text() {
        let ctx = CompileContext::default();
        let result = render_template(&ctx, "t", "before <%= model.absent %> after", &model());
        match result {
            Err(RenderError::Execution(failure)) => {
                assert_eq!(failure.cause, FailureCause::MissingField("absent".to_string()));
            }
            other => panic!("expected execution failure, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_surfaces() {
        let ctx = CompileContext::default();
        let err = render_template(&ctx, "t", "a <%= model.name", &model()).unwrap_err();
        assert!(matches!(err, RenderError::Parse(_)));
        assert_eq!(err.diagnostics().len(), 1);
    }

    #[test]
    fn test_check_template_collects_everything() {
        let ctx = CompileContext::default();
        let report = check_template(&ctx, "t", "<%= 1 + %>\n<% let = 2; %>");
        assert!(!report.is_ok());
        assert!(report.errors.len() >= 2, "{:?}", report.errors);
    }

    #[test]
    fn test_check_template_reports_warnings() {
        let ctx = CompileContext::default();
        let report = check_template(&ctx, "t", "<% for model in [1] %>x<% end %>");
        assert!(report.is_ok());
        assert_eq!(report.warnings.len(), 1);
    }
}
