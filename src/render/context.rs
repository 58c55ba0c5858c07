use tera::{Context, Tera};

use crate::model::Model;

/// Expose every model field to `tera` path and `when` expressions.
pub fn build_context(model: &Model) -> Context {
    let mut context = Context::new();
    for (key, value) in model.iter() {
        context.insert(key, value);
    }
    context
}

/// Evaluate a Tera boolean expression against a model context.
///
/// Returns `Err` if the expression fails to parse or render.
pub fn eval_bool_expr(expr: &str, context: &Context) -> std::result::Result<bool, tera::Error> {
    let mut tera = Tera::default();
    let template_str = format!("{{% if {expr} %}}true{{% else %}}false{{% endif %}}");
    tera.add_raw_template("__when__", &template_str)?;
    let result = tera.render("__when__", context)?;
    Ok(result.trim() == "true")
}

/// Parse a `when` expression without evaluating it.
pub fn check_bool_expr(expr: &str) -> std::result::Result<(), tera::Error> {
    let mut tera = Tera::default();
    let template_str = format!("{{% if {expr} %}}true{{% endif %}}");
    tera.add_raw_template("__when__", &template_str)
}
