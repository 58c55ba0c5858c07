use tera::{Context, Tera};

/// Render template expressions in an output path (e.g. `{{ support_location }}_Layout.cshtml`).
pub fn render_path_component(
    component: &str,
    context: &Context,
) -> std::result::Result<String, tera::Error> {
    if !component.contains("{{") && !component.contains("{%") {
        return Ok(component.to_string());
    }
    let mut tera = Tera::default();
    tera.add_raw_template("__path__", component)?;
    tera.render("__path__", context)
}
