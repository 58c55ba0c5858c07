use serde::Serialize;

use super::probe::ProjectProbe;

pub const DEFAULT_LAYOUT_FILE: &str = "_Layout.cshtml";

/// Where an existing shared layout is looked for, in order.
pub const LAYOUT_PROBE_DIRS: &[&str] = &["Pages/Shared/", "Views/Shared/"];

/// Convention directories and the support location each one implies, in order.
pub const SUPPORT_DIR_MAP: &[(&str, &str)] = &[("Pages/", "Pages/Shared/"), ("Views/", "Views/Shared/")];

pub const DEFAULT_SUPPORT_LOCATION: &str = "Pages/Shared/";

/// Placement of shared support files such as the layout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportLayout {
    /// Relative directory with a trailing `/`, or empty for the project root.
    pub support_location: String,
    pub layout_path: String,
    /// A layout already exists (or was named explicitly), so none is generated.
    pub had_existing_layout: bool,
}

impl SupportLayout {
    /// Layout file name without directory or extension.
    pub fn layout_page(&self) -> &str {
        let name = self
            .layout_path
            .rsplit_once('/')
            .map_or(self.layout_path.as_str(), |(_, name)| name);
        name.rsplit_once('.').map_or(name, |(stem, _)| stem)
    }
}

/// Decide where support files go.
///
/// An explicit layout is adopted as given without looking at the project.
/// Otherwise the first conventional directory holding `layout_file` wins,
/// then the first convention directory that exists, then the default.
pub fn resolve_support_layout(
    explicit: Option<&str>,
    layout_file: &str,
    probe: &dyn ProjectProbe,
) -> SupportLayout {
    if let Some(layout) = explicit.and_then(normalize_explicit) {
        let support_location = match layout.rsplit_once('/') {
            Some((dir, _)) => format!("{dir}/"),
            None => String::new(),
        };
        tracing::debug!(layout = %layout, "using explicit layout");
        return SupportLayout {
            support_location,
            layout_path: layout,
            had_existing_layout: true,
        };
    }

    for dir in LAYOUT_PROBE_DIRS {
        let candidate = format!("{dir}{layout_file}");
        if probe.file_exists(&candidate) {
            tracing::debug!(layout = %candidate, "found existing layout");
            return SupportLayout {
                support_location: dir.to_string(),
                layout_path: candidate,
                had_existing_layout: true,
            };
        }
    }

    let support_location = SUPPORT_DIR_MAP
        .iter()
        .find(|(check, _)| probe.dir_exists(check))
        .map_or(DEFAULT_SUPPORT_LOCATION, |(_, target)| target);

    tracing::debug!(support_location, "no existing layout");
    SupportLayout {
        support_location: support_location.to_string(),
        layout_path: format!("{support_location}{layout_file}"),
        had_existing_layout: false,
    }
}

/// Strip one leading `~` and any leading separators; `None` if nothing is left.
fn normalize_explicit(raw: &str) -> Option<String> {
    let raw = raw.strip_prefix('~').unwrap_or(raw);
    let trimmed = raw.trim_start_matches(['/', '\\']);
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.replace('\\', "/"))
}
