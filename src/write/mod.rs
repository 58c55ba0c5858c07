use std::path::Path;

use crate::error::{Result, StencilError};
use crate::plan::{Decision, Plan};
use crate::render::BatchOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: String,
    pub overwritten: bool,
}

/// A planned write that was not performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRefusal {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct WriteReport {
    pub written: Vec<WrittenFile>,
    pub refused: Vec<WriteRefusal>,
    /// Files that had no output because their render failed.
    pub not_rendered: Vec<String>,
}

impl WriteReport {
    pub fn is_clean(&self) -> bool {
        self.refused.is_empty() && self.not_rendered.is_empty()
    }
}

/// Persist every successful render.
///
/// The overwrite decision is checked again against the disk right before
/// each write; a file that appeared since planning is refused unless its
/// policy (or the plan's force flag) allows replacing it.
pub fn write_outputs(plan: &Plan, outcome: &BatchOutcome) -> Result<WriteReport> {
    let mut report = WriteReport::default();

    for rendered in &outcome.files {
        let planned = &rendered.file;
        let path = planned.file.path.clone();
        let Ok(content) = &rendered.result else {
            report.not_rendered.push(path);
            continue;
        };

        let target = &planned.absolute_path;
        let exists_now = target.exists();
        match planned.file.overwrite.decide(exists_now, plan.force) {
            Decision::Write { .. } => {}
            decision => {
                let reason = if exists_now && !planned.exists {
                    format!(
                        "file appeared after planning (overwrite = {})",
                        planned.file.overwrite
                    )
                } else {
                    format!("overwrite refused ({decision:?})")
                };
                tracing::warn!(path = %path, %reason, "refusing to write");
                report.refused.push(WriteRefusal { path, reason });
                continue;
            }
        }

        write_file(target, content)?;
        tracing::debug!(path = %path, bytes = content.len(), "wrote file");
        report.written.push(WrittenFile {
            path,
            overwritten: exists_now,
        });
    }

    Ok(report)
}

fn write_file(target: &Path, content: &str) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StencilError::Io {
            context: format!("creating directory {}", parent.display()),
            source: e,
        })?;
    }
    std::fs::write(target, content).map_err(|e| StencilError::Io {
        context: format!("writing {}", target.display()),
        source: e,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewAction {
    Create,
    Overwrite { diff: String },
    Unchanged,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewEntry {
    pub path: String,
    pub action: PreviewAction,
}

/// What writing would do, without touching the disk.
pub fn preview_outputs(outcome: &BatchOutcome) -> Result<Vec<PreviewEntry>> {
    let mut entries = Vec::with_capacity(outcome.files.len());
    for rendered in &outcome.files {
        let planned = &rendered.file;
        let path = planned.file.path.clone();
        let action = match &rendered.result {
            Err(_) => PreviewAction::Failed,
            Ok(content) => {
                let target = &planned.absolute_path;
                if !target.exists() {
                    PreviewAction::Create
                } else {
                    let old = std::fs::read_to_string(target).map_err(|e| StencilError::Io {
                        context: format!("reading {}", target.display()),
                        source: e,
                    })?;
                    if old == *content {
                        PreviewAction::Unchanged
                    } else {
                        PreviewAction::Overwrite {
                            diff: unified_diff(&old, content, &path),
                        }
                    }
                }
            }
        };
        entries.push(PreviewEntry { path, action });
    }
    Ok(entries)
}

pub fn unified_diff(old: &str, new: &str, path: &str) -> String {
    use similar::TextDiff;

    let diff = TextDiff::from_lines(old, new);
    let mut output = format!("--- a/{path}\n+++ b/{path}\n");
    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        output.push_str(&format!("{hunk}"));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::{ExecutionFailure, FailureCause};
    use crate::plan::{GenerationFile, OverwritePolicy, PlanVariables, PlannedFile, SupportLayout};
    use crate::render::{RenderError, RenderedFile};
    use std::fs;

    fn planned(root: &Path, path: &str, overwrite: OverwritePolicy, exists: bool) -> PlannedFile {
        PlannedFile {
            file: GenerationFile {
                name: path.to_string(),
                path: path.to_string(),
                template: "t.tpl".to_string(),
                overwrite,
            },
            absolute_path: root.join(path),
            exists,
            requires_force: false,
        }
    }

    fn plan(root: &Path, files: Vec<PlannedFile>, force: bool) -> Plan {
        Plan {
            root: root.to_path_buf(),
            force,
            files,
            skipped: Vec::new(),
            layout: SupportLayout {
                support_location: "Pages/Shared/".to_string(),
                layout_path: "Pages/Shared/_Layout.cshtml".to_string(),
                had_existing_layout: false,
            },
            variables: PlanVariables {
                support_location: "Pages/Shared/".to_string(),
                layout_path: "Pages/Shared/_Layout.cshtml".to_string(),
                layout_page: "_Layout".to_string(),
                generate_layout: true,
                has_existing_layout: false,
                wwwroot_has_files: false,
            },
        }
    }

    fn outcome(plan: &Plan, texts: &[&str]) -> BatchOutcome {
        BatchOutcome {
            files: plan
                .files
                .iter()
                .cloned()
                .zip(texts)
                .map(|(file, text)| RenderedFile {
                    file,
                    result: Ok(text.to_string()),
                })
                .collect(),
        }
    }

    #[test]
    fn test_writes_and_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(
            dir.path(),
            vec![planned(
                dir.path(),
                "Areas/Identity/Login.cshtml",
                OverwritePolicy::WithForce,
                false,
            )],
            false,
        );
        let report = write_outputs(&plan, &outcome(&plan, &["login"])).unwrap();
        assert!(report.is_clean());
        assert_eq!(
            fs::read_to_string(dir.path().join("Areas/Identity/Login.cshtml")).unwrap(),
            "login"
        );
    }

    #[test]
    fn test_refuses_file_that_appeared_after_planning() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(
            dir.path(),
            vec![
                planned(dir.path(), "Late.cshtml", OverwritePolicy::WithForce, false),
                planned(dir.path(), "Always.cs", OverwritePolicy::Always, false),
            ],
            false,
        );
        fs::write(dir.path().join("Late.cshtml"), "user content").unwrap();
        fs::write(dir.path().join("Always.cs"), "old").unwrap();

        let report = write_outputs(&plan, &outcome(&plan, &["generated", "new"])).unwrap();
        assert_eq!(report.refused.len(), 1);
        assert_eq!(report.refused[0].path, "Late.cshtml");
        assert!(report.refused[0].reason.contains("appeared after planning"));
        assert_eq!(
            fs::read_to_string(dir.path().join("Late.cshtml")).unwrap(),
            "user content"
        );
        assert_eq!(
            report.written,
            vec![WrittenFile {
                path: "Always.cs".to_string(),
                overwritten: true
            }]
        );
    }

    #[test]
    fn test_forced_plan_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Login.cshtml"), "old").unwrap();
        let plan = plan(
            dir.path(),
            vec![planned(dir.path(), "Login.cshtml", OverwritePolicy::WithForce, true)],
            true,
        );
        let report = write_outputs(&plan, &outcome(&plan, &["new"])).unwrap();
        assert!(report.written[0].overwritten);
        assert_eq!(fs::read_to_string(dir.path().join("Login.cshtml")).unwrap(), "new");
    }

    #[test]
    fn test_failed_render_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan(
            dir.path(),
            vec![planned(dir.path(), "Broken.cs", OverwritePolicy::Always, false)],
            false,
        );
        let outcome = BatchOutcome {
            files: vec![RenderedFile {
                file: plan.files[0].clone(),
                result: Err(RenderError::Execution(ExecutionFailure {
                    template: "t.tpl".to_string(),
                    cause: FailureCause::Runtime,
                    message: "boom".to_string(),
                    location: None,
                })),
            }],
        };
        let report = write_outputs(&plan, &outcome).unwrap();
        assert_eq!(report.not_rendered, vec!["Broken.cs".to_string()]);
        assert!(!dir.path().join("Broken.cs").exists());
    }

    #[test]
    fn test_preview_actions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Same.cs"), "same").unwrap();
        fs::write(dir.path().join("Changed.cs"), "one\ntwo\n").unwrap();
        let plan = plan(
            dir.path(),
            vec![
                planned(dir.path(), "New.cs", OverwritePolicy::Always, false),
                planned(dir.path(), "Same.cs", OverwritePolicy::Always, true),
                planned(dir.path(), "Changed.cs", OverwritePolicy::Always, true),
            ],
            false,
        );
        let entries = preview_outputs(&outcome(&plan, &["new", "same", "one\nthree\n"])).unwrap();
        assert_eq!(entries[0].action, PreviewAction::Create);
        assert_eq!(entries[1].action, PreviewAction::Unchanged);
        match &entries[2].action {
            PreviewAction::Overwrite { diff } => {
                assert!(diff.contains("-two"));
                assert!(diff.contains("+three"));
            }
            other => panic!("expected overwrite, got {other:?}"),
        }
        assert!(!dir.path().join("New.cs").exists());
    }
}
