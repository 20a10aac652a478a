//! Per-stage artifact files and the aggregate result.

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::json;
use tracing::debug;

use crate::context::StageContext;
use crate::error::PipelineError;
use crate::stage::StageId;

/// Write the artifact for one completed stage into `dir`.
///
/// # Errors
///
/// Returns `PipelineError::ArtifactWrite` on any filesystem failure.
pub fn write_stage_artifact(
    dir: &Utf8Path,
    stage: StageId,
    ctx: &StageContext,
) -> Result<(), PipelineError> {
    match stage {
        StageId::ExtractVariables => {
            write_json(&dir.join("variables.json"), &json!({"variables": ctx.variables}))
        }
        StageId::AnnotateText => write_text(&dir.join("annotated.txt"), &ctx.annotated_text),
        StageId::GenerateDiagram => write_text(&dir.join("diagram.mmd"), &ctx.diagram),
        StageId::SplitSubsystems => write_json(
            &dir.join("subsystems.json"),
            &json!({
                "subsystems": ctx.subsystems,
                "collaboration": ctx.collaboration,
            }),
        ),
        StageId::GenerateSubPrompts => write_json(
            &dir.join("subprompts.json"),
            &json!({"subprompts": ctx.subprompts}),
        ),
        StageId::GenerateCode => write_codegen(dir, ctx),
        StageId::ConvertToDsl => write_json(
            &dir.join("dsl.json"),
            &json!({"dsl": ctx.dsl}),
        ),
    }
}

/// Write the aggregate `result.json` after a full run.
///
/// # Errors
///
/// Returns `PipelineError::ArtifactWrite` on any filesystem failure.
pub fn write_aggregate(
    dir: &Utf8Path,
    ctx: &StageContext,
    completed: &[StageId],
) -> Result<Utf8PathBuf, PipelineError> {
    let path = dir.join("result.json");
    let summary = json!({
        "variable_count": ctx.variables.len(),
        "subsystem_count": ctx.subsystems.len(),
        "subprompt_count": ctx.subprompts.len(),
        "codegen": ctx.codegen.as_ref().map(|c| json!({
            "enabled": c.enabled,
            "total": c.total,
            "implementable_count": c.implementable_count,
            "successful_count": c.successful_count,
            "failed_count": c.failed_count,
        })),
        "dsl": ctx.dsl.as_ref().map(|d| json!({
            "success_count": d.success_count,
            "failed_count": d.failed_count,
            "skipped_count": d.skipped_count,
        })),
        "dsl_skipped": ctx.dsl.as_ref().map_or(0, |d| d.skipped_count),
    });

    write_json(
        &path,
        &json!({
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "completed_stages": completed,
            "summary": summary,
            "context": ctx,
        }),
    )?;
    debug!(path = %path, "aggregate result written");
    Ok(path)
}

fn write_codegen(dir: &Utf8Path, ctx: &StageContext) -> Result<(), PipelineError> {
    let Some(outcome) = &ctx.codegen else {
        return Ok(());
    };

    let code_dir = dir.join("codegen");
    for (index, entry) in outcome.entries.iter().enumerate() {
        if entry.has_code() {
            let file_name = format!("{}.py", sanitize_name(&entry.name, index));
            write_text(&code_dir.join(file_name), &entry.code)?;
        }
    }

    write_json(
        &dir.join("codegen_summary.json"),
        &json!({
            "enabled": outcome.enabled,
            "total": outcome.total,
            "implementable_count": outcome.implementable_count,
            "successful_count": outcome.successful_count,
            "failed_count": outcome.failed_count,
            "entries": outcome.entries,
        }),
    )
}

/// File-system safe version of a subsystem name.
fn sanitize_name(name: &str, index: usize) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if cleaned.trim_matches('_').is_empty() {
        format!("subsystem_{index}")
    } else {
        cleaned
    }
}

fn write_text(path: &Utf8Path, content: &str) -> Result<(), PipelineError> {
    ensure_parent(path)?;
    std::fs::write(path, content).map_err(|source| PipelineError::ArtifactWrite {
        path: path.to_owned(),
        source,
    })
}

fn write_json(path: &Utf8Path, value: &impl serde::Serialize) -> Result<(), PipelineError> {
    let content =
        serde_json::to_string_pretty(value).map_err(|e| PipelineError::Payload(e.to_string()))?;
    write_text(path, &content)
}

fn ensure_parent(path: &Utf8Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent()
        && !parent.as_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| PipelineError::ArtifactWrite {
            path: parent.to_owned(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CodegenEntry, CodegenOutcome, DslOutcome};

    fn temp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    #[test]
    fn writes_variables_artifact() {
        let (_guard, dir) = temp_dir();
        let mut ctx = StageContext::new("input");
        ctx.variables = vec!["a".to_string(), "b".to_string()];

        write_stage_artifact(&dir, StageId::ExtractVariables, &ctx).unwrap();

        let content = std::fs::read_to_string(dir.join("variables.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["variables"][1], "b");
    }

    #[test]
    fn writes_code_files_only_for_entries_with_code() {
        let (_guard, dir) = temp_dir();
        let mut ctx = StageContext::new("input");
        ctx.codegen = Some(CodegenOutcome::from_entries(vec![
            CodegenEntry {
                name: "parser core".to_string(),
                is_implementable: true,
                code: "def run(): pass".to_string(),
                ..CodegenEntry::default()
            },
            CodegenEntry {
                name: "judge only".to_string(),
                ..CodegenEntry::default()
            },
        ]));

        write_stage_artifact(&dir, StageId::GenerateCode, &ctx).unwrap();

        assert!(dir.join("codegen/parser_core.py").exists());
        assert!(!dir.join("codegen/judge_only.py").exists());
        assert!(dir.join("codegen_summary.json").exists());
    }

    #[test]
    fn aggregate_reports_skip_count() {
        let (_guard, dir) = temp_dir();
        let mut ctx = StageContext::new("input");
        ctx.dsl = Some(DslOutcome {
            skipped_count: 2,
            success_count: 1,
            ..DslOutcome::default()
        });

        let path = write_aggregate(&dir, &ctx, &StageId::all()).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["summary"]["dsl_skipped"], 2);
        assert_eq!(value["completed_stages"][0], "extract_variables");
    }

    #[test]
    fn sanitizes_awkward_names() {
        assert_eq!(sanitize_name("parser core", 0), "parser_core");
        assert_eq!(sanitize_name("???", 3), "subsystem_3");
        assert_eq!(sanitize_name("数据处理", 1), "数据处理");
    }
}
