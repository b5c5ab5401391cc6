//! Per-job folders under the upload and output roots.
//!
//! Layout:
//! - `<upload_dir>/<job_id>/`: staged inputs plus `tmp/` for intermediates
//! - `<output_dir>/output_<job_id>.mp4`: final file

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use vpost_models::{JobId, JobParams, TEMP_DIR_NAME};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};

/// Deterministic output location of a job.
pub fn output_path(output_dir: &Path, job_id: &JobId) -> PathBuf {
    output_dir.join(format!("output_{}.mp4", job_id))
}

/// Copy the uploaded videos into a fresh workspace and describe the job.
pub async fn stage(
    config: &PipelineConfig,
    job_id: &JobId,
    primary: &Path,
    secondary: Option<&Path>,
) -> WorkerResult<JobParams> {
    let workspace = config.upload_dir.join(job_id.as_str());
    tokio::fs::create_dir_all(&workspace).await?;

    let staged_primary = copy_into(&workspace, primary, "video1").await?;
    let mut params = JobParams::new(
        job_id.clone(),
        staged_primary,
        output_path(&config.output_dir, job_id),
        &workspace,
    );

    if let Some(second) = secondary {
        params = params.with_secondary(copy_into(&workspace, second, "video2").await?);
    }

    debug!(job_id = %job_id, workspace = %workspace.display(), "Staged job inputs");
    Ok(params)
}

/// Best-effort removal of a job's workspace.
pub async fn remove_workspace(params: &JobParams) {
    match tokio::fs::remove_dir_all(&params.workspace_dir).await {
        Ok(()) => debug!(path = %params.workspace_dir.display(), "Removed job workspace"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(
            path = %params.workspace_dir.display(),
            error = %e,
            "Failed to remove job workspace"
        ),
    }
}

/// Resolve a requested output name, refusing anything outside `output_dir`.
pub fn resolve_download(output_dir: &Path, name: &str) -> WorkerResult<PathBuf> {
    let requested = Path::new(name);
    let mut components = requested.components();

    match (components.next(), components.next()) {
        (Some(Component::Normal(file)), None) if !name.contains(['/', '\\']) => {
            Ok(output_dir.join(file))
        }
        _ => Err(WorkerError::invalid_path(format!(
            "{name:?} is not a plain file name"
        ))),
    }
}

async fn copy_into(workspace: &Path, source: &Path, fallback_stem: &str) -> WorkerResult<PathBuf> {
    if !source.is_file() {
        return Err(WorkerError::invalid_path(format!(
            "{} is not a readable file",
            source.display()
        )));
    }

    let name = staged_name(source, fallback_stem);
    let mut dest = workspace.join(&name);
    if dest.exists() {
        dest = workspace.join(format!("{fallback_stem}_{name}"));
    }
    tokio::fs::copy(source, &dest).await?;
    Ok(dest)
}

/// File name reduced to ASCII alphanumerics, `.`, `-` and `_`.
///
/// The workspace's intermediates folder name is reserved.
fn staged_name(source: &Path, fallback_stem: &str) -> String {
    let raw = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case(TEMP_DIR_NAME) {
        format!("{fallback_stem}.mp4")
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path() {
        let path = output_path(Path::new("/data/outputs"), &JobId::from_string("abc"));
        assert_eq!(path, PathBuf::from("/data/outputs/output_abc.mp4"));
    }

    #[test]
    fn test_resolve_download() {
        let out = Path::new("/data/outputs");
        assert_eq!(
            resolve_download(out, "output_abc.mp4").unwrap(),
            PathBuf::from("/data/outputs/output_abc.mp4")
        );

        for bad in ["../secret", "/etc/passwd", "a/b.mp4", "..", ".", "", "a\\b.mp4"] {
            assert!(
                matches!(resolve_download(out, bad), Err(WorkerError::InvalidPath(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_staged_name_sanitized() {
        assert_eq!(staged_name(Path::new("/x/my clip (1).mp4"), "video1"), "my_clip__1_.mp4");
        assert_eq!(staged_name(Path::new("/x/..hidden.mp4"), "video1"), "hidden.mp4");
        assert_eq!(staged_name(Path::new("/"), "video2"), "video2.mp4");
    }

    #[tokio::test]
    async fn test_upload_named_like_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let upload = dir.path().join("src").join(TEMP_DIR_NAME);
        std::fs::create_dir_all(upload.parent().unwrap()).unwrap();
        std::fs::write(&upload, b"a").unwrap();

        let config = PipelineConfig::default().with_dirs(dir.path().join("up"), dir.path().join("out"));
        let params = stage(&config, &JobId::from_string("j3"), &upload, None).await.unwrap();

        assert_eq!(params.primary_input, dir.path().join("up/j3/video1.mp4"));
        assert_ne!(params.primary_input, params.temp_dir());
        assert!(!params.temp_dir().exists());
    }

    #[tokio::test]
    async fn test_stage_copies_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        let config = PipelineConfig::default().with_dirs(dir.path().join("up"), dir.path().join("out"));
        let id = JobId::from_string("j1");

        let params = stage(&config, &id, &a, Some(b.as_path())).await.unwrap();

        assert_eq!(params.workspace_dir, dir.path().join("up/j1"));
        assert_eq!(params.primary_input, dir.path().join("up/j1/a.mp4"));
        assert_eq!(params.secondary_input, Some(dir.path().join("up/j1/b.mp4")));
        assert_eq!(params.output_path, dir.path().join("out/output_j1.mp4"));
        assert!(params.primary_input.is_file());

        remove_workspace(&params).await;
        assert!(!params.workspace_dir.exists());
    }

    #[tokio::test]
    async fn test_stage_same_file_name_twice() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("clip.mp4");
        std::fs::write(&a, b"a").unwrap();

        let config = PipelineConfig::default().with_dirs(dir.path().join("up"), dir.path().join("out"));
        let params = stage(&config, &JobId::from_string("j2"), &a, Some(a.as_path())).await.unwrap();

        assert_eq!(params.primary_input, dir.path().join("up/j2/clip.mp4"));
        assert_eq!(params.secondary_input, Some(dir.path().join("up/j2/video2_clip.mp4")));
    }

    #[tokio::test]
    async fn test_stage_rejects_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::default().with_dirs(dir.path().join("up"), dir.path().join("out"));

        let res = stage(&config, &JobId::new(), &dir.path().join("nope.mp4"), None).await;
        assert!(matches!(res, Err(WorkerError::InvalidPath(_))));
    }
}
