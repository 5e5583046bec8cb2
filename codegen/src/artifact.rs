//! Where rendered artifacts end up.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::{CodegenError, Result};
use crate::render::Artifact;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Writes every artifact under `gen_path`. Either all files land or none
    /// of the newly created ones are left behind.
    async fn write(&self, gen_path: &str, artifacts: &[Artifact]) -> Result<Vec<PathBuf>>;
}

/// Writes artifacts below a fixed root directory.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Accepts only plain relative paths: no root, no prefix, no `..`.
fn relative(path: &str) -> Result<&Path> {
    let p = Path::new(path);
    let ok = p
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if ok {
        Ok(p)
    } else {
        Err(CodegenError::Artifact(format!(
            "path must be relative without `..`: {path}"
        )))
    }
}

fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.tmp"))
}

fn io_err(path: &Path, e: std::io::Error) -> CodegenError {
    CodegenError::Artifact(format!("{}: {e}", path.display()))
}

struct Staged {
    target: PathBuf,
    temp: PathBuf,
    existed: bool,
}

async fn discard(staged: &[Staged]) {
    for s in staged {
        let _ = tokio::fs::remove_file(&s.temp).await;
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn write(&self, gen_path: &str, artifacts: &[Artifact]) -> Result<Vec<PathBuf>> {
        let base = self.root.join(relative(gen_path)?);

        let mut targets = Vec::with_capacity(artifacts.len());
        for a in artifacts {
            targets.push(base.join(relative(&a.relative_path)?));
        }

        // Stage every file next to its target first.
        let mut staged: Vec<Staged> = Vec::with_capacity(artifacts.len());
        for (artifact, target) in artifacts.iter().zip(targets) {
            let temp = temp_path(&target);
            let result = async {
                if let Some(dir) = target.parent() {
                    tokio::fs::create_dir_all(dir)
                        .await
                        .map_err(|e| io_err(dir, e))?;
                }
                tokio::fs::write(&temp, &artifact.content)
                    .await
                    .map_err(|e| io_err(&temp, e))
            }
            .await;
            let existed = tokio::fs::try_exists(&target).await.unwrap_or(false);
            let entry = Staged {
                target,
                temp,
                existed,
            };
            if let Err(e) = result {
                staged.push(entry);
                discard(&staged).await;
                return Err(e);
            }
            staged.push(entry);
        }

        let mut written = Vec::with_capacity(staged.len());
        for (i, s) in staged.iter().enumerate() {
            if let Err(e) = tokio::fs::rename(&s.temp, &s.target).await {
                discard(&staged[i..]).await;
                for done in staged[..i].iter().filter(|d| !d.existed) {
                    let _ = tokio::fs::remove_file(&done.target).await;
                }
                tracing::warn!(path = %s.target.display(), error = %e, "Artifact write rolled back");
                return Err(io_err(&s.target, e));
            }
            written.push(s.target.clone());
        }

        tracing::info!(root = %base.display(), files = written.len(), "Wrote artifacts");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ArtifactKind;

    fn artifact(path: &str, content: &str) -> Artifact {
        Artifact {
            kind: ArtifactKind::Entity,
            relative_path: path.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn writes_under_gen_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        let paths = store
            .write(
                "shop",
                &[
                    artifact("src/entity/orders.rs", "entity"),
                    artifact("web/src/views/orders/index.vue", "view"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(paths.len(), 2);
        let entity = dir.path().join("shop/src/entity/orders.rs");
        assert_eq!(std::fs::read_to_string(entity).unwrap(), "entity");
        assert!(!dir.path().join("shop/src/entity/.orders.rs.tmp").exists());
    }

    #[tokio::test]
    async fn empty_gen_path_writes_at_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.write("", &[artifact("a.rs", "x")]).await.unwrap();
        assert!(dir.path().join("a.rs").exists());
    }

    #[tokio::test]
    async fn rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("root"));

        for (gen_path, file) in [("../out", "a.rs"), ("/tmp/out", "a.rs"), ("ok", "../../a.rs")] {
            let err = store.write(gen_path, &[artifact(file, "x")]).await.unwrap_err();
            assert!(matches!(err, CodegenError::Artifact(_)), "{gen_path} {file}");
        }
        assert!(!dir.path().join("a.rs").exists());
        assert!(!dir.path().join("root").exists());
    }

    #[tokio::test]
    async fn failed_write_leaves_no_new_files() {
        let dir = tempfile::tempdir().unwrap();
        // A plain file where a directory is needed makes the second artifact fail.
        std::fs::write(dir.path().join("blocked"), "file").unwrap();
        let store = FsArtifactStore::new(dir.path());

        let err = store
            .write(
                "",
                &[artifact("first.rs", "one"), artifact("blocked/second.rs", "two")],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CodegenError::Artifact(_)));
        assert!(!dir.path().join("first.rs").exists());
        assert!(!dir.path().join(".first.rs.tmp").exists());
    }

    #[tokio::test]
    async fn overwrites_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        store.write("", &[artifact("a.rs", "old")]).await.unwrap();
        store.write("", &[artifact("a.rs", "new")]).await.unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("a.rs")).unwrap(), "new");
    }
}
