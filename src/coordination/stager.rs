use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info};

use super::manifest::AssemblyManifest;
use super::results::results_path;
use crate::config::{APP_TOOLS_PAYLOAD_DIR, RUNNER_DIR, RUNNER_PAYLOAD_DIR};
use crate::io::{copy_file_preserving, copy_tree_to, list_files, normalize_separators};
use crate::settings::Settings;

/// A fully staged execution directory
#[derive(Debug, Clone)]
pub struct StagedEnvironment {
    /// Work item root the runner executes in
    pub root: PathBuf,
    /// Directory holding the runner tree
    pub runner_dir: PathBuf,
    /// Files copied from the assembly manifest, at their flattened location
    pub staged_files: Vec<PathBuf>,
}

/// Materializes the execution directory for a work item from the correlation payload
pub struct EnvironmentStager<'a> {
    settings: &'a Settings,
}

impl<'a> EnvironmentStager<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Stage the work item
    ///
    /// Copies the app tooling tree into the work item root, the runner tree into
    /// its `runner` subdirectory, and every file listed in the assembly manifest
    /// (resolved against the work item root) into the root under its base name.
    /// Any failure aborts staging.
    pub async fn stage(&self, assembly_list: &Path) -> Result<StagedEnvironment> {
        let root = self.settings.workitem_working_dir.clone();
        let payload = &self.settings.correlation_payload_dir;

        let app_tools_dir = payload.join(APP_TOOLS_PAYLOAD_DIR);
        let runner_payload_dir = payload.join(RUNNER_PAYLOAD_DIR);
        let runner_dir = root.join(RUNNER_DIR);

        fs::create_dir_all(&runner_dir)
            .await
            .with_context(|| format!("Failed to create runner directory {}", runner_dir.display()))?;

        // Results left by an earlier run must not pass for this run's
        let stale_results = results_path(&root);
        match fs::remove_file(&stale_results).await {
            Ok(()) => info!("Removed stale results at {}", stale_results.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to remove stale results {}", stale_results.display())
                });
            }
        }

        info!(
            "Copying app tools from {} to {}",
            app_tools_dir.display(),
            root.display()
        );
        copy_tree_to(&app_tools_dir, &root).await?;

        info!(
            "Copying runner from {} to {}",
            runner_payload_dir.display(),
            runner_dir.display()
        );
        copy_tree_to(&runner_payload_dir, &runner_dir).await?;

        info!(
            "Copying product binaries from {} to {}",
            payload.display(),
            root.display()
        );
        let staged_files = self.copy_package_files(&root.join(assembly_list)).await?;

        Ok(StagedEnvironment {
            root,
            runner_dir,
            staged_files,
        })
    }

    /// Copy every file named in the manifest into the work item root
    async fn copy_package_files(&self, assembly_list: &Path) -> Result<Vec<PathBuf>> {
        info!("Opening assembly list from {}", assembly_list.display());
        let manifest = AssemblyManifest::load(assembly_list).await?;

        let payload = &self.settings.correlation_payload_dir;
        let root = &self.settings.workitem_working_dir;
        let mut staged = Vec::with_capacity(manifest.len());

        for (category, entries) in manifest.categories() {
            for entry in entries {
                let relative = normalize_separators(entry);
                let source = payload.join(&relative);
                let file_name = relative
                    .file_name()
                    .with_context(|| format!("Manifest entry '{}' has no file name", entry))?;
                let target = root.join(file_name);

                debug!(
                    "Copying {} ({}) to {}",
                    source.display(),
                    category,
                    target.display()
                );

                if let Err(e) = copy_file_preserving(&source, &target).await {
                    self.dump_payload_tree();
                    return Err(e).with_context(|| {
                        format!("Failed to stage {} file '{}'", category, entry)
                    });
                }
                staged.push(target);
            }
        }

        info!("Staged {} files from assembly list", staged.len());
        Ok(staged)
    }

    /// Log every file in the correlation payload for diagnosis
    fn dump_payload_tree(&self) {
        let payload = &self.settings.correlation_payload_dir;
        error!(
            "Failed to copy product binary, dumping contents of '{}'",
            payload.display()
        );
        for file in list_files(payload) {
            info!("{}", file.display());
        }
    }
}
