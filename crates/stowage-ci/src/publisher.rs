//! Image versioning and publishing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stowage_core::context::generated_dockerfile_path;
use stowage_core::obs::{emit_image_pushed, emit_logout_failed, emit_version_resolved};
use stowage_core::{
    next_version, ImageConfig, ImageVersion, RegistryCredentials, Result, RunContext,
    StowageError,
};
use tracing::info;

use crate::tools::ContainerEngine;

/// A pushed image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedImage {
    /// `<registry>/<namespace>/<name>`
    pub repository: String,
    pub version: String,
    /// `<repository>:<version>`
    pub reference: String,
}

/// Dockerfile contents used when none is configured.
pub fn default_dockerfile(base_image: &str) -> String {
    format!("FROM {base_image}\nWORKDIR /app\nCOPY artifacts/ /app/\n")
}

/// Return the Dockerfile to build with, writing the default one into the
/// workspace when none is configured.
pub fn prepare_dockerfile(workspace: &Path, image: &ImageConfig) -> Result<PathBuf> {
    match &image.dockerfile {
        Some(path) if path.is_file() => Ok(path.clone()),
        Some(path) => Err(StowageError::InvalidConfig(format!(
            "Dockerfile not found: {}",
            path.display()
        ))),
        None => {
            let path = generated_dockerfile_path(workspace);
            std::fs::write(&path, default_dockerfile(&image.base_image))?;
            Ok(path)
        }
    }
}

/// Resolves the next version of an image and pushes it.
pub struct ImagePublisher {
    engine: Arc<dyn ContainerEngine>,
}

impl ImagePublisher {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// `v<max+1>` over the `v<N>` tags already present for `repository`.
    ///
    /// Two runs resolving at the same time can pick the same version.
    pub async fn resolve_version(&self, repository: &str) -> Result<ImageVersion> {
        let tags = self.engine.list_tags(repository).await?;
        let version = next_version(&tags)?;
        emit_version_resolved(repository, &version.tag(), tags.len());
        Ok(version)
    }

    /// Build, tag, log in, push, log out.
    ///
    /// Any failure aborts; there is no partial-publish retry. Logout runs
    /// whenever login succeeded, even if the push failed.
    pub async fn publish(
        &self,
        ctx: &RunContext,
        image: &ImageConfig,
        repository: &str,
        version: ImageVersion,
        credentials: Option<&RegistryCredentials>,
    ) -> Result<PublishedImage> {
        let credentials = credentials.ok_or_else(|| {
            StowageError::MissingCredentials(format!(
                "registry credentials for {} are not set",
                image.registry
            ))
        })?;

        let reference = format!("{repository}:{version}");
        std::fs::create_dir_all(ctx.artifact_dir())?;
        let dockerfile = prepare_dockerfile(&ctx.workspace, image)?;

        info!(reference = %reference, dockerfile = %dockerfile.display(), "building image");
        self.engine
            .build_image(&reference, &dockerfile, &ctx.workspace)
            .await?;

        self.engine.login(&image.registry, credentials).await?;
        let pushed = self.engine.push(&reference).await;
        if let Err(e) = self.engine.logout(&image.registry).await {
            emit_logout_failed(&image.registry, &e);
        }
        pushed?;

        emit_image_pushed(&reference);
        Ok(PublishedImage {
            repository: repository.to_string(),
            version: version.tag(),
            reference,
        })
    }
}
