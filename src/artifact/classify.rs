//! Format dispatch for registry metadata
//!
//! Decides whether an asset is worth syncing at all (checksum side-files,
//! index XML and similar are skipped) and builds the [`Artifact`] with the
//! transfer variant its component's format calls for. An unknown format is a
//! configuration error and aborts the run.

use super::{Artifact, ArtifactFormat, ArtifactKind};
use crate::error::{Result, SyncError};
use crate::registry::{AssetData, ComponentData};

/// Whether `asset` should be synced
pub fn is_syncable(asset: &AssetData) -> Result<bool> {
    let format = asset.format.as_deref().ok_or_else(|| {
        SyncError::InvalidAsset(format!("Couldn't validate an asset with no format: {:?}", asset))
    })?;
    let url = asset.download_url.as_deref().ok_or_else(|| {
        SyncError::InvalidAsset(format!("Couldn't validate an asset with no downloadUrl: {:?}", asset))
    })?;

    let syncable = match format.parse::<ArtifactFormat>()? {
        ArtifactFormat::Docker | ArtifactFormat::Pypi | ArtifactFormat::Raw => true,
        ArtifactFormat::Maven2 => ![".md5", ".sha1", ".xml"].iter().any(|s| url.contains(s)),
        ArtifactFormat::Npm => url.contains(".tgz"),
        ArtifactFormat::Rubygems => !["gemspec.rz", ".ruby", ".gz"].iter().any(|s| url.contains(s)),
        ArtifactFormat::Yum => !url.contains(".xml"),
    };
    Ok(syncable)
}

/// Build the artifact for one asset of `component`
pub fn build_artifact(component: &ComponentData, asset: &AssetData) -> Result<Artifact> {
    let format = component.format.as_deref().ok_or_else(|| {
        SyncError::InvalidAsset(format!(
            "Couldn't generate an artifact with no component format: {:?}",
            component.id
        ))
    })?;

    let path = asset.path.clone().unwrap_or_default();
    let field = |value: &Option<String>| value.clone().unwrap_or_default();

    let kind = match format.parse::<ArtifactFormat>()? {
        ArtifactFormat::Docker => ArtifactKind::Docker {
            image: field(&component.name),
            tag: field(&component.version),
        },
        ArtifactFormat::Maven2 => ArtifactKind::Maven {
            group_id: field(&component.group),
            artifact_id: field(&component.name),
            version: field(&component.version),
        },
        ArtifactFormat::Npm => ArtifactKind::Npm,
        ArtifactFormat::Pypi => ArtifactKind::Pypi,
        ArtifactFormat::Raw => ArtifactKind::Raw {
            directory: field(&component.group),
        },
        ArtifactFormat::Rubygems => ArtifactKind::Rubygems,
        ArtifactFormat::Yum => ArtifactKind::Yum {
            directory: parent_directory(&path),
        },
    };

    let repository = component
        .repository
        .clone()
        .or_else(|| asset.repository.clone())
        .unwrap_or_default();

    Ok(Artifact::new(
        kind,
        repository,
        path,
        field(&asset.download_url),
        asset.content_hash().map(str::to_string),
    )
    .with_id(field(&asset.id))
    .with_tags(component.tags.clone()))
}

fn parent_directory(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((directory, _)) => directory.to_string(),
        None => String::new(),
    }
}
