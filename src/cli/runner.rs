//! End-to-end sync run

use crate::cache::LocalCache;
use crate::catalog::Catalog;
use crate::cli::args::Args;
use crate::config::{OutputFormat, Side, SyncConfig};
use crate::disk::DiskGate;
use crate::error::{Result, SyncError};
use crate::logging::Logger;
use crate::registry::{NexusClientBuilder, RegistryClient};
use crate::sync::{Coordinator, SharedState, SyncReport};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Measures free bytes for the filesystem holding a path
pub type SpaceProbe = fn(&Path) -> Result<u64>;

/// What a dry run would have done
#[derive(Debug, Serialize)]
pub struct SyncPlan {
    pub repositories: Vec<String>,
    pub download: Vec<String>,
    pub upload: Vec<String>,
    pub skipped: usize,
    pub required_bytes: u64,
    pub available_bytes: u64,
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    Planned(SyncPlan),
    Synced(SyncReport),
}

pub struct Runner {
    config: SyncConfig,
    logger: Logger,
    space_probe: SpaceProbe,
}

impl Runner {
    pub fn new(config: SyncConfig) -> Self {
        let logger = match config.output {
            OutputFormat::Json => Logger::new_quiet(),
            OutputFormat::Text => Logger::new(config.verbose),
        };

        Self {
            config,
            logger,
            space_probe: DiskGate::available_space,
        }
    }

    pub fn with_space_probe(mut self, space_probe: SpaceProbe) -> Self {
        self.space_probe = space_probe;
        self
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Build the Nexus clients from the environment and run
    pub async fn run(&self, args: &Args) -> Result<()> {
        self.logger.section("Registry Sync");

        let source = args.connection(Side::Source)?;
        let destination = args.connection(Side::Destination)?;
        self.logger.info(&format!("Source: {}", source.url));
        self.logger.info(&format!("Destination: {}", destination.url));
        self.logger.verbose(&format!(
            "Item location: {} ({} workers per role)",
            self.config.item_location.display(),
            self.config.parallelization
        ));

        let source_client: Arc<dyn RegistryClient> = Arc::new(NexusClientBuilder::from_config(&source).build()?);
        let destination_client: Arc<dyn RegistryClient> =
            Arc::new(NexusClientBuilder::from_config(&destination).build()?);

        let outcome = self.execute(source_client, destination_client).await?;
        self.render(&outcome)?;
        if let RunOutcome::Synced(report) = &outcome {
            if let Some(failure) = report.worker_failure() {
                return Err(failure);
            }
        }

        self.logger.success(&format!(
            "Run completed in {}",
            self.logger.format_duration(self.logger.elapsed())
        ));
        Ok(())
    }

    /// Plan the sync between two registries and, unless this is a dry run,
    /// carry it out
    pub async fn execute(
        &self,
        source: Arc<dyn RegistryClient>,
        destination: Arc<dyn RegistryClient>,
    ) -> Result<RunOutcome> {
        let cache = LocalCache::new(&self.config.item_location);
        let catalog = |side, client| {
            Catalog::new(side, client, cache.clone())
                .with_filters(self.config.filters.clone())
                .with_tags(self.config.tags.clone())
        };

        let mut coordinator = Coordinator::new(
            catalog(Side::Source, source),
            catalog(Side::Destination, destination),
            cache.clone(),
            self.config.parallelization,
            self.logger.clone(),
        );

        self.logger.subsection("Verifying credentials");
        coordinator.verify_connections().await?;
        self.logger.step("Both registries accept the configured credentials");

        coordinator.compute_shared_registries().await?;
        coordinator.compute_sync_set().await?;

        tokio::fs::create_dir_all(&self.config.item_location)
            .await
            .map_err(|e| SyncError::io(&self.config.item_location, e))?;
        let gate = DiskGate::new(
            coordinator.required_space(),
            (self.space_probe)(&self.config.item_location)?,
        );
        self.logger.info(&format!(
            "Disk space required: {}, available: {}",
            self.logger.format_size(gate.required),
            self.logger.format_size(gate.available)
        ));
        gate.ensure_adequate()?;

        if self.config.dry_run {
            self.logger.info("Dry run mode - skipping transfers");
            return Ok(RunOutcome::Planned(SyncPlan {
                repositories: coordinator
                    .shared_repositories()
                    .iter()
                    .map(|r| r.name.clone())
                    .collect(),
                download: coordinator.download_list().iter().map(ToString::to_string).collect(),
                upload: coordinator.upload_list().iter().map(ToString::to_string).collect(),
                skipped: coordinator.skipped().len(),
                required_bytes: gate.required,
                available_bytes: gate.available,
            }));
        }

        let coordinator = Arc::new(coordinator);
        let state = Arc::new(SharedState::new(
            coordinator.clone(),
            coordinator.download_count(),
            coordinator.upload_count(),
        ));
        coordinator.populate_queues(&state).await;
        state.verify_pairing().await?;

        let report = coordinator.run_sync(state).await;
        Ok(RunOutcome::Synced(report))
    }

    fn render(&self, outcome: &RunOutcome) -> Result<()> {
        match (self.config.output, outcome) {
            (OutputFormat::Json, RunOutcome::Planned(plan)) => {
                println!("{}", serde_json::to_string_pretty(plan)?);
            }
            (OutputFormat::Json, RunOutcome::Synced(report)) => {
                println!("{}", serde_json::to_string_pretty(report)?);
            }
            (OutputFormat::Text, RunOutcome::Planned(plan)) => {
                self.logger.summary("Would download:", &plan.download);
                self.logger.summary("Would upload from cache:", &plan.upload);
            }
            (OutputFormat::Text, RunOutcome::Synced(_)) => {}
        }
        Ok(())
    }
}
