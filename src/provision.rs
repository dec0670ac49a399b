//! Provisioning flow: pick a hardware flavor and a compatible
//! software bundle, obtain a running instance, and install firmware
//! onto it.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use tokio::time::sleep;
use uuid::Uuid;

use crate::api::{
    CreateInstanceRequest, HardwareModel, ImageKind, Instance, InstanceState, LabClient, Software,
};
use crate::error::LabError;

/// How a software bundle is picked from the model's published list.
/// Always first-match in list order; no tie-break.
#[derive(Debug, Clone)]
pub enum SoftwareSelector {
    /// First bundle in the list.
    First,
    /// First bundle whose filename starts with the prefix.
    FilenamePrefix(String),
}

impl SoftwareSelector {
    fn matches(&self, software: &Software) -> bool {
        match self {
            SoftwareSelector::First => true,
            SoftwareSelector::FilenamePrefix(prefix) => software
                .filename
                .as_deref()
                .is_some_and(|name| name.starts_with(prefix)),
        }
    }
}

impl fmt::Display for SoftwareSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoftwareSelector::First => write!(f, "first available"),
            SoftwareSelector::FilenamePrefix(prefix) => write!(f, "filename prefix '{prefix}'"),
        }
    }
}

/// Drives instance selection, creation and firmware installation
/// against one lab session.
pub struct Provisioner<'a> {
    client: &'a LabClient,
    poll_interval: Duration,
}

impl<'a> Provisioner<'a> {
    pub fn new(client: &'a LabClient) -> Self {
        Provisioner {
            client,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The account's default project is the first one listed.
    pub async fn default_project(&self) -> Result<Uuid, LabError> {
        let projects = self.client.projects().await?;
        projects
            .first()
            .map(|project| project.id)
            .ok_or(LabError::MissingProject)
    }

    /// First model whose flavor starts with the prefix. No match is
    /// an error, never a silent fall-through.
    pub async fn select_model(&self, flavor_prefix: &str) -> Result<HardwareModel, LabError> {
        let models = self.client.models().await?;
        models
            .into_iter()
            .find(|model| model.flavor.starts_with(flavor_prefix))
            .ok_or_else(|| LabError::NoMatchingModel(flavor_prefix.to_string()))
    }

    pub async fn select_software(
        &self,
        model: &HardwareModel,
        selector: &SoftwareSelector,
    ) -> Result<Software, LabError> {
        let software = self.client.model_software(&model.model).await?;
        software
            .into_iter()
            .find(|bundle| selector.matches(bundle))
            .ok_or_else(|| LabError::NoMatchingSoftware(selector.to_string()))
    }

    /// Reuse an instance already carrying the target name, otherwise
    /// create a fresh one from the selected model and software.
    pub async fn obtain_instance(
        &self,
        name: &str,
        project: Uuid,
        model: &HardwareModel,
        software: &Software,
    ) -> Result<Instance, LabError> {
        let existing = self.client.instances().await?;
        if let Some(instance) = existing.into_iter().find(|instance| instance.name == name) {
            tracing::debug!(id = %instance.id, "reusing existing instance");
            println!("Found existing instance '{name}'");
            return Ok(instance);
        }

        println!("Creating a new instance...");
        let request = CreateInstanceRequest {
            name: name.to_string(),
            project,
            flavor: model.flavor.clone(),
            os: software.version.clone(),
            osbuild: software.buildid.clone(),
        };
        self.client.create_instance(&request).await
    }

    /// Poll the lifecycle state at the configured interval until it
    /// reaches the target. A reported `error` state aborts before
    /// any further call. Iterations are unbounded; the caller's
    /// deadline bounds the whole flow.
    pub async fn wait_for_state(&self, id: Uuid, target: InstanceState) -> Result<(), LabError> {
        let mut state = self.client.instance_state(id).await?;
        while state != target {
            if state == InstanceState::Error {
                return Err(LabError::InstanceError);
            }
            sleep(self.poll_interval).await;
            state = self.client.instance_state(id).await?;
        }
        Ok(())
    }

    /// Upload the firmware image and restart the instance onto it,
    /// leaving it observed in state `on`.
    pub async fn install_firmware(
        &self,
        instance: &Instance,
        kind: ImageKind,
        firmware: &Path,
    ) -> Result<(), LabError> {
        match self.client.instance_state(instance.id).await? {
            InstanceState::Error => return Err(LabError::InstanceError),
            // A reused instance may sit powered off; the image can
            // land before its first boot.
            InstanceState::Off => {}
            _ => {
                println!("Waiting for the instance to come up...");
                self.wait_for_state(instance.id, InstanceState::On).await?;
            }
        }

        let name = firmware
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "firmware.bin".to_string());
        println!("Uploading firmware image '{name}'...");
        self.client
            .upload_firmware(kind, &name, instance.id, firmware)
            .await?;

        if self.client.instance_state(instance.id).await? == InstanceState::Off {
            println!("Starting the instance with the new firmware...");
            self.client.start_instance(instance.id).await?;
        } else {
            println!("Rebooting onto the new firmware...");
            self.client.reboot_instance(instance.id).await?;
        }
        println!("Waiting for the instance to finish restarting...");
        self.wait_for_state(instance.id, InstanceState::On).await
    }
}
