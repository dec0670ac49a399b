use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;

use crate::api::{ImageKind, LabClient, TestReport};
use crate::cli::commands::{OutputFormat, SessionOpts};
use crate::console::run_console_test;
use crate::error::LabError;
use crate::output::{print_error, print_info, print_json, print_success};
use crate::provision::{Provisioner, SoftwareSelector};

/// The console-mode scenario: provision, install firmware, then let
/// the firmware's own console output steer the GPIO interaction.
/// The whole flow runs under one deadline; any failure is fatal.
pub async fn firmware_test(
    opts: SessionOpts,
    firmware: PathBuf,
    flavor: String,
    name: String,
    software_prefix: Option<String>,
) -> Result<()> {
    let outcome = tokio::time::timeout(
        opts.deadline,
        run(&opts, &firmware, &flavor, &name, software_prefix),
    )
    .await
    .unwrap_or(Err(LabError::Timeout(opts.deadline)));

    match outcome {
        Ok(report) => {
            match opts.format {
                OutputFormat::Json => print_json(&report, true)?,
                OutputFormat::Text => print_success("Firmware console test completed", opts.color),
            }
            Ok(())
        }
        Err(error) => {
            print_error("Encountered error; cleaning up...", opts.color);
            Err(error.into())
        }
    }
}

async fn run(
    opts: &SessionOpts,
    firmware: &Path,
    flavor: &str,
    name: &str,
    software_prefix: Option<String>,
) -> Result<TestReport, LabError> {
    let color = opts.color;

    let mut client = LabClient::new(&opts.endpoint)?;
    print_info("Logging in...", color);
    client.login(&opts.token).await?;

    let provisioner = Provisioner::new(&client);

    print_info("Finding a project...", color);
    let project = provisioner.default_project().await?;

    print_info(&format!("Selecting a hardware model matching '{flavor}'..."), color);
    let model = provisioner.select_model(flavor).await?;

    let selector = software_prefix
        .map(SoftwareSelector::FilenamePrefix)
        .unwrap_or(SoftwareSelector::First);
    print_info(&format!("Selecting software ({selector})..."), color);
    let software = provisioner.select_software(&model, &selector).await?;

    let instance = provisioner
        .obtain_instance(name, project, &model, &software)
        .await?;
    provisioner
        .install_firmware(&instance, ImageKind::IotFirmware, firmware)
        .await?;

    print_info("Driving the console GPIO test...", color);
    run_console_test(&client, instance.id).await?;

    Ok(TestReport {
        scenario: "firmware-test".to_string(),
        instance: instance.name,
        flavor: model.flavor,
        mismatches: 0,
        timestamp: Utc::now(),
    })
}
