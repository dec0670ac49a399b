use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;

use crate::api::{ImageKind, LabClient, TestReport};
use crate::cli::commands::{OutputFormat, SessionOpts};
use crate::error::LabError;
use crate::output::{format_mismatches, print_error, print_info, print_json, print_success};
use crate::provision::{Provisioner, SoftwareSelector};
use crate::sensors::SensorCheck;

/// The sensor-mode scenario: provision, install firmware, then sweep
/// the simulated environment sensors and verify each write echoes
/// back. Echo mismatches are reported but do not fail the run.
pub async fn sensor_test(
    opts: SessionOpts,
    firmware: PathBuf,
    flavor: String,
    name: String,
    software_prefix: Option<String>,
    rounds: usize,
) -> Result<()> {
    let outcome = tokio::time::timeout(
        opts.deadline,
        run(&opts, &firmware, &flavor, &name, software_prefix, rounds),
    )
    .await
    .unwrap_or(Err(LabError::Timeout(opts.deadline)));

    match outcome {
        Ok(report) => {
            match opts.format {
                OutputFormat::Json => print_json(&report, true)?,
                OutputFormat::Text => {
                    if report.mismatches > 0 {
                        println!("{}", format_mismatches(report.mismatches, opts.color));
                    }
                    print_success("Sensor test completed", opts.color);
                }
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
    rounds: usize,
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
        .install_firmware(&instance, ImageKind::FwBinary, firmware)
        .await?;

    let gpios = client.instance_gpios(instance.id).await?;
    print_info(&format!("Initial GPIO state: {gpios:?}"), color);

    print_info(&format!("Running {rounds} sensor rounds..."), color);
    let mismatches = SensorCheck::new(&client, instance.id)
        .with_rounds(rounds)
        .run()
        .await?;

    Ok(TestReport {
        scenario: "sensor-test".to_string(),
        instance: instance.name,
        flavor: model.flavor,
        mismatches,
        timestamp: Utc::now(),
    })
}
