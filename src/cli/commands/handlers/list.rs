use anyhow::Result;
use tabled::Tabled;

use crate::api::LabClient;
use crate::cli::commands::{ListTarget, OutputFormat, SessionOpts};
use crate::output::{format_table, print_json};

#[derive(Tabled)]
struct ProjectRow {
    id: String,
    name: String,
}

#[derive(Tabled)]
struct ModelRow {
    name: String,
    model: String,
    flavor: String,
}

#[derive(Tabled)]
struct SoftwareRow {
    version: String,
    buildid: String,
    filename: String,
}

pub async fn list(opts: SessionOpts, what: ListTarget) -> Result<()> {
    let mut client = LabClient::new(&opts.endpoint)?;
    client.login(&opts.token).await?;

    match what {
        ListTarget::Projects => {
            let projects = client.projects().await?;
            match opts.format {
                OutputFormat::Json => print_json(&projects, true)?,
                OutputFormat::Text => {
                    let rows: Vec<ProjectRow> = projects
                        .into_iter()
                        .map(|project| ProjectRow {
                            id: project.id.to_string(),
                            name: project.name,
                        })
                        .collect();
                    println!("{}", format_table(rows, opts.color));
                }
            }
        }
        ListTarget::Models { flavor } => {
            let mut models = client.models().await?;
            if let Some(prefix) = &flavor {
                models.retain(|model| model.flavor.starts_with(prefix));
            }
            match opts.format {
                OutputFormat::Json => print_json(&models, true)?,
                OutputFormat::Text => {
                    let rows: Vec<ModelRow> = models
                        .into_iter()
                        .map(|model| ModelRow {
                            name: model.name,
                            model: model.model,
                            flavor: model.flavor,
                        })
                        .collect();
                    println!("{}", format_table(rows, opts.color));
                }
            }
        }
        ListTarget::Software { model } => {
            let software = client.model_software(&model).await?;
            match opts.format {
                OutputFormat::Json => print_json(&software, true)?,
                OutputFormat::Text => {
                    let rows: Vec<SoftwareRow> = software
                        .into_iter()
                        .map(|bundle| SoftwareRow {
                            version: bundle.version,
                            buildid: bundle.buildid.unwrap_or_default(),
                            filename: bundle.filename.unwrap_or_default(),
                        })
                        .collect();
                    println!("{}", format_table(rows, opts.color));
                }
            }
        }
    }

    Ok(())
}
