use clap::Args;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::gate::{grants, Requirement};

#[derive(Args)]
pub struct CheckArgs {
    #[arg(help = "Code demanded by the route, e.g. project:plan:add")]
    pub required: String,

    #[arg(required = true, help = "Codes held by the caller's roles")]
    pub held: Vec<String>,
}

pub fn handle(args: CheckArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let granted_by = match Requirement::parse(&args.required) {
        Requirement::Resource(required) => args.held.iter().find(|held| grants(held, &required)).cloned(),
        other => anyhow::bail!("'{}' is not a resource code", other),
    };

    let message = match &granted_by {
        Some(held) => format!("'{}' is granted by '{}'", args.required, held),
        None => format!("'{}' is not granted", args.required),
    };

    output_success(
        &output_format,
        &message,
        Some(json!({
            "required": args.required,
            "granted": granted_by.is_some(),
            "grantedBy": granted_by
        })),
    )?;

    if granted_by.is_none() {
        std::process::exit(2);
    }
    Ok(())
}
