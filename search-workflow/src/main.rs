//! Contents search workflow.
//!
//! Rebuilds the contents index on the configured search service, uploads the
//! sample documents and prints the titles matching each sample query.

use std::env;
use std::error::Error;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use search_workflow::{Dependencies, IndexWorkflow, WorkflowError};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run() -> Result<(), WorkflowError> {
    let Dependencies { client, config } = Dependencies::new().await?;
    let mut workflow = IndexWorkflow::new(client, config);

    let report = workflow.run().await?;
    info!(
        index_deleted = report.index_deleted,
        index_created = report.index_created,
        consistency_reached = report.consistency_reached,
        queries = report.queries.len(),
        "Workflow finished"
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Workflow failed");
            eprintln!("Error: {}", e);

            let mut source = e.source();
            while let Some(err) = source {
                eprintln!("  Caused by: {}", err);
                source = err.source();
            }
            ExitCode::FAILURE
        }
    }
}
