//! Subcommand bodies of the `testomat` binary.

use crate::results::{expand_patterns, overall_status, read_results};
use crate::settings::CliError;
use reporter::config::ENV_RUN;
use reporter::{ReporterConfig, RunStatus, TestomatClient};
use tracing::info;

/// Creates or resumes the run and returns the `TESTOMATIO_RUN=<id>` line for
/// later processes. Returns only after the run request has been sent.
pub async fn start(config: ReporterConfig) -> Result<String, CliError> {
    let client = TestomatClient::new(config)?;

    client
        .create_run()
        .await
        .ok_or_else(|| CliError::Reporting("run could not be created".to_string()))?;
    // A resumed run resolves before its update request has gone out.
    client.flush().await;

    if let Some(url) = client.run_url() {
        info!("Run URL: {}", url);
    }

    client
        .store()
        .export_line()
        .ok_or_else(|| CliError::Reporting("run id was not recorded".to_string()))
}

pub async fn finish(
    config: ReporterConfig,
    status: RunStatus,
    parallel: bool,
) -> Result<(), CliError> {
    if config.run_id.is_none() {
        return Err(CliError::InvalidConfig(format!(
            "no run to finish, set {} or pass --run",
            ENV_RUN
        )));
    }

    let parallel = parallel || config.parallel;
    let client = TestomatClient::new(config)?;
    client.update_run_status(status, parallel).await;

    Ok(())
}

/// Reports every result matched by `patterns` and finishes the run with the
/// aggregate status. Returns the number of results sent.
pub async fn report(config: ReporterConfig, patterns: &[String]) -> Result<usize, CliError> {
    let files = expand_patterns(patterns)?;
    if files.is_empty() {
        return Err(CliError::Reporting(format!(
            "no result files match {}",
            patterns.join(" ")
        )));
    }

    let mut records = Vec::new();
    for file in &files {
        let mut loaded = read_results(file)?;
        info!("Loaded {} results from {}", loaded.len(), file.display());
        records.append(&mut loaded);
    }

    let parallel = config.parallel;
    let client = TestomatClient::new(config)?;
    let run_id = client
        .create_run()
        .await
        .ok_or_else(|| CliError::Reporting("run could not be created".to_string()))?;

    let submitted: Vec<_> = records
        .iter()
        .map(|record| {
            client.add_test_run(record.test_id.clone(), record.status, record.to_test_run())
        })
        .collect();
    futures::future::join_all(submitted).await;

    let status = overall_status(&records);
    client.update_run_status(status, parallel).await;

    info!(
        "Reported {} results into run {} as {}",
        records.len(),
        run_id,
        status
    );
    Ok(records.len())
}
