use crate::output;

use clap::Args;
use color_eyre::eyre::{bail, eyre};
use color_eyre::{Report, Result};

use jobchain_service::{parse_pair, JobDescription, JobExecutor, Overrides, Registry, ServiceError};

/// Job selection and construction-time overrides
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Job description file or http(s) URL
    #[arg(short = 'f', long = "file", value_name = "FILE|URL")]
    pub file: String,

    /// Repository holding the job
    #[arg(short = 'r', long, value_name = "REPOSITORY", required_unless_present = "check")]
    pub repository: Option<String>,

    /// Job to run
    #[arg(short = 'j', long, value_name = "JOB", required_unless_present = "check")]
    pub job: Option<String>,

    /// Patch the description before validation (can be repeated, dotted path)
    #[arg(short = 'd', long = "define", value_name = "PATH=VALUE", value_parser = parse_pair)]
    pub document: Vec<(String, String)>,

    /// Set a runtime variable (can be repeated)
    #[arg(short = 'e', long = "var", value_name = "NAME=VALUE", value_parser = parse_pair)]
    pub variables: Vec<(String, String)>,

    /// Print the merged job as JSON without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Only validate the description and list its jobs
    #[arg(long, conflicts_with = "dry_run")]
    pub check: bool,
}

impl RunArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            document: self.document.iter().cloned().collect(),
            variables: self.variables.iter().cloned().collect(),
        }
    }
}

pub fn execute(args: RunArgs) -> Result<()> {
    let (Some(repository), Some(job_name)) = (args.repository.as_deref(), args.job.as_deref())
    else {
        bail!("--repository and --job are required to run a job");
    };
    let overrides = args.overrides();

    output::status("Loading", &args.file);
    let description = JobDescription::load(&args.file, &overrides).map_err(report)?;
    tracing::debug!(
        file = %args.file,
        document_overrides = overrides.document.len(),
        variables = overrides.variables.len(),
        "job description loaded"
    );

    if args.dry_run {
        let job = description.job(repository, job_name).map_err(report)?;
        println!("{}", serde_json::to_string_pretty(&job.to_value())?);
        return Ok(());
    }

    let registry = Registry::with_builtins();
    let mut executor =
        JobExecutor::new(&description, &registry, repository, job_name, &overrides)
            .map_err(report)?;

    println!();
    output::header(&format!(
        "Job '{}' of '{}' ({} steps)",
        job_name,
        repository,
        executor.job().len()
    ));

    let result = executor.execute();

    let context = executor.context();
    for (index, step_key) in executor.job().step_keys().enumerate() {
        let Some(slot) = context.slot(index + 1) else {
            break;
        };
        output::step_result(step_key, &slot.to_json());
    }

    println!();
    match result {
        Ok(()) => {
            output::success(&format!("Job '{}' completed successfully", job_name));
            Ok(())
        }
        Err(err) => {
            tracing::error!(
                repository,
                job = job_name,
                kind = err.kind(),
                slots = context.slot_count(),
                "job failed: {}",
                err
            );
            output::failure(&format!("Job '{}' failed", job_name));
            Err(report(err))
        }
    }
}

/// Error report carrying the error kind
pub fn report(err: ServiceError) -> Report {
    eyre!("{} error: {}", err.kind(), err)
}
