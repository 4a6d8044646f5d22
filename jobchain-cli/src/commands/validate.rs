use crate::commands::run::{report, RunArgs};
use crate::output;

use color_eyre::Result;

use jobchain_service::{JobDescription, Mapping, ServiceError, Value};

/// Load and validate the description, then list its repositories and jobs
pub fn execute(args: &RunArgs) -> Result<()> {
    output::status("Validating", &args.file);

    let description = match JobDescription::load(&args.file, &args.overrides()) {
        Ok(description) => description,
        Err(ServiceError::Validation(errors)) => {
            output::error(&format!("{} validation error(s):", errors.len()));
            for error in &errors {
                output::error(&format!("  - [{}] {}", error.path, error.message));
                if let Some(suggestion) = &error.suggestion {
                    output::info(&format!("    Suggestion: {}", suggestion));
                }
            }
            std::process::exit(1);
        }
        Err(err) => return Err(report(err)),
    };

    output::check("Job description valid");

    for (repository, jobs) in visible(description.repositories()) {
        let Some(jobs) = jobs.as_object() else {
            continue;
        };
        for (job_name, _) in visible(jobs) {
            let job = description.job(repository, job_name).map_err(report)?;
            output::info(&format!("{}/{}: {} steps", repository, job_name, job.len()));
        }
    }

    let variables = description.variable_definitions().len();
    if variables > 0 {
        output::info(&format!("{} variable definition(s)", variables));
    }

    Ok(())
}

fn visible(map: &Mapping) -> impl Iterator<Item = (&String, &Value)> {
    map.iter().filter(|(key, _)| !key.starts_with('_'))
}
