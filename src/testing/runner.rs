//! Flow runner front end
//!
//! Loads flow files, runs them through the engine one session at a time and
//! prints a colored transcript of every step.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;

use crate::common::config::Config;
use crate::common::Result;
use crate::engine::{
    ActionStep, DiagnosticSink, DirectorySink, FlowResult, FlowRunner, NullSink, SessionConfig,
    SessionLifecycleManager, StepExecutor, StepOutcome, StepResult,
};
use crate::webdriver::WebDriverHost;

use super::config::{FlowDefinition, Variables};

/// A flow file parsed and expanded into engine steps
#[derive(Debug, Clone)]
pub struct PreparedFlow {
    pub name: String,
    pub description: Option<String>,
    pub source: PathBuf,
    /// Overrides the configured launch settle delay
    pub launch_settle: Option<Duration>,
    pub steps: Vec<ActionStep>,
}

/// Load every flow up front so a broken file fails before any session opens
pub fn prepare_flows(
    paths: &[PathBuf],
    vars: &Variables,
    default_timeout: Duration,
) -> Result<Vec<PreparedFlow>> {
    let mut seen = HashSet::new();
    let mut flows = Vec::with_capacity(paths.len());

    for path in paths {
        let definition = FlowDefinition::load(path)?;
        if !seen.insert(definition.name.clone()) {
            tracing::warn!(
                "Flow name '{}' appears more than once; screenshots will be overwritten",
                definition.name
            );
        }
        flows.push(PreparedFlow {
            steps: definition.to_steps(vars, default_timeout),
            name: definition.name,
            description: definition.description,
            source: path.clone(),
            launch_settle: definition.launch_settle_ms.map(Duration::from_millis),
        });
    }

    Ok(flows)
}

/// Build a flow runner talking to the configured automation server
pub fn build_runner(config: &Config) -> Result<FlowRunner> {
    let host = WebDriverHost::new(
        &config.server.url,
        Duration::from_secs(config.timeouts.http_request_secs),
        Duration::from_millis(config.timeouts.poll_interval_ms),
    )?;

    let executor = if config.diagnostics.screenshots {
        let sink: Arc<dyn DiagnosticSink> =
            Arc::new(DirectorySink::new(&config.diagnostics.results_dir));
        StepExecutor::new(sink)
    } else {
        StepExecutor::new(Arc::new(NullSink)).without_capture()
    };

    Ok(FlowRunner::new(
        SessionLifecycleManager::new(Arc::new(host)),
        executor,
    ))
}

/// Run flows sequentially and print their transcripts
pub async fn run_flows(
    runner: &FlowRunner,
    flows: &[PreparedFlow],
    session: &SessionConfig,
    verbose: bool,
) -> Vec<FlowResult> {
    let mut results = Vec::with_capacity(flows.len());

    for flow in flows {
        println!(
            "\n{} {}",
            "Running Flow:".blue().bold(),
            flow.name.white().bold()
        );
        if let Some(desc) = &flow.description {
            println!("  {}", desc.dimmed());
        }
        if verbose {
            println!("  {}", flow.source.display().to_string().dimmed());
        }

        let result = match flow.launch_settle {
            Some(settle) => {
                let mut session = session.clone();
                session.launch_settle = settle;
                runner.run(&flow.name, &flow.steps, &session).await
            }
            None => runner.run(&flow.name, &flow.steps, session).await,
        };
        print_flow(&result, verbose);
        results.push(result);
    }

    print_summary(&results);
    results
}

fn print_flow(result: &FlowResult, verbose: bool) {
    if let Some(app_id) = result.app_id.as_deref().filter(|id| !id.is_empty()) {
        println!("  {} Session started ({})", "✓".green(), app_id.dimmed());
    }

    if !result.step_results.is_empty() {
        println!("\n{}", "Steps:".cyan());
    }
    for (i, step) in result.step_results.iter().enumerate() {
        print_step(i + 1, step, verbose);
    }

    match &result.error {
        Some(error) if result.session_opened_at.is_none() => {
            println!("  {} Session failed: {}", "✗".red(), error);
        }
        Some(error) => println!("  {} {}", "✗".red(), error),
        None => {}
    }

    if result.passed() {
        println!(
            "\n{} {}",
            "✓".green().bold(),
            format!("Flow '{}' passed", result.flow_name).green()
        );
    } else {
        println!(
            "\n{} {}",
            "✗".red().bold(),
            format!("Flow '{}' failed", result.flow_name).red()
        );
    }
}

fn print_step(number: usize, result: &StepResult, verbose: bool) {
    let name = &result.step.name;
    match result.outcome {
        StepOutcome::Success => {
            let via = result.matched_query().unwrap_or_default();
            println!("  {} Step {}: {} {}", "✓".green(), number, name, via.dimmed());
            if let Some(observed) = &result.observed {
                println!(
                    "      text={:?} displayed={}",
                    observed.text, observed.displayed
                );
            }
        }
        StepOutcome::SkippedBestEffort => {
            println!("  {} Step {}: {} (skipped)", "⚠".yellow(), number, name);
            if verbose {
                if let Some(error) = &result.error {
                    println!("      {}", error.dimmed());
                }
            }
        }
        StepOutcome::FailedRequired => {
            println!("  {} Step {}: {}", "✗".red(), number, name);
            if let Some(error) = &result.error {
                println!("      {}", error.red());
            }
            for query in result.step.queries() {
                println!("      tried {}", query.dimmed());
            }
        }
    }

    if verbose {
        if let Some(path) = &result.artifact {
            println!("      {}", path.display().to_string().dimmed());
        }
    }
}

fn print_summary(results: &[FlowResult]) {
    let passed = results.iter().filter(|r| r.passed()).count();
    let failed = results.len() - passed;
    let skipped: usize = results
        .iter()
        .map(|r| r.count(StepOutcome::SkippedBestEffort))
        .sum();

    println!("\n{}", "Summary:".cyan());
    println!(
        "  {} passed, {} failed, {} best-effort steps skipped",
        passed.to_string().green(),
        if failed > 0 {
            failed.to_string().red()
        } else {
            failed.to_string().normal()
        },
        skipped.to_string().yellow()
    );
}

/// Print what each flow would do without contacting a server
pub fn check_flows(flows: &[PreparedFlow]) {
    for flow in flows {
        println!(
            "\n{} {} ({} steps)",
            "Flow:".blue().bold(),
            flow.name.white().bold(),
            flow.steps.len()
        );
        for (i, step) in flow.steps.iter().enumerate() {
            println!(
                "  {} {}: {} [{}, {:?}, up to {} ms]",
                "•".cyan(),
                i + 1,
                step.name,
                step.action.label(),
                step.criticality,
                step.resolution_budget().as_millis()
            );
            for candidate in &step.candidates {
                println!(
                    "      {} {}",
                    format!("{:>6} ms", candidate.display_timeout.as_millis()).dimmed(),
                    candidate.query
                );
            }
            if step.candidates.is_empty() {
                println!("      {}", "no candidates; this step can never match".yellow());
            }
        }
    }
    println!("\n{} {} flow(s) valid", "✓".green().bold(), flows.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_prepare_flows_loads_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("smoke.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "name: smoke\nsteps:\n  - name: Home\n    action: read_state\n    candidates: ['//home']"
        )
        .unwrap();

        let flows = prepare_flows(
            &[path.clone()],
            &Variables::default(),
            Duration::from_millis(10_000),
        )
        .unwrap();

        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].name, "smoke");
        assert_eq!(flows[0].source, path);
        assert_eq!(
            flows[0].steps[0].candidates[0].display_timeout,
            Duration::from_millis(10_000)
        );
    }

    #[test]
    fn test_prepare_flows_fails_on_missing_file() {
        let err = prepare_flows(
            &[PathBuf::from("/nonexistent/flow.yaml")],
            &Variables::default(),
            Duration::from_millis(10),
        )
        .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/flow.yaml"));
    }
}
