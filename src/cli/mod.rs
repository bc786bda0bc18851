//! CLI command handling
//!
//! Builds the configuration from the config file and flags, then hands
//! flows to the runner and formats the outcome.

use std::time::Duration;

use colored::Colorize;

use crate::commands::{Commands, TargetArgs};
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::testing::{self, RunReport, Variables};
use crate::webdriver::WebDriverHost;

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, verbose: bool) -> Result<()> {
    match command {
        Commands::Run {
            flows,
            target,
            vars,
            results,
            no_screenshots,
            report,
        } => {
            let mut config = Config::load(target.config.as_deref())?;
            apply_target(&mut config, target);
            if let Some(dir) = results {
                config.diagnostics.results_dir = dir;
            }
            if no_screenshots {
                config.diagnostics.screenshots = false;
            }

            let vars = parse_vars(&vars)?;
            let flows = testing::prepare_flows(&flows, &vars, config.default_display_timeout())?;
            let session = config.session_config()?;
            let runner = testing::build_runner(&config)?;

            tracing::info!(
                "Running {} flow(s) against {}",
                flows.len(),
                config.server.url
            );
            let results = testing::run_flows(&runner, &flows, &session, verbose).await;

            if let Some(path) = report {
                RunReport::new(&config.server.url, &results).write(&path)?;
                println!("Report: {}", path.display());
            }

            let failed = results.iter().filter(|r| !r.passed()).count();
            if failed > 0 {
                return Err(Error::FlowsFailed {
                    failed,
                    total: results.len(),
                });
            }
            Ok(())
        }

        Commands::Check {
            flows,
            vars,
            config,
        } => {
            let config = Config::load(config.as_deref())?;
            let vars = parse_vars(&vars)?;
            let flows = testing::prepare_flows(&flows, &vars, config.default_display_timeout())?;
            testing::check_flows(&flows);
            Ok(())
        }

        Commands::Status { config, server } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(url) = server {
                config.server.url = url;
            }

            let host = WebDriverHost::new(
                &config.server.url,
                Duration::from_secs(config.timeouts.http_request_secs),
                Duration::from_millis(config.timeouts.poll_interval_ms),
            )?;
            let status = host.status().await?;

            println!("Server: {}", config.server.url);
            if status.ready {
                println!("  {} ready", "✓".green());
            } else {
                println!("  {} not ready", "✗".red());
            }
            if !status.message.is_empty() {
                println!("  {}", status.message.dimmed());
            }
            if verbose {
                if let Some(build) = status.build {
                    println!("  build: {}", build);
                }
            }

            if status.ready {
                Ok(())
            } else {
                Err(Error::Config(format!(
                    "Automation server at {} is not ready",
                    config.server.url
                )))
            }
        }
    }
}

/// Apply command-line overrides on top of the config file
///
/// `--package` without `--app` drops a configured app binary so the
/// installed package is launched instead.
fn apply_target(config: &mut Config, target: TargetArgs) {
    if let Some(url) = target.server {
        config.server.url = url;
    }
    let explicit_app = target.app.is_some();
    if let Some(app) = target.app {
        config.capabilities.app = Some(app.canonicalize().unwrap_or(app));
    }
    if let Some(package) = target.package {
        if !explicit_app {
            config.capabilities.app = None;
        }
        config.capabilities.app_package = Some(package);
    }
    if let Some(activity) = target.activity {
        config.capabilities.app_activity = Some(activity);
    }
    if let Some(device) = target.device {
        config.capabilities.device_name = device;
    }
}

fn parse_vars(pairs: &[String]) -> Result<Variables> {
    let parsed = pairs
        .iter()
        .map(|pair| Variables::parse_pair(pair))
        .collect::<Result<Vec<_>>>()?;
    Ok(Variables::new(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_package_override_drops_configured_app() {
        let mut config = Config::default();
        config.capabilities.app = Some(PathBuf::from("/apps/laza.apk"));

        apply_target(
            &mut config,
            TargetArgs {
                package: Some("com.laza.ecommerce".to_string()),
                device: Some("Pixel 7".to_string()),
                ..Default::default()
            },
        );

        assert!(config.capabilities.app.is_none());
        assert_eq!(
            config.capabilities.app_package.as_deref(),
            Some("com.laza.ecommerce")
        );
        assert_eq!(config.capabilities.device_name, "Pixel 7");
    }

    #[test]
    fn test_app_and_package_together() {
        let mut config = Config::default();
        apply_target(
            &mut config,
            TargetArgs {
                app: Some(PathBuf::from("/nonexistent/laza.apk")),
                package: Some("com.laza.ecommerce".to_string()),
                server: Some("http://10.0.0.2:4723".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(
            config.capabilities.app,
            Some(PathBuf::from("/nonexistent/laza.apk"))
        );
        assert!(config.capabilities.app_package.is_some());
        assert_eq!(config.server.url, "http://10.0.0.2:4723");
    }

    #[test]
    fn test_parse_vars_rejects_malformed_pairs() {
        assert!(parse_vars(&["email=a@b.c".to_string()]).is_ok());
        assert!(matches!(
            parse_vars(&["email".to_string()]),
            Err(Error::Config(_))
        ));
    }
}
