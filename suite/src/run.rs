use crate::context::TestContext;
use crate::runner::{self, Verdict};
use crate::{deploy, report, upgrade};
use anyhow::{ensure, Result};
use clap::Parser;
use log::{error, info, warn};
use model::CleanupStack;

/// Run the deploy and upgrade test cases sequentially.
#[derive(Debug, Parser)]
pub(crate) struct Run {
    /// Stop after the first failed test case instead of running the rest.
    #[clap(long = "fail-fast")]
    fail_fast: bool,
}

impl Run {
    pub(crate) async fn run(&self, context: TestContext) -> Result<()> {
        record_cluster_version(&context).await;

        let mut reports = Vec::new();
        let mut cleanup = CleanupStack::new(context.config.cleanup);

        let deploy_result = deploy::run(&context, &mut cleanup).await;
        let deploy_passed = matches!(deploy_result, Ok(Verdict::Passed));

        // When an upgrade case follows a passing deploy, the deployed
        // operator must survive until the upgrade has run; the release
        // actions carry over and run after the last case.
        let carry_cleanup = context.config.upgrade_requested() && deploy_passed;
        if !carry_cleanup {
            cleanup.run().await;
            cleanup = CleanupStack::new(context.config.cleanup);
        }
        reports.push(runner::record("deploy-gpu-operator", deploy_result));

        if self.fail_fast && reports.iter().any(|report| report.failed()) {
            runner::summarize(&reports);
            anyhow::bail!("aborting after first failure (--fail-fast)");
        }

        let upgrade_result = if context.config.upgrade_requested() && !deploy_passed {
            Ok(Verdict::Skipped(
                "the deploy case did not pass".to_string(),
            ))
        } else {
            upgrade::run(&context, &mut cleanup).await
        };
        cleanup.run().await;
        reports.push(runner::record("upgrade-gpu-operator", upgrade_result));

        let all_good = runner::summarize(&reports);
        ensure!(all_good, "one or more test cases failed");
        Ok(())
    }
}

/// Record the platform version in a report file. Best effort: a cluster that
/// will not divulge its version is worth a log line, not a failed run.
async fn record_cluster_version(context: &TestContext) {
    match context.cluster_versions().platform_version().await {
        Ok(Some(version)) => {
            info!("cluster platform version is '{}'", version);
            report::write_report(
                &context.config.reports_dir,
                report::CLUSTER_VERSION_FILE,
                &version,
            )
            .await;
        }
        Ok(None) => warn!("the ClusterVersion object reports no desired version"),
        Err(e) => error!("Error reading the cluster version: {}", e),
    }
}
