use anyhow::Result;
use log::{error, info, warn};

/// How a test case that ran to completion ended.
#[derive(Debug)]
pub enum Verdict {
    Passed,
    /// The environment cannot support this case; not a failure.
    Skipped(String),
}

#[derive(Debug)]
pub enum CaseOutcome {
    Passed,
    Skipped(String),
    Failed(String),
}

pub struct CaseReport {
    pub name: &'static str,
    pub outcome: CaseOutcome,
}

impl CaseReport {
    pub fn failed(&self) -> bool {
        matches!(self.outcome, CaseOutcome::Failed(_))
    }

    pub fn passed(&self) -> bool {
        matches!(self.outcome, CaseOutcome::Passed)
    }
}

/// Turn a case result into a report, logging the outcome as it happens.
pub fn record(name: &'static str, result: Result<Verdict>) -> CaseReport {
    let outcome = match result {
        Ok(Verdict::Passed) => {
            info!("case '{}' passed", name);
            CaseOutcome::Passed
        }
        Ok(Verdict::Skipped(reason)) => {
            warn!("case '{}' skipped: {}", name, reason);
            CaseOutcome::Skipped(reason)
        }
        Err(e) => {
            // `{:#}` includes the whole context chain on one line.
            error!("case '{}' failed: {:#}", name, e);
            CaseOutcome::Failed(format!("{:#}", e))
        }
    };
    CaseReport { name, outcome }
}

/// Log a one-line-per-case summary; `true` when every case passed or was
/// skipped.
pub fn summarize(reports: &[CaseReport]) -> bool {
    for report in reports {
        match &report.outcome {
            CaseOutcome::Passed => info!("PASS {}", report.name),
            CaseOutcome::Skipped(reason) => info!("SKIP {} ({})", report.name, reason),
            CaseOutcome::Failed(reason) => info!("FAIL {} ({})", report.name, reason),
        }
    }
    !reports.iter().any(CaseReport::failed)
}

#[cfg(test)]
mod test {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn record_keeps_failure_context() {
        let report = record(
            "deploy-gpu-operator",
            Err(anyhow!("creating subscription").context("deploying the GPU operator")),
        );
        assert!(report.failed());
        match &report.outcome {
            CaseOutcome::Failed(reason) => {
                assert!(reason.contains("deploying the GPU operator"));
                assert!(reason.contains("creating subscription"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn summary_fails_only_on_failures() {
        let reports = vec![
            CaseReport {
                name: "deploy-gpu-operator",
                outcome: CaseOutcome::Passed,
            },
            CaseReport {
                name: "upgrade-gpu-operator",
                outcome: CaseOutcome::Skipped("upgrade channel not set".to_string()),
            },
        ];
        assert!(summarize(&reports));

        let reports = vec![CaseReport {
            name: "deploy-gpu-operator",
            outcome: CaseOutcome::Failed("timed out".to_string()),
        }];
        assert!(!summarize(&reports));
    }
}
