// Command line arguments
use crate::application::report_service::{RunSummary, SiteOutcome};
use crate::domain::period::ReportPeriod;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "monthly-reporter",
    version,
    about = "Clone a Grafana dashboard per site for a month, render it and email it"
)]
pub struct Cli {
    /// Month to report on, as MM-YYYY (e.g. 03-2024)
    #[arg(long, value_parser = ReportPeriod::parse)]
    pub month: ReportPeriod,

    /// Connection settings (Grafana, SMTP, file host, paths)
    #[arg(long, default_value = "config.ini")]
    pub config: PathBuf,

    /// Sites and their recipients, one section per site
    #[arg(long, default_value = "sites.ini")]
    pub sites: PathBuf,
}

/// One line per site, for the end of the run
pub fn summary_lines(summary: &RunSummary) -> Vec<String> {
    summary
        .reports
        .iter()
        .map(|report| match &report.outcome {
            SiteOutcome::Delivered => format!("{}: delivered", report.site),
            SiteOutcome::NotDelivered(reason) => format!("{}: not delivered ({})", report.site, reason),
            SiteOutcome::Failed(error) => format!("{}: failed ({})", report.site, error),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::report_service::SiteReport;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_month_is_required_and_parsed() {
        let cli = Cli::try_parse_from(["monthly-reporter", "--month", "03-2024"]).unwrap();
        assert_eq!(cli.month, ReportPeriod::parse("03-2024").unwrap());
        assert_eq!(cli.config, PathBuf::from("config.ini"));
        assert_eq!(cli.sites, PathBuf::from("sites.ini"));

        assert!(Cli::try_parse_from(["monthly-reporter"]).is_err());
        assert!(Cli::try_parse_from(["monthly-reporter", "--month", "2024-03"]).is_err());
    }

    #[test]
    fn test_summary_lines() {
        let summary = RunSummary {
            reports: vec![
                SiteReport {
                    site: "Lyon".to_string(),
                    outcome: SiteOutcome::Delivered,
                },
                SiteReport {
                    site: "Nantes".to_string(),
                    outcome: SiteOutcome::Failed("SMTP delivery failed".to_string()),
                },
            ],
        };
        assert_eq!(
            summary_lines(&summary),
            vec!["Lyon: delivered", "Nantes: failed (SMTP delivery failed)"]
        );
    }
}
