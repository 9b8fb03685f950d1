// Domain layer - Report periods, sites, dashboard definitions and emails
pub mod dashboard;
pub mod period;
pub mod report_email;
pub mod site;
