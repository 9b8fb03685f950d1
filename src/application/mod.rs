// Application layer - Use cases and the traits adapters implement
pub mod dashboard_repository;
pub mod dashboard_service;
pub mod image_host;
pub mod mailer;
pub mod page_renderer;
pub mod report_service;
