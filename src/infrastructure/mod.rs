// Infrastructure layer - External dependencies and adapters
pub mod chrome_renderer;
pub mod config;
pub mod grafana_repository;
pub mod jirafeau_host;
pub mod pdftoppm_rasterizer;
pub mod smtp_mailer;
