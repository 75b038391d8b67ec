pub mod config;

/// Shared configuration types for the storefront services.
///
/// Every executable loads one YAML document covering the common database
/// settings plus the per-service sections; see `config::Config`.
pub use config::Config;
