use crate::auth::TokenAuth;
use crate::config::Config;
use crate::error::Error;

/// Validates configuration objects for consistency and correctness
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates a Redis URL
    pub fn validate_redis_url(url: &str) -> Result<(), Error> {
        if url.is_empty() {
            return Err(Error::Config("Redis URL cannot be empty".to_string()));
        }

        if !url.starts_with("redis://") && !url.starts_with("rediss://") {
            return Err(Error::Config(
                "Redis URL must start with 'redis://' or 'rediss://'".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates a bind address
    pub fn validate_bind_address(address: &str) -> Result<(), Error> {
        if address.is_empty() {
            return Err(Error::Config("Bind address cannot be empty".to_string()));
        }

        // Check if it looks like host:port format
        if !address.contains(':') {
            return Err(Error::Config(
                "Bind address must be in host:port format".to_string(),
            ));
        }

        Ok(())
    }

    pub fn validate_limits(config: &Config) -> Result<(), Error> {
        config.route_limits().validate().map_err(Error::Config)?;

        if config.sweep_interval_ms == 0 {
            return Err(Error::Config("Sweep interval must be greater than 0".to_string()));
        }
        if config.max_body_bytes == 0 {
            return Err(Error::Config("Max body size must be greater than 0".to_string()));
        }
        if config.analysis_cost < 0 {
            return Err(Error::Config("Analysis cost cannot be negative".to_string()));
        }
        if config.transcript_timeout_secs == 0 {
            return Err(Error::Config(
                "Transcript timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates the whole service configuration
    pub fn validate(config: &Config) -> Result<(), Error> {
        Self::validate_bind_address(&config.bind_addr)?;
        if let Some(url) = &config.redis_url {
            Self::validate_redis_url(url)?;
        }
        Self::validate_limits(config)?;
        TokenAuth::parse(&config.auth_tokens)?;
        Ok(())
    }
}
