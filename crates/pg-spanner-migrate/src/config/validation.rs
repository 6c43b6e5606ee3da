//! Configuration validation.

use chrono::FixedOffset;

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(MigrateError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(MigrateError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(MigrateError::Config("source.user is required".into()));
    }
    if config.source.r#type != "postgres" {
        return Err(MigrateError::Config(format!(
            "source.type must be 'postgres', got '{}'",
            config.source.r#type
        )));
    }
    if config.source.max_connections == 0 {
        return Err(MigrateError::Config(
            "source.max_connections must be at least 1".into(),
        ));
    }

    // Target validation
    if config.target.project.is_empty() {
        return Err(MigrateError::Config("target.project is required".into()));
    }
    if config.target.instance.is_empty() {
        return Err(MigrateError::Config("target.instance is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }

    // Conversion config validation
    if config.conversion.workers == 0 {
        return Err(MigrateError::Config(
            "conversion.workers must be at least 1".into(),
        ));
    }
    parse_timezone(&config.conversion.default_timezone)?;

    Ok(())
}

/// Parse a UTC offset string like "+05:30" or "-08:00" into a FixedOffset.
pub fn parse_timezone(offset: &str) -> Result<FixedOffset> {
    let bad = || {
        MigrateError::Config(format!(
            "conversion.default_timezone must be a UTC offset like '+05:30', got '{offset}'"
        ))
    };

    let (sign, rest) = match offset.as_bytes().first() {
        Some(b'+') => (1, &offset[1..]),
        Some(b'-') => (-1, &offset[1..]),
        _ => return Err(bad()),
    };
    let (hh, mm) = rest.split_once(':').ok_or_else(bad)?;
    let hours: i32 = hh.parse().map_err(|_| bad())?;
    let minutes: i32 = mm.parse().map_err(|_| bad())?;
    if hours > 14 || minutes > 59 {
        return Err(bad());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(bad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timezone() {
        assert_eq!(
            parse_timezone("+00:00").unwrap(),
            FixedOffset::east_opt(0).unwrap()
        );
        assert_eq!(
            parse_timezone("+05:30").unwrap(),
            FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap()
        );
        assert_eq!(
            parse_timezone("-08:00").unwrap(),
            FixedOffset::west_opt(8 * 3600).unwrap()
        );
        assert!(parse_timezone("UTC").is_err());
        assert!(parse_timezone("+25:00").is_err());
    }
}
