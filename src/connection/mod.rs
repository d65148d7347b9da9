//! Connection-string parsing. Per spec §6 / SPEC_FULL.md §12: a `;`-joined,
//! `=`-separated, case-insensitive key list naming how `Database::open`
//! should reach and treat a file.

use std::collections::HashMap;

use crate::common::{Collation, Error, Result};

/// How a connection coordinates access to the database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Single-process access; no cross-process locking.
    Direct,
    /// Cross-process access via the `shared` named-mutex coordinator.
    Shared,
}

/// A parsed connection string, ready to drive `Database::open`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionString {
    pub filename: String,
    pub password: Option<String>,
    pub connection: ConnectionMode,
    pub readonly: bool,
    pub upgrade: bool,
    pub initial_size: u64,
    pub collation: Collation,
    pub timeout_seconds: u32,
}

impl Default for ConnectionString {
    fn default() -> Self {
        Self {
            filename: String::new(),
            password: None,
            connection: ConnectionMode::Direct,
            readonly: false,
            upgrade: false,
            initial_size: 0,
            collation: Collation::Binary,
            timeout_seconds: crate::common::config::DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl ConnectionString {
    /// Parse a `key=value; key=value` connection string. `filename` (or a
    /// bare value with no `key=` at all, matching the common "just a path"
    /// shorthand) is the only required key.
    pub fn parse(s: &str) -> Result<Self> {
        let mut pairs: HashMap<String, String> = HashMap::new();

        for part in s.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match part.split_once('=') {
                Some((k, v)) => {
                    pairs.insert(k.trim().to_ascii_lowercase(), v.trim().to_string());
                }
                None if pairs.is_empty() && !s.contains('=') => {
                    pairs.insert("filename".to_string(), part.to_string());
                }
                None => {
                    return Err(Error::InvalidConnectionString(format!(
                        "malformed key=value pair: {part}"
                    )))
                }
            }
        }

        let mut conn = ConnectionString::default();

        conn.filename = pairs
            .remove("filename")
            .ok_or_else(|| Error::InvalidConnectionString("missing filename".into()))?;

        if let Some(v) = pairs.remove("password") {
            conn.password = Some(v);
        }
        if let Some(v) = pairs.remove("connection") {
            conn.connection = match v.to_ascii_lowercase().as_str() {
                "direct" => ConnectionMode::Direct,
                "shared" => ConnectionMode::Shared,
                other => {
                    return Err(Error::InvalidConnectionString(format!(
                        "unknown connection mode: {other}"
                    )))
                }
            };
        }
        if let Some(v) = pairs.remove("readonly") {
            conn.readonly = parse_bool(&v)?;
        }
        if let Some(v) = pairs.remove("upgrade") {
            conn.upgrade = parse_bool(&v)?;
        }
        if let Some(v) = pairs.remove("initial size") {
            conn.initial_size = v
                .parse()
                .map_err(|_| Error::InvalidConnectionString(format!("bad initial size: {v}")))?;
        }
        if let Some(v) = pairs.remove("collation") {
            conn.collation = Collation::parse(&v);
        }
        if let Some(v) = pairs.remove("timeout") {
            conn.timeout_seconds = v
                .parse()
                .map_err(|_| Error::InvalidConnectionString(format!("bad timeout: {v}")))?;
        }

        if let Some((key, _)) = pairs.into_iter().next() {
            return Err(Error::InvalidConnectionString(format!("unrecognized key: {key}")));
        }

        Ok(conn)
    }
}

fn parse_bool(v: &str) -> Result<bool> {
    match v.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(Error::InvalidConnectionString(format!("not a boolean: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_path_is_filename() {
        let conn = ConnectionString::parse("my.db").unwrap();
        assert_eq!(conn.filename, "my.db");
        assert_eq!(conn.connection, ConnectionMode::Direct);
    }

    #[test]
    fn test_full_key_set() {
        let s = "Filename=test.db; Password=secret; Connection=shared; ReadOnly=true; \
                  Upgrade=true; Initial Size=1024; Collation=IgnoreCase; Timeout=30";
        let conn = ConnectionString::parse(s).unwrap();
        assert_eq!(conn.filename, "test.db");
        assert_eq!(conn.password.as_deref(), Some("secret"));
        assert_eq!(conn.connection, ConnectionMode::Shared);
        assert!(conn.readonly);
        assert!(conn.upgrade);
        assert_eq!(conn.initial_size, 1024);
        assert_eq!(conn.collation, Collation::Locale(crate::common::CaseSensitivity::IgnoreCase));
        assert_eq!(conn.timeout_seconds, 30);
    }

    #[test]
    fn test_missing_filename_errors() {
        assert!(matches!(
            ConnectionString::parse("timeout=30"),
            Err(Error::InvalidConnectionString(_))
        ));
    }

    #[test]
    fn test_unknown_key_errors() {
        assert!(matches!(
            ConnectionString::parse("filename=x.db; bogus=1"),
            Err(Error::InvalidConnectionString(_))
        ));
    }

    #[test]
    fn test_bad_connection_mode_errors() {
        assert!(matches!(
            ConnectionString::parse("filename=x.db; connection=remote"),
            Err(Error::InvalidConnectionString(_))
        ));
    }
}
