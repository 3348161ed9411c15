use url::Url;

use super::error::{CouchDaoError, CouchResult};

const URL_VAR: &str = "COUCH_BASE_URL";
const DB_VAR: &str = "COUCH_DB";
const USER_VAR: &str = "COUCH_USERNAME";
const PASSWORD_VAR: &str = "COUCH_PASSWORD";

/// Basic-auth pair sent with every CouchDB request.
#[derive(Debug, Clone)]
pub struct CouchCredentials {
    /// Basic-auth user.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
}

/// Where the room documents live: server, database and optional credentials.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// CouchDB server, e.g. `http://localhost:5984`.
    pub server: Url,
    /// Database holding the room aggregates.
    pub database: String,
    /// Sent as basic auth when present.
    pub credentials: Option<CouchCredentials>,
}

impl CouchConfig {
    /// Parse `server` as an absolute URL; no credentials.
    pub fn parse(server: &str, database: impl Into<String>) -> CouchResult<Self> {
        let server = Url::parse(server).map_err(|source| CouchDaoError::InvalidUrl {
            url: server.to_owned(),
            source,
        })?;
        Ok(Self {
            server,
            database: database.into(),
            credentials: None,
        })
    }

    /// `COUCH_BASE_URL` and `COUCH_DB` are required; credentials apply only when both
    /// `COUCH_USERNAME` and `COUCH_PASSWORD` are set.
    pub fn from_env() -> CouchResult<Self> {
        let mut config = Self::parse(&required(URL_VAR)?, required(DB_VAR)?)?;
        if let (Ok(username), Ok(password)) = (std::env::var(USER_VAR), std::env::var(PASSWORD_VAR))
        {
            config.credentials = Some(CouchCredentials { username, password });
        }
        Ok(config)
    }

    /// `<server>/<database>` with no trailing slash.
    pub fn database_url(&self) -> String {
        format!(
            "{}/{}",
            self.server.as_str().trim_end_matches('/'),
            self.database
        )
    }
}

fn required(var: &'static str) -> CouchResult<String> {
    std::env::var(var).map_err(|_| CouchDaoError::MissingEnvVar { var })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_url_drops_trailing_slash() {
        let config = CouchConfig::parse("http://localhost:5984/", "rooms").unwrap();
        assert_eq!(config.database_url(), "http://localhost:5984/rooms");
    }

    #[test]
    fn rejects_relative_server() {
        let err = CouchConfig::parse("localhost", "rooms").unwrap_err();
        assert!(matches!(err, CouchDaoError::InvalidUrl { .. }));
    }
}
