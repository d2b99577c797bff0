//! Connection-string value types, one per datastore kind.

use std::fmt;

pub const IN_CLUSTER_MONGO_PORT: u16 = 27017;
pub const IN_CLUSTER_REDIS_PORT: u16 = 6379;
pub const IN_CLUSTER_RABBITMQ_PORT: u16 = 5672;
pub const IN_CLUSTER_ELASTICSEARCH_PORT: u16 = 9200;

/// Replica-set name used by the document store
pub const REPLICA_SET_NAME: &str = "rs0";

/// Where a datastore is reached: its host and which port rule applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Remote host uses the externally configured port, otherwise the
    /// in-cluster name and default port.
    pub fn resolve(
        remote: Option<&str>,
        in_cluster_host: String,
        external_port: u16,
        in_cluster_port: u16,
    ) -> Self {
        match remote {
            Some(host) => Self {
                host: host.to_string(),
                port: external_port,
            },
            None => Self {
                host: in_cluster_host,
                port: in_cluster_port,
            },
        }
    }
}

/// Percent-encoded `user:password` authority prefix.
fn userinfo(user: &str, password: &str) -> Result<String, fmt::Error> {
    let mut url = url::Url::parse("userinfo://host").map_err(|_| fmt::Error)?;
    url.set_username(user).map_err(|_| fmt::Error)?;
    url.set_password(Some(password)).map_err(|_| fmt::Error)?;
    Ok(format!(
        "{}:{}",
        url.username(),
        url.password().unwrap_or_default()
    ))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoUrl {
    pub username: String,
    pub password: String,
    pub endpoint: Endpoint,
    pub db_name: String,
    pub options: Vec<(String, String)>,
}

impl MongoUrl {
    /// Database name from the trailing path segment of a connection string.
    pub fn database_from(url: &str) -> Option<String> {
        let (_, rest) = url.split_once("://")?;
        let without_query = rest.split(['?', '#']).next()?;
        let (_, path) = without_query.split_once('/')?;
        let name = path.rsplit('/').next()?;
        (!name.is_empty()).then(|| name.to_string())
    }
}

impl fmt::Display for MongoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mongodb://{}@{}:{}/{}",
            userinfo(&self.username, &self.password)?,
            self.endpoint.host,
            self.endpoint.port,
            self.db_name
        )?;
        for (i, (key, value)) in self.options.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisEndpoint {
    pub endpoint: Endpoint,
    pub password: Option<String>,
}

impl fmt::Display for RedisEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.password {
            Some(password) => write!(
                f,
                "redis://{}@{}:{}",
                userinfo("", password)?,
                self.endpoint.host,
                self.endpoint.port
            ),
            None => write!(f, "redis://{}:{}", self.endpoint.host, self.endpoint.port),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmqpUrl {
    /// Hosted broker, used verbatim
    Cloud(String),
    Synthesized {
        user: String,
        pass: String,
        endpoint: Endpoint,
        vhost: String,
    },
}

impl fmt::Display for AmqpUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cloud(url) => f.write_str(url),
            Self::Synthesized {
                user,
                pass,
                endpoint,
                vhost,
            } => write!(
                f,
                "amqp://{}@{}:{}/{}",
                userinfo(user, pass)?,
                endpoint.host,
                endpoint.port,
                vhost
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchUrl {
    Hosted(String),
    Endpoint(Endpoint),
}

impl fmt::Display for SearchUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hosted(url) => f.write_str(url),
            Self::Endpoint(endpoint) => write!(f, "http://{}:{}", endpoint.host, endpoint.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(host: &str, port: u16) -> Endpoint {
        Endpoint {
            host: host.to_string(),
            port,
        }
    }

    #[test]
    fn mongo_url_renders_options_in_order() {
        let url = MongoUrl {
            username: "admin".to_string(),
            password: "pw".to_string(),
            endpoint: endpoint("mongo", 27017),
            db_name: "sales".to_string(),
            options: vec![
                ("authSource".to_string(), "admin".to_string()),
                ("replicaSet".to_string(), "rs0".to_string()),
            ],
        };
        assert_eq!(
            url.to_string(),
            "mongodb://admin:pw@mongo:27017/sales?authSource=admin&replicaSet=rs0"
        );
    }

    #[test]
    fn reserved_characters_in_credentials_are_encoded() {
        let url = MongoUrl {
            username: "ad@min".to_string(),
            password: "p?ss#1/x".to_string(),
            endpoint: endpoint("mongo", 27017),
            db_name: "sales_db".to_string(),
            options: vec![("authSource".to_string(), "admin".to_string())],
        };
        let rendered = url.to_string();
        assert!(!rendered.contains("p?ss"), "unencoded password in {rendered}");
        assert_eq!(MongoUrl::database_from(&rendered), Some("sales_db".to_string()));

        let parsed = url::Url::parse(&rendered).unwrap();
        assert_eq!(parsed.host_str(), Some("mongo"));
        assert_eq!(parsed.port(), Some(27017));
        assert_eq!(parsed.path(), "/sales_db");
        assert_eq!(parsed.query(), Some("authSource=admin"));

        let amqp = AmqpUrl::Synthesized {
            user: "guest".to_string(),
            pass: "a/b@c".to_string(),
            endpoint: endpoint("rabbitmq", 5672),
            vhost: "tenant".to_string(),
        }
        .to_string();
        let parsed = url::Url::parse(&amqp).unwrap();
        assert_eq!(parsed.host_str(), Some("rabbitmq"));
        assert_eq!(parsed.path(), "/tenant");

        let redis = RedisEndpoint {
            endpoint: endpoint("redis", 6379),
            password: Some("x@y".to_string()),
        }
        .to_string();
        assert_eq!(url::Url::parse(&redis).unwrap().host_str(), Some("redis"));
    }

    #[test]
    fn database_from_takes_trailing_segment() {
        assert_eq!(
            MongoUrl::database_from("mongodb://u:p@mongo:27017/sales?authSource=admin"),
            Some("sales".to_string())
        );
        assert_eq!(
            MongoUrl::database_from("mongodb://u:p@h1:27017,h2:27017/tickets"),
            Some("tickets".to_string())
        );
        assert_eq!(MongoUrl::database_from("mongodb://u:p@mongo:27017"), None);
        assert_eq!(MongoUrl::database_from("mongodb://u:p@mongo:27017/?x=1"), None);
        assert_eq!(MongoUrl::database_from("not a url"), None);
    }

    #[test]
    fn amqp_url_uses_scheme_credentials_host_port_vhost() {
        let url = AmqpUrl::Synthesized {
            user: "guest".to_string(),
            pass: "pw".to_string(),
            endpoint: endpoint("rabbitmq", 5672),
            vhost: "tenant".to_string(),
        };
        assert_eq!(url.to_string(), "amqp://guest:pw@rabbitmq:5672/tenant");
        assert_eq!(
            AmqpUrl::Cloud("amqps://hosted/vh".to_string()).to_string(),
            "amqps://hosted/vh"
        );
    }

    #[test]
    fn endpoint_switches_port_on_remote_host() {
        let remote = Endpoint::resolve(Some("10.0.0.5"), "mongo".to_string(), 27018, 27017);
        assert_eq!(remote, endpoint("10.0.0.5", 27018));

        let local = Endpoint::resolve(None, "mongo".to_string(), 27018, 27017);
        assert_eq!(local, endpoint("mongo", 27017));
    }

    #[test]
    fn redis_endpoint_renders_password_when_present() {
        let redis = RedisEndpoint {
            endpoint: endpoint("redis", 6379),
            password: Some("pw".to_string()),
        };
        assert_eq!(redis.to_string(), "redis://:pw@redis:6379");
    }
}
