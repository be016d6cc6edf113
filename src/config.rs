use std::{
    collections::{BTreeMap, HashSet},
    path::Path,
};

use lapin::types::{AMQPValue, FieldArray, FieldTable, ShortString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file")]
    Parse(#[from] serde_yaml::Error),
    #[error("queue entry {index} has an empty name")]
    EmptyQueueName { index: usize },
    #[error("queue {name:?} is declared more than once")]
    DuplicateQueueName { name: String },
    #[error("connPrefetchCount {value} does not fit in an AMQP short-uint")]
    PrefetchOutOfRange { value: i64 },
    #[error("queue {queue:?} argument {key:?} has an unsupported value")]
    UnsupportedArgument { queue: String, key: String },
}

/// Connection half of the config file. Key names match the YAML document.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnSettings {
    #[serde(rename = "connHost")]
    pub host: String,
    #[serde(rename = "connPort")]
    pub port: u16,
    #[serde(rename = "connUseSSL")]
    pub use_ssl: bool,
    /// seconds; zero or negative leaves the transport default
    #[serde(rename = "connSocketTimeout")]
    pub socket_timeout: i64,
    #[serde(rename = "connVHost")]
    pub vhost: String,
    #[serde(rename = "connUsername")]
    pub username: String,
    #[serde(rename = "connPassword")]
    pub password: String,
    /// zero or negative means no limit is set on the channel
    #[serde(rename = "connPrefetchCount")]
    pub prefetch_count: i64,
}

/// One desired queue, validated and ready to send to the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSpec {
    pub name: String,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
    pub arguments: FieldTable,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub conn: ConnSettings,
    pub queues: Vec<QueueSpec>,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    conn: ConnSettings,
    #[serde(default)]
    queues: Vec<RawQueue>,
}

#[derive(Debug, Deserialize)]
struct RawQueue {
    name: String,
    #[serde(default)]
    durable: bool,
    #[serde(default)]
    exclusive: bool,
    #[serde(default)]
    auto_delete: bool,
    #[serde(default)]
    arguments: BTreeMap<String, serde_yaml::Value>,
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string_lossy().into_owned(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let raw: RawSettings = serde_yaml::from_str(text)?;
        if raw.conn.prefetch_count > i64::from(u16::MAX) {
            return Err(ConfigError::PrefetchOutOfRange {
                value: raw.conn.prefetch_count,
            });
        }

        let mut seen = HashSet::new();
        let mut queues = Vec::with_capacity(raw.queues.len());
        for (index, entry) in raw.queues.into_iter().enumerate() {
            if entry.name.is_empty() {
                return Err(ConfigError::EmptyQueueName { index });
            }
            if !seen.insert(entry.name.clone()) {
                return Err(ConfigError::DuplicateQueueName { name: entry.name });
            }
            queues.push(QueueSpec::try_from(entry)?);
        }

        Ok(Self {
            conn: raw.conn,
            queues,
        })
    }
}

impl TryFrom<RawQueue> for QueueSpec {
    type Error = ConfigError;

    fn try_from(raw: RawQueue) -> Result<Self, ConfigError> {
        let mut arguments = FieldTable::default();
        for (key, value) in &raw.arguments {
            let converted = amqp_value(value).ok_or_else(|| ConfigError::UnsupportedArgument {
                queue: raw.name.clone(),
                key: key.clone(),
            })?;
            arguments.insert(ShortString::from(key.as_str()), converted);
        }
        Ok(Self {
            name: raw.name,
            durable: raw.durable,
            exclusive: raw.exclusive,
            auto_delete: raw.auto_delete,
            arguments,
        })
    }
}

/// Map a YAML argument value onto the AMQP field-table value space.
/// Null and tagged values have no field-table counterpart.
fn amqp_value(value: &serde_yaml::Value) -> Option<AMQPValue> {
    use serde_yaml::Value;
    match value {
        Value::Bool(b) => Some(AMQPValue::Boolean(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(AMQPValue::LongLongInt(i))
            } else {
                n.as_f64().map(AMQPValue::Double)
            }
        }
        Value::String(s) => Some(AMQPValue::LongString(s.as_str().into())),
        Value::Sequence(items) => {
            let mut array = FieldArray::default();
            for item in items {
                array.push(amqp_value(item)?);
            }
            Some(AMQPValue::FieldArray(array))
        }
        Value::Mapping(entries) => {
            let mut table = FieldTable::default();
            for (key, item) in entries {
                let key = key.as_str()?;
                table.insert(ShortString::from(key), amqp_value(item)?);
            }
            Some(AMQPValue::FieldTable(table))
        }
        Value::Null | Value::Tagged(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
conn:
  connHost: rabbit.internal
  connPort: 5671
  connUseSSL: true
  connSocketTimeout: 3
  connVHost: /
  connUsername: provisioner
  connPassword: hunter2
  connPrefetchCount: 10
queues:
  - name: work.orders
    durable: true
    exclusive: false
    auto_delete: false
    arguments:
      x-message-ttl: 60000
      x-dead-letter-exchange: dlx
  - name: work.audit
"#;

    #[test]
    fn parses_a_full_document() {
        let settings = Settings::parse(EXAMPLE).unwrap();
        assert_eq!(settings.conn.host, "rabbit.internal");
        assert_eq!(settings.conn.port, 5671);
        assert!(settings.conn.use_ssl);
        assert_eq!(settings.conn.vhost, "/");
        assert_eq!(settings.conn.prefetch_count, 10);
        assert_eq!(settings.queues.len(), 2);

        let orders = &settings.queues[0];
        assert_eq!(orders.name, "work.orders");
        assert!(orders.durable);
        assert_eq!(
            orders.arguments.inner().get(&ShortString::from("x-message-ttl")),
            Some(&AMQPValue::LongLongInt(60000))
        );
        assert_eq!(
            orders.arguments.inner().get(&ShortString::from("x-dead-letter-exchange")),
            Some(&AMQPValue::LongString("dlx".into()))
        );
    }

    #[test]
    fn queue_attributes_default_to_amqp_defaults() {
        let settings = Settings::parse(EXAMPLE).unwrap();
        let audit = &settings.queues[1];
        assert!(!audit.durable);
        assert!(!audit.exclusive);
        assert!(!audit.auto_delete);
        assert_eq!(audit.arguments, FieldTable::default());
    }

    #[test]
    fn missing_conn_host_is_a_parse_error() {
        let text = EXAMPLE.replace("connHost: rabbit.internal", "");
        let err = Settings::parse(&text).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)), "{err}");
    }

    #[test]
    fn queues_section_may_be_absent() {
        let text = EXAMPLE.split("queues:").next().unwrap();
        let settings = Settings::parse(text).unwrap();
        assert!(settings.queues.is_empty());
    }

    #[test]
    fn empty_queue_name_is_rejected() {
        let text = EXAMPLE.replace("name: work.audit", "name: \"\"");
        let err = Settings::parse(&text).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyQueueName { index: 1 }));
    }

    #[test]
    fn duplicate_queue_names_are_rejected() {
        let text = EXAMPLE.replace("name: work.audit", "name: work.orders");
        let err = Settings::parse(&text).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DuplicateQueueName { name } if name == "work.orders"
        ));
    }

    #[test]
    fn oversized_prefetch_is_rejected() {
        let text = EXAMPLE.replace("connPrefetchCount: 10", "connPrefetchCount: 70000");
        let err = Settings::parse(&text).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::PrefetchOutOfRange { value: 70000 }
        ));
    }

    #[test]
    fn negative_prefetch_means_no_limit_and_is_accepted() {
        let text = EXAMPLE.replace("connPrefetchCount: 10", "connPrefetchCount: -1");
        let settings = Settings::parse(&text).unwrap();
        assert_eq!(settings.conn.prefetch_count, -1);
    }

    #[test]
    fn null_argument_values_are_rejected() {
        let text = EXAMPLE.replace("x-dead-letter-exchange: dlx", "x-dead-letter-exchange: ~");
        let err = Settings::parse(&text).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnsupportedArgument { queue, key }
                if queue == "work.orders" && key == "x-dead-letter-exchange"
        ));
    }

    #[test]
    fn nested_argument_values_convert() {
        let list = serde_yaml::from_str::<serde_yaml::Value>("[1, two, true]").unwrap();
        let mut expected = FieldArray::default();
        expected.push(AMQPValue::LongLongInt(1));
        expected.push(AMQPValue::LongString("two".into()));
        expected.push(AMQPValue::Boolean(true));
        assert_eq!(amqp_value(&list), Some(AMQPValue::FieldArray(expected)));

        let map = serde_yaml::from_str::<serde_yaml::Value>("{x-max-priority: 5}").unwrap();
        let mut expected = FieldTable::default();
        expected.insert(ShortString::from("x-max-priority"), AMQPValue::LongLongInt(5));
        assert_eq!(amqp_value(&map), Some(AMQPValue::FieldTable(expected)));
    }
}
