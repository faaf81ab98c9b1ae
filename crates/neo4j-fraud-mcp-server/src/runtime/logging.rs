//! Logging config and setup for the main binary. Logs always go to stderr:
//! stdout belongs to the stdio MCP transport.

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Logging related options
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    /// The log level to use for tracing
    #[serde(deserialize_with = "parsers::from_str")]
    #[schemars(schema_with = "level")]
    pub level: Level,
}

impl Default for Logging {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl Logging {
    pub fn env_filter(&self) -> EnvFilter {
        let mut env_filter = EnvFilter::from_default_env().add_directive(self.level.into());

        if self.level == Level::INFO {
            // Driver chatter is only interesting when debugging.
            if let Ok(directive) = "neo4rs=warn".parse() {
                env_filter = env_filter.add_directive(directive);
            }
        }
        env_filter
    }

    /// Installs the global subscriber.
    pub fn init(&self) {
        tracing_subscriber::fmt()
            .with_env_filter(self.env_filter())
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .init();
    }
}

mod parsers {
    use std::{fmt::Display, marker::PhantomData, str::FromStr};

    use serde::Deserializer;

    pub(super) fn from_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr,
        <T as FromStr>::Err: Display,
    {
        struct FromStrVisitor<Inner> {
            _phantom: PhantomData<Inner>,
        }
        impl<Inner> serde::de::Visitor<'_> for FromStrVisitor<Inner>
        where
            Inner: FromStr,
            <Inner as FromStr>::Err: Display,
        {
            type Value = Inner;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Inner::from_str(v).map_err(|e| serde::de::Error::custom(e.to_string()))
            }
        }

        deserializer.deserialize_str(FromStrVisitor {
            _phantom: PhantomData,
        })
    }
}

fn level(generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
    /// Log level
    #[derive(JsonSchema)]
    #[schemars(rename_all = "lowercase")]
    #[allow(dead_code)]
    enum Level {
        Trace,
        Debug,
        Info,
        Warn,
        Error,
    }

    Level::json_schema(generator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(default)]
        logging: Logging,
    }

    #[test]
    fn level_parses_from_yaml_string() {
        let wrapper: Wrapper = serde_yaml::from_str("logging:\n  level: debug\n").unwrap();
        assert_eq!(wrapper.logging.level, Level::DEBUG);
    }

    #[test]
    fn invalid_level_is_rejected() {
        let result: Result<Wrapper, _> = serde_yaml::from_str("logging:\n  level: loud\n");
        assert!(result.is_err());
    }

    #[test]
    fn default_level_is_info() {
        assert_eq!(Logging::default().level, Level::INFO);
    }
}
