use std::fmt;
use uuid::Uuid;

/// Name under which this process claims messages within the group
///
/// Each running instance needs its own identity; two instances sharing one
/// would have their pending entries mixed together in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConsumerIdentity(String);

impl ConsumerIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Pick an identity for this process
    ///
    /// An explicitly configured name wins. Otherwise `<hostname>-<pid>` when a
    /// hostname is known, else `bridge-<uuid>`.
    pub fn resolve(configured: Option<&str>, hostname: Option<&str>) -> Self {
        let non_blank = |s: &&str| !s.trim().is_empty();

        if let Some(name) = configured.filter(non_blank) {
            return Self(name.trim().to_string());
        }
        if let Some(host) = hostname.filter(non_blank) {
            return Self(format!("{}-{}", host.trim(), std::process::id()));
        }
        Self::generated()
    }

    /// A random identity, unique per call
    pub fn generated() -> Self {
        Self(format!("bridge-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConsumerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
