//! Partition and object key types
//!
//! All keys are immutable values with structural equality and hashing, so
//! they can live in shared registries and in the shared store. A
//! [`PartitionObjectKey`] carries the [`PartitionKey`] that created it; this
//! is what keeps partitions isolated inside one physical store.

use std::fmt;
use std::sync::Arc;

/// Identity of a logical cache namespace
///
/// Display names are a stable, human-legible contract used in logs:
/// `GLOBAL`, the partition name itself, or `parent>child` for composites.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PartitionKey {
    /// The process-wide default namespace
    Global,
    /// A named partition
    Named(Arc<str>),
    /// Two nested keys, used for tenant + sub-partition scoping
    Composite(Arc<PartitionKey>, Arc<PartitionKey>),
}

impl PartitionKey {
    /// Create a named partition key
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        PartitionKey::Named(name.into())
    }

    /// Nest a child key under a parent key
    pub fn composite(parent: PartitionKey, child: PartitionKey) -> Self {
        PartitionKey::Composite(Arc::new(parent), Arc::new(child))
    }

    /// The human-readable name used in logs and statistics
    pub fn display_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionKey::Global => write!(f, "GLOBAL"),
            PartitionKey::Named(name) => write!(f, "{}", name),
            PartitionKey::Composite(parent, child) => write!(f, "{}>{}", parent, child),
        }
    }
}

/// The method-call half of an object key
///
/// Either an opaque string or a method name plus its stringified argument
/// tuple. Equality is structural over the whole tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CallKey {
    /// An arbitrary caller-chosen key
    Opaque(Arc<str>),
    /// A method invocation identity
    Call {
        /// Name of the memoized method
        method: Arc<str>,
        /// Stringified argument values, in declaration order
        args: Vec<Arc<str>>,
    },
}

impl CallKey {
    /// Create an opaque key
    pub fn opaque(key: impl Into<Arc<str>>) -> Self {
        CallKey::Opaque(key.into())
    }

    /// Create a method-call key from a method name and its arguments
    pub fn call<I, S>(method: impl Into<Arc<str>>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        CallKey::Call {
            method: method.into(),
            args: args.into_iter().map(|a| a.to_string().into()).collect(),
        }
    }
}

impl fmt::Display for CallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallKey::Opaque(key) => write!(f, "{}", key),
            CallKey::Call { method, args } => {
                write!(f, "{}(", method)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A lookup key tagged with the partition that created it
///
/// Presenting this key to any other partition is silently rejected; that is
/// the isolation mechanism, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionObjectKey {
    partition: PartitionKey,
    call: CallKey,
}

impl PartitionObjectKey {
    /// Create an object key scoped to the given partition
    pub fn new(partition: PartitionKey, call: CallKey) -> Self {
        Self { partition, call }
    }

    /// Create an object key from an opaque string
    pub fn opaque(partition: PartitionKey, key: impl Into<Arc<str>>) -> Self {
        Self::new(partition, CallKey::opaque(key))
    }

    /// The partition this key belongs to
    pub fn partition_key(&self) -> &PartitionKey {
        &self.partition
    }

    /// The call identity within the partition
    pub fn call(&self) -> &CallKey {
        &self.call
    }
}

impl fmt::Display for PartitionObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.partition, self.call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_global_display_name() {
        assert_eq!(PartitionKey::Global.display_name(), "GLOBAL");
    }

    #[test]
    fn test_named_display_name() {
        assert_eq!(PartitionKey::named("Part1").display_name(), "Part1");
    }

    #[test]
    fn test_composite_display_name() {
        let key =
            PartitionKey::composite(PartitionKey::named("Tenant1"), PartitionKey::named("Part1"));
        assert_eq!(key.display_name(), "Tenant1>Part1");
    }

    #[test]
    fn test_nested_composite_display_name() {
        let inner = PartitionKey::composite(PartitionKey::Global, PartitionKey::named("Bob"));
        let key = PartitionKey::composite(PartitionKey::named("Tenant1"), inner);
        assert_eq!(key.display_name(), "Tenant1>GLOBAL>Bob");
    }

    #[test]
    fn test_keys_constructed_separately_are_equal() {
        let a =
            PartitionKey::composite(PartitionKey::named("Tenant1"), PartitionKey::named("Part1"));
        let b =
            PartitionKey::composite(PartitionKey::named("Tenant1"), PartitionKey::named("Part1"));

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_distinct_keys_are_not_equal() {
        assert_ne!(PartitionKey::named("A"), PartitionKey::named("B"));
        assert_ne!(PartitionKey::Global, PartitionKey::named("GLOBAL"));
    }

    #[test]
    fn test_call_key_equality() {
        let a = CallKey::call("lookup", ["bob", "7"]);
        let b = CallKey::call("lookup", ["bob", "7"]);
        let c = CallKey::call("lookup", ["bob", "8"]);

        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert_ne!(a, c);
    }

    #[test]
    fn test_call_key_display() {
        let key = CallKey::call("lookup", ["bob", "7"]);
        assert_eq!(key.to_string(), "lookup(bob, 7)");
        assert_eq!(CallKey::opaque("Key2").to_string(), "Key2");
    }

    #[test]
    fn test_object_key_display() {
        let partition = PartitionKey::named("Part1");
        let key = PartitionObjectKey::opaque(partition, "Key2");
        assert_eq!(key.to_string(), "Part1~Key2");
    }

    #[test]
    fn test_object_key_equality_includes_partition() {
        let p1 = PartitionKey::named("P1");
        let p2 = PartitionKey::named("P2");

        let a = PartitionObjectKey::opaque(p1.clone(), "K");
        let b = PartitionObjectKey::opaque(p1, "K");
        let c = PartitionObjectKey::opaque(p2, "K");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
