//! Demo seed data.

/// Key used by `Store::increment_counter`.
pub const COUNTER_KEY: &str = "counter";

/// Name of the snapshot taken right after seeding.
pub const INITIAL_SNAPSHOT_NAME: &str = "Initial state";

/// Description of the snapshot taken right after seeding.
pub const INITIAL_SNAPSHOT_DESCRIPTION: &str = "System generated initial snapshot";

/// Entries written into a freshly created demo store, in order.
pub const DEMO_ENTRIES: &[(&str, &str)] = &[
    ("user:1", r#"{"name":"John Doe","email":"john@example.com"}"#),
    ("user:2", r#"{"name":"Jane Smith","email":"jane@example.com"}"#),
    ("product:1", r#"{"name":"Laptop","price":999.99}"#),
    ("product:2", r#"{"name":"Smartphone","price":499.99}"#),
    ("settings:theme", "dark"),
    ("settings:notifications", "enabled"),
    (COUNTER_KEY, "1"),
];
