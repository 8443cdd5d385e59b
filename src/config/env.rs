use super::RelayConfig;

impl RelayConfig {
    /// Overlay `ROOMSYNC_*` environment variables on top of file values.
    /// Unparseable values are ignored.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`RelayConfig::with_env`] with an injectable lookup
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("ROOMSYNC_BIND_ADDR") {
            if !v.is_empty() {
                self.bind_addr = v;
            }
        }
        if let Some(v) = lookup("ROOMSYNC_MAX_MESSAGE_BYTES") {
            if let Ok(n) = v.parse::<usize>() {
                self.max_message_bytes = n;
            }
        }
        if let Some(v) = lookup("ROOMSYNC_BROADCAST_CAPACITY") {
            if let Ok(n) = v.parse::<usize>() {
                if n > 0 {
                    self.broadcast_capacity = n;
                }
            }
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_overrides_apply() {
        let cfg = RelayConfig::default().with_overrides(lookup_from(&[
            ("ROOMSYNC_BIND_ADDR", "127.0.0.1:7000"),
            ("ROOMSYNC_MAX_MESSAGE_BYTES", "1024"),
            ("ROOMSYNC_BROADCAST_CAPACITY", "16"),
        ]));

        assert_eq!(cfg.bind_addr, "127.0.0.1:7000");
        assert_eq!(cfg.max_message_bytes, 1024);
        assert_eq!(cfg.broadcast_capacity, 16);
    }

    #[test]
    fn test_invalid_overrides_ignored() {
        let cfg = RelayConfig::default().with_overrides(lookup_from(&[
            ("ROOMSYNC_MAX_MESSAGE_BYTES", "lots"),
            ("ROOMSYNC_BROADCAST_CAPACITY", "0"),
        ]));

        let defaults = RelayConfig::default();
        assert_eq!(cfg.max_message_bytes, defaults.max_message_bytes);
        assert_eq!(cfg.broadcast_capacity, defaults.broadcast_capacity);
        assert_eq!(cfg.bind_addr, defaults.bind_addr);
    }

    #[test]
    fn test_with_env_reads_process_environment() {
        // Only test in the crate that touches ROOMSYNC_* variables
        std::env::set_var("ROOMSYNC_BROADCAST_CAPACITY", "48");
        let cfg = RelayConfig::default().with_env();
        std::env::remove_var("ROOMSYNC_BROADCAST_CAPACITY");

        assert_eq!(cfg.broadcast_capacity, 48);
    }
}
