#[cfg(test)]
mod tests {
    use appwatch::libs::ledger::Ledger;
    use std::fs;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};

    struct LedgerTestContext {
        temp_dir: TempDir,
    }

    impl LedgerTestContext {
        fn ledger(&self) -> Ledger {
            Ledger::new(self.temp_dir.path().join("installed_versions.json"))
        }
    }

    impl TestContext for LedgerTestContext {
        fn setup() -> Self {
            LedgerTestContext { temp_dir: tempfile::tempdir().unwrap() }
        }
    }

    #[test_context(LedgerTestContext)]
    #[test]
    fn test_missing_file_reads_as_not_installed(ctx: &mut LedgerTestContext) {
        let ledger = ctx.ledger();
        assert_eq!(ledger.get("Anything"), "0.0.0");
    }

    #[test_context(LedgerTestContext)]
    #[test]
    fn test_init_creates_empty_document(ctx: &mut LedgerTestContext) {
        let ledger = ctx.ledger();
        ledger.init().unwrap();

        let text = fs::read_to_string(ledger.path()).unwrap();
        let map: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(map, serde_json::json!({}));

        // Re-running init leaves existing content alone.
        ledger.set("App", "1.0.0").unwrap();
        ledger.init().unwrap();
        assert_eq!(ledger.get("App"), "1.0.0");
    }

    #[test_context(LedgerTestContext)]
    #[test]
    fn test_set_then_get_round_trip(ctx: &mut LedgerTestContext) {
        let ledger = ctx.ledger();
        ledger.set("TestApp", "1.1.0").unwrap();
        ledger.set("Other", "2.0.0").unwrap();
        ledger.set("TestApp", "1.2.0").unwrap();

        assert_eq!(ledger.get("TestApp"), "1.2.0");
        assert_eq!(ledger.get("Other"), "2.0.0");
        assert_eq!(ledger.get("Absent"), "0.0.0");
    }

    #[test_context(LedgerTestContext)]
    #[test]
    fn test_set_preserves_other_entries(ctx: &mut LedgerTestContext) {
        let ledger = ctx.ledger();
        fs::write(ledger.path(), r#"{"Keep": "3.4.5"}"#).unwrap();

        ledger.set("New", "0.1.0").unwrap();

        let text = fs::read_to_string(ledger.path()).unwrap();
        let map: std::collections::BTreeMap<String, String> = serde_json::from_str(&text).unwrap();
        assert_eq!(map.get("Keep").map(String::as_str), Some("3.4.5"));
        assert_eq!(map.get("New").map(String::as_str), Some("0.1.0"));
    }

    #[test_context(LedgerTestContext)]
    #[test]
    fn test_corrupt_ledger_reads_empty_but_refuses_writes(ctx: &mut LedgerTestContext) {
        let ledger = ctx.ledger();
        fs::write(ledger.path(), "not json at all").unwrap();

        // Readers degrade to the empty map.
        assert_eq!(ledger.get("App"), "0.0.0");

        // Writers must not clobber the operator's data.
        assert!(ledger.set("App", "1.0.0").is_err());
        assert_eq!(fs::read_to_string(ledger.path()).unwrap(), "not json at all");
    }

    #[test_context(LedgerTestContext)]
    #[test]
    fn test_validate_rejects_corrupt_documents(ctx: &mut LedgerTestContext) {
        let ledger = ctx.ledger();

        // Absent and well-formed documents pass.
        ledger.validate().unwrap();
        ledger.init().unwrap();
        ledger.validate().unwrap();

        fs::write(ledger.path(), "{ truncated").unwrap();
        assert!(ledger.validate().is_err());
    }

    #[test_context(LedgerTestContext)]
    #[test]
    fn test_simulated_set_persists_nothing(ctx: &mut LedgerTestContext) {
        let ledger = ctx.ledger();
        fs::write(ledger.path(), r#"{"TestApp": "1.0.0"}"#).unwrap();

        ledger.set_simulated("TestApp", "1.1.0").unwrap();

        assert_eq!(ledger.get("TestApp"), "1.0.0");
    }

    #[test_context(LedgerTestContext)]
    #[test]
    fn test_writers_are_serialized(ctx: &mut LedgerTestContext) {
        let ledger = ctx.ledger();
        ledger.init().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = ledger.clone();
                std::thread::spawn(move || ledger.set(&format!("App{}", i), "1.0.0").unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let text = fs::read_to_string(ledger.path()).unwrap();
        let map: std::collections::BTreeMap<String, String> = serde_json::from_str(&text).unwrap();
        assert_eq!(map.len(), 8);
    }
}
