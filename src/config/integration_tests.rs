#[cfg(test)]
mod integration_tests {
    use std::io::Write;

    use crate::config::{load_and_validate_config, load_config, RuntimeBuilder, StorageBackend};
    use crate::errors::ConfigError;
    use crate::fixtures::identity_run;
    use crate::lineage::LineageRequest;

    /// Test that the shipped memory configuration loads
    #[test]
    fn test_memory_yaml_loading() {
        let config = load_and_validate_config("configs/memory.yaml").unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.recorder.reconcile_boundaries);
        assert!(config.lineage.return_inputs);
        assert!(config.lineage.build_opm);
        assert_eq!(config.logging.filter, "dagwood_lineage=debug");
    }

    /// The sqlite configuration parses in every build; validation depends on the feature
    #[test]
    fn test_sqlite_yaml_loading() {
        let config = load_config("configs/sqlite.yaml").unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.max_connections(), 4);
        assert!(config.storage.path.is_some());

        let validated = load_and_validate_config("configs/sqlite.yaml");
        if cfg!(feature = "sqlite") {
            assert!(validated.is_ok());
        } else {
            assert!(matches!(
                validated,
                Err(ConfigError::BackendUnavailable { .. })
            ));
        }
    }

    #[test]
    fn test_invalid_yaml_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "storage: 42").unwrap();

        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    /// Test building a runtime and using it end to end
    #[tokio::test]
    async fn test_runtime_records_and_resolves() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "lineage:\n  build_opm: true").unwrap();
        let config = load_and_validate_config(file.path()).unwrap();

        let runtime = RuntimeBuilder::from_config(&config).await.unwrap();
        for event in identity_run("R1") {
            runtime.recorder.record(&event).await;
        }

        let runs = runtime.access.list_runs(None).await.unwrap();
        assert_eq!(runs.len(), 1);

        let request = LineageRequest::new("R1", "wf-W", "W", "Y").targeting(["Proc1"]);
        let answer = runtime.resolver.resolve(&request).await.unwrap();
        assert_eq!(answer.iterations[0].paths.len(), 1);
        assert!(answer.opm.is_some());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_runtime_on_sqlite_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("lineage.db");
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            format!("storage:\n  backend: sqlite\n  path: {}\n", db.display()),
        )
        .unwrap();
        let config = load_and_validate_config(&path).unwrap();

        let runtime = RuntimeBuilder::from_config(&config).await.unwrap();
        for event in identity_run("R1") {
            runtime.recorder.record(&event).await;
        }

        let outputs = runtime.access.final_outputs("R1").await.unwrap();
        assert_eq!(outputs["Y"][0].value.as_deref(), Some("v1"));
    }
}
