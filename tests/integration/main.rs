//! Integration tests for getpack

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    fn getpack() -> Command {
        let mut cmd = cargo_bin_cmd!("getpack");
        cmd.env_remove("GETPACK_CONFIG").env_remove("GETPACK_BASE_DIR");
        cmd
    }

    #[test]
    fn help_displays() {
        getpack()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("declarative external resources"));
    }

    #[test]
    fn version_displays() {
        getpack()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("getpack"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("custom.toml");
        getpack()
            .arg("--config")
            .arg(&path)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom.toml"));
    }

    #[test]
    fn config_show_defaults() {
        let temp = TempDir::new().unwrap();
        getpack()
            .arg("--config")
            .arg(temp.path().join("missing.toml"))
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[registry]"))
            .stdout(predicate::str::contains("pypi.org"));
    }

    #[test]
    fn config_init_and_set() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        getpack()
            .arg("--config")
            .arg(&path)
            .args(["config", "init"])
            .assert()
            .success();
        assert!(path.is_file());

        getpack()
            .arg("--config")
            .arg(&path)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        getpack()
            .arg("--config")
            .arg(&path)
            .args(["config", "set", "registry.python_tag", "cp311"])
            .assert()
            .success();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("python_tag = \"cp311\""));
    }

    #[test]
    fn invalid_config_reported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "resources = 3").unwrap();

        getpack()
            .arg("--config")
            .arg(&path)
            .args(["provide"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"))
            .stderr(predicate::str::contains("Hint:"));
    }
}

mod resource_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use getpack::config::{Config, ResourceConfig, SourceConfig};
    use getpack::extract::ExtractionRule;
    use predicates::prelude::*;
    use std::fs;
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use std::thread;
    use tempfile::TempDir;

    /// A config file, a cache root and a local archive
    struct Fixture {
        _temp: TempDir,
        root: PathBuf,
        config: PathBuf,
        base: PathBuf,
    }

    impl Fixture {
        fn new(resources: Vec<ResourceConfig>) -> Self {
            let temp = TempDir::new().unwrap();
            let root = temp.path().to_path_buf();
            let fixture = Self {
                config: root.join("config.toml"),
                base: root.join("cache"),
                root,
                _temp: temp,
            };
            fixture.write_config(resources);
            fixture
        }

        fn write_config(&self, resources: Vec<ResourceConfig>) {
            let config = Config {
                resources,
                ..Config::default()
            };
            fs::write(&self.config, toml::to_string_pretty(&config).unwrap()).unwrap();
        }

        fn archive(&self, name: &str) -> PathBuf {
            self.root.join(name)
        }

        fn cmd(&self) -> Command {
            let mut cmd = cargo_bin_cmd!("getpack");
            cmd.env_remove("GETPACK_CONFIG")
                .env_remove("GETPACK_BASE_DIR")
                .arg("--config")
                .arg(&self.config)
                .arg("--base-dir")
                .arg(&self.base);
            cmd
        }
    }

    fn write_zip(path: &Path, files: &[(&str, &[u8], u32)]) {
        let mut writer = zip::ZipWriter::new(fs::File::create(path).unwrap());
        for (name, content, mode) in files {
            let options = zip::write::SimpleFileOptions::default().unix_permissions(*mode);
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
    }

    fn resource(name: &str, archive: &Path) -> ResourceConfig {
        ResourceConfig {
            name: name.to_string(),
            version: "1.0".to_string(),
            prefix: String::new(),
            source: SourceConfig::File(archive.to_path_buf()),
            extract: vec![ExtractionRule {
                from: "pkg/bin/".to_string(),
                to: String::new(),
            }],
            requires: Vec::new(),
            executable: None,
        }
    }

    fn demo() -> Fixture {
        let fixture = Fixture::new(Vec::new());
        let archive = fixture.archive("demo-1.0.zip");
        write_zip(
            &archive,
            &[
                ("pkg/bin/hello.txt", b"hello", 0o644),
                ("pkg/readme.txt", b"docs", 0o644),
            ],
        );
        fixture.write_config(vec![resource("demo", &archive)]);
        fixture
    }

    fn temp_dirs(parent: &Path) -> Vec<String> {
        fs::read_dir(parent)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".temp"))
            .collect()
    }

    #[test]
    fn provide_extracts_selected_subtree() {
        let fixture = demo();

        fixture
            .cmd()
            .args(["provide", "demo"])
            .assert()
            .success()
            .stdout(predicate::str::contains("demo 1.0"));

        let version_dir = fixture.base.join("demo").join("1.0");
        assert_eq!(
            fs::read_to_string(version_dir.join("hello.txt")).unwrap(),
            "hello"
        );
        assert!(!version_dir.join("readme.txt").exists());
        assert!(!version_dir.join("pkg").exists());
    }

    #[test]
    fn versions_after_provide_and_cleanup() {
        let fixture = demo();

        fixture
            .cmd()
            .args(["versions", "demo", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        fixture.cmd().args(["provide"]).assert().success();

        fixture
            .cmd()
            .args(["versions", "demo", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"version\": \"1.0\""))
            .stdout(predicate::str::contains("\"declared\": true"));

        fixture.cmd().args(["cleanup", "demo"]).assert().success();

        fixture
            .cmd()
            .args(["versions", "demo", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("1.0").not());
        assert!(!fixture.base.join("demo").join("1.0").exists());
    }

    #[test]
    fn unknown_resource_fails_with_hint() {
        let fixture = demo();

        fixture
            .cmd()
            .args(["provide", "ffmpeg"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Resource not declared: ffmpeg"))
            .stderr(predicate::str::contains("[[resources]]"));
    }

    #[test]
    fn unsupported_archive_leaves_no_staging_dir() {
        let fixture = Fixture::new(Vec::new());
        let archive = fixture.archive("demo-1.0.rar");
        fs::write(&archive, b"not an archive").unwrap();
        fixture.write_config(vec![resource("demo", &archive)]);

        fixture
            .cmd()
            .args(["provide", "demo"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No extractor for demo-1.0.rar"));

        let parent = fixture.base.join("demo");
        assert!(!parent.join("1.0").exists());
        assert!(temp_dirs(&parent).is_empty());
    }

    #[test]
    fn concurrent_processes_deploy_one_copy() {
        let fixture = Fixture::new(Vec::new());
        let archive = fixture.archive("big-1.0.zip");
        let chunk = vec![b'x'; 256 * 1024];
        let files: Vec<(String, Vec<u8>)> = (0..20)
            .map(|i| (format!("pkg/bin/part{:02}.bin", i), chunk.clone()))
            .collect();
        let entries: Vec<(&str, &[u8], u32)> = files
            .iter()
            .map(|(name, content)| (name.as_str(), content.as_slice(), 0o644))
            .collect();
        write_zip(&archive, &entries);
        fixture.write_config(vec![resource("big", &archive)]);

        let config = fixture.config.clone();
        let base = fixture.base.clone();
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let config = config.clone();
                let base = base.clone();
                thread::spawn(move || {
                    cargo_bin_cmd!("getpack")
                        .env_remove("GETPACK_CONFIG")
                        .env_remove("GETPACK_BASE_DIR")
                        .arg("--config")
                        .arg(&config)
                        .arg("--base-dir")
                        .arg(&base)
                        .args(["provide", "big"])
                        .assert()
                        .success();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let parent = fixture.base.join("big");
        let versions: Vec<String> = fs::read_dir(&parent)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(versions, vec!["1.0".to_string()]);
        assert!(temp_dirs(&parent).is_empty());

        let version_dir = parent.join("1.0");
        for i in 0..20 {
            let part = fs::read(version_dir.join(format!("part{:02}.bin", i))).unwrap();
            assert_eq!(part.len(), chunk.len());
        }
    }

    #[cfg(unix)]
    mod run_tests {
        use super::*;

        const SCRIPT: &[u8] = b"#!/bin/sh\necho \"hello $1\"\nexit ${2:-0}\n";

        fn greeter() -> Fixture {
            let fixture = Fixture::new(Vec::new());
            let archive = fixture.archive("greeter-1.0.zip");
            write_zip(&archive, &[("pkg/bin/greet", SCRIPT, 0o755)]);
            let mut greeter = resource("greeter", &archive);
            greeter.executable = Some("greet".to_string());
            fixture.write_config(vec![greeter]);
            fixture
        }

        #[test]
        fn run_passes_arguments() {
            let fixture = greeter();

            fixture
                .cmd()
                .args(["run", "greeter", "--", "world"])
                .assert()
                .success()
                .stdout("hello world\n");
        }

        #[test]
        fn run_propagates_exit_code() {
            let fixture = greeter();

            fixture
                .cmd()
                .args(["run", "greeter", "--", "world", "7"])
                .assert()
                .code(7)
                .stderr(predicate::str::contains("exited with code 7"));
        }
    }
}
