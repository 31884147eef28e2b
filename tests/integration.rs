use std::{env, fs, path::PathBuf, process::Command};

#[test]
fn basic_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("basic_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[lattice]\n"
        + "side = 2\n"
        + "epsilon = 0.0\n"
        + "\n"
        + "[model]\n"
        + "n_things = 2\n"
        + "\n"
        + "[variant]\n"
        + "kind = \"always-listener\"\n"
        + "influence = 1\n"
        + "\n"
        + "[conductor]\n"
        + "n_runs = 3\n"
        + "stop_iteration = 10000\n"
        + "seed = 7\n";

    fs::write(&config_path, config_contents).expect("failed to write config file");

    fn run_bin(args: &[&str]) {
        let bin = PathBuf::from(env!("CARGO_BIN_EXE_langcomp"));

        let output = Command::new(bin)
            .args(args)
            .output()
            .expect("failed to execute command");

        let stdout_str =
            std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
        let stderr_str =
            std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

        assert!(
            output.status.success(),
            "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
        );
    }

    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    let results_path = test_dir.join("results.json");
    let read_results = || -> serde_json::Value {
        let contents = fs::read_to_string(&results_path).expect("failed to read results");
        serde_json::from_str(&contents).expect("failed to parse results")
    };

    run_bin(&["--sim-dir", test_dir_str, "run"]);
    assert_eq!(read_results()["n_runs"], 3);

    run_bin(&["--sim-dir", test_dir_str, "resume", "--n-runs", "2"]);
    let results = read_results();
    assert_eq!(results["n_runs"], 5);
    assert_eq!(results["variant"]["kind"], "always-listener");
    assert_eq!(results["languages"].as_array().map(Vec::len), Some(2));
    assert_eq!(results["agents"].as_array().map(Vec::len), Some(4));

    fs::remove_file(&results_path).expect("failed to remove results");
    run_bin(&["--sim-dir", test_dir_str, "report"]);
    assert_eq!(read_results()["n_runs"], 5);

    run_bin(&["--sim-dir", test_dir_str, "clean"]);
    assert!(!results_path.exists());
    assert!(!test_dir.join("checkpoint.msgpack").exists());

    fs::remove_dir_all(&test_dir).ok();
}
