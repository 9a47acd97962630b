use assert_cmd::prelude::*;
use predicates::prelude::*;

/// `nf config-hash` must print a stable hash and the canonical (sorted-key)
/// JSON for whatever layered YAML paths it's given.
#[test]
fn config_hash_prints_hash_and_canonical_json() -> anyhow::Result<()> {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .canonicalize()?;
    let base = repo_root.join("config").join("base.yaml");
    let base_s = base.to_string_lossy().to_string();

    let mut cmd = assert_cmd::Command::cargo_bin("nf-cli")?;
    cmd.args(["config-hash", &base_s]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("config_hash="))
        .stdout(predicate::str::contains("\"publish_threshold\""));

    Ok(())
}

/// Two invocations over the same files must hash identically.
#[test]
fn config_hash_is_deterministic_across_invocations() -> anyhow::Result<()> {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .canonicalize()?;
    let base = repo_root.join("config").join("base.yaml");
    let base_s = base.to_string_lossy().to_string();

    let out1 = assert_cmd::Command::cargo_bin("nf-cli")?
        .args(["config-hash", &base_s])
        .output()?;
    let out2 = assert_cmd::Command::cargo_bin("nf-cli")?
        .args(["config-hash", &base_s])
        .output()?;

    assert_eq!(out1.stdout, out2.stdout);

    Ok(())
}
