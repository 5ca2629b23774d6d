// tests/config_sources.rs
use std::time::Duration;
use std::{env, fs};

use vacancy_watch::config::source::{
    load_sources_default, load_sources_from, ENV_SOURCES_PATH,
};
use vacancy_watch::config::SourceConfig;

#[test]
fn file_overrides_apply_to_named_source() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("sources.toml");
    fs::write(
        &p,
        r#"
[sources.western_cape]
name = "WC Health"
color = 255
retry_attempts = 4
retry_backoff_ms = 500
"#,
    )
    .unwrap();

    let all = load_sources_from(&p).unwrap();
    let wc = all.iter().find(|c| c.id == "western_cape").unwrap();
    assert_eq!(wc.name, "WC Health");
    assert_eq!(wc.color, 255);
    assert_eq!(wc.retry.max_attempts, 4);
    assert_eq!(wc.retry.backoff, Duration::from_millis(500));
    assert_eq!(all[0], SourceConfig::gauteng());
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // Isolate CWD so the repo's own config/ is not picked up.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    // 1) env set but missing -> error
    env::set_var(ENV_SOURCES_PATH, tmp.path().join("missing.toml"));
    assert!(load_sources_default().is_err());

    // 2) env set and present -> used
    let envp = tmp.path().join("env_sources.toml");
    fs::write(&envp, "[sources.gauteng]\nbase_url = \"http://from-env.test/\"\n").unwrap();
    env::set_var(ENV_SOURCES_PATH, &envp);
    assert_eq!(load_sources_default().unwrap()[0].base_url, "http://from-env.test/");

    // 3) no env, no config/ -> built-ins
    env::remove_var(ENV_SOURCES_PATH);
    assert_eq!(load_sources_default().unwrap(), SourceConfig::builtin());

    // 4) no env, config/sources.toml present -> used
    fs::create_dir_all("config").unwrap();
    fs::write(
        "config/sources.toml",
        "[sources.mpumalanga]\nbase_url = \"http://from-default.test/\"\n",
    )
    .unwrap();
    assert_eq!(
        load_sources_default().unwrap()[2].base_url,
        "http://from-default.test/"
    );

    env::set_current_dir(old).unwrap();
}
