#![cfg(unix)]

use std::{path::Path, time::Duration};

use common::{
    config::{Invocation, Settings, SweepSpec},
    driver::{Driver, ProcessDriver},
    error::SweepError,
    sweep::SweepRunner,
};

/// Runs `script` through `/bin/sh` so the test never execs a freshly written file
fn sh_driver(dir: &Path, script: &str) -> ProcessDriver {
    let path = dir.join("driver.sh");
    std::fs::write(&path, script).unwrap();
    ProcessDriver::from_settings(&Settings {
        driver: "/bin/sh".into(),
        driver_args: Some(vec![path.to_string_lossy().into_owned()]),
        ..Default::default()
    })
}

fn cm_are(sizes: &[&str]) -> SweepSpec {
    SweepSpec {
        sketches: vec!["CM".to_owned()],
        metrics: vec!["ARE".to_owned()],
        memory_sizes: sizes.iter().map(|x| x.to_string()).collect(),
    }
}

#[tokio::test]
async fn arguments_reach_the_driver_unmangled() {
    let dir = tempfile::tempdir().unwrap();
    let driver = sh_driver(dir.path(), "echo \"$1|$2|$3|$4|$5\" >&2\necho \"$1,$3,$5\"\n");
    let out = driver
        .invoke(&Invocation::new("CM", "ARE; rm -rf /", "64 KB"))
        .await
        .unwrap();
    assert_eq!(out, "-nCM,ARE; rm -rf /,64 KB\n");
}

#[tokio::test]
async fn sweep_against_a_real_process() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("calls.log");
    let script = format!(
        "echo \"$5\" >> '{}'\ncase \"$5\" in\n  64KB) echo \"x,y,0.12\" ;;\n  128KB) echo \"x,y,0.07\" ;;\n  *) exit 1 ;;\nesac\n",
        log.display()
    );
    let runner = SweepRunner::new(sh_driver(dir.path(), &script)).with_delay(Duration::ZERO);
    let table = runner.run(&cm_are(&["64KB", "128KB"])).await.unwrap();

    assert_eq!(table.get("CM", "ARE"), Some(&[0.12, 0.07][..]));
    assert_eq!(std::fs::read_to_string(log).unwrap(), "64KB\n128KB\n");
}

#[tokio::test]
async fn non_zero_exit_names_the_invocation() {
    let dir = tempfile::tempdir().unwrap();
    let script = "case \"$5\" in\n  64KB) echo \"x,y,0.12\" ;;\n  *) echo oops >&2; exit 1 ;;\nesac\n";
    let runner = SweepRunner::new(sh_driver(dir.path(), script)).with_delay(Duration::ZERO);
    let err = runner
        .run(&cm_are(&["64KB", "128KB"]))
        .await
        .unwrap_err();

    match err {
        SweepError::Exit {
            invocation,
            code,
            stderr,
            ..
        } => {
            assert_eq!(invocation, Invocation::new("CM", "ARE", "128KB"));
            assert_eq!(code, Some(1));
            assert_eq!(stderr.trim(), "oops");
        }
        other => panic!("expected exit failure, got {other:?}"),
    }
}

#[tokio::test]
async fn slow_driver_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let mut driver = sh_driver(dir.path(), "sleep 5\necho x,y,1\n");
    driver.timeout = Some(Duration::from_millis(100));
    let err = driver
        .invoke(&Invocation::new("CM", "ARE", "64KB"))
        .await
        .unwrap_err();
    assert!(matches!(err, SweepError::Timeout { .. }));
}

#[tokio::test]
async fn configured_env_is_passed_through() {
    let dir = tempfile::tempdir().unwrap();
    let mut driver = sh_driver(dir.path(), "echo \"a,b,$SKETCH_SEED\"\n");
    driver.env.insert("SKETCH_SEED".to_owned(), "42".to_owned());
    let out = driver
        .invoke(&Invocation::new("CM", "ARE", "64KB"))
        .await
        .unwrap();
    assert_eq!(out.trim(), "a,b,42");
}
