use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use scriptline_core::{InstallError, Installer, RenderError, ScriptParams, render};
use scriptline_exec::{ExecError, LocalRunner, ScriptRunner};

/// Records scripts instead of running them
#[derive(Default)]
struct RecordingRunner {
    calls: AtomicU32,
    last_script: std::sync::Mutex<Option<String>>,
}

#[async_trait]
impl ScriptRunner for RecordingRunner {
    async fn run(&self, script: &str) -> Result<String, ExecError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_script.lock().unwrap() = Some(script.to_string());
        Ok("ignored output\n".to_string())
    }

    fn runner_type(&self) -> &'static str {
        "recording"
    }
}

#[tokio::test]
async fn test_echo_image_runs_locally() {
    let script = render("echo {{.Image}}", &ScriptParams::new("demo:1.0")).unwrap();
    let stdout = LocalRunner::new().run(&script).await.unwrap();

    assert_eq!(stdout, "demo:1.0\n");
}

#[tokio::test]
async fn test_install_local_success() {
    let installer = Installer::new("echo {{.Image}}", "demo:1.0");
    installer.install().await.unwrap();
}

#[tokio::test]
async fn test_install_hands_rendered_script_to_runner() {
    let runner = RecordingRunner::default();
    let installer = Installer::new("docker pull {{.Image}}\necho {{.Mode}}", "nvidia/toolkit:v1")
        .with_var("Mode", "systemd");

    installer.install_with(&runner).await.unwrap();

    assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        runner.last_script.lock().unwrap().as_deref(),
        Some("docker pull nvidia/toolkit:v1\necho systemd")
    );
}

#[tokio::test]
async fn test_render_failure_never_runs() {
    let runner = RecordingRunner::default();
    let installer = Installer::new("echo {{.Undefined}}", "demo:1.0");

    let err = installer.install_with(&runner).await.unwrap_err();

    assert!(matches!(err, InstallError::Render(RenderError::Render(_))));
    assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_local_failure_propagates_streams() {
    let installer = Installer::new(
        "echo pulling {{.Image}}; echo 'manifest unknown' >&2; exit 1",
        "demo:1.0",
    );

    let err = installer.install().await.unwrap_err();

    match &err {
        InstallError::Exec(ExecError::Execution {
            cause,
            stdout,
            stderr,
        }) => {
            assert!(cause.contains("exit status"));
            assert_eq!(stdout, "pulling demo:1.0\n");
            assert_eq!(stderr, "manifest unknown\n");
        }
        other => panic!("expected Execution, got {other:?}"),
    }
    assert!(err.to_string().contains("STDERR: manifest unknown"));
}

#[tokio::test]
async fn test_remote_with_unreadable_key_fails_fast() {
    let installer =
        Installer::new("echo {{.Image}}", "demo:1.0").with_remote("/nonexistent/id_ed25519", "ci", "192.0.2.1");

    let started = std::time::Instant::now();
    let err = installer.install().await.unwrap_err();

    match &err {
        InstallError::Exec(exec) => {
            assert!(matches!(exec, ExecError::Connection { host, .. } if host == "192.0.2.1"));
            assert!(matches!(exec.root(), ExecError::Credential { .. }));
        }
        other => panic!("expected Exec, got {other:?}"),
    }
    // no dial, so no backoff sleeps
    assert!(started.elapsed() < std::time::Duration::from_secs(1));
}
