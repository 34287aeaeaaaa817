use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `fmt` subscriber. `RUST_LOG` overrides the `info` default.
pub fn init() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();
}

/// `outer: inner: root` on one line.
pub fn error_chain(err: &anyhow::Error) -> String {
    format!("{err:#}")
}

fn exit_status(result: &anyhow::Result<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %error_chain(e), "run failed");
            1
        }
    }
}

/// Log a failed run's error chain and turn the outcome into the process exit code.
pub fn report(result: anyhow::Result<()>) -> ExitCode {
    ExitCode::from(exit_status(&result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn failure_exits_one_with_full_chain() {
        let err: anyhow::Result<()> = Err(anyhow!("connection refused")).context("load stage");
        assert_eq!(
            error_chain(err.as_ref().unwrap_err()),
            "load stage: connection refused"
        );
        assert_eq!(exit_status(&err), 1);
        assert_eq!(exit_status(&Ok(())), 0);
    }
}
