//! Diagnostic log retrieval for fatal failures

use futures::future::{BoxFuture, FutureExt};

use super::{TargetError, command};

/// Source of recent target logs, consulted once when a run fails fatally
pub trait LogSource: Send + Sync {
    fn recent_logs(&self) -> BoxFuture<'_, Result<String, TargetError>>;
}

/// Tails the logs of a Docker container
#[derive(Debug, Clone)]
pub struct DockerLogs {
    container: String,
    lines: usize,
}

impl DockerLogs {
    pub fn new(container: impl Into<String>, lines: usize) -> Self {
        Self {
            container: container.into(),
            lines,
        }
    }

    fn args(&self) -> Vec<String> {
        vec![
            "logs".to_string(),
            "--tail".to_string(),
            self.lines.to_string(),
            self.container.clone(),
        ]
    }
}

impl LogSource for DockerLogs {
    fn recent_logs(&self) -> BoxFuture<'_, Result<String, TargetError>> {
        async move {
            let output = command::run("docker", &self.args()).await?;
            // docker replays the container's stderr on its own stderr
            let mut logs = output.stdout;
            logs.push_str(&output.stderr);
            Ok(logs.trim_end().to_string())
        }
        .boxed()
    }
}
