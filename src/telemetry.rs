use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Prometheus recorder whose exposition is written to a file at the end of a
/// run (node_exporter textfile collector style; a batch job has no port).
pub struct Metrics {
    pub handle: PrometheusHandle,
    path: PathBuf,
}

impl Metrics {
    /// Install the global recorder. Call once, before the run starts.
    pub fn init(path: impl Into<PathBuf>) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        Ok(Self {
            handle,
            path: path.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the current exposition and atomically replace the textfile.
    pub fn flush(&self) -> Result<()> {
        let body = self.handle.render();
        let tmp = self.path.with_extension("prom.tmp");
        {
            let mut f = fs::File::create(&tmp)
                .with_context(|| format!("creating {}", tmp.display()))?;
            f.write_all(body.as_bytes())?;
        }
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}
