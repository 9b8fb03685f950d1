// Poppler's pdftoppm rasterizing the first page of a PDF
use crate::application::page_renderer::Rasterizer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    program: PathBuf,
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new(program: PathBuf, dpi: u32) -> Self {
        Self { program, dpi }
    }

    fn args(&self, pdf: &Path, prefix: &Path) -> Vec<OsString> {
        let dpi = self.dpi.to_string();
        let mut args: Vec<OsString> = ["-png", "-r", dpi.as_str(), "-f", "1", "-l", "1", "-singlefile"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(pdf.into());
        args.push(prefix.into());
        args
    }
}

/// pdftoppm appends `.png` to the output prefix it is given
fn output_prefix(output: &Path) -> PathBuf {
    output.with_extension("")
}

fn produced_file(prefix: &Path) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(".png");
    PathBuf::from(name)
}

#[async_trait]
impl Rasterizer for PdftoppmRasterizer {
    async fn first_page_to_png(&self, pdf: &Path, output: &Path) -> Result<()> {
        tracing::debug!("Converting {} to PNG", pdf.display());
        let prefix = output_prefix(output);

        let result = Command::new(&self.program)
            .args(self.args(pdf, &prefix))
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.program.display()))?;

        if !result.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                self.program.display(),
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }

        let produced = produced_file(&prefix);
        if produced != output {
            tokio::fs::rename(&produced, output)
                .await
                .with_context(|| format!("Failed to move {} to {}", produced.display(), output.display()))?;
        }
        Ok(())
    }
}
