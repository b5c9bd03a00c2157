//! `cssurl init`: write a commented default config.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;

use cssurl::config::CssurlConfig;
use cssurl::log;

/// Write the default config to `path`. Refuses to overwrite unless `force`.
pub fn write_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "'{}' already exists, pass --force to overwrite it",
            path.display()
        );
    }

    let content = format!(
        "# cssurl configuration (v{})\n\n{}",
        env!("CARGO_PKG_VERSION"),
        CssurlConfig::template()
    );
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;

    log!("init"; "wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cssurl.toml");

        write_config(&path, false).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# cssurl configuration"));
        assert!(CssurlConfig::from_str(&written).is_ok());

        assert!(write_config(&path, false).is_err());
        write_config(&path, true).unwrap();
    }
}
