//! `init-config` command
//!
//! Writes a commented sample `dwh.toml` to fill in by hand.

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::config::{DwhConfig, sample_config};

/// Init-config command arguments
#[derive(Debug, Clone)]
pub struct InitArgs {
    /// Where to write the file
    pub path: PathBuf,
    /// Overwrite an existing file
    pub force: bool,
}

pub fn handle_init_config(args: &InitArgs) -> Result<(), CliError> {
    if args.path.exists() && !args.force {
        return Err(CliError::FileExists(args.path.clone()));
    }

    // The sample must stay loadable
    DwhConfig::parse(sample_config())?;

    if let Some(parent) = args.path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            CliError::IoError(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    std::fs::write(&args.path, sample_config()).map_err(|e| {
        CliError::IoError(format!("Failed to write {}: {}", args.path.display(), e))
    })?;

    println!("Wrote sample configuration to {}", args.path.display());
    println!("Fill in [IAM_ROLE], [S3] and [CLUSTER] before running the pipeline.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_config_writes_loadable_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf").join("dwh.toml");
        let args = InitArgs {
            path: path.clone(),
            force: false,
        };

        handle_init_config(&args).unwrap();
        let config = DwhConfig::load(&path).unwrap();
        assert!(config.load_settings().is_ok());

        // Second write without --force is refused
        assert!(matches!(
            handle_init_config(&args),
            Err(CliError::FileExists(_))
        ));

        let forced = InitArgs { path, force: true };
        assert!(handle_init_config(&forced).is_ok());
    }
}
