//! Integration that copies new files into a target folder.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::registry::{IntegrationDescriptor, ParamSpec};
use super::{Integration, IntegrationError, Parameters};

/// Type identifier of [`FileIntegration`].
pub const KIND: &str = "File";

const TARGET: &str = "target";

const SCHEMA: &[ParamSpec] = &[ParamSpec {
    name: TARGET,
    flag: "-t",
    description: "target folder",
}];

/// Copies each new file into `target`, keeping its file name.
#[derive(Debug, Clone)]
pub struct FileIntegration {
    target: PathBuf,
    action_message: String,
}

impl FileIntegration {
    /// Create the integration. `target` is made absolute against the current directory.
    pub fn new(target: impl AsRef<Path>) -> Result<Self, IntegrationError> {
        let target = std::path::absolute(target.as_ref()).map_err(|e| {
            IntegrationError::InvalidParameter {
                name: TARGET.to_string(),
                reason: e.to_string(),
            }
        })?;
        // Parameters are stored as JSON strings and must reload to the same path
        if target.to_str().is_none() {
            return Err(IntegrationError::InvalidParameter {
                name: TARGET.to_string(),
                reason: format!("{} is not valid UTF-8", target.display()),
            });
        }
        let action_message = format!("copied to {}", target.display());

        Ok(Self {
            target,
            action_message,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn descriptor() -> IntegrationDescriptor {
        IntegrationDescriptor::new(
            KIND,
            "copy new files into another folder",
            SCHEMA,
            Self::from_parameters,
        )
    }

    fn from_parameters(parameters: &Parameters) -> Result<Arc<dyn Integration>, IntegrationError> {
        let target = parameters
            .get(TARGET)
            .ok_or_else(|| IntegrationError::MissingParameter {
                kind: KIND.to_string(),
                name: TARGET.to_string(),
                flag: SCHEMA[0].flag.to_string(),
            })?;
        Ok(Arc::new(Self::new(target)?))
    }

    fn copy_failed(&self, file: &Path, destination: &Path, reason: impl ToString) -> IntegrationError {
        IntegrationError::CopyFailed {
            file: file.to_path_buf(),
            destination: destination.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

impl Integration for FileIntegration {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn action_message(&self) -> &str {
        &self.action_message
    }

    fn parameters(&self) -> Parameters {
        let mut parameters = Parameters::new();
        parameters.insert(
            TARGET.to_string(),
            self.target.to_string_lossy().into_owned(),
        );
        parameters
    }

    fn execute(&self, file: &Path) -> Result<(), IntegrationError> {
        let name = file
            .file_name()
            .ok_or_else(|| self.copy_failed(file, &self.target, "path has no file name"))?;
        let destination = self.target.join(name);

        let mut source = File::open(file).map_err(|e| self.copy_failed(file, &destination, e))?;

        // Never overwrite an existing destination
        let mut target = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&destination)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => {
                    self.copy_failed(file, &destination, "destination file already exists")
                }
                _ => self.copy_failed(file, &destination, e),
            })?;

        if let Err(e) = io::copy(&mut source, &mut target) {
            drop(target);
            let _ = fs::remove_file(&destination);
            return Err(self.copy_failed(file, &destination, e));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_target_is_absolute() {
        let integration = FileIntegration::new("relative/out").unwrap();
        assert!(integration.target().is_absolute());
        assert!(integration.target().ends_with("relative/out"));
        assert_eq!(
            integration.action_message(),
            format!("copied to {}", integration.target().display())
        );
    }

    #[test]
    fn test_parameters_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let integration = FileIntegration::new(temp_dir.path()).unwrap();

        let rebuilt = FileIntegration::descriptor()
            .build(&integration.parameters())
            .unwrap();

        assert_eq!(rebuilt.kind(), KIND);
        assert_eq!(rebuilt.parameters(), integration.parameters());
        assert_eq!(rebuilt.action_message(), integration.action_message());
    }

    #[test]
    fn test_execute_copies_file() {
        let source_dir = TempDir::new().unwrap();
        let target_dir = TempDir::new().unwrap();
        let file = source_dir.path().join("a.txt");
        fs::write(&file, "hello").unwrap();

        let integration = FileIntegration::new(target_dir.path()).unwrap();
        integration.execute(&file).unwrap();

        let copied = fs::read_to_string(target_dir.path().join("a.txt")).unwrap();
        assert_eq!(copied, "hello");
    }

    #[test]
    fn test_execute_refuses_to_overwrite() {
        let source_dir = TempDir::new().unwrap();
        let target_dir = TempDir::new().unwrap();
        let file = source_dir.path().join("a.txt");
        fs::write(&file, "new").unwrap();
        fs::write(target_dir.path().join("a.txt"), "old").unwrap();

        let integration = FileIntegration::new(target_dir.path()).unwrap();
        let err = integration.execute(&file).unwrap_err();

        assert!(matches!(err, IntegrationError::CopyFailed { .. }));
        let kept = fs::read_to_string(target_dir.path().join("a.txt")).unwrap();
        assert_eq!(kept, "old");
    }

    #[test]
    fn test_execute_missing_source() {
        let target_dir = TempDir::new().unwrap();
        let integration = FileIntegration::new(target_dir.path()).unwrap();

        let err = integration
            .execute(&target_dir.path().join("gone.txt.src"))
            .unwrap_err();
        assert!(matches!(err, IntegrationError::CopyFailed { .. }));
        assert!(!target_dir.path().join("gone.txt.src").exists());
    }

    #[test]
    fn test_execute_missing_target_dir() {
        let source_dir = TempDir::new().unwrap();
        let file = source_dir.path().join("a.txt");
        fs::write(&file, "x").unwrap();

        let integration = FileIntegration::new(source_dir.path().join("nope")).unwrap();
        assert!(matches!(
            integration.execute(&file),
            Err(IntegrationError::CopyFailed { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_target_is_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let target = Path::new("/srv").join(OsStr::from_bytes(b"out\xff"));
        let err = FileIntegration::new(&target).unwrap_err();
        assert!(matches!(err, IntegrationError::InvalidParameter { name, .. } if name == TARGET));

        let mut parameters = Parameters::new();
        parameters.insert(TARGET.to_string(), "/srv/out\u{FFFD}".to_string());
        let rebuilt = FileIntegration::from_parameters(&parameters).unwrap();
        assert_eq!(rebuilt.parameters(), parameters);
    }
}
