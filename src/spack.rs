// src/spack.rs

//! Spack command-line interface
//!
//! The provisioning stages never call Spack directly. They go through the
//! [`PackageManager`] trait, which covers the four operations the workflow
//! needs. [`Spack`] implements it by running `<root>/bin/spack`.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{debug, info};

/// Result of a `locate_installed` probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    /// Installed at the given prefix
    Found(PathBuf),
    /// Not installed, or the query failed
    NotFound,
}

/// Configuration scope for `spack compiler add`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigScope {
    Defaults,
    System,
    #[default]
    Site,
    User,
}

impl ConfigScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Defaults => "defaults",
            Self::System => "system",
            Self::Site => "site",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operations the provisioning workflow needs from the package manager
pub trait PackageManager {
    /// Look up the install prefix of `spec`
    ///
    /// Any non-zero exit counts as [`Located::NotFound`]; this conflates
    /// "not installed" with other query failures such as a malformed spec.
    fn locate_installed(&self, spec: &str) -> Result<Located>;

    /// Register the compilers found on the host
    fn discover_compilers(&self) -> Result<()>;

    /// Install `spec`; with `fail_fast` the build stops at the first failure
    fn install(&self, spec: &str, fail_fast: bool) -> Result<()>;

    /// Register the compiler installed at `prefix` in `scope`
    fn register_compiler(&self, prefix: &Path, scope: ConfigScope) -> Result<()>;
}

impl<P: PackageManager + ?Sized> PackageManager for &P {
    fn locate_installed(&self, spec: &str) -> Result<Located> {
        (**self).locate_installed(spec)
    }

    fn discover_compilers(&self) -> Result<()> {
        (**self).discover_compilers()
    }

    fn install(&self, spec: &str, fail_fast: bool) -> Result<()> {
        (**self).install(spec, fail_fast)
    }

    fn register_compiler(&self, prefix: &Path, scope: ConfigScope) -> Result<()> {
        (**self).register_compiler(prefix, scope)
    }
}

/// Spack executable inside a Spack root
#[derive(Debug, Clone)]
pub struct Spack {
    /// Path to `bin/spack`
    exe: PathBuf,

    /// Interpreter to run `bin/spack` with, instead of its shebang
    python: Option<PathBuf>,

    /// Stream build output to the terminal instead of capturing it
    verbose: bool,
}

impl Spack {
    /// Spack in the given root
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            exe: root.as_ref().join("bin").join("spack"),
            python: None,
            verbose: false,
        }
    }

    /// Run `bin/spack` through a specific interpreter
    pub fn with_python(mut self, python: Option<PathBuf>) -> Self {
        self.python = python;
        self
    }

    /// Stream output of long-running commands
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = match &self.python {
            Some(python) => {
                let mut cmd = Command::new(python);
                cmd.arg(&self.exe);
                cmd
            }
            None => Command::new(&self.exe),
        };
        cmd.args(args);
        cmd
    }

    fn describe(args: &[&str]) -> String {
        format!("spack {}", args.join(" "))
    }

    /// Run a command that must succeed; output is streamed when verbose
    fn run(&self, args: &[&str]) -> Result<()> {
        let description = Self::describe(args);
        debug!("Running: {}", description);

        let mut cmd = self.command(args);
        if self.verbose {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let output = cmd.output().map_err(|e| Error::ExternalToolError {
            command: description.clone(),
            reason: format!("could not run {}: {}", self.exe.display(), e),
        })?;

        check_status(&description, &output)
    }

    /// Run a command and capture stdout, without judging the exit status
    fn capture(&self, args: &[&str]) -> Result<Output> {
        let description = Self::describe(args);
        debug!("Running: {}", description);

        self.command(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::ExternalToolError {
                command: description,
                reason: format!("could not run {}: {}", self.exe.display(), e),
            })
    }
}

fn check_status(description: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let reason = match stderr.trim() {
        "" => output.status.to_string(),
        detail => format!("{}\n{}", output.status, detail),
    };

    Err(Error::ExternalToolError {
        command: description.to_string(),
        reason,
    })
}

impl PackageManager for Spack {
    fn locate_installed(&self, spec: &str) -> Result<Located> {
        let output = self.capture(&["location", "-i", spec])?;
        if !output.status.success() {
            debug!("{} is not installed ({})", spec, output.status);
            return Ok(Located::NotFound);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
            Some(prefix) => Ok(Located::Found(PathBuf::from(prefix))),
            None => Ok(Located::NotFound),
        }
    }

    fn discover_compilers(&self) -> Result<()> {
        info!("Registering host compilers");
        self.run(&["compiler", "find"])
    }

    fn install(&self, spec: &str, fail_fast: bool) -> Result<()> {
        let mut args = vec!["install"];
        if fail_fast {
            args.push("--fail-fast");
        }
        args.push(spec);
        self.run(&args)
    }

    fn register_compiler(&self, prefix: &Path, scope: ConfigScope) -> Result<()> {
        let prefix = prefix.to_str().ok_or_else(|| {
            Error::ConfigError(format!("compiler prefix {} is not valid UTF-8", prefix.display()))
        })?;
        self.run(&["compiler", "add", "--scope", scope.as_str(), prefix])
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_names() {
        assert_eq!(ConfigScope::default(), ConfigScope::Site);
        assert_eq!(ConfigScope::Site.to_string(), "site");
        assert_eq!(ConfigScope::User.as_str(), "user");
    }

    #[test]
    fn test_command_uses_interpreter() {
        let spack = Spack::new("/opt/spack").with_python(Some(PathBuf::from("/usr/bin/python3")));
        let cmd = spack.command(&["location", "-i", "gcc@8.4.0"]);

        assert_eq!(cmd.get_program(), "/usr/bin/python3");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, ["/opt/spack/bin/spack", "location", "-i", "gcc@8.4.0"]);
    }

    #[test]
    fn test_command_runs_exe_directly() {
        let spack = Spack::new("/opt/spack");
        let cmd = spack.command(&["compiler", "find"]);
        assert_eq!(cmd.get_program(), "/opt/spack/bin/spack");
    }

    #[test]
    fn test_missing_executable_is_external_tool_error() {
        let temp = tempfile::tempdir().unwrap();
        let spack = Spack::new(temp.path());

        let err = spack.discover_compilers().unwrap_err();
        assert!(matches!(err, Error::ExternalToolError { ref command, .. } if command == "spack compiler find"));

        // Spawn failures are errors, not "not found"
        assert!(spack.locate_installed("gcc@8.4.0").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_with_fake_spack_script() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let bin = temp.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let exe = bin.join("spack");
        std::fs::write(
            &exe,
            "#!/bin/sh\nif [ \"$3\" = \"gcc@8.4.0\" ]; then echo /opt/gcc-8.4.0; exit 0; fi\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let spack = Spack::new(temp.path());
        assert_eq!(
            spack.locate_installed("gcc@8.4.0").unwrap(),
            Located::Found(PathBuf::from("/opt/gcc-8.4.0"))
        );
        assert_eq!(spack.locate_installed("gcc@9.3.0").unwrap(), Located::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_compiler_and_install_arguments() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let bin = temp.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let log = temp.path().join("argv.log");
        let exe = bin.join("spack");
        std::fs::write(
            &exe,
            format!("#!/bin/sh\nprintf '%s\\n' \"$*\" >> '{}'\n", log.display()),
        )
        .unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let spack = Spack::new(temp.path());
        spack.discover_compilers().unwrap();
        spack
            .register_compiler(Path::new("/opt/gcc"), ConfigScope::Site)
            .unwrap();
        spack.install("zlib", false).unwrap();
        spack.install("cmake", true).unwrap();

        let lines: Vec<String> = std::fs::read_to_string(&log)
            .unwrap()
            .lines()
            .map(String::from)
            .collect();
        assert_eq!(
            lines,
            [
                "compiler find",
                "compiler add --scope site /opt/gcc",
                "install zlib",
                "install --fail-fast cmake",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_install_failure_reports_command() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let bin = temp.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let exe = bin.join("spack");
        std::fs::write(&exe, "#!/bin/sh\necho 'Error: no such package' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = Spack::new(temp.path()).install("nope", true).unwrap_err();
        match err {
            Error::ExternalToolError { command, reason } => {
                assert_eq!(command, "spack install --fail-fast nope");
                assert!(reason.contains("no such package"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
