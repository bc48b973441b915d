// src/bootstrap/templates.rs

//! Configuration templates
//!
//! Every generated document is rendered by a pure function of an explicit
//! parameter struct, so the same inputs always produce byte-identical text
//! and rendering can be tested without touching the filesystem.
//!
//! Templates use `{name}` placeholders; `{{` and `}}` produce literal braces.
//! Rendering fails with [`Error::FormatError`] when a template is malformed,
//! when a placeholder has no value, or when a supplied value is never used.

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::path::Path;

use super::config::CompilerSpec;

const MIRRORS_TEMPLATE: &str = "\
mirrors:
  local: {url}
";

const PACKAGES_TEMPLATE: &str = "\
packages:
  all:
    compiler: [{compiler}]
  cairo:
    variants: -X+pdf
  clapack:
    variants: ~external-blas
  pcre:
    variants: +jit
  perl:
    version: [5.32.0]
  python:
    version: [3.8.6]
";

const MODULES_TEMPLATE: &str = "\
modules:
  enable::
    - lmod
  lmod:
    core_compilers:
      - '{core_compiler}'
    whitelist:
      - '{whitelist}'
    verbose_autoload: false
    all:
      autoload: 'direct'
      suffixes:
        '+jit': jit
        '^python@2.7': 'py2.7'
        '^python@3.8': 'py3.8'
      environment:
        set:
          'SPACK_{{name}}_ROOT': '{{prefix}}'
    ^python:
      autoload: 'direct'
";

const ACTIVATE_TEMPLATE: &str = r#"# Generated by spacktree. Source this file; do not execute it.

SPACK_AUTOLOAD_MODULES=${{SPACK_AUTOLOAD_MODULES:-"{autoload_modules}"}}

# An empty MANPATH entry keeps the system man pages visible once Lmod prepends to it.
if [ -z "${{MANPATH:-}}" ]; then
    export MANPATH=":"
fi

if [ -z "${{_INIT_LMOD:-}}" ]; then
    export _INIT_LMOD=1
    . {init_file}
    module use {modules_dir}
    module load ${{SPACK_AUTOLOAD_MODULES}}
else
    . {init_file}
    module refresh
fi

printf '%s\n' \
    "" \
    "* Spack tree initialized using these env vars:" \
    "  SPACK_AUTOLOAD_MODULES=\"${{SPACK_AUTOLOAD_MODULES}}\"" \
    "" \
    "* You can export these env vars prior to sourcing this script for more control over your environment." \
    "" \
    "* Type module avail to see a list of available packages." \
    ""
"#;

/// Piece of a parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Brace(char),
    Placeholder(&'a str),
}

/// A parsed `{name}` template
#[derive(Debug, Clone)]
pub struct Template<'a> {
    name: &'a str,
    segments: Vec<Segment<'a>>,
}

impl<'a> Template<'a> {
    /// Parse template text; `name` is only used in error messages
    pub fn parse(name: &'a str, text: &'a str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = text;

        while let Some(pos) = rest.find(['{', '}']) {
            if pos > 0 {
                segments.push(Segment::Literal(&rest[..pos]));
            }
            let tail = &rest[pos..];

            if let Some(after) = tail.strip_prefix("{{") {
                segments.push(Segment::Brace('{'));
                rest = after;
            } else if let Some(after) = tail.strip_prefix("}}") {
                segments.push(Segment::Brace('}'));
                rest = after;
            } else if tail.starts_with('}') {
                return Err(Error::FormatError(format!(
                    "{}: single '}}' at byte {} (use '}}}}' for a literal brace)",
                    name,
                    text.len() - tail.len()
                )));
            } else {
                let body = &tail[1..];
                let end = body.find(['{', '}']).filter(|&i| body.as_bytes()[i] == b'}');
                let Some(end) = end else {
                    return Err(Error::FormatError(format!(
                        "{}: unclosed placeholder at byte {}",
                        name,
                        text.len() - tail.len()
                    )));
                };

                let key = &body[..end];
                if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(Error::FormatError(format!(
                        "{}: invalid placeholder name '{}'",
                        name, key
                    )));
                }
                segments.push(Segment::Placeholder(key));
                rest = &body[end + 1..];
            }
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest));
        }

        Ok(Self { name, segments })
    }

    /// Placeholder names used by this template
    pub fn placeholders(&self) -> BTreeSet<&'a str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(key) => Some(*key),
                _ => None,
            })
            .collect()
    }

    /// Substitute `values` into the template
    ///
    /// Every placeholder must have a value and every value must be used.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String> {
        let used = self.placeholders();

        if let Some((extra, _)) = values.iter().find(|(k, _)| !used.contains(k)) {
            return Err(Error::FormatError(format!(
                "{}: value '{}' has no placeholder",
                self.name, extra
            )));
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Brace(c) => out.push(*c),
                Segment::Placeholder(key) => {
                    let value = values
                        .iter()
                        .find(|(k, _)| k == key)
                        .map(|(_, v)| *v)
                        .ok_or_else(|| {
                            Error::FormatError(format!(
                                "{}: no value for placeholder '{}'",
                                self.name, key
                            ))
                        })?;
                    out.push_str(value);
                }
            }
        }

        Ok(out)
    }
}

/// Parameters of `mirrors.yaml`
#[derive(Debug, Clone, Copy)]
pub struct MirrorParams<'a> {
    /// Absolute, normalized mirror directory
    pub path: &'a Path,
}

/// Parameters of `packages.yaml`
#[derive(Debug, Clone, Copy)]
pub struct PackagesParams<'a> {
    /// Preferred compiler for all packages
    pub compiler: &'a CompilerSpec,
}

/// Parameters of `modules.yaml`
#[derive(Debug, Clone, Copy)]
pub struct ModulesParams<'a> {
    /// Compiler whose modules form the Lmod core
    pub compiler: &'a CompilerSpec,
}

/// Parameters of the activation script
#[derive(Debug, Clone, Copy)]
pub struct ActivateParams<'a> {
    /// Lmod init file sourced by the script
    pub init_file: &'a Path,
    /// Module directory added with `module use`
    pub modules_dir: &'a Path,
    /// Default auto-load set
    pub autoload_modules: &'a [String],
}

/// Render `mirrors.yaml`
pub fn render_mirrors(params: &MirrorParams<'_>) -> Result<String> {
    let url = yaml_quote(&format!("file://{}", path_str(params.path)?));
    Template::parse("mirrors.yaml", MIRRORS_TEMPLATE)?.render(&[("url", url.as_str())])
}

/// Render `packages.yaml`
pub fn render_packages(params: &PackagesParams<'_>) -> Result<String> {
    let compiler = params.compiler.to_string();
    Template::parse("packages.yaml", PACKAGES_TEMPLATE)?.render(&[("compiler", compiler.as_str())])
}

/// Render `modules.yaml`
pub fn render_modules(params: &ModulesParams<'_>) -> Result<String> {
    let compiler = params.compiler.to_string();
    Template::parse("modules.yaml", MODULES_TEMPLATE)?.render(&[
        ("core_compiler", compiler.as_str()),
        ("whitelist", compiler.as_str()),
    ])
}

/// Render the activation script
pub fn render_activate(params: &ActivateParams<'_>) -> Result<String> {
    let init_file = shell_quote(path_str(params.init_file)?);
    let modules_dir = shell_quote(path_str(params.modules_dir)?);
    let modules = params.autoload_modules.join(" ");

    if let Some(bad) = params
        .autoload_modules
        .iter()
        .find(|m| m.is_empty() || m.contains(['"', '$', '`', '\\']) || m.contains(char::is_whitespace))
    {
        return Err(Error::FormatError(format!(
            "activate.sh: module name '{}' cannot be embedded in the script",
            bad
        )));
    }

    Template::parse("activate.sh", ACTIVATE_TEMPLATE)?.render(&[
        ("autoload_modules", modules.as_str()),
        ("init_file", init_file.as_str()),
        ("modules_dir", modules_dir.as_str()),
    ])
}

/// Single-quoted shell word; nothing inside is expanded when sourced
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Single-quoted YAML scalar, so `#` and `: ` are plain text
fn yaml_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| Error::FormatError(format!("path {} is not valid UTF-8", path.display())))
}
