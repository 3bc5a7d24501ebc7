//! Process-wide registry of configurable options
//!
//! Every option a target (or the global scope) exposes is declared here
//! during a single setup pass that runs before any target instance is
//! constructed, so help output and config-file validation can enumerate the
//! full set without building real instances. The effective value of an
//! option is resolved once, with ascending priority: literal default,
//! computed default, persisted config file, environment, command line.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::config::error::{ConfigError, Result};
use crate::config::snapshot::ConfigSnapshot;
use crate::target::Architecture;

/// Scope an option is resolved against: a concrete target bound to an
/// architecture. Computed defaults receive this so they can derive values
/// such as "install root plus the target's lowercase name".
#[derive(Debug, Clone)]
pub struct TargetContext {
    pub name: String,
    pub arch: Architecture,
}

impl TargetContext {
    pub fn new(name: impl Into<String>, arch: Architecture) -> Self {
        Self {
            name: name.into(),
            arch,
        }
    }

    /// Context used when resolving options that do not belong to a target.
    pub fn global(arch: Architecture) -> Self {
        Self::new("", arch)
    }
}

/// A resolved option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Str(String),
    Path(PathBuf),
    List(Vec<String>),
}

impl OptionValue {
    pub fn kind_str(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "bool",
            OptionValue::Str(_) => "string",
            OptionValue::Path(_) => "path",
            OptionValue::List(_) => "list",
        }
    }
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{b}"),
            OptionValue::Str(s) => write!(f, "{s}"),
            OptionValue::Path(p) => write!(f, "{}", p.display()),
            OptionValue::List(items) => write!(f, "{}", items.join(" ")),
        }
    }
}

/// Declared value type of an option.
#[derive(Debug, Clone, Copy)]
pub enum OptionKind {
    Bool,
    Str,
    Path,
    List,
    /// String restricted to a closed set of legal spellings.
    Choice(&'static [&'static str]),
}

impl OptionKind {
    fn expected(&self) -> &'static str {
        match self {
            OptionKind::Bool => "bool",
            OptionKind::Str => "string",
            OptionKind::Path => "path",
            OptionKind::List => "list",
            OptionKind::Choice(_) => "choice",
        }
    }
}

/// A computed default is a pure function of the resolved global config and
/// the owning target's identity. It runs at resolution time, never at
/// registration time.
pub type ComputedFn = fn(&ConfigSnapshot, &TargetContext) -> OptionValue;

#[derive(Clone)]
pub enum OptionDefault {
    Literal(OptionValue),
    Computed {
        compute: ComputedFn,
        /// Human-readable rendering of the computation for help output.
        as_string: &'static str,
    },
}

impl std::fmt::Debug for OptionDefault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionDefault::Literal(v) => write!(f, "Literal({v:?})"),
            OptionDefault::Computed { as_string, .. } => write!(f, "Computed({as_string})"),
        }
    }
}

/// One declared option.
#[derive(Debug, Clone)]
pub struct OptionDecl {
    /// Fully-qualified name: `<target>/<option>` or a bare global name.
    pub name: String,
    pub kind: OptionKind,
    pub default: OptionDefault,
    pub help: &'static str,
}

/// Where the effective value of an option came from, ascending priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OptionSource {
    Default,
    ConfigFile,
    Environment,
    CommandLine,
}

/// Opaque handle returned by [`OptionRegistry::register`].
#[derive(Debug, Clone)]
pub struct OptionHandle {
    qualified: String,
}

impl OptionHandle {
    pub fn name(&self) -> &str {
        &self.qualified
    }
}

/// Ordered callback contributing option declarations for one level of a
/// target's composition (base, cross-compilation, build system, leaf).
pub type OptionContributor = fn(&mut OptionRegistry, &str) -> Result<()>;

#[derive(Default)]
pub struct OptionRegistry {
    decls: BTreeMap<String, OptionDecl>,
    file_values: HashMap<String, serde_json::Value>,
    env_values: HashMap<String, String>,
    cli_values: HashMap<String, String>,
}

impl OptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn qualify(target: Option<&str>, option: &str) -> String {
        match target {
            Some(t) => format!("{t}/{option}"),
            None => option.to_string(),
        }
    }

    /// Environment variable consulted for an option, derived from its
    /// qualified name: `zlib/build-type` reads `BUILDFORGE_ZLIB_BUILD_TYPE`.
    pub fn env_var_name(qualified: &str) -> String {
        let mut name = String::from("BUILDFORGE_");
        for ch in qualified.chars() {
            match ch {
                '/' | '-' | '.' => name.push('_'),
                c => name.push(c.to_ascii_uppercase()),
            }
        }
        name
    }

    /// Declare an option. Fails if the exact (target, option) pair is
    /// already registered; each class-hierarchy level declares its options
    /// exactly once.
    pub fn register(
        &mut self,
        target: Option<&str>,
        option: &str,
        kind: OptionKind,
        default: OptionDefault,
        help: &'static str,
    ) -> Result<OptionHandle> {
        let qualified = Self::qualify(target, option);
        if self.decls.contains_key(&qualified) {
            return Err(ConfigError::DuplicateOption { name: qualified });
        }
        self.decls.insert(
            qualified.clone(),
            OptionDecl {
                name: qualified.clone(),
                kind,
                default,
                help,
            },
        );
        Ok(OptionHandle { qualified })
    }

    pub fn is_registered(&self, qualified: &str) -> bool {
        self.decls.contains_key(qualified)
    }

    /// All declarations in deterministic (name) order.
    pub fn decls(&self) -> impl Iterator<Item = &OptionDecl> {
        self.decls.values()
    }

    /// Seed the persisted-file layer. Every key must name a registered
    /// option; typos in a config file are fatal rather than silently inert.
    pub fn seed_file_layer(&mut self, values: HashMap<String, serde_json::Value>) -> Result<()> {
        for key in values.keys() {
            if !self.decls.contains_key(key) {
                return Err(ConfigError::UnknownOption { name: key.clone() });
            }
        }
        self.file_values.extend(values);
        Ok(())
    }

    /// Seed the environment layer from the current process environment.
    /// Unrecognised `BUILDFORGE_` variables are warned about, not fatal:
    /// the environment is shared state we do not own.
    pub fn seed_env_layer(&mut self) {
        let known: HashMap<String, String> = self
            .decls
            .keys()
            .map(|q| (Self::env_var_name(q), q.clone()))
            .collect();
        for (var, value) in std::env::vars() {
            if let Some(qualified) = known.get(&var) {
                self.env_values.insert(qualified.clone(), value);
            } else if var.starts_with("BUILDFORGE_") {
                tracing::warn!("ignoring environment variable {var}: no matching option");
            }
        }
    }

    /// Seed the command-line layer from repeated `<option>=<value>` pairs.
    pub fn seed_cli_overrides(&mut self, overrides: &[String]) -> Result<()> {
        for raw in overrides {
            let (key, value) = raw
                .split_once('=')
                .ok_or_else(|| ConfigError::MalformedOverride { raw: raw.clone() })?;
            if !self.decls.contains_key(key) {
                return Err(ConfigError::UnknownOption {
                    name: key.to_string(),
                });
            }
            self.cli_values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    /// Directly set a command-line override for a known option. Used by the
    /// CLI to map dedicated flags onto registry options.
    pub fn set_cli_override(&mut self, qualified: &str, value: impl Into<String>) -> Result<()> {
        if !self.decls.contains_key(qualified) {
            return Err(ConfigError::UnknownOption {
                name: qualified.to_string(),
            });
        }
        self.cli_values.insert(qualified.to_string(), value.into());
        Ok(())
    }

    /// Resolve one option. Deterministic and side-effect-free; callers
    /// memoize the result per target instance so resolution happens exactly
    /// once per run.
    pub fn resolve(
        &self,
        qualified: &str,
        config: &ConfigSnapshot,
        ctx: &TargetContext,
    ) -> Result<(OptionValue, OptionSource)> {
        let decl = self
            .decls
            .get(qualified)
            .ok_or_else(|| ConfigError::UnknownOption {
                name: qualified.to_string(),
            })?;

        if let Some(raw) = self.cli_values.get(qualified) {
            return Ok((parse_raw(decl, raw)?, OptionSource::CommandLine));
        }
        if let Some(raw) = self.env_values.get(qualified) {
            return Ok((parse_raw(decl, raw)?, OptionSource::Environment));
        }
        if let Some(json) = self.file_values.get(qualified) {
            return Ok((value_from_json(decl, json)?, OptionSource::ConfigFile));
        }
        let value = match &decl.default {
            OptionDefault::Literal(v) => v.clone(),
            OptionDefault::Computed { compute, .. } => compute(config, ctx),
        };
        Ok((value, OptionSource::Default))
    }

    /// Resolve an option that must not depend on the config snapshot
    /// (used while the snapshot itself is being constructed).
    pub fn resolve_global(&self, name: &str) -> Result<(OptionValue, OptionSource)> {
        let decl = self.decls.get(name).ok_or_else(|| ConfigError::UnknownOption {
            name: name.to_string(),
        })?;
        if let Some(raw) = self.cli_values.get(name) {
            return Ok((parse_raw(decl, raw)?, OptionSource::CommandLine));
        }
        if let Some(raw) = self.env_values.get(name) {
            return Ok((parse_raw(decl, raw)?, OptionSource::Environment));
        }
        if let Some(json) = self.file_values.get(name) {
            return Ok((value_from_json(decl, json)?, OptionSource::ConfigFile));
        }
        match &decl.default {
            OptionDefault::Literal(v) => Ok((v.clone(), OptionSource::Default)),
            OptionDefault::Computed { as_string, .. } => Err(ConfigError::InvalidValue {
                name: name.to_string(),
                value: (*as_string).to_string(),
                reason: "global options cannot use computed defaults".to_string(),
            }),
        }
    }

    /// Resolve every option scoped to `target` into an immutable record.
    pub fn resolve_target_options(
        &self,
        target: &str,
        config: &ConfigSnapshot,
        ctx: &TargetContext,
    ) -> Result<TargetOptions> {
        let prefix = format!("{target}/");
        let mut values = BTreeMap::new();
        for qualified in self.decls.keys() {
            if let Some(short) = qualified.strip_prefix(&prefix) {
                let resolved = self.resolve(qualified, config, ctx)?;
                values.insert(short.to_string(), resolved);
            }
        }
        Ok(TargetOptions { values })
    }
}

fn check_choice(decl: &OptionDecl, value: &str) -> Result<()> {
    if let OptionKind::Choice(choices) = decl.kind {
        if !choices.contains(&value) {
            return Err(ConfigError::InvalidChoice {
                name: decl.name.clone(),
                value: value.to_string(),
                choices: choices.iter().map(|c| c.to_string()).collect(),
            });
        }
    }
    Ok(())
}

/// Parse a textual override (environment or command line) against the
/// declared kind. Lists use shell quoting rules.
fn parse_raw(decl: &OptionDecl, raw: &str) -> Result<OptionValue> {
    match decl.kind {
        OptionKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(OptionValue::Bool(true)),
            "0" | "false" | "no" | "off" => Ok(OptionValue::Bool(false)),
            other => Err(ConfigError::InvalidValue {
                name: decl.name.clone(),
                value: other.to_string(),
                reason: "expected true/false".to_string(),
            }),
        },
        OptionKind::Str => Ok(OptionValue::Str(raw.to_string())),
        OptionKind::Choice(_) => {
            check_choice(decl, raw)?;
            Ok(OptionValue::Str(raw.to_string()))
        }
        OptionKind::Path => Ok(OptionValue::Path(PathBuf::from(raw))),
        OptionKind::List => {
            let items = shell_words::split(raw).map_err(|e| ConfigError::InvalidValue {
                name: decl.name.clone(),
                value: raw.to_string(),
                reason: e.to_string(),
            })?;
            Ok(OptionValue::List(items))
        }
    }
}

/// Convert a JSON config-file value against the declared kind.
fn value_from_json(decl: &OptionDecl, json: &serde_json::Value) -> Result<OptionValue> {
    let mismatch = || ConfigError::TypeMismatch {
        name: decl.name.clone(),
        expected: decl.kind.expected(),
        actual: json.to_string(),
    };
    match decl.kind {
        OptionKind::Bool => json.as_bool().map(OptionValue::Bool).ok_or_else(mismatch),
        OptionKind::Str => json
            .as_str()
            .map(|s| OptionValue::Str(s.to_string()))
            .ok_or_else(mismatch),
        OptionKind::Choice(_) => {
            let s = json.as_str().ok_or_else(mismatch)?;
            check_choice(decl, s)?;
            Ok(OptionValue::Str(s.to_string()))
        }
        OptionKind::Path => json
            .as_str()
            .map(|s| OptionValue::Path(PathBuf::from(s)))
            .ok_or_else(mismatch),
        OptionKind::List => {
            let arr = json.as_array().ok_or_else(mismatch)?;
            let mut items = Vec::with_capacity(arr.len());
            for item in arr {
                items.push(item.as_str().ok_or_else(mismatch)?.to_string());
            }
            Ok(OptionValue::List(items))
        }
    }
}

/// The immutable, fully-resolved option record of one target instance.
/// Looked up by short (unqualified) option name.
#[derive(Debug, Clone, Default)]
pub struct TargetOptions {
    values: BTreeMap<String, (OptionValue, OptionSource)>,
}

impl TargetOptions {
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name).map(|(v, _)| v)
    }

    pub fn source(&self, name: &str) -> Option<OptionSource> {
        self.values.get(name).map(|(_, s)| *s)
    }

    fn typed<T>(&self, name: &str, extract: fn(&OptionValue) -> Option<T>, expected: &'static str) -> Result<T> {
        let value = self.get(name).ok_or_else(|| ConfigError::UnknownOption {
            name: name.to_string(),
        })?;
        extract(value).ok_or_else(|| ConfigError::TypeMismatch {
            name: name.to_string(),
            expected,
            actual: value.kind_str().to_string(),
        })
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        self.typed(
            name,
            |v| match v {
                OptionValue::Bool(b) => Some(*b),
                _ => None,
            },
            "bool",
        )
    }

    pub fn bool_or(&self, name: &str, default: bool) -> bool {
        self.bool(name).unwrap_or(default)
    }

    pub fn str(&self, name: &str) -> Result<String> {
        self.typed(
            name,
            |v| match v {
                OptionValue::Str(s) => Some(s.clone()),
                _ => None,
            },
            "string",
        )
    }

    pub fn path(&self, name: &str) -> Result<PathBuf> {
        self.typed(
            name,
            |v| match v {
                OptionValue::Path(p) => Some(p.clone()),
                _ => None,
            },
            "path",
        )
    }

    pub fn list(&self, name: &str) -> Result<Vec<String>> {
        self.typed(
            name,
            |v| match v {
                OptionValue::List(items) => Some(items.clone()),
                _ => None,
            },
            "list",
        )
    }

    pub fn list_or_empty(&self, name: &str) -> Vec<String> {
        self.list(name).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.values.iter().map(|(k, (v, _))| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::snapshot::ConfigSnapshot;

    fn snapshot() -> ConfigSnapshot {
        ConfigSnapshot::for_testing(std::path::Path::new("/tmp/forge-test"))
    }

    fn ctx() -> TargetContext {
        TargetContext::new("demo", Architecture::Riscv64)
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut reg = OptionRegistry::new();
        reg.register(
            Some("demo"),
            "gui",
            OptionKind::Bool,
            OptionDefault::Literal(OptionValue::Bool(false)),
            "",
        )
        .unwrap();
        let err = reg
            .register(
                Some("demo"),
                "gui",
                OptionKind::Bool,
                OptionDefault::Literal(OptionValue::Bool(true)),
                "",
            )
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateOption { .. }));
    }

    #[test]
    fn command_line_outranks_file() {
        let mut reg = OptionRegistry::new();
        reg.register(
            Some("demo"),
            "build-type",
            OptionKind::Choice(&["Debug", "Release"]),
            OptionDefault::Literal(OptionValue::Str("Release".into())),
            "",
        )
        .unwrap();
        let mut file = HashMap::new();
        file.insert("demo/build-type".to_string(), serde_json::json!("Debug"));
        reg.seed_file_layer(file).unwrap();

        let (value, source) = reg.resolve("demo/build-type", &snapshot(), &ctx()).unwrap();
        assert_eq!(value, OptionValue::Str("Debug".into()));
        assert_eq!(source, OptionSource::ConfigFile);

        reg.seed_cli_overrides(&["demo/build-type=Release".to_string()])
            .unwrap();
        let (value, source) = reg.resolve("demo/build-type", &snapshot(), &ctx()).unwrap();
        assert_eq!(value, OptionValue::Str("Release".into()));
        assert_eq!(source, OptionSource::CommandLine);
    }

    #[test]
    fn choice_rejects_unknown_spelling() {
        let mut reg = OptionRegistry::new();
        reg.register(
            Some("demo"),
            "linker",
            OptionKind::Choice(&["lld", "bfd"]),
            OptionDefault::Literal(OptionValue::Str("lld".into())),
            "",
        )
        .unwrap();
        let err = reg
            .seed_cli_overrides(&["demo/linker=gold".to_string()])
            .and_then(|_| reg.resolve("demo/linker", &snapshot(), &ctx()).map(|_| ()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidChoice { .. }));
    }

    #[test]
    fn computed_default_sees_overridden_config() {
        fn install_default(config: &ConfigSnapshot, ctx: &TargetContext) -> OptionValue {
            OptionValue::Path(
                config
                    .rootfs_dir(ctx.arch)
                    .join("opt")
                    .join(ctx.name.to_lowercase()),
            )
        }
        let mut reg = OptionRegistry::new();
        reg.register(
            Some("Demo"),
            "install-directory",
            OptionKind::Path,
            OptionDefault::Computed {
                compute: install_default,
                as_string: "$ROOTFS/opt/<target>",
            },
            "",
        )
        .unwrap();

        let config = ConfigSnapshot::for_testing(std::path::Path::new("/custom/output"));
        let ctx = TargetContext::new("Demo", Architecture::Aarch64);
        let (value, source) = reg.resolve("Demo/install-directory", &config, &ctx).unwrap();
        assert_eq!(source, OptionSource::Default);
        match value {
            OptionValue::Path(p) => {
                assert!(p.starts_with("/custom/output"));
                assert!(p.ends_with("opt/demo"));
            }
            other => panic!("expected path, got {other:?}"),
        }
    }

    #[test]
    fn unknown_file_key_is_fatal() {
        let mut reg = OptionRegistry::new();
        let mut file = HashMap::new();
        file.insert("nope/missing".to_string(), serde_json::json!(true));
        assert!(matches!(
            reg.seed_file_layer(file).unwrap_err(),
            ConfigError::UnknownOption { .. }
        ));
    }

    #[test]
    fn list_override_uses_shell_quoting() {
        let mut reg = OptionRegistry::new();
        reg.register(
            Some("demo"),
            "extra-args",
            OptionKind::List,
            OptionDefault::Literal(OptionValue::List(vec![])),
            "",
        )
        .unwrap();
        reg.seed_cli_overrides(&[r#"demo/extra-args=--flag "two words""#.to_string()])
            .unwrap();
        let (value, _) = reg.resolve("demo/extra-args", &snapshot(), &ctx()).unwrap();
        assert_eq!(
            value,
            OptionValue::List(vec!["--flag".into(), "two words".into()])
        );
    }

    #[test]
    fn env_var_name_mapping() {
        assert_eq!(
            OptionRegistry::env_var_name("zlib/build-type"),
            "BUILDFORGE_ZLIB_BUILD_TYPE"
        );
        assert_eq!(OptionRegistry::env_var_name("jobs"), "BUILDFORGE_JOBS");
    }
}
