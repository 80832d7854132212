use anyhow::Context;
use clap::{ArgMatches, Command, ValueEnum};
use json5;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::subcommands::generate::Language;

/// Errors that can occur when building or using CommandConfig
#[derive(Debug, Error)]
pub enum CommandConfigError {
    #[error("The option `--{arg_name}` is defined in Clap, but not in the config. If this is intentional and the option shouldn't be available in the config, you can exclude it with the `CommandConfigBuilder::exclude` function")]
    ClapArgNotDefined { arg_name: String },

    #[error("Key '{config_name}' references clap argument '{clap_name}' which doesn't exist in the Command. If the config key should be different than the clap argument, use from_clap()")]
    InvalidClapReference { config_name: String, clap_name: String },

    #[error("Key '{config_name}' has alias '{alias}' which doesn't exist in the Command")]
    InvalidAliasReference { config_name: String, alias: String },

    #[error("Excluded key '{key}' doesn't exist in the clap Command")]
    InvalidExclusion { key: String },

    #[error("Config key '{config_key}' is not supported in the config file. Available keys: {available_keys}")]
    UnsupportedConfigKey { config_key: String, available_keys: String },

    #[error("Required key '{key}' is missing from the config file")]
    MissingRequiredKey { key: String },

    #[error("Mismatch between definition and access of `{key}`. Could not downcast to {requested_type}, need to downcast to {expected_type}")]
    TypeMismatch {
        key: String,
        requested_type: String,
        expected_type: String,
    },

    #[error("Failed to convert config value for key '{key}' to type {target_type}")]
    ConversionError {
        key: String,
        target_type: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Project configuration loaded from spacetime.json.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct SpacetimeConfig {
    /// Command to run after publishing and generating (used by `spacetime dev`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,

    /// List of generate configurations for creating client bindings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate: Option<Vec<HashMap<String, Value>>>,

    /// Configuration for publishing the database
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishConfig>,
}

/// Configuration for `spacetime publish` command.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct PublishConfig {
    /// Child databases
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<PublishConfig>>,

    /// Configuration fields
    #[serde(flatten)]
    pub additional_fields: HashMap<String, Value>,
}

impl PublishConfig {
    /// Iterate through all publish targets (self + children recursively).
    /// Returns an iterator that yields references to PublishConfig instances.
    pub fn iter_all_targets(&self) -> Box<dyn Iterator<Item = &PublishConfig> + '_> {
        Box::new(
            std::iter::once(self).chain(
                self.children
                    .iter()
                    .flat_map(|children| children.iter())
                    .flat_map(|child| child.iter_all_targets()),
            ),
        )
    }

    /// Count total number of targets (self + all descendants)
    pub fn count_targets(&self) -> usize {
        1 + self
            .children
            .as_ref()
            .map(|children| children.iter().map(|child| child.count_targets()).sum())
            .unwrap_or(0)
    }
}

/// A unified config that merges clap arguments with config file values.
/// Provides a `get_one::<T>(key)` interface similar to clap's ArgMatches.
/// CLI arguments take precedence over config file values.
#[derive(Debug)]
pub struct CommandConfig<'a> {
    /// Schema defining the contract between CLI and config
    schema: &'a CommandSchema,
    /// Config file values
    config_values: HashMap<String, Value>,
}

/// Schema that defines the contract between CLI arguments and config file keys.
/// Does not hold ArgMatches - methods take matches as a parameter instead.
#[derive(Debug)]
pub struct CommandSchema {
    /// Key definitions
    keys: Vec<Key>,
    /// Keys excluded from config file
    excluded_keys: HashSet<String>,
    /// Type information for validation (keyed by config name)
    type_map: HashMap<String, TypeId>,
    /// Map from config name to clap arg name (for from_clap mapping)
    config_to_clap: HashMap<String, String>,
    /// Map from config name to alias (for alias mapping)
    config_to_alias: HashMap<String, String>,
}

/// Builder for creating a CommandSchema with custom mappings and exclusions.
pub struct CommandSchemaBuilder {
    /// Keys defined for this command
    keys: Vec<Key>,
    /// Set of keys to exclude from being read from the config file
    excluded_keys: HashSet<String>,
}

impl CommandSchemaBuilder {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            excluded_keys: HashSet::new(),
        }
    }

    /// Add a key definition to the builder.
    /// Example: `.key(Key::new::<String>("server"))`
    pub fn key(mut self, key: Key) -> Self {
        self.keys.push(key);
        self
    }

    /// Exclude a key from being read from the config file.
    /// This is useful for keys that should only come from CLI arguments.
    pub fn exclude(mut self, key: impl Into<String>) -> Self {
        self.excluded_keys.insert(key.into());
        self
    }

    /// Build a CommandSchema by validating against the clap Command.
    ///
    /// # Arguments
    /// * `command` - The clap Command to validate against
    pub fn build(self, command: &Command) -> Result<CommandSchema, CommandConfigError> {
        // Collect all clap argument names for validation
        let clap_arg_names: HashSet<String> = command
            .get_arguments()
            .map(|arg| arg.get_id().as_str().to_string())
            .collect();

        // Check that all the defined keys exist in clap
        for key in &self.keys {
            if !clap_arg_names.contains(key.clap_arg_name()) {
                return Err(CommandConfigError::InvalidClapReference {
                    config_name: key.config_name().to_string(),
                    clap_name: key.clap_arg_name().to_string(),
                });
            }

            // Validate alias if present
            if let Some(alias) = &key.clap_alias {
                if !clap_arg_names.contains(alias) {
                    return Err(CommandConfigError::InvalidAliasReference {
                        config_name: key.config_name().to_string(),
                        alias: alias.clone(),
                    });
                }
            }
        }

        // Validate exclusions reference valid clap arguments
        for excluded_key in &self.excluded_keys {
            if !clap_arg_names.contains(excluded_key) {
                return Err(CommandConfigError::InvalidExclusion {
                    key: excluded_key.clone(),
                });
            }
        }

        let mut type_map = HashMap::new();
        // A list of clap args that are referenced by the config keys
        let mut referenced_clap_args = HashSet::new();
        let mut config_to_clap_map = HashMap::new();
        let mut config_to_alias_map = HashMap::new();

        for key in &self.keys {
            let config_name = key.config_name().to_string();
            let clap_name = key.clap_arg_name().to_string();

            referenced_clap_args.insert(clap_name.clone());
            type_map.insert(config_name.clone(), key.type_id());

            // Track the mapping from config name to clap arg name (if using from_clap)
            if key.clap_name.is_some() {
                config_to_clap_map.insert(config_name.clone(), clap_name.clone());
            }

            // Register the alias if present
            if let Some(alias) = &key.clap_alias {
                referenced_clap_args.insert(alias.clone());
                config_to_alias_map.insert(config_name.clone(), alias.clone());
            }
        }

        // Check that all clap arguments are either referenced or excluded
        for arg in command.get_arguments() {
            let arg_name = arg.get_id().as_str();

            // Skip clap's built-in arguments
            if arg_name == "help" || arg_name == "version" {
                continue;
            }

            if !referenced_clap_args.contains(arg_name) && !self.excluded_keys.contains(arg_name) {
                return Err(CommandConfigError::ClapArgNotDefined {
                    arg_name: arg_name.to_string(),
                });
            }
        }

        Ok(CommandSchema {
            keys: self.keys,
            excluded_keys: self.excluded_keys,
            type_map,
            config_to_clap: config_to_clap_map,
            config_to_alias: config_to_alias_map,
        })
    }
}

impl Default for CommandSchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandSchema {
    /// Get a value from clap arguments only (not from config).
    /// Useful for filtering or checking if a value was provided via CLI.
    pub fn get_clap_arg<T: Clone + Send + Sync + 'static>(
        &self,
        matches: &ArgMatches,
        config_name: &str,
    ) -> Result<Option<T>, CommandConfigError> {
        let requested_type_id = TypeId::of::<T>();

        // Validate type if we have type information
        if let Some(&expected_type_id) = self.type_map.get(config_name) {
            if requested_type_id != expected_type_id {
                let expected_type_name = type_name_from_id(expected_type_id);
                let requested_type_name = std::any::type_name::<T>();

                return Err(CommandConfigError::TypeMismatch {
                    key: config_name.to_string(),
                    requested_type: requested_type_name.to_string(),
                    expected_type: expected_type_name.to_string(),
                });
            }
        }

        // Check clap with mapped name (if from_clap was used, use that name, otherwise use config name)
        let clap_name = self
            .config_to_clap
            .get(config_name)
            .map(|s| s.as_str())
            .unwrap_or(config_name);

        // Only return the value if it was actually provided by the user, not from defaults
        if let Some(source) = matches.value_source(clap_name) {
            if source == clap::parser::ValueSource::CommandLine {
                if let Some(value) = matches.get_one::<T>(clap_name) {
                    return Ok(Some(value.clone()));
                }
            }
        }

        // Try clap with the alias if it exists
        if let Some(alias) = self.config_to_alias.get(config_name) {
            if let Some(source) = matches.value_source(alias) {
                if source == clap::parser::ValueSource::CommandLine {
                    if let Some(value) = matches.get_one::<T>(alias) {
                        return Ok(Some(value.clone()));
                    }
                }
            }
        }

        Ok(None)
    }

    /// Check if a value was provided via CLI (not from config).
    /// Only returns true if the user explicitly provided the value, not if it came from a default.
    pub fn is_from_cli(&self, matches: &ArgMatches, config_name: &str) -> bool {
        // Check clap with mapped name
        let clap_name = self
            .config_to_clap
            .get(config_name)
            .map(|s| s.as_str())
            .unwrap_or(config_name);

        // Use value_source to check if the value was actually provided by the user
        if let Some(source) = matches.value_source(clap_name) {
            if source == clap::parser::ValueSource::CommandLine {
                return true;
            }
        }

        // Check clap with alias
        if let Some(alias) = self.config_to_alias.get(config_name) {
            if let Some(source) = matches.value_source(alias) {
                if source == clap::parser::ValueSource::CommandLine {
                    return true;
                }
            }
        }

        false
    }

    /// Get all module-specific keys that were provided via CLI.
    pub fn module_specific_cli_args(&self, matches: &ArgMatches) -> Vec<&str> {
        self.keys
            .iter()
            .filter(|k| k.module_specific && self.is_from_cli(matches, k.config_name()))
            .map(|k| k.config_name())
            .collect()
    }
}

/// Configuration for a single key in the CommandConfig.
#[derive(Debug, Clone)]
pub struct Key {
    /// The key name in the config file (e.g., "module-path")
    config_name: String,
    /// The corresponding clap argument name (e.g., "project-path"), if different
    clap_name: Option<String>,
    /// Alias for a clap argument, useful for example if we have to deprecate a clap
    /// argument and still allow to use it in the CLI args, but not in the config file
    clap_alias: Option<String>,
    /// Whether this key is module-specific
    module_specific: bool,
    /// Whether this key is required in the config file
    required: bool,
    /// The expected TypeId for this key
    type_id: TypeId,
}

impl Key {
    /// Returns a new Key instance
    pub fn new<T: 'static>(name: impl Into<String>) -> Self {
        Self {
            config_name: name.into(),
            clap_name: None,
            clap_alias: None,
            module_specific: false,
            required: false,
            type_id: TypeId::of::<T>(),
        }
    }

    /// Map this config key to a different clap argument name. When fetching values
    /// the key that is defined should be used.
    /// Example: Key::new::<String>("module-path").from_clap("project-path")
    ///          - in this case the value for either project-path in clap or
    ///            for module-path in the config file will be fetched
    pub fn from_clap(mut self, clap_arg_name: impl Into<String>) -> Self {
        self.clap_name = Some(clap_arg_name.into());
        self
    }

    /// Add an alias for a clap argument name that also maps to this key.
    /// This is useful for backwards compatibility when renaming arguments.
    /// Example: Key::new::<String>("module-path").alias("project-path")
    ///
    /// This allows both --module-path and --project-path to map to the same config key.
    /// The value should then be accessed by using `module-path`
    ///
    /// The difference between from_clap and alias is that from_clap will work by mapping
    /// a single value from clap, whereas alias will check both of them in the CLI args
    pub fn alias(mut self, alias_name: impl Into<String>) -> Self {
        self.clap_alias = Some(alias_name.into());
        self
    }

    /// Mark this key as module-specific. For example, the `js-bin` config option makes sense
    /// only when applied to a single module. The `server` config option makes sense for
    /// multiple publish targets
    pub fn module_specific(mut self) -> Self {
        self.module_specific = true;
        self
    }

    /// Mark this key as required in the config file. If a config file is provided but
    /// this key is missing, an error will be returned.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Get the clap argument name (either the mapped name or the config name)
    pub fn clap_arg_name(&self) -> &str {
        self.clap_name.as_deref().unwrap_or(&self.config_name)
    }

    /// Get the config name
    pub fn config_name(&self) -> &str {
        &self.config_name
    }

    /// Get the type_id
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Check if this key is required
    pub fn is_required(&self) -> bool {
        self.required
    }
}

impl<'a> CommandConfig<'a> {
    /// Create a new CommandConfig by validating config values against a schema.
    ///
    /// # Arguments
    /// * `schema` - The command schema that defines valid keys and types
    /// * `config_values` - Values from the config file
    ///
    /// # Errors
    /// Returns an error if any config keys are not defined in the schema.
    /// Note: Required key validation happens when get_one() is called, not during construction.
    pub fn new(schema: &'a CommandSchema, config_values: HashMap<String, Value>) -> Result<Self, CommandConfigError> {
        // Normalize keys from kebab-case to snake_case to match clap's Arg::new() convention
        let normalized_values: HashMap<String, Value> = config_values
            .into_iter()
            .map(|(k, v)| (k.replace('-', "_"), v))
            .collect();

        // Build set of valid config keys from schema
        let valid_config_keys: HashSet<String> = schema.keys.iter().map(|k| k.config_name().to_string()).collect();

        // Check that all keys in config file are defined in schema
        for config_key in normalized_values.keys() {
            if !valid_config_keys.contains(config_key) {
                return Err(CommandConfigError::UnsupportedConfigKey {
                    config_key: config_key.clone(),
                    available_keys: valid_config_keys
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }

        Ok(CommandConfig {
            schema,
            config_values: normalized_values,
        })
    }

    /// Get a single value from the config as a specific type.
    /// First checks clap args (via schema), then falls back to config values.
    /// Validates that the requested type matches the schema definition.
    ///
    /// Returns:
    /// - Ok(Some(T)) if the value exists and can be converted
    /// - Ok(None) if the value doesn't exist in either clap or config
    /// - Err if the type doesn't match or conversion fails
    pub fn get_one<T: Clone + Send + Sync + 'static>(
        &self,
        matches: &ArgMatches,
        key: &str,
    ) -> Result<Option<T>, CommandConfigError> {
        // Try clap arguments first (CLI takes precedence) via schema
        let from_cli = self.schema.get_clap_arg::<T>(matches, key)?;
        if let Some(ref value) = from_cli {
            return Ok(Some(value.clone()));
        }

        // Fall back to config values using the config name
        if let Some(value) = self.config_values.get(key) {
            from_json_value::<T>(value)
                .map_err(|source| CommandConfigError::ConversionError {
                    key: key.to_string(),
                    target_type: std::any::type_name::<T>().to_string(),
                    source,
                })
                .map(Some)
        } else {
            Ok(None)
        }
    }

    /// Check if a key exists in either clap or config.
    pub fn contains(&self, matches: &ArgMatches, key: &str) -> bool {
        // Check if provided via CLI using schema
        if self.schema.is_from_cli(matches, key) {
            return true;
        }

        // Check config key
        self.config_values.contains_key(key)
    }

    /// Validate that all required keys are present in the config file.
    /// Note: This only checks config file keys. CLI required validation is handled by clap.
    pub fn validate(&self) -> Result<(), CommandConfigError> {
        for key in &self.schema.keys {
            if key.is_required() && !self.config_values.contains_key(key.config_name()) {
                return Err(CommandConfigError::MissingRequiredKey {
                    key: key.config_name().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Helper to get a human-readable type name from a TypeId
fn type_name_from_id(type_id: TypeId) -> &'static str {
    if type_id == TypeId::of::<String>() {
        "alloc::string::String"
    } else if type_id == TypeId::of::<PathBuf>() {
        "std::path::PathBuf"
    } else if type_id == TypeId::of::<bool>() {
        "bool"
    } else if type_id == TypeId::of::<i64>() {
        "i64"
    } else if type_id == TypeId::of::<u64>() {
        "u64"
    } else if type_id == TypeId::of::<f64>() {
        "f64"
    } else if type_id == TypeId::of::<Language>() {
        "spacetimedb_cli::subcommands::generate::Language"
    } else {
        "unknown"
    }
}

/// Helper to convert JSON values to Rust types (for config file values)
fn from_json_value<T: Clone + Send + Sync + 'static>(value: &Value) -> anyhow::Result<T> {
    let type_id = TypeId::of::<T>();

    let any: Box<dyn std::any::Any> = match type_id {
        t if t == TypeId::of::<String>() => Box::new(value.as_str().context("Expected string value")?.to_string()),
        t if t == TypeId::of::<PathBuf>() => Box::new(PathBuf::from(
            value.as_str().context("Expected string value for PathBuf")?,
        )),
        t if t == TypeId::of::<bool>() => Box::new(value.as_bool().context("Expected boolean value")?),
        t if t == TypeId::of::<i64>() => Box::new(value.as_i64().context("Expected i64 value")?),
        t if t == TypeId::of::<u64>() => Box::new(value.as_u64().context("Expected u64 value")?),
        t if t == TypeId::of::<f64>() => Box::new(value.as_f64().context("Expected f64 value")?),
        t if t == TypeId::of::<Language>() => {
            let s = value.as_str().context("Expected string value for Language")?;
            // Use ValueEnum's from_str method which handles aliases automatically
            let lang = Language::from_str(s, true).map_err(|_| anyhow::anyhow!("Invalid language: {}", s))?;
            Box::new(lang)
        }
        _ => anyhow::bail!("Unsupported type for conversion from JSON"),
    };

    // Now downcast to T
    any.downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| anyhow::anyhow!("Failed to downcast value"))
}

impl SpacetimeConfig {
    /// Find and load a spacetime.json file.
    ///
    /// Searches for spacetime.json starting from the current directory
    /// and walking up the directory tree until found or filesystem root is reached.
    ///
    /// Returns `Ok(Some((path, config)))` if found and successfully parsed.
    /// Returns `Ok(None)` if not found.
    /// Returns `Err` if found but failed to parse.
    pub fn find_and_load() -> anyhow::Result<Option<(PathBuf, Self)>> {
        Self::find_and_load_from(std::env::current_dir()?)
    }

    /// Find and load a spacetime.json file starting from a specific directory.
    ///
    /// Searches for spacetime.json starting from `start_dir`
    /// and walking up the directory tree until found or filesystem root is reached.
    pub fn find_and_load_from(start_dir: PathBuf) -> anyhow::Result<Option<(PathBuf, Self)>> {
        let mut current_dir = start_dir;
        loop {
            let config_path = current_dir.join("spacetime.json");
            if config_path.exists() {
                let config = Self::load(&config_path)
                    .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
                return Ok(Some((config_path, config)));
            }

            // Try to go up one directory
            if !current_dir.pop() {
                // Reached filesystem root
                break;
            }
        }
        Ok(None)
    }

    /// Load a spacetime.json file from a specific path.
    ///
    /// The file must exist and be valid JSON5 format (supports comments).
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = json5::from_str(&content)
            .with_context(|| format!("Failed to parse config file as JSON: {}", path.display()))?;

        Ok(config)
    }

    /// Save the config to a file.
    ///
    /// The config will be serialized as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, json).with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Create a spacetime.json file in the current directory with the given config.
    pub fn create_in_current_dir(&self) -> anyhow::Result<PathBuf> {
        let config_path = std::env::current_dir()?.join("spacetime.json");
        self.save(&config_path)?;
        Ok(config_path)
    }
}
