#![allow(dead_code)]

use hashmake::config::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                ..RawConfigFile::default()
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.config.config.target = Some(target.to_string());
        self
    }

    pub fn with_cache(mut self, cache: &str) -> Self {
        self.config.config.cache = cache.to_string();
        self
    }

    pub fn with_option(mut self, name: &str, value: impl Into<toml::Value>) -> Self {
        self.config.options.insert(name.to_string(), value.into());
        self
    }

    /// The unvalidated config, for exercising validation errors.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                needs: vec![],
                inputs: vec![],
                output: None,
            },
        }
    }

    pub fn needs(mut self, dep: &str) -> Self {
        self.task.needs.push(dep.to_string());
        self
    }

    pub fn input(mut self, pattern: &str) -> Self {
        self.task.inputs.push(pattern.to_string());
        self
    }

    pub fn output(mut self, path: &str) -> Self {
        self.task.output = Some(path.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
