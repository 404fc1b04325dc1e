//! Multi-file configuration loading.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Loads a configuration file and its includes, rejecting include cycles and
/// sections defined in more than one file.
pub struct ConfigLoader {
	base_path: PathBuf,
	loaded_files: HashSet<PathBuf>,
	section_sources: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			loaded_files: HashSet::new(),
			section_sources: HashMap::new(),
		}
	}

	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;
		let main_content = self.load_file(&config_path).await?;
		let main_toml: toml::Table = toml::from_str(&main_content)?;

		let includes = extract_includes(&main_toml)?;
		if includes.is_empty() {
			return main_content.parse();
		}

		let combined = self.combine(main_toml, includes, config_path).await?;
		let combined = toml::to_string(&combined).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		combined.parse()
	}

	async fn load_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Cannot resolve path {}: {}", path.display(), e),
			))
		})?;
		if !self.loaded_files.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}

	async fn combine(
		&mut self,
		mut main: toml::Table,
		includes: Vec<PathBuf>,
		main_path: PathBuf,
	) -> Result<toml::Table, ConfigError> {
		main.remove("include");
		for key in main.keys() {
			self.section_sources.insert(key.clone(), main_path.clone());
		}

		for include in includes {
			let path = self.resolve_path(&include)?;
			let content = self.load_file(&path).await?;
			let included: toml::Table = toml::from_str(&content)?;
			if included.contains_key("include") {
				return Err(ConfigError::Validation(format!(
					"Nested include in {} is not supported",
					path.display()
				)));
			}

			for (key, value) in included {
				if let Some(existing) = self.section_sources.get(&key) {
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}",
						key,
						existing.display(),
						path.display()
					)));
				}
				self.section_sources.insert(key.clone(), path.clone());
				main.insert(key, value);
			}
		}
		Ok(main)
	}

	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};
		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}
		Ok(resolved)
	}
}

fn extract_includes(toml: &toml::Table) -> Result<Vec<PathBuf>, ConfigError> {
	match toml.get("include") {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(items)) => items
			.iter()
			.map(|item| {
				item.as_str().map(PathBuf::from).ok_or_else(|| {
					ConfigError::Validation("Include array must contain only strings".into())
				})
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tests::BASE;
	use std::fs;
	use tempfile::TempDir;

	const VENUES: &str = r#"
[[adapters]]
id = 1
kind = "fixed_rate"
target = "0xadadadadadadadadadadadadadadadadadadadad"
numerator = 1
denominator = 1
"#;

	#[tokio::test]
	async fn test_single_file() {
		let dir = TempDir::new().unwrap();
		fs::write(dir.path().join("styx.toml"), BASE).unwrap();

		let config = Config::from_file(dir.path().join("styx.toml").to_str().unwrap())
			.await
			.unwrap();
		assert_eq!(config.storage.primary, "memory");
		assert!(config.adapters.is_empty());
	}

	#[tokio::test]
	async fn test_includes_are_merged() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("main.toml"),
			format!("include = [\"venues.toml\"]\n{}", BASE),
		)
		.unwrap();
		fs::write(dir.path().join("venues.toml"), VENUES).unwrap();

		let mut loader = ConfigLoader::new(dir.path());
		let config = loader.load_config("main.toml").await.unwrap();
		assert_eq!(config.adapters.len(), 1);
		assert_eq!(config.adapters[0].id, 1);
	}

	#[tokio::test]
	async fn test_duplicate_section() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("main.toml"),
			format!("include = \"dup.toml\"\n{}", BASE),
		)
		.unwrap();
		fs::write(dir.path().join("dup.toml"), "[storage]\nprimary = \"file\"\n").unwrap();

		let mut loader = ConfigLoader::new(dir.path());
		let err = loader.load_config("main.toml").await.unwrap_err();
		assert!(err.to_string().contains("Duplicate section 'storage'"));
	}

	#[tokio::test]
	async fn test_self_include() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("self.toml"),
			format!("include = [\"self.toml\"]\n{}", BASE),
		)
		.unwrap();

		let mut loader = ConfigLoader::new(dir.path());
		let err = loader.load_config("self.toml").await.unwrap_err();
		assert!(err.to_string().contains("already loaded"));
	}

	#[tokio::test]
	async fn test_missing_include() {
		let dir = TempDir::new().unwrap();
		fs::write(
			dir.path().join("main.toml"),
			format!("include = [\"nope.toml\"]\n{}", BASE),
		)
		.unwrap();

		let mut loader = ConfigLoader::new(dir.path());
		assert!(matches!(
			loader.load_config("main.toml").await,
			Err(ConfigError::Io(_))
		));
	}
}
