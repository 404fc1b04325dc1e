//! File storage backend.
//!
//! Each key `namespace:id` is stored at `<storage_path>/<namespace>/<id>.bin`
//! behind a fixed 32-byte header carrying the expiry time. Writes go to a
//! temporary file that is renamed into place.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use styx_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, StorageKey, ValidationError,
};
use tokio::fs;

const EXTENSION: &str = "bin";

fn now_secs() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}

/// Header layout (32 bytes): magic `STYX`, version u16 LE, expiry u64 LE
/// in unix seconds (0 = never), zero padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileHeader {
	version: u16,
	expires_at: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"STYX";
	const VERSION: u16 = 1;
	const SIZE: usize = 32;

	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0
		} else {
			now_secs().saturating_add(ttl.as_secs())
		};
		Self {
			version: Self::VERSION,
			expires_at,
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE || &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Missing file header".into()));
		}
		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}
		let mut expires = [0u8; 8];
		expires.copy_from_slice(&bytes[6..14]);
		Ok(Self {
			version,
			expires_at: u64::from_le_bytes(expires),
		})
	}

	fn is_expired(&self) -> bool {
		self.expires_at != 0 && now_secs() >= self.expires_at
	}
}

/// Default TTL per namespace, from `ttl_<namespace>` settings.
#[derive(Debug, Clone, Default)]
pub struct TtlConfig {
	ttls: HashMap<StorageKey, Duration>,
}

impl TtlConfig {
	fn from_config(config: &toml::Value) -> Self {
		let ttls = StorageKey::all()
			.filter_map(|key| {
				config
					.get(format!("ttl_{}", key.as_str()))
					.and_then(|v| v.as_integer())
					.map(|secs| (key, Duration::from_secs(secs.max(0) as u64)))
			})
			.collect();
		Self { ttls }
	}

	fn ttl_for(&self, namespace: &str) -> Duration {
		namespace
			.parse::<StorageKey>()
			.ok()
			.and_then(|key| self.ttls.get(&key).copied())
			.unwrap_or(Duration::ZERO)
	}
}

pub struct FileStorage {
	base_path: PathBuf,
	ttl_config: TtlConfig,
}

impl FileStorage {
	pub fn new(base_path: PathBuf, ttl_config: TtlConfig) -> Self {
		Self {
			base_path,
			ttl_config,
		}
	}

	fn sanitize(part: &str) -> String {
		part.replace(['/', '\\', ':', '.'], "_")
	}

	fn split(key: &str) -> (&str, &str) {
		key.split_once(':').unwrap_or(("default", key))
	}

	fn namespace_dir(&self, namespace: &str) -> PathBuf {
		self.base_path.join(Self::sanitize(namespace))
	}

	fn file_path(&self, key: &str) -> PathBuf {
		let (namespace, id) = Self::split(key);
		self.namespace_dir(namespace)
			.join(format!("{}.{}", Self::sanitize(id), EXTENSION))
	}

	async fn read_entry(
		&self,
		path: &Path,
	) -> Result<Option<(FileHeader, Vec<u8>)>, StorageError> {
		let data = match fs::read(path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};
		let header = FileHeader::deserialize(&data)?;
		Ok(Some((header, data[FileHeader::SIZE..].to_vec())))
	}

	async fn data_files(&self) -> Result<Vec<PathBuf>, StorageError> {
		let mut files = Vec::new();
		let mut dirs = match fs::read_dir(&self.base_path).await {
			Ok(dirs) => dirs,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};
		while let Some(dir) = dirs
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			if !dir.path().is_dir() {
				continue;
			}
			let mut entries = fs::read_dir(dir.path())
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
			while let Some(entry) = entries
				.next_entry()
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?
			{
				let path = entry.path();
				if path.extension().is_some_and(|ext| ext == EXTENSION) {
					files.push(path);
				}
			}
		}
		Ok(files)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		match self.read_entry(&self.file_path(key)).await? {
			Some((header, _)) if header.is_expired() => Err(StorageError::NotFound),
			Some((_, data)) => Ok(data),
			None => Err(StorageError::NotFound),
		}
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let path = self.file_path(key);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)
				.await
				.map_err(|e| StorageError::Backend(e.to_string()))?;
		}

		let ttl = ttl.unwrap_or_else(|| self.ttl_config.ttl_for(Self::split(key).0));
		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&FileHeader::new(ttl).serialize());
		file_data.extend_from_slice(&value);

		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.file_path(key)).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(matches!(
			self.read_entry(&self.file_path(key)).await?,
			Some((header, _)) if !header.is_expired()
		))
	}

	async fn list_ids(&self, namespace: &str) -> Result<Vec<String>, StorageError> {
		let mut entries = match fs::read_dir(self.namespace_dir(namespace)).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};
		let mut ids = Vec::new();
		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if !path.extension().is_some_and(|ext| ext == EXTENSION) {
				continue;
			}
			if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
				ids.push(stem.to_string());
			}
		}
		Ok(ids)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		let mut removed = 0;
		for path in self.data_files().await? {
			match self.read_entry(&path).await {
				Ok(Some((header, _))) if header.is_expired() => {
					if let Err(e) = fs::remove_file(&path).await {
						tracing::warn!("Failed to remove expired file {:?}: {}", path, e);
					} else {
						removed += 1;
					}
				},
				Ok(_) => {},
				Err(e) => tracing::debug!("Skipping file {:?}: {}", path, e),
			}
		}
		Ok(removed)
	}
}

pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let mut optional = vec![Field::new("storage_path", FieldType::String)];
		optional.extend(StorageKey::all().map(|key| {
			Field::new(
				format!("ttl_{}", key.as_str()),
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			)
		}));
		Schema::new(vec![], optional).validate(config)
	}
}

/// Builds a file backend.
///
/// Configuration parameters:
/// - `storage_path`: base directory (default: "./data/storage")
/// - `ttl_addresses`, `ttl_settlements`: default TTL in seconds (default: 0, never)
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage");

	Ok(Box::new(FileStorage::new(
		PathBuf::from(storage_path),
		TtlConfig::from_config(config),
	)))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = crate::StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl crate::StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	fn storage(dir: &TempDir) -> FileStorage {
		FileStorage::new(dir.path().to_path_buf(), TtlConfig::default())
	}

	#[tokio::test]
	async fn test_write_read_delete() {
		let dir = TempDir::new().unwrap();
		let storage = storage(&dir);

		storage.set_bytes("settlements:abc", b"hello".to_vec(), None).await.unwrap();
		assert_eq!(storage.get_bytes("settlements:abc").await.unwrap(), b"hello");
		assert!(dir.path().join("settlements").join("abc.bin").exists());
		assert!(storage.exists("settlements:abc").await.unwrap());

		storage.delete("settlements:abc").await.unwrap();
		storage.delete("settlements:abc").await.unwrap();
		assert!(matches!(
			storage.get_bytes("settlements:abc").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_list_ids_survives_reopen() {
		let dir = TempDir::new().unwrap();
		{
			let storage = storage(&dir);
			for id in ["0", "1", "2"] {
				storage.set_bytes(&format!("addresses:{}", id), vec![1], None).await.unwrap();
			}
		}
		let reopened = storage(&dir);
		let mut ids = reopened.list_ids("addresses").await.unwrap();
		ids.sort();
		assert_eq!(ids, vec!["0", "1", "2"]);
		assert!(reopened.list_ids("settlements").await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_expired_entries_are_hidden_and_cleaned() {
		let dir = TempDir::new().unwrap();
		let storage = storage(&dir);

		let path = storage.file_path("settlements:old");
		fs::create_dir_all(path.parent().unwrap()).await.unwrap();
		let header = FileHeader {
			version: FileHeader::VERSION,
			expires_at: 1,
		};
		let mut data = header.serialize().to_vec();
		data.extend_from_slice(b"stale");
		fs::write(&path, data).await.unwrap();
		storage.set_bytes("settlements:new", b"fresh".to_vec(), None).await.unwrap();

		assert!(matches!(
			storage.get_bytes("settlements:old").await,
			Err(StorageError::NotFound)
		));
		assert!(!storage.exists("settlements:old").await.unwrap());
		assert_eq!(storage.cleanup_expired().await.unwrap(), 1);
		assert!(!path.exists());
		assert!(storage.exists("settlements:new").await.unwrap());
	}

	#[test]
	fn test_ttl_config_from_toml() {
		let config = toml::Value::Table(
			toml::from_str::<toml::Table>("ttl_settlements = 3600").unwrap(),
		);
		assert!(FileStorageSchema.validate(&config).is_ok());
		let ttls = TtlConfig::from_config(&config);
		assert_eq!(ttls.ttl_for("settlements"), Duration::from_secs(3600));
		assert_eq!(ttls.ttl_for("addresses"), Duration::ZERO);

		let bad = toml::Value::Table(toml::from_str::<toml::Table>("ttl_settlements = -1").unwrap());
		assert!(create_storage(&bad).is_err());
	}

	#[test]
	fn test_header_round_trip() {
		let header = FileHeader::new(Duration::from_secs(60));
		let parsed = FileHeader::deserialize(&header.serialize()).unwrap();
		assert_eq!(parsed, header);
		assert!(!parsed.is_expired());
		assert!(FileHeader::deserialize(b"short").is_err());
	}
}
