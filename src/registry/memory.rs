//! Thread-safe in-memory [`ClientRegistry`] for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::ClientId,
	registry::{self, ClientRecord, ClientRegistry, RegistryError, RegistryFuture},
};

type RecordMap = Arc<RwLock<HashMap<ClientId, ClientRecord>>>;

/// Registry that keeps client records in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryRegistry(RecordMap);
impl MemoryRegistry {
	/// Builds a registry from records; later duplicates replace earlier ones.
	pub fn from_records<I>(records: I) -> Self
	where
		I: IntoIterator<Item = ClientRecord>,
	{
		let map = records.into_iter().map(|record| (record.client_id.clone(), record)).collect();

		Self(Arc::new(RwLock::new(map)))
	}

	/// Builds a registry from a registry document.
	pub fn from_json(document: &[u8]) -> Result<Self, RegistryError> {
		Ok(Self::from_records(registry::parse_registry_document(document)?))
	}

	/// Inserts or replaces a record.
	pub fn insert(&self, record: ClientRecord) {
		self.0.write().insert(record.client_id.clone(), record);
	}

	/// Number of registered clients.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns true when no clients are registered.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl ClientRegistry for MemoryRegistry {
	fn lookup<'a>(&'a self, client_id: &'a ClientId) -> RegistryFuture<'a, Option<ClientRecord>> {
		let record = self.0.read().get(client_id).cloned();

		Box::pin(async move { Ok(record) })
	}
}
