//! Registry backed by a JSON document served over HTTP.

// self
use crate::{
	_prelude::*,
	auth::ClientId,
	http,
	registry::{self, ClientRecord, ClientRegistry, RegistryError, RegistryFuture},
};

/// Fetches the registry document on every lookup.
///
/// The document is a JSON array of [`ClientRecord`]s. Any transport, status, or parse failure
/// surfaces as a [`RegistryError`], which the issuer reports as a server error.
#[derive(Clone, Debug)]
pub struct RemoteRegistry {
	http_client: ReqwestClient,
	url: Url,
}
impl RemoteRegistry {
	/// Creates a registry reading `url` through the shared client.
	pub fn new(http_client: ReqwestClient, url: Url) -> Self {
		Self { http_client, url }
	}

	async fn fetch_records(&self) -> Result<Vec<ClientRecord>, RegistryError> {
		let unavailable = |message: &str, source| RegistryError::Unavailable {
			message: message.into(),
			source: Some(source),
		};
		let response = self
			.http_client
			.get(self.url.clone())
			.send()
			.await
			.map_err(|e| unavailable("request failed", e))?;
		let status = response.status();
		let bytes = response.bytes().await.map_err(|e| unavailable("body read failed", e))?;

		if !status.is_success() {
			return Err(RegistryError::Unavailable {
				message: format!("status {}: {}", status.as_u16(), http::body_preview(&bytes)),
				source: None,
			});
		}

		registry::parse_registry_document(&bytes)
	}
}
impl ClientRegistry for RemoteRegistry {
	fn lookup<'a>(&'a self, client_id: &'a ClientId) -> RegistryFuture<'a, Option<ClientRecord>> {
		Box::pin(async move {
			let records = self.fetch_records().await?;

			Ok(records.into_iter().find(|record| &record.client_id == client_id))
		})
	}
}
