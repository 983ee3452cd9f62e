//! Client-side ring over multiple servers
//!
//! One client connection per server address, plus a consistent-hash router
//! keyed by those addresses. Every operation resolves its key to a member
//! and delegates; the ring itself holds no other state.

use crate::client::{Client, Filled};
use crate::common::{Error, HashRing, Result, ShardRouter};
use std::collections::HashMap;

pub struct Ring {
    clients: HashMap<String, Client>,
    router: Box<dyn ShardRouter + Send + Sync>,
}

impl Ring {
    /// Open one connection per address. Fails if any server is unreachable.
    pub async fn connect<S: AsRef<str>>(addrs: &[S]) -> Result<Self> {
        if addrs.is_empty() {
            return Err(Error::InvalidConfig(
                "ring needs at least one server address".into(),
            ));
        }
        let mut router: Box<dyn ShardRouter + Send + Sync> =
            Box::new(HashRing::with_default_vnodes());
        let mut clients = HashMap::new();
        for addr in addrs {
            let addr = addr.as_ref().to_string();
            let client = Client::connect(&addr).await?;
            router.add(&addr);
            clients.insert(addr, client);
        }
        tracing::debug!("ring connected to {} server(s)", clients.len());
        Ok(Self { clients, router })
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Close every member connection.
    pub async fn close(self) -> Result<()> {
        for (_, client) in self.clients {
            client.close().await?;
        }
        Ok(())
    }

    fn client_for(&mut self, key: &str) -> Result<&mut Client> {
        let name = self
            .router
            .resolve(key)
            .ok_or_else(|| Error::Internal("ring has no members".into()))?;
        self.clients
            .get_mut(name)
            .ok_or_else(|| Error::Internal(format!("ring resolved unknown member: {}", name)))
    }

    pub async fn get_bytes(&mut self, key: &str) -> Result<Vec<u8>> {
        self.client_for(key)?.get_bytes(key).await
    }

    pub async fn get_bytes_into(&mut self, key: &str, dst: &mut [u8]) -> Result<Filled> {
        self.client_for(key)?.get_bytes_into(key, dst).await
    }

    pub async fn get_bytes_range(&mut self, key: &str, start: u32, end: u32) -> Result<Vec<u8>> {
        self.client_for(key)?.get_bytes_range(key, start, end).await
    }

    pub async fn get_bytes_range_into(
        &mut self,
        key: &str,
        start: u32,
        end: u32,
        dst: &mut [u8],
    ) -> Result<Filled> {
        self.client_for(key)?
            .get_bytes_range_into(key, start, end, dst)
            .await
    }

    pub async fn set_bytes(&mut self, key: &str, data: &[u8]) -> Result<()> {
        self.client_for(key)?.set_bytes(key, data).await
    }

    pub async fn set_bytes_range(&mut self, key: &str, start: u32, data: &[u8]) -> Result<()> {
        self.client_for(key)?.set_bytes_range(key, start, data).await
    }

    pub async fn del_bytes(&mut self, key: &str) -> Result<()> {
        self.client_for(key)?.del_bytes(key).await
    }

    pub async fn truncate_bytes(&mut self, key: &str, size: u32) -> Result<()> {
        self.client_for(key)?.truncate_bytes(key, size).await
    }

    pub async fn set_uint(&mut self, key: &str, value: u32) -> Result<()> {
        self.client_for(key)?.set_uint(key, value).await
    }

    pub async fn get_uint(&mut self, key: &str) -> Result<u32> {
        self.client_for(key)?.get_uint(key).await
    }

    pub async fn set_uint_if_max(&mut self, key: &str, value: u32) -> Result<()> {
        self.client_for(key)?.set_uint_if_max(key, value).await
    }

    pub async fn del_uint(&mut self, key: &str) -> Result<()> {
        self.client_for(key)?.del_uint(key).await
    }
}
