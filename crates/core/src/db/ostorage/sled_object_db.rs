use crate::db::ostorage::ObjectDB;
use crate::error::DBError;
use crate::hash::{hash_bytes, Hash};
use bytes::Bytes;
use sled;
use sled::Mode::HighThroughput;
use std::path::Path;

pub struct SledObjectDB {
    db: sled::Db,
}

impl SledObjectDB {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DBError> {
        let config = sled::Config::default()
            .path(path)
            .flush_every_ms(Some(50))
            .mode(HighThroughput);
        let db = config.open()?;
        Ok(Self { db })
    }
}

impl ObjectDB for SledObjectDB {
    fn add(&mut self, bytes: Vec<u8>) -> Hash {
        let hash = hash_bytes(&bytes);

        self.db.insert(hash.data.as_slice(), bytes.as_slice()).unwrap();

        hash
    }

    fn get(&self, hash: Hash) -> Option<Bytes> {
        match self.db.get(hash.as_slice()) {
            Ok(v) => v.map(|v| bytes::Bytes::from(v.to_vec())),
            Err(_) => None,
        }
    }

    fn flush(&mut self) -> Result<(), DBError> {
        match self.db.flush() {
            Ok(_) => Ok(()),
            Err(e) => Err(DBError::SledDbError(e)),
        }
    }

    fn sync_all(&mut self) -> Result<(), DBError> {
        self.flush()
    }

    fn size_on_disk(&self) -> Result<u64, DBError> {
        Ok(self.db.size_on_disk()?)
    }
}
