use sha2::{Digest, Sha256};

/// Connection settings of a remote repository, as supplied by the
/// repository-configuration store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: String,
    pub name: String,
    /// Host name or address of the remote server
    pub address: String,
    pub port: u16,
    pub username: String,
    /// Never part of the fingerprint
    pub password: String,
}

impl Repository {
    pub fn fingerprint(&self) -> String {
        current_fingerprint(&self.address, self.port, &self.username)
    }
}

/// SHA256 of `address:port:username`, hex encoded
///
/// Credentials are excluded so a password rotation keeps the cache usable.
/// The output is always 64 lowercase hex characters, so fingerprints compare
/// by plain string equality.
pub fn current_fingerprint(address: &str, port: u16, username: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}", address, port, username).as_bytes());
    let result = hasher.finalize();
    format!("{:x}", result)
}
