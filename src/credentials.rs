use std::{fmt, path::Path};

use alloy::{
    primitives::{Address, B256},
    signers::local::PrivateKeySigner,
};
use tokio::io::AsyncBufReadExt;

use crate::error::CredentialError;

const SECRET_HEX_LEN: usize = 64;

/// A validated private key together with the address it signs for.
#[derive(Clone)]
pub struct Credential {
    signer: PrivateKeySigner,
    identity: Address,
    line: usize,
}

impl Credential {
    pub fn new(raw: &str, line: usize) -> Result<Self, CredentialError> {
        let (signer, identity) = validate_secret(raw)?;
        Ok(Self {
            signer,
            identity,
            line,
        })
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn identity(&self) -> Address {
        self.identity
    }

    /// Short worker tag used in log lines, e.g. `W007`.
    pub fn label(&self) -> String {
        format!("W{:03}", self.line)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .field("line", &self.line)
            .field("secret", &"***REDACTED***")
            .finish()
    }
}

/// Checks that `raw` is a 64 character hex string (optionally `0x` prefixed)
/// and derives the address it controls.
pub fn validate_secret(raw: &str) -> Result<(PrivateKeySigner, Address), CredentialError> {
    let trimmed = raw.trim();
    let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    if hex.len() != SECRET_HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CredentialError::InvalidFormat {
            length: hex.chars().count(),
        });
    }

    let bytes: B256 = hex
        .parse()
        .map_err(|_| CredentialError::InvalidFormat { length: hex.len() })?;
    let signer = PrivateKeySigner::from_bytes(&bytes).map_err(|e| CredentialError::Derivation {
        reason: e.to_string(),
    })?;
    let identity = signer.address();

    Ok((signer, identity))
}

/// Abbreviates an address for log output: `0x12345678...9abcdef0`.
pub fn short_identity(identity: &Address) -> String {
    let full = identity.to_string();
    format!("{}...{}", &full[..10], &full[full.len() - 8..])
}

#[derive(Debug, Default)]
pub struct LoadedCredentials {
    pub credentials: Vec<Credential>,
    pub rejected: Vec<(usize, CredentialError)>,
}

/// Parses one secret per line. Blank lines and `#` comments are ignored,
/// malformed lines are logged and collected in `rejected`.
pub fn parse_credentials(contents: &str) -> LoadedCredentials {
    let mut loaded = LoadedCredentials::default();

    for (index, line) in contents.lines().enumerate() {
        let line_num = index + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match Credential::new(line, line_num) {
            Ok(credential) => {
                tracing::info!(
                    "Private key #{line_num} is valid: {}",
                    short_identity(&credential.identity())
                );
                loaded.credentials.push(credential);
            }
            Err(e) => {
                tracing::warn!("Private key #{line_num} rejected: {e}");
                loaded.rejected.push((line_num, e));
            }
        }
    }

    loaded
}

pub async fn read_file_lines(path: impl AsRef<Path>) -> eyre::Result<Vec<String>> {
    let file = tokio::fs::read(path).await?;
    let mut lines = file.lines();

    let mut contents = vec![];
    while let Some(line) = lines.next_line().await? {
        contents.push(line);
    }

    Ok(contents)
}

pub async fn read_private_keys(path: impl AsRef<Path>) -> eyre::Result<Vec<Credential>> {
    let path = path.as_ref();
    let lines = read_file_lines(path)
        .await
        .map_err(|e| eyre::eyre!("Failed to read private keys file {}: {e}", path.display()))?;

    let loaded = parse_credentials(&lines.join("\n"));
    tracing::info!(
        "Loaded {} valid private keys from {} ({} rejected)",
        loaded.credentials.len(),
        path.display(),
        loaded.rejected.len()
    );

    Ok(loaded.credentials)
}
