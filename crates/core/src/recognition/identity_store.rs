use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use thiserror::Error;

/// Identity store wire format, version 1 (little-endian):
///
/// ```text
/// magic    [u8;4]  = "FGID"
/// version  u16
/// count    u32
/// dim      u32
/// vectors  count * dim * f32
/// names    count * { len: u32, utf8 bytes }
/// ```
pub const STORE_MAGIC: [u8; 4] = *b"FGID";
pub const STORE_VERSION: u16 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access identity store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("not an identity store (bad magic)")]
    BadMagic,
    #[error("unsupported store version {0}")]
    UnsupportedVersion(u16),
    #[error("identity store is truncated")]
    Truncated,
    #[error("{0} identities with zero-dimensional embeddings")]
    ZeroDimension(usize),
    #[error("identity store declares an implausible size")]
    SizeOverflow,
    #[error("identity name is not valid UTF-8")]
    InvalidName(#[from] std::string::FromUtf8Error),
    #[error("{names} names but {embeddings} embeddings")]
    LengthMismatch { names: usize, embeddings: usize },
}

/// The known-identity set: `names[i]` labels `embeddings.row(i)`.
///
/// The pairing is enforced at construction and the set is only ever replaced
/// wholesale, never patched in place.
#[derive(Clone, Debug)]
pub struct KnownIdentities {
    names: Vec<String>,
    embeddings: Array2<f32>,
}

impl KnownIdentities {
    pub fn new(names: Vec<String>, embeddings: Array2<f32>) -> Result<Self, StoreError> {
        if names.len() != embeddings.nrows() {
            return Err(StoreError::LengthMismatch {
                names: names.len(),
                embeddings: embeddings.nrows(),
            });
        }
        Ok(Self { names, embeddings })
    }

    pub fn empty() -> Self {
        Self {
            names: Vec::new(),
            embeddings: Array2::zeros((0, 0)),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn embeddings(&self) -> &Array2<f32> {
        &self.embeddings
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.embeddings.ncols()
    }
}

pub fn encode(identities: &KnownIdentities) -> Vec<u8> {
    let count = identities.len() as u32;
    let dim = identities.dim() as u32;
    let mut out = Vec::with_capacity(14 + identities.embeddings.len() * 4);
    out.extend_from_slice(&STORE_MAGIC);
    out.extend_from_slice(&STORE_VERSION.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());
    out.extend_from_slice(&dim.to_le_bytes());
    for value in identities.embeddings.iter() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    for name in &identities.names {
        out.extend_from_slice(&(name.len() as u32).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
    }
    out
}

pub fn decode(bytes: &[u8]) -> Result<KnownIdentities, StoreError> {
    let mut reader = Reader::new(bytes);

    if reader.take(4)? != STORE_MAGIC {
        return Err(StoreError::BadMagic);
    }
    let version = reader.u16()?;
    if version != STORE_VERSION {
        return Err(StoreError::UnsupportedVersion(version));
    }
    let count = reader.u32()? as usize;
    let dim = reader.u32()? as usize;
    if count > 0 && dim == 0 {
        return Err(StoreError::ZeroDimension(count));
    }

    let total = count
        .checked_mul(dim)
        .and_then(|n| n.checked_mul(4))
        .ok_or(StoreError::SizeOverflow)?;
    if total > bytes.len() {
        return Err(StoreError::Truncated);
    }

    let mut values = Vec::with_capacity(count * dim);
    for _ in 0..count * dim {
        values.push(reader.f32()?);
    }
    let embeddings =
        Array2::from_shape_vec((count, dim), values).map_err(|_| StoreError::SizeOverflow)?;

    let mut names = Vec::with_capacity(count);
    for _ in 0..count {
        let len = reader.u32()? as usize;
        let raw = reader.take(len)?;
        names.push(String::from_utf8(raw.to_vec())?);
    }

    KnownIdentities::new(names, embeddings)
}

/// File-backed persistence for the known-identity set.
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<KnownIdentities, StoreError> {
        let bytes = fs::read(&self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        decode(&bytes)
    }

    pub fn save(&self, identities: &KnownIdentities) -> Result<(), StoreError> {
        fs::write(&self.path, encode(identities)).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Writes raw bytes to the backing path, then loads them.
    ///
    /// Callers keep their previous in-memory set when this fails.
    pub fn update(&self, bytes: &[u8]) -> Result<KnownIdentities, StoreError> {
        fs::write(&self.path, bytes).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.load()
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], StoreError> {
        let end = self.pos.checked_add(n).ok_or(StoreError::SizeOverflow)?;
        if end > self.buf.len() {
            return Err(StoreError::Truncated);
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, StoreError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, StoreError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self) -> Result<f32, StoreError> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_identities() -> KnownIdentities {
        KnownIdentities::new(
            vec!["alice".into(), "bob".into()],
            array![[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]],
        )
        .unwrap()
    }

    #[test]
    fn test_round_trip_preserves_names_and_order() {
        let original = sample_identities();
        let decoded = decode(&encode(&original)).unwrap();
        assert_eq!(decoded.names(), original.names());
        assert_eq!(decoded.embeddings(), original.embeddings());
    }

    #[test]
    fn test_empty_set_round_trips() {
        let decoded = decode(&encode(&KnownIdentities::empty())).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = KnownIdentities::new(vec!["only-one".into()], array![[0.1], [0.2]]);
        assert!(matches!(
            result,
            Err(StoreError::LengthMismatch {
                names: 1,
                embeddings: 2
            })
        ));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = encode(&sample_identities());
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(StoreError::BadMagic)));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut bytes = encode(&sample_identities());
        bytes[4] = 99;
        assert!(matches!(
            decode(&bytes),
            Err(StoreError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_truncated_vectors_rejected() {
        let bytes = encode(&sample_identities());
        assert!(matches!(
            decode(&bytes[..20]),
            Err(StoreError::Truncated)
        ));
    }

    #[test]
    fn test_truncated_name_table_rejected() {
        let full = encode(&sample_identities());
        let cut = full.len() - 3;
        assert!(matches!(decode(&full[..cut]), Err(StoreError::Truncated)));
    }

    #[test]
    fn test_implausible_counts_rejected_without_allocation() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&STORE_MAGIC);
        bytes.extend_from_slice(&STORE_VERSION.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        let err = decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            StoreError::SizeOverflow | StoreError::Truncated
        ));
    }

    #[test]
    fn test_zero_dimension_with_identities_rejected() {
        // 40 zero-length vectors occupy no bytes, so every size check would
        // pass; the header itself must be refused.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&STORE_MAGIC);
        bytes.extend_from_slice(&STORE_VERSION.to_le_bytes());
        bytes.extend_from_slice(&40u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        for _ in 0..40 {
            bytes.extend_from_slice(&1u32.to_le_bytes());
            bytes.push(b'x');
        }
        assert!(matches!(decode(&bytes), Err(StoreError::ZeroDimension(40))));
    }

    #[test]
    fn test_invalid_utf8_name_rejected() {
        let ids = KnownIdentities::new(vec!["ab".into()], array![[1.0]]).unwrap();
        let mut bytes = encode(&ids);
        let n = bytes.len();
        bytes[n - 2] = 0xff;
        bytes[n - 1] = 0xfe;
        assert!(matches!(decode(&bytes), Err(StoreError::InvalidName(_))));
    }

    #[test]
    fn test_store_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(dir.path().join("identities.fgid"));
        store.save(&sample_identities()).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.names(), &["alice".to_string(), "bob".to_string()]);
    }

    #[test]
    fn test_store_update_writes_then_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(dir.path().join("identities.fgid"));
        let bytes = encode(&sample_identities());
        let loaded = store.update(&bytes).unwrap();
        assert_eq!(loaded.len(), 2);
        // The raw bytes landed on disk verbatim.
        assert_eq!(fs::read(store.path()).unwrap(), bytes);
    }

    #[test]
    fn test_store_update_rejects_garbage_but_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(dir.path().join("identities.fgid"));
        assert!(store.update(b"not a store").is_err());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(dir.path().join("absent.fgid"));
        assert!(matches!(store.load(), Err(StoreError::Io { .. })));
    }
}
