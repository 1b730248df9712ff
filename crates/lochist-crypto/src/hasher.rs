use lochist_types::ObjectId;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g. `"lochist-blob-v1"`) that is
/// prepended to every hash computation, preventing cross-kind collisions.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for file content blobs.
    pub const BLOB: Self = Self {
        domain: "lochist-blob-v1",
    };
    /// Hasher for snapshot trees (file manifests).
    pub const TREE: Self = Self {
        domain: "lochist-tree-v1",
    };
    /// Hasher for snapshot commits.
    pub const COMMIT: Self = Self {
        domain: "lochist-commit-v1",
    };

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ObjectId::from_hash(*hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn different_domains_produce_different_hashes() {
        let data = b"same content";
        let blob = ContentHasher::BLOB.hash(data);
        let tree = ContentHasher::TREE.hash(data);
        let commit = ContentHasher::COMMIT.hash(data);
        assert_ne!(blob, tree);
        assert_ne!(blob, commit);
        assert_ne!(tree, commit);
    }

    #[test]
    fn content_change_changes_id() {
        let id = ContentHasher::BLOB.hash(b"original");
        assert_eq!(ContentHasher::BLOB.hash(b"original"), id);
        assert_ne!(ContentHasher::BLOB.hash(b"tampered"), id);
    }

    #[test]
    fn domain_separated_hash_differs_from_plain_blake3() {
        let plain = ObjectId::from_bytes(b"test");
        assert_ne!(plain, ContentHasher::BLOB.hash(b"test"));
    }

    proptest! {
        #[test]
        fn hashing_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(ContentHasher::BLOB.hash(&data), ContentHasher::BLOB.hash(&data));
            prop_assert!(!ContentHasher::BLOB.hash(&data).is_null());
        }
    }
}
