// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cache-key derivation.
//!
//! A cache key is a content-addressable fingerprint over every input
//! that can affect a compile's output: the assembled proto file set
//! (the request's own files plus every dependency's files, already
//! namespaced by the resolver), the target language, the gRPC switch,
//! the generation options, and the configured toolchain version.
//!
//! Derivation is a pure function: stable across process restarts and
//! machines, independent of map/slice iteration order. Identical
//! semantic inputs always yield identical keys; changing any single
//! byte of any input changes the key.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::types::ProtoFile;

/// Separator byte between hashed fields. Prevents ambiguity between
/// adjacent path/content boundaries.
const FIELD_SEP: [u8; 1] = [0u8];

/// Derive the cache key for one compile.
///
/// `proto_files` is the fully assembled input set from the resolver.
/// Files and options are sorted internally, so caller ordering does not
/// affect the key.
pub fn derive_cache_key(
    proto_files: &[ProtoFile],
    language: &str,
    include_grpc: bool,
    options: &HashMap<String, String>,
    toolchain_version: &str,
) -> String {
    let mut files: Vec<&ProtoFile> = proto_files.iter().collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let mut opts: Vec<(&String, &String)> = options.iter().collect();
    opts.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = Sha256::new();
    for file in files {
        hasher.update(file.path.as_bytes());
        hasher.update(FIELD_SEP);
        hasher.update(&file.content);
        hasher.update(FIELD_SEP);
    }
    hasher.update(language.as_bytes());
    hasher.update(FIELD_SEP);
    hasher.update(if include_grpc { b"grpc" as &[u8] } else { b"nogrpc" });
    hasher.update(FIELD_SEP);
    for (k, v) in opts {
        hasher.update(k.as_bytes());
        hasher.update(b"=");
        hasher.update(v.as_bytes());
        hasher.update(FIELD_SEP);
    }
    hasher.update(toolchain_version.as_bytes());

    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> Vec<ProtoFile> {
        vec![
            ProtoFile::new("user.proto", "message User { string id = 1; }"),
            ProtoFile::new("common/types.proto", "message Id { string value = 1; }"),
        ]
    }

    fn options(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn deterministic_across_file_order() {
        let forward = files();
        let mut reversed = files();
        reversed.reverse();

        let opts = options(&[("java_package", "com.example"), ("optimize", "speed")]);
        let k1 = derive_cache_key(&forward, "go", false, &opts, "protoc-25");
        let k2 = derive_cache_key(&reversed, "go", false, &opts, "protoc-25");
        assert_eq!(k1, k2);
    }

    #[test]
    fn sensitive_to_single_content_byte() {
        let base = files();
        let mut tweaked = files();
        tweaked[0].content[0] ^= 1;

        let opts = HashMap::new();
        let k1 = derive_cache_key(&base, "go", false, &opts, "protoc-25");
        let k2 = derive_cache_key(&tweaked, "go", false, &opts, "protoc-25");
        assert_ne!(k1, k2);
    }

    #[test]
    fn sensitive_to_path() {
        let base = files();
        let mut renamed = files();
        renamed[0].path = "user2.proto".to_string();

        let opts = HashMap::new();
        assert_ne!(
            derive_cache_key(&base, "go", false, &opts, "protoc-25"),
            derive_cache_key(&renamed, "go", false, &opts, "protoc-25")
        );
    }

    #[test]
    fn sensitive_to_language_grpc_and_options() {
        let f = files();
        let opts = HashMap::new();
        let base = derive_cache_key(&f, "go", false, &opts, "protoc-25");

        assert_ne!(base, derive_cache_key(&f, "python", false, &opts, "protoc-25"));
        assert_ne!(base, derive_cache_key(&f, "go", true, &opts, "protoc-25"));
        assert_ne!(
            base,
            derive_cache_key(&f, "go", false, &options(&[("k", "v")]), "protoc-25")
        );
    }

    #[test]
    fn option_order_does_not_matter() {
        let f = files();
        let a = options(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let b = options(&[("c", "3"), ("a", "1"), ("b", "2")]);
        assert_eq!(
            derive_cache_key(&f, "go", false, &a, "protoc-25"),
            derive_cache_key(&f, "go", false, &b, "protoc-25")
        );
    }

    #[test]
    fn option_value_change_changes_key() {
        let f = files();
        assert_ne!(
            derive_cache_key(&f, "go", false, &options(&[("opt", "a")]), "protoc-25"),
            derive_cache_key(&f, "go", false, &options(&[("opt", "b")]), "protoc-25")
        );
    }

    #[test]
    fn toolchain_version_namespaces_the_cache() {
        let f = files();
        let opts = HashMap::new();
        assert_ne!(
            derive_cache_key(&f, "go", false, &opts, "protoc-25"),
            derive_cache_key(&f, "go", false, &opts, "protoc-26")
        );
    }

    #[test]
    fn key_is_hex_sha256() {
        let key = derive_cache_key(&files(), "go", false, &HashMap::new(), "protoc-25");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
