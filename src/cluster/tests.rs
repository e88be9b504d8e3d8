//! Cluster Module Tests
//!
//! Validates the static layout shared by all processes.
//!
//! ## Test Scopes
//! - **Ownership**: `owner(b) = b mod N`, dense local indexing, owned block counts.
//! - **Addressing**: bounds checks and the single-block access rule.
//! - **Configuration**: defaults, validation and directory construction.

#[cfg(test)]
mod tests {
    use crate::cluster::addressing::{BlockAddress, translate};
    use crate::cluster::ownership::OwnershipMap;
    use crate::cluster::types::{ProcessDescriptor, ProcessDirectory, SystemConfig};
    use crate::error::DsmError;
    use std::time::Duration;

    // ============================================================
    // OWNERSHIP TESTS
    // ============================================================

    #[test]
    fn test_owner_is_block_mod_n() {
        let map = OwnershipMap::new(4, 1024, 0);

        for block_id in 0..1024u32 {
            assert_eq!(map.owner(block_id), block_id as usize % 4);
        }
    }

    #[test]
    fn test_owner_is_stable() {
        let map = OwnershipMap::new(3, 100, 1);
        let first: Vec<usize> = (0..100).map(|b| map.owner(b)).collect();
        let second: Vec<usize> = (0..100).map(|b| map.owner(b)).collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_owned_blocks_partition_the_space() {
        let n = 4;
        let mut seen = vec![0usize; 1024];

        for local in 0..n {
            let map = OwnershipMap::new(n, 1024, local);
            let owned: Vec<u32> = map.owned_blocks().collect();
            assert_eq!(owned.len(), map.owned_count());
            for block_id in owned {
                assert!(map.is_local(block_id));
                seen[block_id as usize] += 1;
            }
        }

        assert!(seen.iter().all(|&count| count == 1), "every block has exactly one owner");
    }

    #[test]
    fn test_owned_count_with_uneven_split() {
        // 10 blocks over 4 processes: 0,4,8 | 1,5,9 | 2,6 | 3,7
        assert_eq!(OwnershipMap::new(4, 10, 0).owned_count(), 3);
        assert_eq!(OwnershipMap::new(4, 10, 1).owned_count(), 3);
        assert_eq!(OwnershipMap::new(4, 10, 2).owned_count(), 2);
        assert_eq!(OwnershipMap::new(4, 10, 3).owned_count(), 2);
        // More processes than blocks
        assert_eq!(OwnershipMap::new(8, 4, 6).owned_count(), 0);
    }

    #[test]
    fn test_local_index_is_dense() {
        let map = OwnershipMap::new(4, 1024, 2);
        let indexes: Vec<usize> = map.owned_blocks().map(|b| map.local_index(b)).collect();
        let expected: Vec<usize> = (0..map.owned_count()).collect();

        assert_eq!(indexes, expected);
    }

    #[test]
    fn test_peers_excludes_self() {
        let map = OwnershipMap::new(4, 16, 2);
        let peers: Vec<usize> = map.peers().collect();

        assert_eq!(peers, vec![0, 1, 3]);
    }

    // ============================================================
    // ADDRESSING TESTS
    // ============================================================

    #[test]
    fn test_translate_start_of_address_space() {
        let config = SystemConfig::default();
        let addr = translate(&config, 0, 17).unwrap();

        assert_eq!(addr, BlockAddress { block_id: 0, offset: 0 });
    }

    #[test]
    fn test_translate_inside_block() {
        let config = SystemConfig::default();
        let addr = translate(&config, 4096 * 3 + 100, 50).unwrap();

        assert_eq!(addr.block_id, 3);
        assert_eq!(addr.offset, 100);
    }

    #[test]
    fn test_translate_exactly_fills_block() {
        let config = SystemConfig::default();
        let addr = translate(&config, 4096, 4096).unwrap();

        assert_eq!(addr, BlockAddress { block_id: 1, offset: 0 });
    }

    #[test]
    fn test_translate_last_byte() {
        let config = SystemConfig::default();
        let last = config.capacity() - 1;
        let addr = translate(&config, last, 1).unwrap();

        assert_eq!(addr.block_id, 1023);
        assert_eq!(addr.offset, 4095);
    }

    #[test]
    fn test_translate_out_of_range() {
        let config = SystemConfig::default();

        let err = translate(&config, config.capacity(), 1).unwrap_err();
        assert!(matches!(err, DsmError::OutOfRange { .. }));

        let err = translate(&config, config.capacity() - 4, 8).unwrap_err();
        assert!(matches!(err, DsmError::OutOfRange { .. }));

        let err = translate(&config, u64::MAX, 2).unwrap_err();
        assert!(matches!(err, DsmError::OutOfRange { .. }));
    }

    #[test]
    fn test_translate_cross_block_is_rejected() {
        let config = SystemConfig::default();

        // (p mod T) + len > T for a spread of positions
        for (position, length) in [(4090u64, 7usize), (4095, 2), (8191, 2), (100, 4000)] {
            let err = translate(&config, position, length).unwrap_err();
            assert!(
                matches!(err, DsmError::CrossBlock { .. }),
                "position {} length {} should cross a block",
                position,
                length
            );
            assert!(err.is_validation());
        }
    }

    // ============================================================
    // CONFIGURATION TESTS
    // ============================================================

    #[test]
    fn test_default_config() {
        let config = SystemConfig::default();

        assert_eq!(config.block_size, 4096);
        assert_eq!(config.block_count, 1024);
        assert_eq!(config.capacity(), 4 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        assert!(SystemConfig::default().with_block_size(0).validate().is_err());
        assert!(SystemConfig::default().with_block_count(0).validate().is_err());
        assert!(
            SystemConfig::default()
                .with_io_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            SystemConfig::default()
                .with_block_size(64)
                .with_block_count(16)
                .validate()
                .is_ok()
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = SystemConfig::default().with_block_size(512);
        let json = serde_json::to_string(&config).expect("Serialization failed");
        let restored: SystemConfig = serde_json::from_str(&json).expect("Deserialization failed");

        assert_eq!(restored, config);
    }

    #[test]
    fn test_directory_localhost() {
        let directory = ProcessDirectory::localhost(4, 8000).unwrap();

        assert_eq!(directory.len(), 4);
        assert_eq!(directory.get(2).unwrap().addr(), "127.0.0.1:8002");
        assert!(directory.get(4).is_none());
    }

    #[test]
    fn test_directory_rejects_misordered_ids() {
        let result = ProcessDirectory::new(vec![
            ProcessDescriptor::new(0, "127.0.0.1", 8000),
            ProcessDescriptor::new(2, "127.0.0.1", 8002),
        ]);

        assert!(matches!(result, Err(DsmError::InvalidConfig(_))));
        assert!(ProcessDirectory::new(vec![]).is_err());
    }

    #[test]
    fn test_descriptor_addr_brackets_ipv6() {
        let descriptor = ProcessDescriptor::new(0, "::1", 9000);

        assert_eq!(descriptor.addr(), "[::1]:9000");
    }
}
