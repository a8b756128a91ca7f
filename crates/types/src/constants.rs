//! Protocol constants shared across cinnabar crates.

use alloy_primitives::{b256, B256};

/// Keccak-256 of an empty RLP string; root hash of an empty trie.
pub const EMPTY_ROOT_HASH: B256 =
    b256!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421");

/// Keccak-256 of an empty RLP list; uncle hash of a block with no uncles.
pub const EMPTY_UNCLE_HASH: B256 =
    b256!("1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347");

/// Fixed digest carried in `mixHash` by every IBFT-sealed header.
pub const ISTANBUL_DIGEST: B256 =
    b256!("63746963616c2062797a616e74696e65206661756c7420746f6c6572616e6365");

/// Size of the zero-vanity prefix in front of the RLP-encoded IBFT extra.
pub const EXTRA_VANITY_LEN: usize = 32;
