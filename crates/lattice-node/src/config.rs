//! Node configuration.

use crate::Args;
use anyhow::{Context, Result};
use lattice_consensus::ConsensusSettings;
use lattice_mempool::MemPoolSettings;
use lattice_mining::MiningSettings;
use lattice_network::NetworkSettings;
use lattice_types::{Hash, LockupScript};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_node_name() -> String {
    "lattice-node".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_broker_num() -> u8 {
    1
}

/// Broker position within the clique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Clique identifier, hex. Brokers sharing it exchange state freely.
    #[serde(default)]
    pub clique_id: String,
    #[serde(default = "default_broker_num")]
    pub broker_num: u8,
    #[serde(default)]
    pub broker_id: u8,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            clique_id: String::new(),
            broker_num: 1,
            broker_id: 0,
        }
    }
}

impl BrokerConfig {
    /// Parse the clique id, falling back to the zero digest.
    pub fn clique_id(&self) -> Hash {
        hex::decode(&self.clique_id)
            .ok()
            .and_then(|bytes| Hash::from_slice(&bytes))
            .unwrap_or(Hash::ZERO)
    }
}

/// Mining configuration: worker knobs plus reward addresses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MiningConfig {
    #[serde(flatten)]
    pub settings: MiningSettings,
    /// One reward lockup per group, hex, 32 bytes each.
    #[serde(default)]
    pub miner_addresses: Vec<String>,
}

impl MiningConfig {
    /// Decode the per-group reward lockups. Groups beyond the configured
    /// list fall back to the zero lockup.
    pub fn lockups(&self, groups: u8) -> Vec<LockupScript> {
        (0..groups as usize)
            .map(|g| {
                self.miner_addresses
                    .get(g)
                    .and_then(|s| hex::decode(s).ok())
                    .and_then(|bytes| {
                        (bytes.len() == 32).then(|| {
                            let mut arr = [0u8; 32];
                            arr.copy_from_slice(&bytes);
                            LockupScript(arr)
                        })
                    })
                    .unwrap_or(LockupScript([0u8; 32]))
            })
            .collect()
    }
}

fn default_scan_frequency_ms() -> u64 {
    30_000
}

fn default_neighbors_per_group() -> usize {
    20
}

/// Peer discovery options. The discovery walker itself is an external
/// collaborator; the node only carries its knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_scan_frequency_ms")]
    pub scan_frequency_ms: u64,
    #[serde(default = "default_neighbors_per_group")]
    pub neighbors_per_group: usize,
    /// Bootstrap peer addresses.
    #[serde(default)]
    pub bootstrap: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            scan_frequency_ms: default_scan_frequency_ms(),
            neighbors_per_group: default_neighbors_per_group(),
            bootstrap: Vec::new(),
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_node_name")]
    pub node_name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub consensus: ConsensusSettings,
    #[serde(default)]
    pub mempool: MemPoolSettings,
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub network: NetworkSettings,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            data_dir: default_data_dir(),
            broker: BrokerConfig::default(),
            consensus: ConsensusSettings::default(),
            mempool: MemPoolSettings::default(),
            mining: MiningConfig::default(),
            network: NetworkSettings::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from file and CLI args.
    pub fn load(config_path: &Path, args: &Args) -> Result<Self> {
        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(config_path).context("failed to read config file")?;
            toml::from_str(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        if let Some(ref data_dir) = args.data_dir {
            config.data_dir = data_dir.clone();
        }
        if let Some(groups) = args.groups {
            config.consensus = ConsensusSettings::with_groups(groups);
        }
        if let Some(ref addr) = args.miner_address {
            config.mining.miner_addresses = vec![addr.clone(); config.consensus.groups as usize];
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = NodeConfig::default();
        assert_eq!(config.consensus.groups, 4);
        assert_eq!(config.consensus.tips_prune_interval, 100);
        assert_eq!(config.consensus.block_cache_capacity_per_chain, 25);
        assert_eq!(config.mempool.shared_pool_capacity, 1000);
        assert_eq!(config.mempool.pending_pool_capacity, 1000);
        assert_eq!(config.mempool.tx_max_number_per_block, 1000);
        assert_eq!(config.mempool.clean_frequency_ms, 10 * 60 * 1000);
        assert_eq!(config.broker.broker_num, 1);
        assert_eq!(config.broker.broker_id, 0);
    }

    #[test]
    fn test_toml_roundtrip() {
        let toml_src = r#"
            node_name = "test-node"

            [broker]
            broker_num = 2
            broker_id = 1

            [consensus]
            groups = 2
            expected_time_span = 32000

            [mempool]
            shared_pool_capacity = 10

            [network]
            ping_frequency_ms = 5000
        "#;
        let config: NodeConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.node_name, "test-node");
        assert_eq!(config.broker.broker_num, 2);
        assert_eq!(config.consensus.groups, 2);
        assert_eq!(config.consensus.expected_time_span, 32_000);
        assert_eq!(config.mempool.shared_pool_capacity, 10);
        assert_eq!(config.network.ping_frequency_ms, 5_000);
        // Untouched sections keep their defaults.
        assert_eq!(config.mempool.pending_pool_capacity, 1000);
    }

    #[test]
    fn test_miner_lockup_parsing() {
        let mining = MiningConfig {
            settings: MiningSettings::default(),
            miner_addresses: vec![hex::encode([7u8; 32]), "bogus".to_string()],
        };
        let lockups = mining.lockups(3);
        assert_eq!(lockups.len(), 3);
        assert_eq!(lockups[0], LockupScript([7u8; 32]));
        // Unparseable and missing entries fall back to zero.
        assert_eq!(lockups[1], LockupScript([0u8; 32]));
        assert_eq!(lockups[2], LockupScript([0u8; 32]));
    }
}
