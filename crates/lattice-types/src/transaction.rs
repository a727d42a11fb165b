//! Transactions, outputs and output references.

use crate::codec::{Reader, Writer};
use crate::{Hash, TxHash, TypesResult, HASH_LENGTH};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

/// Maximum inputs/outputs/signatures a single transaction may carry.
const MAX_TX_ITEMS: usize = 1024;

/// Script locking an output to its owner. Opaque 32-byte key hash; the
/// last byte selects the owner's group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LockupScript(pub [u8; HASH_LENGTH]);

impl LockupScript {
    /// Group owning outputs locked by this script.
    pub fn group(&self, groups: u8) -> u8 {
        self.0[HASH_LENGTH - 1] % groups
    }
}

/// Reference to an asset output: the producing transaction and the output
/// position within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetOutputRef {
    pub tx_hash: TxHash,
    pub index: u32,
}

impl AssetOutputRef {
    pub fn new(tx_hash: TxHash, index: u32) -> Self {
        Self { tx_hash, index }
    }

    fn write(&self, w: &mut Writer) {
        w.put_bytes(self.tx_hash.as_bytes());
        w.put_u32(self.index);
    }

    fn read(r: &mut Reader<'_>) -> TypesResult<Self> {
        let tx_hash = TxHash(r.get_hash_bytes()?);
        let index = r.get_u32()?;
        Ok(Self { tx_hash, index })
    }
}

/// Reference to a contract output. Disjoint from asset references: the two
/// live in separate index spaces and never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractOutputRef {
    pub contract_id: Hash,
    pub index: u32,
}

/// A transferable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Amount of the native token.
    pub amount: u64,
    /// Owner lockup.
    pub lockup: LockupScript,
    /// Secondary token balances carried by this output.
    pub tokens: Vec<(Hash, u64)>,
}

impl TxOutput {
    pub fn plain(amount: u64, lockup: LockupScript) -> Self {
        Self {
            amount,
            lockup,
            tokens: Vec::new(),
        }
    }

    fn write(&self, w: &mut Writer) {
        w.put_u64(self.amount);
        w.put_bytes(&self.lockup.0);
        w.put_u16(self.tokens.len() as u16);
        for (id, amount) in &self.tokens {
            w.put_bytes(id.as_bytes());
            w.put_u64(*amount);
        }
    }

    fn read(r: &mut Reader<'_>) -> TypesResult<Self> {
        let amount = r.get_u64()?;
        let lockup = LockupScript(r.get_hash_bytes()?);
        let count = r.get_count(MAX_TX_ITEMS)?;
        let mut tokens = Vec::with_capacity(count);
        for _ in 0..count {
            let id = Hash(r.get_hash_bytes()?);
            let token_amount = r.get_u64()?;
            tokens.push((id, token_amount));
        }
        Ok(Self {
            amount,
            lockup,
            tokens,
        })
    }
}

/// Unsigned transaction body. Its digest is the transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    /// Asset outputs consumed.
    pub inputs: Vec<AssetOutputRef>,
    /// Outputs fixed at signing time.
    pub fixed_outputs: Vec<TxOutput>,
    /// Optional script executed against the world state.
    pub script: Option<Vec<u8>>,
}

impl UnsignedTransaction {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(128);
        self.write(&mut w);
        w.into_bytes()
    }

    fn write(&self, w: &mut Writer) {
        w.put_u16(self.inputs.len() as u16);
        for input in &self.inputs {
            input.write(w);
        }
        w.put_u16(self.fixed_outputs.len() as u16);
        for output in &self.fixed_outputs {
            output.write(w);
        }
        match &self.script {
            Some(script) => {
                w.put_u8(1);
                w.put_var_bytes(script);
            }
            None => w.put_u8(0),
        }
    }

    fn read(r: &mut Reader<'_>) -> TypesResult<Self> {
        let input_count = r.get_count(MAX_TX_ITEMS)?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            inputs.push(AssetOutputRef::read(r)?);
        }
        let output_count = r.get_count(MAX_TX_ITEMS)?;
        let mut fixed_outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            fixed_outputs.push(TxOutput::read(r)?);
        }
        let script = match r.get_u8()? {
            0 => None,
            _ => Some(r.get_var_bytes()?),
        };
        Ok(Self {
            inputs,
            fixed_outputs,
            script,
        })
    }

    /// Transaction identifier: digest of the unsigned body.
    pub fn hash(&self) -> TxHash {
        TxHash::hash(&self.to_bytes())
    }
}

/// Signed transaction template, as submitted and gossiped.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxTemplate {
    pub unsigned: UnsignedTransaction,
    #[serde_as(as = "Vec<Bytes>")]
    pub signatures: Vec<[u8; 64]>,
}

impl TxTemplate {
    /// Promote to a full transaction with no generated outputs.
    pub fn into_transaction(self) -> Transaction {
        Transaction {
            unsigned: self.unsigned,
            signatures: self.signatures,
            generated_outputs: Vec::new(),
        }
    }
}

/// A transaction as stored in a block: the template plus the outputs its
/// script generated during execution.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub unsigned: UnsignedTransaction,
    #[serde_as(as = "Vec<Bytes>")]
    pub signatures: Vec<[u8; 64]>,
    pub generated_outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Transaction identifier (digest of the unsigned body only, so the
    /// id is stable across script execution).
    pub fn hash(&self) -> TxHash {
        self.unsigned.hash()
    }

    /// Whether this transaction carries a script.
    pub fn is_scripted(&self) -> bool {
        self.unsigned.script.is_some()
    }

    /// A coinbase: no inputs, a single output paying `lockup`.
    pub fn coinbase(amount: u64, lockup: LockupScript) -> Self {
        Self {
            unsigned: UnsignedTransaction {
                inputs: Vec::new(),
                fixed_outputs: vec![TxOutput::plain(amount, lockup)],
                script: None,
            },
            signatures: Vec::new(),
            generated_outputs: Vec::new(),
        }
    }

    /// All outputs in output-index order: fixed first, then generated.
    pub fn all_outputs(&self) -> impl Iterator<Item = &TxOutput> {
        self.unsigned
            .fixed_outputs
            .iter()
            .chain(self.generated_outputs.iter())
    }

    /// Reference to the `index`-th output of this transaction.
    pub fn output_ref(&self, index: u32) -> AssetOutputRef {
        AssetOutputRef::new(self.hash(), index)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(256);
        self.write(&mut w);
        w.into_bytes()
    }

    pub(crate) fn write(&self, w: &mut Writer) {
        self.unsigned.write(w);
        w.put_u16(self.signatures.len() as u16);
        for sig in &self.signatures {
            w.put_bytes(sig);
        }
        w.put_u16(self.generated_outputs.len() as u16);
        for output in &self.generated_outputs {
            output.write(w);
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> TypesResult<Self> {
        let mut r = Reader::new(bytes);
        let tx = Self::read(&mut r)?;
        r.finish()?;
        Ok(tx)
    }

    pub(crate) fn read(r: &mut Reader<'_>) -> TypesResult<Self> {
        let unsigned = UnsignedTransaction::read(r)?;
        let sig_count = r.get_count(MAX_TX_ITEMS)?;
        let mut signatures = Vec::with_capacity(sig_count);
        for _ in 0..sig_count {
            let bytes = r.get_bytes(64)?;
            let mut sig = [0u8; 64];
            sig.copy_from_slice(&bytes);
            signatures.push(sig);
        }
        let gen_count = r.get_count(MAX_TX_ITEMS)?;
        let mut generated_outputs = Vec::with_capacity(gen_count);
        for _ in 0..gen_count {
            generated_outputs.push(TxOutput::read(r)?);
        }
        Ok(Self {
            unsigned,
            signatures,
            generated_outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            unsigned: UnsignedTransaction {
                inputs: vec![AssetOutputRef::new(TxHash::hash(b"prev"), 1)],
                fixed_outputs: vec![TxOutput {
                    amount: 1_000_000,
                    lockup: LockupScript([7u8; 32]),
                    tokens: vec![(Hash::hash(b"token"), 42)],
                }],
                script: Some(vec![0xde, 0xad]),
            },
            signatures: vec![[3u8; 64]],
            generated_outputs: vec![TxOutput::plain(5, LockupScript([9u8; 32]))],
        }
    }

    #[test]
    fn test_serialization_roundtrip() {
        let tx = sample_tx();
        let decoded = Transaction::from_bytes(&tx.to_bytes()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_hash_ignores_signatures_and_generated() {
        let mut tx = sample_tx();
        let id = tx.hash();
        tx.signatures.clear();
        tx.generated_outputs.clear();
        assert_eq!(tx.hash(), id);
    }

    #[test]
    fn test_coinbase_shape() {
        let cb = Transaction::coinbase(500, LockupScript([1u8; 32]));
        assert!(cb.unsigned.inputs.is_empty());
        assert_eq!(cb.unsigned.fixed_outputs.len(), 1);
        assert!(!cb.is_scripted());
    }

    #[test]
    fn test_lockup_group() {
        let mut bytes = [0u8; 32];
        bytes[31] = 6;
        assert_eq!(LockupScript(bytes).group(4), 2);
    }

    #[test]
    fn test_truncated_input_rejected() {
        let tx = sample_tx();
        let bytes = tx.to_bytes();
        assert!(Transaction::from_bytes(&bytes[..bytes.len() - 3]).is_err());
    }
}
