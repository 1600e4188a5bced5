//! Node connection: state reads and extrinsic submission
//!
//! One `ChainClient` per target node, created once per process run and
//! dropped on exit. Reads are idempotent and reflect some state at or after
//! the node's last block; absence is a valid result, distinct from a
//! transport failure.

use crate::call::CallDescriptor;
use crate::error::{Error, Result};
use crate::registry::DeviceProfile;
use crate::transaction::Envelope;
use crate::types::{Material, Receipt, SubmitOptions};
use parity_scale_codec::DecodeAll;
use subxt::backend::legacy::LegacyRpcMethods;
use subxt::backend::rpc::RpcClient;
use subxt::dynamic::Value;
use subxt::ext::scale_value::At;
use subxt::tx::{SubmittableExtrinsic, TxProgress, TxStatus};
use subxt::utils::AccountId32;
use subxt::{OnlineClient, SubstrateConfig};
use subxt_signer::sr25519::Keypair;
use tracing::{debug, info, warn};

/// A live connection to one node.
pub struct ChainClient {
    api: OnlineClient<SubstrateConfig>,
    rpc: LegacyRpcMethods<SubstrateConfig>,
    material: Material,
}

impl ChainClient {
    /// Connect and fetch the chain material used for signing payloads.
    pub async fn connect(url: &str) -> Result<Self> {
        let rpc_client = RpcClient::from_url(url)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let api = OnlineClient::<SubstrateConfig>::from_rpc_client(rpc_client.clone()).await?;
        let rpc = LegacyRpcMethods::<SubstrateConfig>::new(rpc_client);

        let chain_name = rpc.system_chain().await?;
        let runtime = api.runtime_version();
        let material = Material {
            genesis_hash: api.genesis_hash().0,
            chain_name,
            spec_version: runtime.spec_version,
            tx_version: runtime.transaction_version,
        };
        info!(
            chain = %material.chain_name,
            spec_version = material.spec_version,
            "connected"
        );
        Ok(Self { api, rpc, material })
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Encode a composed call against the node's runtime metadata.
    pub fn encode_call(&self, call: &CallDescriptor) -> Result<Vec<u8>> {
        self.api
            .tx()
            .call_data(&call.to_payload())
            .map_err(|e| match e {
                subxt::Error::Metadata(_) => Error::UnknownCall {
                    pallet: call.pallet.clone(),
                    function: call.function.clone(),
                },
                other => Error::Codec(other.to_string()),
            })
    }

    /// Pallet and call indices from metadata. Used to assemble calls whose
    /// argument is itself a runtime call (sudo nesting).
    pub fn call_index(&self, pallet: &str, function: &str) -> Result<(u8, u8)> {
        let metadata = self.api.metadata();
        let p = metadata
            .pallet_by_name(pallet)
            .ok_or_else(|| Error::UnknownCall {
                pallet: pallet.to_string(),
                function: function.to_string(),
            })?;
        let c = p
            .call_variant_by_name(function)
            .ok_or_else(|| Error::UnknownCall {
                pallet: pallet.to_string(),
                function: function.to_string(),
            })?;
        Ok((p.index(), c.index))
    }

    /// Next nonce for an account, including pool transactions.
    pub async fn nonce(&self, account: &AccountId32) -> Result<u64> {
        Ok(self.rpc.system_account_next_index(account).await?)
    }

    /// Raw storage read. Absent entries are `Ok(None)`.
    pub async fn query(
        &self,
        pallet: &str,
        entry: &str,
        keys: Vec<Value>,
    ) -> Result<Option<Vec<u8>>> {
        let address = subxt::dynamic::storage(pallet, entry, keys);
        let storage = self.api.storage().at_latest().await?;
        Ok(storage.fetch(&address).await?.map(|v| v.into_encoded()))
    }

    /// Free balance of an account; `None` when no account entry exists.
    pub async fn free_balance(&self, account: &AccountId32) -> Result<Option<u128>> {
        let address = subxt::dynamic::storage(
            "System",
            "Account",
            vec![Value::from_bytes(account.0)],
        );
        let storage = self.api.storage().at_latest().await?;
        let Some(entry) = storage.fetch(&address).await? else {
            return Ok(None);
        };
        let value = entry.to_value()?;
        let free = value
            .at("data")
            .and_then(|data| data.at("free"))
            .and_then(|free| free.as_u128())
            .ok_or_else(|| Error::Codec("System.Account missing data.free".to_string()))?;
        Ok(Some(free))
    }

    /// Device profile from a marketplace pallet, decoded with the crate's
    /// schema; `None` for an unregistered device.
    pub async fn device_profile(
        &self,
        pallet: &str,
        device: &AccountId32,
    ) -> Result<Option<DeviceProfile>> {
        match self
            .query(pallet, "Device", vec![Value::from_bytes(device.0)])
            .await?
        {
            Some(bytes) => Ok(Some(DeviceProfile::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Current on-chain timestamp. Operator wall clocks are not trusted for
    /// deadline arithmetic; this is the reference.
    pub async fn timestamp_now(&self) -> Result<u64> {
        let bytes = self
            .query("Timestamp", "Now", vec![])
            .await?
            .ok_or_else(|| Error::Codec("Timestamp.Now not present".to_string()))?;
        Ok(u64::decode_all(&mut &bytes[..])?)
    }

    /// Sign a composed call and submit it.
    pub async fn sign_and_submit(
        &self,
        call: &CallDescriptor,
        signer: &Keypair,
        opts: &SubmitOptions,
    ) -> Result<Receipt> {
        let call_data = self.encode_call(call)?;
        self.submit_call_data(&call.pallet, &call.function, call_data, signer, opts)
            .await
    }

    /// Sign and submit pre-encoded call bytes.
    ///
    /// Fetches a fresh nonce, builds the envelope, signs, transmits. With
    /// `wait_for_inclusion` the call blocks until the node reports the
    /// extrinsic in a block or definitely rejected, bounded by
    /// `opts.timeout`; on expiry the fate is unresolved and the caller must
    /// re-query state before retrying.
    pub async fn submit_call_data(
        &self,
        pallet: &str,
        function: &str,
        call_data: Vec<u8>,
        signer: &Keypair,
        opts: &SubmitOptions,
    ) -> Result<Receipt> {
        let account = AccountId32(signer.public_key().0);
        let nonce = self.nonce(&account).await?;

        let envelope = Envelope::new(
            call_data,
            opts.era.clone(),
            nonce,
            opts.tip,
            self.material.clone(),
        );
        let signature = signer.sign(&envelope.signable_payload());
        let signed = envelope.into_signed(&signer.public_key().0, &signature.0);

        info!(pallet, function, nonce, "submitting extrinsic");
        let tx = SubmittableExtrinsic::from_bytes(self.api.clone(), signed.into_bytes());

        if !opts.wait_for_inclusion {
            let hash = tx.submit().await?;
            return Ok(Receipt {
                extrinsic_hash: hash.0,
                block_hash: None,
            });
        }

        let watch = async {
            let progress = tx.submit_and_watch().await?;
            wait_for_inclusion(progress).await
        };
        match tokio::time::timeout(opts.timeout, watch).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    pallet,
                    function, nonce, "no inclusion report before timeout; fate unresolved"
                );
                Err(Error::InclusionTimeout(opts.timeout))
            }
        }
    }
}

/// Follow transaction status until a terminal report.
async fn wait_for_inclusion(
    mut progress: TxProgress<SubstrateConfig, OnlineClient<SubstrateConfig>>,
) -> Result<Receipt> {
    while let Some(status) = progress.next().await {
        match status? {
            TxStatus::InBestBlock(included) | TxStatus::InFinalizedBlock(included) => {
                // Inclusion is not success: a ledger-declined transition
                // lands in a block as ExtrinsicFailed. Runtime dispatch
                // errors surface as TransitionRejected via the error
                // conversion.
                included.wait_for_success().await?;
                debug!(
                    block = %hex::encode(included.block_hash().0),
                    "extrinsic included"
                );
                return Ok(Receipt {
                    extrinsic_hash: included.extrinsic_hash().0,
                    block_hash: Some(included.block_hash().0),
                });
            }
            TxStatus::Error { message } => return Err(Error::SubmissionRejected(message)),
            TxStatus::Invalid { message } => return Err(Error::SubmissionRejected(message)),
            TxStatus::Dropped { message } => return Err(Error::SubmissionRejected(message)),
            TxStatus::Broadcasted { num_peers } => {
                debug!(num_peers, "extrinsic broadcast");
            }
            _ => {}
        }
    }
    // The stream ended without a terminal report: connection lost.
    Err(Error::Transport(
        "status subscription ended before inclusion".to_string(),
    ))
}
