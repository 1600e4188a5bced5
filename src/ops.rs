//! Operator workflows: funding, parachain registration, channels, and the
//! device-leasing marketplace lifecycle
//!
//! The `Operator` is the only component holding cross-call state: the live
//! connection, the signing credential, and the deployment configuration.
//! Workflows are strictly ordered pipelines of awaited submissions; the
//! ledger is the authority on every state-machine transition, and the
//! orchestrator pre-flights only what a fresh storage read can prove.

use crate::address::{decode_ss58, encode_ss58, sovereign_ss58, Relation};
use crate::call::{CallDescriptor, CallRegistry};
use crate::client::ChainClient;
use crate::error::{Error, Result};
use crate::registry::DeviceProfile;
use crate::types::{MarketRole, Receipt, SubmitOptions};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use subxt::dynamic::Value;
use subxt::utils::AccountId32;
use subxt_signer::sr25519::Keypair;
use subxt_signer::SecretUri;
use tracing::info;

/// Fixed HRMP channel limits for this deployment.
pub const HRMP_MAX_CAPACITY: u32 = 5;
pub const HRMP_MAX_MESSAGE_SIZE: u32 = 500;

/// Deployment configuration for the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OperatorConfig {
    /// Node websocket endpoint
    pub url: String,
    /// SS58 network version used when rendering addresses
    pub ss58_version: u16,
    /// Which ledger module the device-registration workflow targets
    pub role: MarketRole,
    /// Marketplace pallet (device registration and lifecycle)
    pub market_pallet: String,
    /// Pallet accepting client-side orders
    pub order_pallet: String,
    /// Pallet forwarding upward and lateral messages
    pub messaging_pallet: String,
    /// Parachain id reported during parachain-role registration
    pub para_id: u32,
    /// Patience for inclusion waits, in seconds
    pub inclusion_timeout_secs: u64,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        let role = MarketRole::Parachain;
        Self {
            url: "ws://localhost:9944".to_string(),
            ss58_version: 42,
            role,
            market_pallet: role.default_market_pallet().to_string(),
            order_pallet: "ClientModule".to_string(),
            messaging_pallet: "TemplateModule".to_string(),
            para_id: 2000,
            inclusion_timeout_secs: 60,
        }
    }
}

impl OperatorConfig {
    /// Config for a deployment role, with that role's default pallet names.
    pub fn for_role(role: MarketRole) -> Self {
        Self {
            role,
            market_pallet: role.default_market_pallet().to_string(),
            ..Self::default()
        }
    }
}

/// Derive an sr25519 credential from a secret URI (e.g. `//Alice`,
/// `//Device//1`).
pub fn keypair_from_suri(suri: &str) -> Result<Keypair> {
    let uri = SecretUri::from_str(suri)
        .map_err(|e| Error::InvalidInput(format!("bad secret uri: {}", e)))?;
    Keypair::from_uri(&uri).map_err(|e| Error::InvalidInput(format!("cannot derive keypair: {}", e)))
}

/// Sequencer for operator workflows against one node.
pub struct Operator {
    client: ChainClient,
    registry: CallRegistry,
    config: OperatorConfig,
    signer: Keypair,
}

impl Operator {
    /// Connect to the configured node with a signing credential.
    pub async fn connect(config: OperatorConfig, signer: Keypair) -> Result<Self> {
        let client = ChainClient::connect(&config.url).await?;
        let registry = CallRegistry::for_deployment(
            config.role,
            &config.market_pallet,
            &config.order_pallet,
            &config.messaging_pallet,
        );
        Ok(Self {
            client,
            registry,
            config,
            signer,
        })
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    pub fn client(&self) -> &ChainClient {
        &self.client
    }

    /// The signer's account id.
    pub fn account(&self) -> AccountId32 {
        AccountId32(self.signer.public_key().0)
    }

    /// The signer's SS58 address.
    pub fn address(&self) -> Result<String> {
        encode_ss58(&self.signer.public_key().0, self.config.ss58_version)
    }

    fn opts(&self) -> SubmitOptions {
        SubmitOptions {
            timeout: Duration::from_secs(self.config.inclusion_timeout_secs),
            ..SubmitOptions::default()
        }
    }

    async fn submit(&self, call: CallDescriptor) -> Result<Receipt> {
        self.client
            .sign_and_submit(&call, &self.signer, &self.opts())
            .await
    }

    /// Wrap a composed call in `Sudo::sudo`. Sudo's argument is the runtime
    /// call itself, so the outer bytes are indices plus the encoded inner
    /// call.
    async fn submit_sudo(&self, inner: CallDescriptor) -> Result<Receipt> {
        let inner_bytes = self.client.encode_call(&inner)?;
        let (pallet_index, call_index) = self.client.call_index("Sudo", "sudo")?;
        let mut call_data = vec![pallet_index, call_index];
        call_data.extend_from_slice(&inner_bytes);
        self.client
            .submit_call_data("Sudo", "sudo", call_data, &self.signer, &self.opts())
            .await
    }

    /// Transfer `amount` to `dest` (SS58), waiting for inclusion.
    pub async fn fund(&self, dest: &str, amount: u128) -> Result<Receipt> {
        let (dest_account, _) = decode_ss58(dest)?;
        let call = self.registry.compose(
            "Balances",
            "transfer",
            vec![
                ("dest", multi_address(&dest_account)),
                ("value", Value::u128(amount)),
            ],
        )?;
        self.submit(call).await
    }

    /// Register a parachain with the relay chain (sudo): runtime wasm plus
    /// genesis head, both opaque blobs.
    pub async fn register_parachain(
        &self,
        para_id: u32,
        validation_code: Vec<u8>,
        genesis_head: Vec<u8>,
    ) -> Result<Receipt> {
        info!(para_id, code_len = validation_code.len(), "registering parachain");
        let inner = self.registry.compose(
            "ParasSudoWrapper",
            "sudo_schedule_para_initialize",
            vec![
                ("id", Value::u128(para_id as u128)),
                (
                    "genesis",
                    Value::named_composite([
                        ("genesis_head", Value::from_bytes(genesis_head)),
                        ("validation_code", Value::from_bytes(validation_code)),
                        ("parachain", Value::bool(true)),
                    ]),
                ),
            ],
        )?;
        self.submit_sudo(inner).await
    }

    /// Open a one-directional HRMP channel between two parachain ids
    /// (sudo). Capacity and message size are fixed deployment parameters.
    pub async fn open_channel(&self, from: u32, to: u32) -> Result<Receipt> {
        if from == to {
            return Err(Error::InvalidInput(
                "channel endpoints must differ".to_string(),
            ));
        }
        let inner = self.registry.compose(
            "ParasSudoWrapper",
            "sudo_establish_hrmp_channel",
            vec![
                ("sender", Value::u128(from as u128)),
                ("recipient", Value::u128(to as u128)),
                ("max_capacity", Value::u128(HRMP_MAX_CAPACITY as u128)),
                (
                    "max_message_size",
                    Value::u128(HRMP_MAX_MESSAGE_SIZE as u128),
                ),
            ],
        )?;
        self.submit_sudo(inner).await
    }

    /// Send an opaque upward message to the relay chain.
    pub async fn send_upward(&self, msg: Vec<u8>) -> Result<Receipt> {
        let call = self.registry.compose(
            &self.config.messaging_pallet,
            "send_relay_chain",
            vec![("call", Value::from_bytes(msg))],
        )?;
        self.submit(call).await
    }

    /// Send an opaque lateral message to a sibling parachain.
    pub async fn send_lateral(&self, para_id: u32, msg: Vec<u8>) -> Result<Receipt> {
        let call = self.registry.compose(
            &self.config.messaging_pallet,
            "send_para_chain",
            vec![
                ("paraid", Value::u128(para_id as u128)),
                ("call", Value::from_bytes(msg)),
            ],
        )?;
        self.submit(call).await
    }

    /// Register the signer's device on the marketplace (Off -> Ready when
    /// `onoff` is set).
    pub async fn register_device(&self, penalty: u128, wcd: u64, onoff: bool) -> Result<Receipt> {
        let mut params: Vec<(&str, Value)> = Vec::new();
        if self.config.role == MarketRole::Parachain {
            params.push(("paraid", Value::u128(self.config.para_id as u128)));
        }
        params.extend([
            ("penalty", Value::u128(penalty)),
            ("wcd", Value::u128(wcd as u128)),
            ("onoff", Value::bool(onoff)),
        ]);
        let call = self
            .registry
            .compose(&self.config.market_pallet, "register", params)?;
        self.submit(call).await
    }

    /// Explicit Off/Ready toggle for the signer's device.
    pub async fn set_device_state(&self, onoff: bool) -> Result<Receipt> {
        let call = self.registry.compose(
            &self.config.market_pallet,
            "set_state",
            vec![("onoff", Value::bool(onoff))],
        )?;
        self.submit(call).await
    }

    /// Place an order against `device`, valid for `window` on-chain time
    /// units from the chain's current timestamp.
    ///
    /// The deadline comes from `Timestamp::Now`, not the operator's clock;
    /// clock skew between operator and node is expected.
    pub async fn place_order(
        &self,
        device: &str,
        args: u64,
        fee: u128,
        window: u64,
    ) -> Result<Receipt> {
        let (device_account, _) = decode_ss58(device)?;

        // Fail fast only when a fresh read proves the precondition broken;
        // an unregistered device is still submitted and judged ledger-side.
        if let Some(profile) = self
            .client
            .device_profile(&self.config.market_pallet, &AccountId32(device_account))
            .await?
        {
            if !profile.state.accepts_orders() {
                return Err(Error::TransitionRejected(format!(
                    "device is {:?}, not Ready",
                    profile.state
                )));
            }
        }

        let now = self.client.timestamp_now().await?;
        let until = order_deadline(now, window)?;
        info!(device, until, fee, "placing order");
        let call = self.registry.compose(
            &self.config.order_pallet,
            "order",
            vec![(
                "order",
                Value::named_composite([
                    ("until", Value::u128(until as u128)),
                    ("args", Value::u128(args as u128)),
                    ("fee", Value::u128(fee)),
                    ("device", Value::from_bytes(device_account)),
                ]),
            )],
        )?;
        self.submit(call).await
    }

    /// Client-side cancel of an overdue order held by `device`.
    pub async fn cancel_order(&self, device: &str) -> Result<Receipt> {
        let (device_account, _) = decode_ss58(device)?;
        let call = self.registry.compose(
            &self.config.order_pallet,
            "cancel",
            vec![("device", Value::from_bytes(device_account))],
        )?;
        self.submit(call).await
    }

    /// Device-side accept (`reject = false`) or reject of the pending
    /// order. Rejecting with `onoff = false` doubles as a halt: the device
    /// lands in Off.
    pub async fn accept_order(&self, reject: bool, onoff: bool) -> Result<Receipt> {
        let call = self.registry.compose(
            &self.config.market_pallet,
            "accept",
            vec![("reject", Value::bool(reject)), ("onoff", Value::bool(onoff))],
        )?;
        self.submit(call).await
    }

    /// Device-side service completion; `onoff` selects Ready or Off after
    /// the cooldown.
    pub async fn complete(&self, onoff: bool) -> Result<Receipt> {
        let call = self.registry.compose(
            &self.config.market_pallet,
            "done",
            vec![("onoff", Value::bool(onoff))],
        )?;
        self.submit(call).await
    }

    /// The signer device's current profile, if registered.
    pub async fn device_profile(&self) -> Result<Option<DeviceProfile>> {
        self.client
            .device_profile(&self.config.market_pallet, &self.account())
            .await
    }

    /// Human-readable device/account overview. Accounts with no chain-side
    /// entry are reported absent, not as errors.
    pub async fn summary(
        &self,
        para_ids: &[u32],
        named_accounts: &[(String, String)],
    ) -> Result<Summary> {
        let device = self.device_profile().await?;
        let device_address = self.address()?;

        let mut accounts = Vec::new();
        for &id in para_ids {
            for relation in [Relation::Parent, Relation::Sibling] {
                let address = sovereign_ss58(id, relation, self.config.ss58_version)?;
                let (account, _) = decode_ss58(&address)?;
                let free = self.client.free_balance(&AccountId32(account)).await?;
                accounts.push(AccountSummary {
                    name: format!("{} {}", relation.tag(), id),
                    address,
                    free,
                });
            }
        }
        for (name, address) in named_accounts {
            let (account, _) = decode_ss58(address)?;
            let free = self.client.free_balance(&AccountId32(account)).await?;
            accounts.push(AccountSummary {
                name: name.clone(),
                address: address.clone(),
                free,
            });
        }
        let free = self.client.free_balance(&self.account()).await?;
        accounts.push(AccountSummary {
            name: "device".to_string(),
            address: device_address.clone(),
            free,
        });

        Ok(Summary {
            device,
            device_address,
            accounts,
        })
    }
}

/// One account line of a summary.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub name: String,
    pub address: String,
    /// Free balance; `None` when the account has no chain-side entry
    pub free: Option<u128>,
}

/// Device/account overview returned by [`Operator::summary`].
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub device: Option<DeviceProfile>,
    pub device_address: String,
    pub accounts: Vec<AccountSummary>,
}

/// `MultiAddress::Id` value for a 32-byte account.
fn multi_address(account: &[u8; 32]) -> Value {
    Value::unnamed_variant("Id", [Value::from_bytes(account)])
}

/// Absolute order deadline from the chain's now and a caller-supplied
/// window. The window is untrusted input; a deadline past `u64::MAX` is
/// rejected rather than wrapped.
fn order_deadline(now: u64, window: u64) -> Result<u64> {
    now.checked_add(window).ok_or_else(|| {
        Error::InvalidInput(format!("order window {} overflows the deadline", window))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_match_deployment() {
        let config = OperatorConfig::default();
        assert_eq!(config.url, "ws://localhost:9944");
        assert_eq!(config.ss58_version, 42);
        assert_eq!(config.market_pallet, "XchangePallet");
        assert_eq!(config.para_id, 2000);
    }

    #[test]
    fn test_config_for_role() {
        let config = OperatorConfig::for_role(MarketRole::Service);
        assert_eq!(config.market_pallet, "ServiceModule");
    }

    #[test]
    fn test_config_from_json() {
        let config: OperatorConfig = serde_json::from_str(
            r#"{
                "url": "ws://node:9944",
                "role": "service",
                "market-pallet": "ServiceModule",
                "inclusion-timeout-secs": 30
            }"#,
        )
        .unwrap();
        assert_eq!(config.url, "ws://node:9944");
        assert_eq!(config.role, MarketRole::Service);
        assert_eq!(config.inclusion_timeout_secs, 30);
        // unspecified fields keep deployment defaults
        assert_eq!(config.order_pallet, "ClientModule");
    }

    #[test]
    fn test_keypair_from_suri_derivation() {
        let root = keypair_from_suri("//Device").unwrap();
        let child = keypair_from_suri("//Device//1").unwrap();
        assert_ne!(root.public_key().0, child.public_key().0);
        // derivation is deterministic
        let again = keypair_from_suri("//Device//1").unwrap();
        assert_eq!(child.public_key().0, again.public_key().0);
    }

    #[test]
    fn test_keypair_from_bad_suri() {
        // a bare phrase must be a valid mnemonic
        assert!(keypair_from_suri("notamnemonic").is_err());
    }

    #[test]
    fn test_order_deadline_rejects_overflow() {
        assert_eq!(order_deadline(1_000, 10_000_000).unwrap(), 10_001_000);
        assert_eq!(order_deadline(u64::MAX, 0).unwrap(), u64::MAX);
        assert!(matches!(
            order_deadline(u64::MAX, 1),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_channel_limits() {
        assert_eq!(HRMP_MAX_CAPACITY, 5);
        assert_eq!(HRMP_MAX_MESSAGE_SIZE, 500);
    }
}
