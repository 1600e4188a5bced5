//! Call composition against a fixed registry of known extrinsics
//!
//! Composition is pure: parameter names and arity are checked against the
//! registry here, value shapes are checked later when the call is encoded
//! against the node's runtime metadata.

use crate::error::{Error, Result};
use crate::types::MarketRole;
use std::collections::HashMap;
use subxt::dynamic::Value;
use subxt::ext::scale_value::Composite;
use subxt::tx::DynamicPayload;

/// A typed, unsigned call descriptor: pallet, function, ordered named
/// parameters. Transient — encoded, wrapped in an envelope, discarded.
#[derive(Debug, Clone)]
pub struct CallDescriptor {
    pub pallet: String,
    pub function: String,
    params: Vec<(String, Value)>,
}

impl CallDescriptor {
    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }

    /// Dynamic payload for metadata-driven encoding.
    pub fn to_payload(&self) -> DynamicPayload {
        subxt::dynamic::tx(
            self.pallet.as_str(),
            self.function.as_str(),
            Composite::Named(self.params.clone()),
        )
    }
}

/// The fixed set of (pallet, function) pairs the workflows use, with their
/// expected parameter names in order. Marketplace pallet names are injected
/// from deployment configuration.
pub struct CallRegistry {
    calls: HashMap<(String, String), Vec<&'static str>>,
}

impl CallRegistry {
    pub fn for_deployment(
        role: MarketRole,
        market_pallet: &str,
        order_pallet: &str,
        messaging_pallet: &str,
    ) -> Self {
        let mut calls: HashMap<(String, String), Vec<&'static str>> = HashMap::new();
        let mut put = |pallet: &str, function: &str, names: &[&'static str]| {
            calls.insert(
                (pallet.to_string(), function.to_string()),
                names.to_vec(),
            );
        };

        put("Balances", "transfer", &["dest", "value"]);
        put(
            "ParasSudoWrapper",
            "sudo_schedule_para_initialize",
            &["id", "genesis"],
        );
        put(
            "ParasSudoWrapper",
            "sudo_establish_hrmp_channel",
            &["sender", "recipient", "max_capacity", "max_message_size"],
        );
        put(messaging_pallet, "send_relay_chain", &["call"]);
        put(messaging_pallet, "send_para_chain", &["paraid", "call"]);
        match role {
            MarketRole::Service => put(market_pallet, "register", &["penalty", "wcd", "onoff"]),
            MarketRole::Parachain => put(
                market_pallet,
                "register",
                &["paraid", "penalty", "wcd", "onoff"],
            ),
        }
        put(market_pallet, "accept", &["reject", "onoff"]);
        put(market_pallet, "done", &["onoff"]);
        put(market_pallet, "set_state", &["onoff"]);
        put(order_pallet, "order", &["order"]);
        put(order_pallet, "cancel", &["device"]);

        Self { calls }
    }

    /// Compose a call, validating parameter names and arity.
    pub fn compose(
        &self,
        pallet: &str,
        function: &str,
        params: Vec<(&str, Value)>,
    ) -> Result<CallDescriptor> {
        let expected = self
            .calls
            .get(&(pallet.to_string(), function.to_string()))
            .ok_or_else(|| Error::UnknownCall {
                pallet: pallet.to_string(),
                function: function.to_string(),
            })?;

        if params.len() != expected.len() {
            return Err(Error::ParamMismatch {
                pallet: pallet.to_string(),
                function: function.to_string(),
                detail: format!(
                    "expected {} parameters, got {}",
                    expected.len(),
                    params.len()
                ),
            });
        }
        for ((name, _), want) in params.iter().zip(expected.iter()) {
            if name != want {
                return Err(Error::ParamMismatch {
                    pallet: pallet.to_string(),
                    function: function.to_string(),
                    detail: format!("expected parameter `{}`, got `{}`", want, name),
                });
            }
        }

        Ok(CallDescriptor {
            pallet: pallet.to_string(),
            function: function.to_string(),
            params: params
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        })
    }

    pub fn contains(&self, pallet: &str, function: &str) -> bool {
        self.calls
            .contains_key(&(pallet.to_string(), function.to_string()))
    }
}
