use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{
    config::{DingTalkAccountConfig, DingTalkCredentials},
    dispatch::DeliveryDispatcher,
    webhook_cache::SessionWebhookCache,
};

/// Shared account state map.
pub type AccountStateMap = Arc<RwLock<HashMap<String, AccountState>>>;

/// Per-account runtime state.
pub struct AccountState {
    pub account_id: String,
    pub config: DingTalkAccountConfig,
    pub credentials: DingTalkCredentials,
    pub dispatcher: Arc<DeliveryDispatcher>,
    pub webhooks: Arc<SessionWebhookCache>,
}
