use anyhow::Result;
use rand::Rng;
use shared::domain::UserId;
use tracing::info;

use crate::local_store::KeyValueStore;

pub const IDENTITY_KEY: &str = "sumantra_user_id";
/// Used for diary calls when no identity could be provisioned.
pub const DEMO_USER_ID: &str = "user_demo";

const IDENTITY_PREFIX: &str = "user_";
const IDENTITY_SUFFIX_LEN: usize = 8;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

pub fn generate_user_id() -> UserId {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..IDENTITY_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    UserId(format!("{IDENTITY_PREFIX}{suffix}"))
}

/// Returns the persisted identity, creating and storing one on first use.
pub fn provision_identity(store: &dyn KeyValueStore) -> Result<UserId> {
    if let Some(existing) = store.get(IDENTITY_KEY)?.filter(|id| !id.trim().is_empty()) {
        return Ok(UserId(existing));
    }
    let id = generate_user_id();
    store.set(IDENTITY_KEY, id.as_str())?;
    info!(user_id = %id, "provisioned new session identity");
    Ok(id)
}
